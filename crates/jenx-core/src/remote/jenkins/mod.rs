//! Jenkins remote API client over libcurl.
//!
//! One `Easy` handle per request, basic auth with the target's API token,
//! a client-wide request timeout. Calls block; async callers go through
//! `spawn_blocking` (see `remote::poll`).

mod wire;

use std::collections::BTreeMap;
use std::str;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::error::ApiError;
use super::{BuildApi, BuildStatus, QueueItem};
use crate::config::Target;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const JOB_TREE: &str = "jobs[name,url,_class]";
const PARAM_TREE: &str = "actions[parameterDefinitions[name,description,type,choices,defaultParameterValue[value]]],\
property[parameterDefinitions[name,description,type,choices,defaultParameterValue[value]]]";

/// Escape the brackets of a `tree=` filter for the request line.
fn tree_query(tree: &str) -> String {
    tree.replace('[', "%5B").replace(']', "%5D")
}

/// Entry in a folder listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobNodeKind {
    Folder,
    Job,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobNode {
    pub name: String,
    /// Slash-joined path from the listing root.
    pub full_name: String,
    pub url: String,
    pub kind: JobNodeKind,
}

/// Parameter kinds jenx understands; other definition types are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Choice,
    String,
    Text,
    Boolean,
    Password,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Choice => "choice",
            ParamKind::String => "string",
            ParamKind::Text => "text",
            ParamKind::Boolean => "boolean",
            ParamKind::Password => "password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub choices: Vec<String>,
    pub default: String,
}

/// CSRF crumb handshake state; fetched at most once per client.
#[derive(Debug)]
enum CrumbState {
    Unknown,
    /// Crumb issuer absent (404) or returned an empty crumb.
    Disabled,
    Issued { field: String, value: String },
}

struct Response {
    status: u32,
    headers: Vec<String>,
    body: Vec<u8>,
}

impl Response {
    fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().rev().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// Client for one configured Jenkins target.
pub struct JenkinsClient {
    host: String,
    username: String,
    token: String,
    timeout: Duration,
    insecure: bool,
    crumb: Mutex<CrumbState>,
}

impl JenkinsClient {
    pub fn new(target: &Target, token: String, timeout: Duration) -> Self {
        Self {
            host: target.host.trim_end_matches('/').to_string(),
            username: target.username.clone(),
            token,
            timeout,
            insecure: target.insecure_skip_tls_verify,
            crumb: Mutex::new(CrumbState::Unknown),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn perform(
        &self,
        method: &'static str,
        url: &str,
        form: Option<&str>,
        headers: &[String],
    ) -> Result<Response, ApiError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url)?;
        easy.connect_timeout(CONNECT_TIMEOUT)?;
        easy.timeout(self.timeout)?;
        if !self.username.is_empty() {
            easy.username(&self.username)?;
            easy.password(&self.token)?;
        }
        if self.insecure {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        if let Some(body) = form {
            easy.post(true)?;
            easy.post_fields_copy(body.as_bytes())?;
        }

        let mut list = curl::easy::List::new();
        for h in headers {
            list.append(h)?;
        }
        if form.is_some() {
            list.append("Content-Type: application/x-www-form-urlencoded")?;
        }
        easy.http_headers(list)?;

        let mut resp_headers = Vec::new();
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    resp_headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        let status = easy.response_code()?;
        tracing::trace!(method, url, status, "jenkins request");
        Ok(Response {
            status,
            headers: resp_headers,
            body,
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let resp = self.perform("GET", url, None, &[])?;
        if !resp.ok() {
            return Err(ApiError::Http {
                method: "GET",
                url: url.to_string(),
                status: resp.status,
                body: resp.body_text(),
            });
        }
        serde_json::from_slice(&resp.body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Crumb header line for state-changing requests, fetching it on first use.
    ///
    /// The lock is held across the fetch so concurrent triggers share one
    /// handshake. A failed fetch leaves the state unknown for the next caller.
    fn crumb_header(&self) -> Result<Option<String>, ApiError> {
        let mut state = self.crumb.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*state, CrumbState::Unknown) {
            *state = self.fetch_crumb()?;
        }
        Ok(match &*state {
            CrumbState::Issued { field, value } => Some(format!("{field}: {value}")),
            CrumbState::Unknown | CrumbState::Disabled => None,
        })
    }

    fn fetch_crumb(&self) -> Result<CrumbState, ApiError> {
        let url = format!("{}/crumbIssuer/api/json", self.host);
        let resp = self.perform("GET", &url, None, &[])?;
        if resp.status == 404 {
            tracing::debug!(host = %self.host, "crumb issuer disabled");
            return Ok(CrumbState::Disabled);
        }
        if !resp.ok() {
            return Err(ApiError::Crumb {
                status: resp.status,
                body: resp.body_text(),
            });
        }
        let crumb: wire::CrumbResp =
            serde_json::from_slice(&resp.body).map_err(|source| ApiError::Decode { url, source })?;
        if crumb.field.is_empty() || crumb.value.is_empty() {
            return Ok(CrumbState::Disabled);
        }
        tracing::debug!(host = %self.host, field = %crumb.field, "crumb acquired");
        Ok(CrumbState::Issued {
            field: crumb.field,
            value: crumb.value,
        })
    }

    /// List one folder level (the server root when `folder_url` is empty).
    pub fn list_jobs(&self, folder_url: &str, prefix: &str) -> Result<Vec<JobNode>, ApiError> {
        let base = if folder_url.trim().is_empty() {
            self.host.as_str()
        } else {
            folder_url.trim().trim_end_matches('/')
        };
        let url = format!("{base}/api/json?tree={}", tree_query(JOB_TREE));
        let resp: wire::JobListResp = self.get_json(&url)?;
        Ok(wire::job_nodes(resp, prefix))
    }

    /// Parameter definitions declared by a job.
    pub fn job_params(&self, job_url: &str) -> Result<Vec<ParamDef>, ApiError> {
        let url = format!(
            "{}/api/json?tree={}",
            job_url.trim_end_matches('/'),
            tree_query(PARAM_TREE)
        );
        let resp: wire::JobParamsResp = self.get_json(&url)?;
        Ok(wire::param_defs(resp))
    }
}

impl BuildApi for JenkinsClient {
    fn trigger(&self, job_url: &str, params: &BTreeMap<String, String>) -> Result<String, ApiError> {
        let headers: Vec<String> = self.crumb_header()?.into_iter().collect();
        let form = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let url = format!("{}/buildWithParameters", job_url.trim_end_matches('/'));
        let resp = self.perform("POST", &url, Some(&form), &headers)?;
        if !resp.ok() {
            return Err(ApiError::Http {
                method: "POST",
                url,
                status: resp.status,
                body: resp.body_text(),
            });
        }
        match resp.header("location") {
            Some(loc) if !loc.is_empty() => Ok(loc.to_string()),
            _ => Err(ApiError::MissingLocation),
        }
    }

    fn queue_item(&self, queue_url: &str) -> Result<QueueItem, ApiError> {
        let url = format!("{}/api/json", queue_url.trim_end_matches('/'));
        let resp: wire::QueueResp = self.get_json(&url)?;
        Ok(resp.into())
    }

    fn build_status(&self, build_url: &str) -> Result<BuildStatus, ApiError> {
        let url = format!("{}/api/json", build_url.trim_end_matches('/'));
        let resp: wire::BuildResp = self.get_json(&url)?;
        Ok(resp.into())
    }
}
