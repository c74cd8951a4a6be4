//! Argument parsing helpers shared by subcommands.

use anyhow::{anyhow, bail, Context, Result};
use jenx_core::permutation::{self, ParameterSelection};
use jenx_core::run::JobSpec;
use url::Url;

use super::SelectionArgs;

fn split_assignment(s: &str) -> Result<(&str, &str), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing parameter name in {s:?}"));
    }
    Ok((name, value))
}

/// `NAME=VALUE`; the value may be empty or contain `=`.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    let (name, value) = split_assignment(s)?;
    Ok((name.to_string(), value.to_string()))
}

/// `NAME=V1,V2,...`; blank entries are dropped, so `NAME=` is an empty choice.
pub fn parse_choice(s: &str) -> Result<(String, Vec<String>), String> {
    let (name, values) = split_assignment(s)?;
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok((name.to_string(), values))
}

pub fn selection(args: &SelectionArgs) -> ParameterSelection {
    let mut sel = ParameterSelection::new();
    for (name, value) in &args.params {
        sel = sel.fixed(name.as_str(), value.as_str());
    }
    for (name, values) in &args.choices {
        sel = sel.choice(name.as_str(), values.iter().map(String::as_str));
    }
    sel
}

/// Expand the selection, capped by `--max-permutations` or the config value.
pub fn build_specs(args: &SelectionArgs, default_max: usize) -> Result<Vec<JobSpec>> {
    let max = args.max_permutations.unwrap_or(default_max);
    Ok(permutation::build(&selection(args), max)?)
}

/// Accept a full job URL, or a slash-separated job path under `host`.
/// Path segments are percent-encoded (`my job` becomes `my%20job`).
pub fn job_url(host: &str, job: &str) -> Result<String> {
    let job = job.trim();
    if job.starts_with("http://") || job.starts_with("https://") {
        return Ok(format!("{}/", job.trim_end_matches('/')));
    }
    let segments: Vec<&str> = job.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        bail!("job path is empty");
    }
    let mut url = Url::parse(host).with_context(|| format!("target host {host:?} is not a URL"))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| anyhow!("target host {host:?} cannot hold a job path"))?;
        path.pop_if_empty();
        for seg in segments {
            path.push("job").push(seg);
        }
        path.push("");
    }
    Ok(url.into())
}

/// Slash-joined folder path of a Jenkins folder URL (`.../job/a/job/b/` is `a/b`).
pub fn folder_prefix(url: &str) -> String {
    let segments: Vec<&str> = url.split('/').collect();
    segments
        .windows(2)
        .filter(|w| w[0] == "job" && !w[1].is_empty())
        .map(|w| w[1])
        .collect::<Vec<_>>()
        .join("/")
}
