//! Minimal HTTP/1.1 Jenkins stand-in for integration tests.
//!
//! Serves the crumb issuer, `buildWithParameters`, queue items, build status,
//! a root job listing and one job's parameter definitions. Every queued build
//! leaves the queue on first lookup and finishes with `SUCCESS`. One request
//! per connection.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct JenkinsServerOptions {
    /// If false, the crumb issuer answers 404 (CSRF protection off).
    pub crumb_enabled: bool,
}

impl Default for JenkinsServerOptions {
    fn default() -> Self {
        Self { crumb_enabled: true }
    }
}

/// A `buildWithParameters` request as received.
#[derive(Debug, Clone)]
pub struct TriggerRequest {
    pub form: String,
    pub crumb: Option<String>,
}

#[derive(Default)]
pub struct ServerState {
    pub crumb_hits: AtomicUsize,
    pub triggers: Mutex<Vec<TriggerRequest>>,
    next_item: AtomicU64,
}

pub struct JenkinsServer {
    /// Base URL without trailing slash, e.g. "http://127.0.0.1:12345".
    pub base: String,
    pub state: Arc<ServerState>,
}

impl JenkinsServer {
    pub fn crumb_hits(&self) -> usize {
        self.state.crumb_hits.load(Ordering::SeqCst)
    }

    pub fn triggers(&self) -> Vec<TriggerRequest> {
        self.state.triggers.lock().unwrap().clone()
    }
}

pub fn start() -> JenkinsServer {
    start_with_options(JenkinsServerOptions::default())
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start_with_options(opts: JenkinsServerOptions) -> JenkinsServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}", port);
    let state = Arc::new(ServerState::default());
    {
        let state = Arc::clone(&state);
        let base = base.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&state);
                let base = base.clone();
                thread::spawn(move || handle(stream, &base, &state, opts));
            }
        });
    }
    JenkinsServer { base, state }
}

struct Request {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();
    let path = target.split('?').next().unwrap_or("").to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let len: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(0);
    let mut body = data[head_end..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&buf[..n]);
    }
    Some(Request {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn respond(stream: &mut TcpStream, status: &str, extra: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
        status,
        body.len(),
        extra,
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn handle(mut stream: TcpStream, base: &str, state: &ServerState, opts: JenkinsServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();

    match (req.method.as_str(), segments.as_slice()) {
        ("GET", ["crumbIssuer", "api", "json"]) => {
            state.crumb_hits.fetch_add(1, Ordering::SeqCst);
            if opts.crumb_enabled {
                let body = r#"{"_class":"hudson.security.csrf.DefaultCrumbIssuer","crumb":"c0ffee","crumbRequestField":"Jenkins-Crumb"}"#;
                respond(&mut stream, "200 OK", "", body);
            } else {
                respond(&mut stream, "404 Not Found", "", "");
            }
        }
        ("POST", ["job", "deploy", "buildWithParameters"]) => {
            state.triggers.lock().unwrap().push(TriggerRequest {
                form: req.body.clone(),
                crumb: req.header("Jenkins-Crumb").map(str::to_string),
            });
            let item = state.next_item.fetch_add(1, Ordering::SeqCst) + 1;
            let location = format!("Location: {}/queue/item/{}/\r\n", base, item);
            respond(&mut stream, "201 Created", &location, "");
        }
        ("GET", ["queue", "item", item, "api", "json"]) => {
            let body = format!(
                r#"{{"_class":"hudson.model.Queue$LeftItem","cancelled":false,"executable":{{"_class":"hudson.model.FreeStyleBuild","number":{item},"url":"{base}/job/deploy/{item}/"}}}}"#
            );
            respond(&mut stream, "200 OK", "", &body);
        }
        ("GET", ["job", "deploy", _, "api", "json"]) => {
            let body = r#"{"_class":"hudson.model.FreeStyleBuild","building":false,"result":"SUCCESS"}"#;
            respond(&mut stream, "200 OK", "", body);
        }
        ("GET", ["job", "deploy", "api", "json"]) => {
            let body = r#"{"actions":[{},{"_class":"hudson.model.ParametersDefinitionProperty","parameterDefinitions":[
                {"_class":"hudson.model.ChoiceParameterDefinition","name":"REGION","description":"target region","type":"ChoiceParameterDefinition","choices":["us","eu","ap"],"defaultParameterValue":{"value":"us"}},
                {"_class":"hudson.model.BooleanParameterDefinition","name":"DRY_RUN","type":"BooleanParameterDefinition","defaultParameterValue":{"value":false}},
                {"_class":"hudson.model.FileParameterDefinition","name":"BUNDLE","type":"FileParameterDefinition"}
            ]}],"property":[]}"#;
            respond(&mut stream, "200 OK", "", body);
        }
        ("GET", ["api", "json"]) => {
            let body = format!(
                r#"{{"jobs":[
                    {{"_class":"hudson.model.FreeStyleProject","name":"deploy","url":"{base}/job/deploy/"}},
                    {{"_class":"com.cloudbees.hudson.plugins.folder.Folder","name":"team","url":"{base}/job/team/"}},
                    {{"_class":"hudson.model.FreeStyleProject","name":"deploy","url":"{base}/job/deploy/"}}
                ]}}"#
            );
            respond(&mut stream, "200 OK", "", &body);
        }
        _ => respond(&mut stream, "404 Not Found", "", ""),
    }
}
