//! Async protocol steps over a blocking `BuildApi`.
//!
//! Every request runs on the blocking pool and races the batch cancellation
//! token. Polling waits one interval before each lookup and tolerates up to
//! `MAX_TRANSIENT_FAILURES` consecutive lookup errors; any successful lookup
//! resets the count.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::error::{ApiError, ProtocolError};
use super::{BuildApi, Executable};

/// Consecutive lookup failures swallowed while polling; one more is fatal.
pub const MAX_TRANSIENT_FAILURES: u32 = 5;

/// Result reported when Jenkins says a build finished but gives no result.
pub const UNKNOWN_RESULT: &str = "UNKNOWN";

/// Fixed polling intervals for queue resolution and build polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub queue_interval: Duration,
    pub build_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            queue_interval: Duration::from_secs(2),
            build_interval: Duration::from_secs(3),
        }
    }
}

/// Run one blocking API call, giving up early if the scope is cancelled.
///
/// A cancelled call is detached; curl's request timeout bounds how long it
/// keeps running in the background.
async fn blocking_call<A, T, F>(
    api: &Arc<A>,
    cancel: &CancellationToken,
    f: F,
) -> Result<Result<T, ApiError>, ProtocolError>
where
    A: BuildApi,
    T: Send + 'static,
    F: FnOnce(&A) -> Result<T, ApiError> + Send + 'static,
{
    let api = Arc::clone(api);
    let handle = tokio::task::spawn_blocking(move || f(&api));
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
        joined = handle => joined.map_err(|e| ProtocolError::Join(e.to_string())),
    }
}

async fn tick(cancel: &CancellationToken, interval: Duration) -> Result<(), ProtocolError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}

/// Consecutive-failure counter for one polling loop.
struct FailureBudget {
    operation: &'static str,
    consecutive: u32,
}

impl FailureBudget {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            consecutive: 0,
        }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }

    fn record(&mut self, url: &str, err: ApiError) -> Result<(), ProtocolError> {
        self.consecutive += 1;
        if self.consecutive > MAX_TRANSIENT_FAILURES {
            return Err(ProtocolError::Exhausted {
                operation: self.operation,
                failures: self.consecutive,
                source: err,
            });
        }
        tracing::warn!(
            operation = self.operation,
            url,
            failures = self.consecutive,
            transient = err.is_transient(),
            error = %err,
            "transient lookup failure, retrying"
        );
        Ok(())
    }
}

/// Queue a build. Trigger failures are returned as-is and never retried.
pub async fn trigger<A: BuildApi>(
    api: &Arc<A>,
    cancel: &CancellationToken,
    job_url: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, ProtocolError> {
    if cancel.is_cancelled() {
        return Err(ProtocolError::Cancelled);
    }
    let job_url = job_url.to_string();
    let params = params.clone();
    blocking_call(api, cancel, move |api| api.trigger(&job_url, &params))
        .await?
        .map_err(ProtocolError::Trigger)
}

/// Poll a queue item until it becomes a build or is cancelled.
pub async fn resolve_queue<A: BuildApi>(
    api: &Arc<A>,
    cancel: &CancellationToken,
    queue_url: &str,
    interval: Duration,
) -> Result<Executable, ProtocolError> {
    let mut failures = FailureBudget::new("resolve queue");
    loop {
        tick(cancel, interval).await?;
        let url = queue_url.to_string();
        match blocking_call(api, cancel, move |api| api.queue_item(&url)).await? {
            Ok(item) => {
                failures.reset();
                if item.cancelled {
                    return Err(ProtocolError::QueueCancelled);
                }
                if let Some(exe) = item.executable.filter(|e| !e.url.is_empty()) {
                    return Ok(exe);
                }
                tracing::trace!(queue_url, "still queued");
            }
            Err(e) => failures.record(queue_url, e)?,
        }
    }
}

/// Poll a build until it stops building; returns its result string.
///
/// A finished build without a result yields `UNKNOWN`.
pub async fn poll_build<A: BuildApi>(
    api: &Arc<A>,
    cancel: &CancellationToken,
    build_url: &str,
    interval: Duration,
) -> Result<String, ProtocolError> {
    let mut failures = FailureBudget::new("poll build");
    loop {
        tick(cancel, interval).await?;
        let url = build_url.to_string();
        match blocking_call(api, cancel, move |api| api.build_status(&url)).await? {
            Ok(status) => {
                failures.reset();
                if !status.building {
                    return Ok(status
                        .result
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| UNKNOWN_RESULT.to_string()));
                }
            }
            Err(e) => failures.record(build_url, e)?,
        }
    }
}
