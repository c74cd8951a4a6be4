//! Error types for Jenkins API calls and the build protocol built on them.

/// Failure of a single Jenkins API request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport failure reported by curl (timeout, connection, TLS).
    #[error(transparent)]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("{method} {url} failed ({status}): {body}")]
    Http {
        method: &'static str,
        url: String,
        status: u32,
        body: String,
    },
    /// Response body was not the JSON we expected.
    #[error("decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("trigger succeeded but queue location missing")]
    MissingLocation,
    #[error("fetch crumb failed ({status}): {body}")]
    Crumb { status: u32, body: String },
}

impl ApiError {
    /// True for failures that may clear up on their own (network, 5xx, throttling).
    ///
    /// Polling treats every lookup failure as transient regardless; this is
    /// for callers that want to report the distinction.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Curl(e) => {
                e.is_operation_timedout()
                    || e.is_couldnt_connect()
                    || e.is_couldnt_resolve_host()
                    || e.is_recv_error()
                    || e.is_send_error()
                    || e.is_got_nothing()
            }
            ApiError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            ApiError::Decode { .. } | ApiError::MissingLocation | ApiError::Crumb { .. } => false,
        }
    }
}

/// Terminal outcome of driving one job through the build protocol.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The trigger request failed. Never retried: it may not be idempotent.
    #[error("trigger failed: {0}")]
    Trigger(#[source] ApiError),
    /// Jenkins reports the queue item was cancelled by someone else.
    #[error("queue item cancelled")]
    QueueCancelled,
    /// Too many consecutive lookup failures while polling.
    #[error("{operation} failed after {failures} consecutive errors: {source}")]
    Exhausted {
        operation: &'static str,
        failures: u32,
        #[source]
        source: ApiError,
    },
    /// The blocking request task panicked or was torn down.
    #[error("remote call aborted: {0}")]
    Join(String),
    /// The batch scope was cancelled; not reported per job.
    #[error("run cancelled")]
    Cancelled,
}
