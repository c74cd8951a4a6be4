//! Remote build protocol.
//!
//! `BuildApi` is the request-level boundary (one blocking HTTP call per
//! method). The async protocol functions in `poll` drive it: trigger once,
//! resolve the queue item, poll the build to a result.

mod error;
mod jenkins;
mod poll;

use std::collections::BTreeMap;

pub use error::{ApiError, ProtocolError};
pub use jenkins::{JenkinsClient, JobNode, JobNodeKind, ParamDef, ParamKind};
pub use poll::{poll_build, resolve_queue, trigger, PollConfig, MAX_TRANSIENT_FAILURES, UNKNOWN_RESULT};

/// A started build, as reported by a queue item once it leaves the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    pub url: String,
    pub number: u64,
}

/// Snapshot of a queue item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueItem {
    pub cancelled: bool,
    pub executable: Option<Executable>,
}

/// Snapshot of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStatus {
    pub building: bool,
    pub result: Option<String>,
}

/// Blocking request-level API. Implementations are shared across workers and
/// called from `spawn_blocking`, so they must be `Send + Sync`.
pub trait BuildApi: Send + Sync + 'static {
    /// Queue a build of `job_url` with `params`; returns the queue item URL.
    fn trigger(&self, job_url: &str, params: &BTreeMap<String, String>) -> Result<String, ApiError>;

    fn queue_item(&self, queue_url: &str) -> Result<QueueItem, ApiError>;

    fn build_status(&self, build_url: &str) -> Result<BuildStatus, ApiError>;
}
