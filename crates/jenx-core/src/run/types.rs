//! Types shared by the run executor and its consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::remote::ProtocolError;

/// One concrete parameter assignment, executed as a single remote build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JobSpec {
    params: BTreeMap<String, String>,
}

impl JobSpec {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// `NAME=value` pairs joined with ", " in name order (for tables and logs).
    pub fn summary(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Lifecycle state of one job in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Planned,
    Queued,
    Running,
    Success,
    Failed,
    Aborted,
    /// Protocol or transport failure (the build may never have run).
    Error,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Planned => "PLANNED",
            RunState::Queued => "QUEUED",
            RunState::Running => "RUNNING",
            RunState::Success => "SUCCESS",
            RunState::Failed => "FAILED",
            RunState::Aborted => "ABORTED",
            RunState::Error => "ERROR",
        }
    }

    /// Map a Jenkins build result string to a terminal state.
    pub fn from_result(result: &str) -> Self {
        match result {
            "SUCCESS" => RunState::Success,
            "ABORTED" => RunState::Aborted,
            _ => RunState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Success | RunState::Failed | RunState::Aborted | RunState::Error
        )
    }

    /// Terminal states that make a job eligible for a failed-only retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, RunState::Failed | RunState::Aborted | RunState::Error)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress event for the job at `index` in the submitted batch.
///
/// Fields are last-write-wins: consumers overwrite only the fields that are
/// present, so a later `Running` event does not erase an earlier queue URL.
#[derive(Debug, Clone)]
pub struct RunUpdate {
    pub index: usize,
    pub state: RunState,
    pub queue_url: Option<String>,
    pub build_url: Option<String>,
    pub build_number: Option<u64>,
    pub result: Option<String>,
    pub error: Option<Arc<ProtocolError>>,
    /// Terminal event for this index; nothing follows it.
    pub done: bool,
}

impl RunUpdate {
    pub fn new(index: usize, state: RunState) -> Self {
        Self {
            index,
            state,
            queue_url: None,
            build_url: None,
            build_number: None,
            result: None,
            error: None,
            done: false,
        }
    }

    pub(crate) fn with_queue_url(mut self, url: &str) -> Self {
        self.queue_url = Some(url.to_string());
        self
    }

    pub(crate) fn with_build(mut self, url: &str, number: u64) -> Self {
        self.build_url = Some(url.to_string());
        self.build_number = Some(number);
        self
    }

    pub(crate) fn with_result(mut self, result: String) -> Self {
        self.result = Some(result);
        self
    }

    pub(crate) fn with_error(mut self, err: ProtocolError) -> Self {
        self.error = Some(Arc::new(err));
        self
    }

    pub(crate) fn finished(mut self) -> Self {
        self.done = true;
        self
    }
}
