//! Per-job records folded from the update stream, and failed-only retry.

use std::time::SystemTime;

use super::types::{JobSpec, RunState, RunUpdate};

/// What is known about one job of a batch.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub index: usize,
    pub spec: JobSpec,
    pub state: RunState,
    pub queue_url: Option<String>,
    pub build_url: Option<String>,
    pub build_number: Option<u64>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
}

/// Counts of records per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub planned: usize,
    pub queued: usize,
    pub running: usize,
    pub success: usize,
    pub failed: usize,
    pub aborted: usize,
    pub error: usize,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.planned + self.queued + self.running + self.success + self.failed + self.aborted + self.error
    }

    /// Jobs that did not end in `Success`, including unfinished ones.
    pub fn unsuccessful(&self) -> usize {
        self.total() - self.success
    }
}

/// Ordered job specs submitted together, with their records.
#[derive(Debug, Clone)]
pub struct RunBatch {
    records: Vec<RunRecord>,
}

impl RunBatch {
    /// Accept `specs` into a batch; every record starts `Planned`.
    pub fn new(specs: Vec<JobSpec>) -> Self {
        let now = SystemTime::now();
        let records = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| RunRecord {
                index,
                spec,
                state: RunState::Planned,
                queue_url: None,
                build_url: None,
                build_number: None,
                result: None,
                error: None,
                started_at: now,
                ended_at: None,
            })
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Specs in batch order, e.g. to hand to the executor.
    pub fn specs(&self) -> Vec<JobSpec> {
        self.records.iter().map(|r| r.spec.clone()).collect()
    }

    /// Fold one update into its record. Unknown indices are ignored; optional
    /// fields only overwrite when the update carries them.
    pub fn apply(&mut self, update: &RunUpdate) {
        let Some(record) = self.records.get_mut(update.index) else {
            tracing::debug!(index = update.index, "update for unknown index ignored");
            return;
        };
        record.state = update.state;
        if let Some(url) = update.queue_url.as_ref().filter(|u| !u.is_empty()) {
            record.queue_url = Some(url.clone());
        }
        if let Some(url) = update.build_url.as_ref().filter(|u| !u.is_empty()) {
            record.build_url = Some(url.clone());
        }
        if let Some(n) = update.build_number.filter(|n| *n != 0) {
            record.build_number = Some(n);
        }
        if let Some(result) = update.result.as_ref().filter(|r| !r.is_empty()) {
            record.result = Some(result.clone());
        }
        if let Some(err) = &update.error {
            record.error = Some(err.to_string());
        }
        if update.done {
            record.ended_at = Some(SystemTime::now());
        }
    }

    /// True when every record is in a terminal state.
    pub fn is_finished(&self) -> bool {
        self.records.iter().all(|r| r.state.is_terminal())
    }

    pub fn summary(&self) -> BatchSummary {
        let mut s = BatchSummary::default();
        for r in &self.records {
            match r.state {
                RunState::Planned => s.planned += 1,
                RunState::Queued => s.queued += 1,
                RunState::Running => s.running += 1,
                RunState::Success => s.success += 1,
                RunState::Failed => s.failed += 1,
                RunState::Aborted => s.aborted += 1,
                RunState::Error => s.error += 1,
            }
        }
        s
    }

    /// Specs whose job ended `Failed`, `Aborted` or `Error`, in batch order.
    pub fn failed_specs(&self) -> Vec<JobSpec> {
        self.records
            .iter()
            .filter(|r| r.state.is_retryable())
            .map(|r| r.spec.clone())
            .collect()
    }

    /// Replace this batch with its failed subset (fresh `Planned` records).
    /// Returns how many jobs were prepared; 0 leaves the batch untouched.
    pub fn retry_failed(&mut self) -> usize {
        let failed = self.failed_specs();
        if failed.is_empty() {
            return 0;
        }
        let n = failed.len();
        *self = RunBatch::new(failed);
        tracing::info!("prepared {} failed run(s) for retry", n);
        n
    }
}
