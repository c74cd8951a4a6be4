//! Bounded run executor.
//!
//! A feeder task hands job indices to a fixed pool of workers through one
//! shared work channel; each worker drives one job at a time through the
//! build protocol and reports progress on a single update channel. The
//! update stream closes once every worker has returned.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::remote::{self, BuildApi, PollConfig, ProtocolError};

use super::types::{JobSpec, RunState, RunUpdate};

/// Buffered updates before workers wait on a slow consumer.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Jobs in flight at once; values below 1 are treated as 1.
    pub concurrency: usize,
    pub poll: PollConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll: PollConfig::default(),
        }
    }
}

/// Runs batches of job specs against one `BuildApi`.
pub struct RunExecutor<A> {
    api: Arc<A>,
    cfg: ExecutorConfig,
}

impl<A> Clone for RunExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cfg: self.cfg,
        }
    }
}

impl<A: BuildApi> RunExecutor<A> {
    pub fn new(api: Arc<A>, cfg: ExecutorConfig) -> Self {
        Self { api, cfg }
    }

    pub fn concurrency(&self) -> usize {
        self.cfg.concurrency.max(1)
    }

    /// Start running `specs` against `job_url` and return the update stream.
    ///
    /// Must be called from within a tokio runtime. Cancelling `cancel` stops
    /// claiming and polling; nothing further is emitted for in-flight jobs and
    /// the stream closes after all workers unwind. Dropping the receiver has
    /// the same effect on workers once they next try to report.
    pub fn run(
        &self,
        cancel: CancellationToken,
        job_url: impl Into<String>,
        specs: Vec<JobSpec>,
    ) -> mpsc::Receiver<RunUpdate> {
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let (work_tx, work_rx) = mpsc::channel::<usize>(1);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let specs: Arc<[JobSpec]> = specs.into();
        let job_url: Arc<str> = Arc::from(job_url.into());
        let total = specs.len();
        let concurrency = self.concurrency();

        tracing::info!(jobs = total, concurrency, job_url = %job_url, "run started");

        let mut workers = JoinSet::new();
        for id in 0..concurrency {
            let worker = Worker {
                id,
                api: Arc::clone(&self.api),
                poll: self.cfg.poll,
                job_url: Arc::clone(&job_url),
                specs: Arc::clone(&specs),
                cancel: cancel.clone(),
                work: Arc::clone(&work_rx),
                updates: updates_tx.clone(),
            };
            workers.spawn(worker.run());
        }
        // Workers hold the only senders: the stream closes when they return.
        drop(updates_tx);
        drop(work_rx);

        let feeder_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut fed = 0usize;
            for index in 0..total {
                tokio::select! {
                    biased;
                    _ = feeder_cancel.cancelled() => break,
                    sent = work_tx.send(index) => {
                        if sent.is_err() {
                            break;
                        }
                        fed += 1;
                    }
                }
            }
            drop(work_tx);

            let mut completed = 0usize;
            while let Some(res) = workers.join_next().await {
                match res {
                    Ok(n) => completed += n,
                    Err(e) => tracing::error!("run worker join: {}", e),
                }
            }
            tracing::info!(
                jobs = total,
                fed,
                completed,
                cancelled = feeder_cancel.is_cancelled(),
                "run finished"
            );
        });

        updates_rx
    }
}

struct Worker<A> {
    id: usize,
    api: Arc<A>,
    poll: PollConfig,
    job_url: Arc<str>,
    specs: Arc<[JobSpec]>,
    cancel: CancellationToken,
    work: Arc<Mutex<mpsc::Receiver<usize>>>,
    updates: mpsc::Sender<RunUpdate>,
}

impl<A: BuildApi> Worker<A> {
    /// Claim and run jobs until the work source is drained or the run stops.
    /// Returns the number of jobs that reached a terminal event.
    async fn run(self) -> usize {
        let mut completed = 0;
        while let Some(index) = self.claim().await {
            match self.run_job(index).await {
                JobExit::Finished => completed += 1,
                JobExit::Stopped => break,
            }
        }
        tracing::debug!(worker = self.id, completed, "worker exiting");
        completed
    }

    async fn claim(&self) -> Option<usize> {
        let mut work = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            guard = self.work.lock() => guard,
        };
        let index = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            index = work.recv() => index,
        };
        if self.cancel.is_cancelled() {
            return None;
        }
        index
    }

    /// Send an update unless the run was cancelled or nobody is listening.
    async fn emit(&self, update: RunUpdate) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.updates.send(update) => sent.is_ok(),
        }
    }

    /// Emit the terminal event for a protocol failure; cancellation is silent.
    async fn fail(&self, update: RunUpdate, err: ProtocolError) -> JobExit {
        if matches!(err, ProtocolError::Cancelled) {
            return JobExit::Stopped;
        }
        tracing::warn!(worker = self.id, index = update.index, error = %err, "job failed");
        self.finish(update.with_error(err)).await
    }

    async fn finish(&self, update: RunUpdate) -> JobExit {
        if self.emit(update.finished()).await {
            JobExit::Finished
        } else {
            JobExit::Stopped
        }
    }

    async fn run_job(&self, index: usize) -> JobExit {
        let spec = &self.specs[index];
        tracing::debug!(worker = self.id, index, params = %spec.summary(), "job claimed");
        if !self.emit(RunUpdate::new(index, RunState::Queued)).await {
            return JobExit::Stopped;
        }

        let queue_url = match remote::trigger(&self.api, &self.cancel, &self.job_url, spec.params()).await {
            Ok(url) => url,
            Err(e) => return self.fail(RunUpdate::new(index, RunState::Error), e).await,
        };
        tracing::info!(index, queue_url = %queue_url, "build queued");
        if !self
            .emit(RunUpdate::new(index, RunState::Queued).with_queue_url(&queue_url))
            .await
        {
            return JobExit::Stopped;
        }

        let exe = match remote::resolve_queue(&self.api, &self.cancel, &queue_url, self.poll.queue_interval).await {
            Ok(exe) => exe,
            Err(e) => {
                let update = RunUpdate::new(index, RunState::Error).with_queue_url(&queue_url);
                return self.fail(update, e).await;
            }
        };
        tracing::info!(index, build_url = %exe.url, number = exe.number, "build running");
        let running = RunUpdate::new(index, RunState::Running)
            .with_queue_url(&queue_url)
            .with_build(&exe.url, exe.number);
        if !self.emit(running).await {
            return JobExit::Stopped;
        }

        match remote::poll_build(&self.api, &self.cancel, &exe.url, self.poll.build_interval).await {
            Ok(result) => {
                let state = RunState::from_result(&result);
                tracing::info!(index, build_url = %exe.url, %result, "build finished");
                let update = RunUpdate::new(index, state)
                    .with_build(&exe.url, exe.number)
                    .with_result(result);
                self.finish(update).await
            }
            Err(e) => {
                let update = RunUpdate::new(index, RunState::Error).with_build(&exe.url, exe.number);
                self.fail(update, e).await
            }
        }
    }
}

enum JobExit {
    /// Terminal event delivered; claim the next job.
    Finished,
    /// Cancelled or the consumer went away; stop this worker.
    Stopped,
}
