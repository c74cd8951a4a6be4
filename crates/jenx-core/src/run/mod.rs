//! Job lifecycle: data model, bounded executor, and batch aggregation.
//!
//! Per job the executor moves through
//! `Planned → Queued → Queued(queue url) → Running(build) → Success | Failed | Aborted`,
//! with `Error` possible at any step. Events for one index are emitted in that
//! order; events of different indices interleave freely.

mod batch;
mod executor;
mod types;

pub use batch::{BatchSummary, RunBatch, RunRecord};
pub use executor::{ExecutorConfig, RunExecutor};
pub use types::{JobSpec, RunState, RunUpdate};
