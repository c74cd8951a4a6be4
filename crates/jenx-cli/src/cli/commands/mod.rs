//! CLI command handlers, one file per subcommand.

mod jobs;
mod params;
mod plan;
mod run;
mod targets;

use anyhow::{anyhow, Context, Result};
use jenx_core::config::{JenxConfig, Target};
use jenx_core::credentials;
use jenx_core::remote::JenkinsClient;
use std::sync::Arc;

pub use jobs::run_jobs;
pub use params::run_params;
pub use plan::run_plan;
pub use run::{run_permutations, RunOptions};
pub use targets::run_targets;

/// Look up `target_id`, resolve its token and build a client for it.
fn connect(cfg: &JenxConfig, target_id: &str) -> Result<(Target, Arc<JenkinsClient>)> {
    let target = cfg.target(target_id).cloned().ok_or_else(|| {
        let known: Vec<&str> = cfg.targets.iter().map(|t| t.id.as_str()).collect();
        if known.is_empty() {
            anyhow!("unknown target {target_id:?}; no targets configured")
        } else {
            anyhow!("unknown target {target_id:?}; configured: {}", known.join(", "))
        }
    })?;
    let token = credentials::resolve_token(&target)
        .with_context(|| format!("resolve credential for target {}", target.id))?;
    let client = JenkinsClient::new(&target, token, cfg.request_timeout());
    tracing::debug!(target = %target.id, host = %client.host(), "client ready");
    Ok((target, Arc::new(client)))
}
