//! `jenx params --target <id> <job>` – show a job's parameter definitions.

use anyhow::{Context, Result};
use jenx_core::config::JenxConfig;
use jenx_core::remote::ParamKind;

use super::connect;
use crate::cli::args;

pub async fn run_params(cfg: &JenxConfig, target_id: &str, job: &str) -> Result<()> {
    let (target, client) = connect(cfg, target_id)?;
    let job_url = args::job_url(&target.host, job)?;

    let defs = {
        let url = job_url.clone();
        tokio::task::spawn_blocking(move || client.job_params(&url))
            .await
            .context("job params task")?
            .with_context(|| format!("read parameters of {job_url}"))?
    };

    if defs.is_empty() {
        println!("{job_url} declares no supported parameters.");
        return Ok(());
    }
    println!("{:<24} {:<9} {:<16} {}", "NAME", "TYPE", "DEFAULT", "CHOICES / DESCRIPTION");
    for d in defs {
        let default = match d.kind {
            ParamKind::Password => "****".to_string(),
            _ => d.default.clone(),
        };
        let detail = if d.kind == ParamKind::Choice {
            d.choices.join(",")
        } else {
            d.description.lines().next().unwrap_or("").to_string()
        };
        println!("{:<24} {:<9} {:<16} {}", d.name, d.kind.as_str(), default, detail);
    }
    Ok(())
}
