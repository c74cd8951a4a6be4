//! `jenx jobs --target <id> [folder]` – list one folder level.

use anyhow::{Context, Result};
use jenx_core::config::JenxConfig;
use jenx_core::remote::JobNodeKind;

use super::connect;
use crate::cli::args;

pub async fn run_jobs(cfg: &JenxConfig, target_id: &str, folder: Option<&str>) -> Result<()> {
    let (target, client) = connect(cfg, target_id)?;
    let folder_url = match folder {
        Some(f) if !f.trim().is_empty() => args::job_url(&target.host, f)?,
        _ => String::new(),
    };
    let prefix = args::folder_prefix(&folder_url);

    let nodes = tokio::task::spawn_blocking(move || client.list_jobs(&folder_url, &prefix))
        .await
        .context("list jobs task")?
        .with_context(|| format!("list jobs on {}", target.name))?;

    if nodes.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }
    println!("{:<7} {:<40} {}", "KIND", "NAME", "URL");
    for n in nodes {
        let kind = match n.kind {
            JobNodeKind::Folder => "folder",
            JobNodeKind::Job => "job",
        };
        println!("{:<7} {:<40} {}", kind, n.full_name, n.url);
    }
    Ok(())
}
