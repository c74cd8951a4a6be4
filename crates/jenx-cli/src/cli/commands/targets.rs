//! `jenx targets` – list configured Jenkins targets.

use anyhow::Result;
use jenx_core::config::JenxConfig;

pub fn run_targets(cfg: &JenxConfig) -> Result<()> {
    if cfg.targets.is_empty() {
        println!("No targets configured.");
        return Ok(());
    }
    println!("{:<12} {:<20} {:<12} {:<24} {}", "ID", "NAME", "USER", "CREDENTIAL", "HOST");
    for t in &cfg.targets {
        let credential = format!("{}:{}", t.credential.kind.as_str(), t.credential.reference);
        let host = if t.insecure_skip_tls_verify {
            format!("{} (tls verify off)", t.host)
        } else {
            t.host.clone()
        };
        println!("{:<12} {:<20} {:<12} {:<24} {}", t.id, t.name, t.username, credential, host);
    }
    Ok(())
}
