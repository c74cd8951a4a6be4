//! `jenx run` – trigger every permutation of a job and follow the builds.

use anyhow::{bail, Result};
use jenx_core::config::JenxConfig;
use jenx_core::run::{ExecutorConfig, RunBatch, RunExecutor, RunUpdate};
use tokio_util::sync::CancellationToken;

use super::{connect, plan};
use crate::cli::{args, SelectionArgs};

pub struct RunOptions<'a> {
    pub target: &'a str,
    pub job: &'a str,
    pub selection: &'a SelectionArgs,
    pub concurrency: Option<usize>,
    pub retry_failed: u32,
}

pub async fn run_permutations(cfg: &JenxConfig, opts: RunOptions<'_>) -> Result<()> {
    // Selection errors surface before any credential lookup or request.
    let specs = args::build_specs(opts.selection, cfg.max_permutations)?;
    let (target, client) = connect(cfg, opts.target)?;
    let job_url = args::job_url(&target.host, opts.job)?;

    let executor = RunExecutor::new(
        client,
        ExecutorConfig {
            concurrency: opts.concurrency.unwrap_or(cfg.concurrency),
            poll: cfg.poll_config(),
        },
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("interrupted, cancelling run");
                cancel.cancel();
            }
        })
    };

    println!(
        "Running {} permutation(s) of {} on {} (concurrency {})",
        specs.len(),
        job_url,
        target.name,
        executor.concurrency()
    );
    plan::print_specs(&specs);

    let mut batch = RunBatch::new(specs);
    let mut attempt = 0u32;
    loop {
        let mut updates = executor.run(cancel.clone(), job_url.as_str(), batch.specs());
        while let Some(update) = updates.recv().await {
            print_update(&batch, &update);
            batch.apply(&update);
        }
        print_summary(&batch);

        if cancel.is_cancelled() || attempt >= opts.retry_failed {
            break;
        }
        attempt += 1;
        let n = batch.retry_failed();
        if n == 0 {
            break;
        }
        println!("Retrying {} failed job(s) (retry {} of {})", n, attempt, opts.retry_failed);
    }
    interrupt.abort();

    if cancel.is_cancelled() {
        bail!("run cancelled");
    }
    let unsuccessful = batch.summary().unsuccessful();
    if unsuccessful > 0 {
        bail!("{} of {} job(s) did not succeed", unsuccessful, batch.len());
    }
    Ok(())
}

fn print_update(batch: &RunBatch, u: &RunUpdate) {
    let params = batch
        .records()
        .get(u.index)
        .map(|r| r.spec.summary())
        .unwrap_or_default();
    let detail = if let Some(err) = &u.error {
        err.to_string()
    } else if let Some(result) = &u.result {
        result.clone()
    } else if let Some(url) = &u.build_url {
        match u.build_number {
            Some(n) => format!("#{n} {url}"),
            None => url.clone(),
        }
    } else if let Some(url) = &u.queue_url {
        url.clone()
    } else {
        String::new()
    };
    let line = format!(
        "[{}/{}] {:<8} {}  {}",
        u.index + 1,
        batch.len(),
        u.state.as_str(),
        params,
        detail
    );
    println!("{}", line.trim_end());
}

fn print_summary(batch: &RunBatch) {
    println!();
    println!("{:>4}  {:<8} {:<8} {}", "#", "STATE", "BUILD", "PARAMETERS / DETAIL");
    for r in batch.records() {
        let build = r
            .build_number
            .map(|n| format!("#{n}"))
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!("{:>4}  {:<8} {:<8} {}", r.index + 1, r.state.as_str(), build, r.spec.summary());
        if let Some(err) = &r.error {
            line.push_str(&format!("  ({err})"));
        } else if let Some(url) = &r.build_url {
            line.push_str(&format!("  {url}"));
        }
        println!("{}", line);
    }
    let s = batch.summary();
    println!(
        "success {}, failed {}, aborted {}, error {}, unfinished {}",
        s.success,
        s.failed,
        s.aborted,
        s.error,
        s.planned + s.queued + s.running
    );
}
