//! CLI for jenx.

mod args;
mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use jenx_core::config;
use std::path::PathBuf;

use commands::{run_jobs, run_params, run_permutations, run_plan, run_targets, RunOptions};

/// Top-level CLI for jenx.
#[derive(Debug, Parser)]
#[command(name = "jenx")]
#[command(about = "jenx: run every permutation of a parameterized Jenkins job", long_about = None)]
pub struct Cli {
    /// Absolute path to config.toml (default: $JENX_CONFIG, then ~/.config/jenx/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds; overrides the config value.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Parameter selection shared by `plan` and `run`.
#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
    /// Fixed parameter applied to every permutation (repeatable).
    #[arg(long = "param", value_name = "NAME=VALUE", value_parser = args::parse_param)]
    pub params: Vec<(String, String)>,

    /// Choice parameter expanded over comma-separated values (repeatable; the first varies slowest).
    #[arg(long = "choice", value_name = "NAME=V1,V2", value_parser = args::parse_choice)]
    pub choices: Vec<(String, Vec<String>)>,

    /// Refuse to expand to more than N permutations (default from config).
    #[arg(long, value_name = "N")]
    pub max_permutations: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List configured Jenkins targets.
    Targets,

    /// List jobs and folders at one folder level.
    Jobs {
        /// Target id from the config.
        #[arg(long, value_name = "ID")]
        target: String,
        /// Folder URL or path (default: the server root).
        folder: Option<String>,
    },

    /// Show the parameter definitions of a job.
    Params {
        /// Target id from the config.
        #[arg(long, value_name = "ID")]
        target: String,
        /// Job URL, or a slash-separated job path such as `team/deploy`.
        job: String,
    },

    /// Print the permutations a selection expands to, without contacting Jenkins.
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Trigger every permutation of a job and follow the builds to completion.
    Run {
        /// Target id from the config.
        #[arg(long, value_name = "ID")]
        target: String,
        /// Job URL, or a slash-separated job path such as `team/deploy`.
        job: String,
        #[command(flatten)]
        selection: SelectionArgs,
        /// Builds in flight at once (default from config).
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,
        /// Re-run the failed subset up to N more times.
        #[arg(long, default_value = "0", value_name = "N")]
        retry_failed: u32,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let path = config::resolve_path(cli.config.as_deref())?;
        let mut cfg = config::load_or_init(&path)?;
        if let Some(secs) = cli.timeout {
            cfg.request_timeout_secs = secs;
        }
        tracing::debug!(path = %path.display(), "loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Targets => run_targets(&cfg),
            CliCommand::Jobs { target, folder } => run_jobs(&cfg, &target, folder.as_deref()).await,
            CliCommand::Params { target, job } => run_params(&cfg, &target, &job).await,
            CliCommand::Plan { selection } => run_plan(&cfg, &selection),
            CliCommand::Run {
                target,
                job,
                selection,
                concurrency,
                retry_failed,
            } => {
                let opts = RunOptions {
                    target: &target,
                    job: &job,
                    selection: &selection,
                    concurrency,
                    retry_failed,
                };
                run_permutations(&cfg, opts).await
            }
        }
    }
}

#[cfg(test)]
mod tests;
