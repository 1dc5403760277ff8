// Scan Cascade - command-line entry point
// stdout carries the outcome table; logs go to stderr.

mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ScanArgs};
use scan_cascade::utils::paths::{config_path, repo_root, resolve_under};
use scan_cascade::{AppError, ConfigService, FsArtifactStore, ScanOutcome, ScanRunner};
use scan_cascade_engine::{parse_tool_list, ScanRequest};

/// Exit status for configuration errors and aborted scope resolution
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Scan(args) => scan(args, cli.config.as_deref()).await,
        Commands::Purge { repo } => purge(&repo, cli.config.as_deref()).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(err) if err.is_scope_error() => {
                    tracing::error!("scope resolution aborted: {}", err)
                }
                Some(err) if err.is_config_error() => {
                    tracing::error!("invalid configuration: {}", err)
                }
                _ => tracing::error!("{:#}", e),
            }
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn scan(args: ScanArgs, config: Option<&Path>) -> anyhow::Result<u8> {
    let repo = repo_root(&args.repo)?;
    let config = ConfigService::load(config_path(&repo, config))?.get_config_clone();
    let tools = parse_tool_list(&args.tools)?;
    let request = ScanRequest::new(tools, args.scope, args.min_severity)
        .fail_on_findings(args.fail_on_findings);

    let store = Arc::new(FsArtifactStore::new(resolve_under(&repo, &config.artifact_dir)));
    let runner = ScanRunner::new(&repo, config, store);

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; stopping running tools");
            cancel.cancel();
        }
    });

    let outcome = runner.run(request).await?;
    Ok(finish(&outcome, args.step_output.as_deref()))
}

/// Print the outcome, write step outputs, and return the exit code. A step
/// output failure is logged; the scan's own exit code stands.
fn finish(outcome: &ScanOutcome, step_output: Option<&Path>) -> u8 {
    print_outcome(outcome);
    if let Some(path) = step_output {
        if let Err(e) = outcome.write_step_outputs(path) {
            tracing::error!(path = %path.display(), "failed to write step outputs: {}", e);
        }
    }
    outcome.exit_code()
}

async fn purge(repo: &Path, config: Option<&Path>) -> anyhow::Result<u8> {
    let repo = repo_root(repo)?;
    let config = ConfigService::load(config_path(&repo, config))?.get_config_clone();
    let store = FsArtifactStore::new(resolve_under(&repo, &config.artifact_dir));

    let purged = store.purge_expired(chrono::Utc::now()).await?;
    for run_id in &purged {
        println!("purged {}", run_id);
    }
    println!("{} expired run(s) removed", purged.len());
    Ok(0)
}

fn print_outcome(outcome: &ScanOutcome) {
    println!("{}", outcome.summary);
    println!();
    if outcome.verdict.has_findings {
        let tools: Vec<&str> = outcome
            .verdict
            .contributing_tools
            .iter()
            .map(|tool| tool.as_str())
            .collect();
        println!("verdict: findings ({})", tools.join(", "));
    } else {
        println!("verdict: clean");
    }
    match (&outcome.artifact, &outcome.publish_error) {
        (Some(handle), _) => println!(
            "artifacts: {} ({} file(s), expires {})",
            handle.location,
            handle.file_count,
            handle.expires_at.to_rfc3339()
        ),
        (None, Some(error)) => println!("artifacts: not published: {}", error),
        (None, None) => {}
    }
}
