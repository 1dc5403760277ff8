use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scan_cascade_engine::{ScopeMode, SeverityLevel};

#[derive(Parser)]
#[command(name = "scan-cascade")]
#[command(
    about = "Run several security scanners and reduce them to one verdict",
    long_about = None
)]
pub struct Cli {
    /// Path to config file (default: <repo>/scan-cascade.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a repository with the selected tools
    Scan(ScanArgs),
    /// Delete published artifact runs whose retention has expired
    Purge {
        /// Repository whose config and artifact directory are used
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
}

#[derive(Args)]
pub struct ScanArgs {
    /// Comma-separated tools (bandit, semgrep, trivy, clamav)
    #[arg(long, default_value = "bandit,semgrep,trivy,clamav")]
    pub tools: String,
    /// Scope mode (all, changed)
    #[arg(long, default_value = "all")]
    pub scope: ScopeMode,
    /// Minimum severity that counts as a finding (LOW, MEDIUM, HIGH)
    #[arg(long, default_value = "LOW")]
    pub min_severity: SeverityLevel,
    /// Exit with status 1 when the verdict reports findings
    #[arg(long)]
    pub fail_on_findings: bool,
    /// Repository to scan
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,
    /// Append key=value outputs to this file (CI step output)
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub step_output: Option<PathBuf>,
}
