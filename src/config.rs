use clap::Parser;
use std::path::PathBuf;

/// Student records sidecar: JSON requests on stdin, JSON responses on stdout.
#[derive(Debug, Parser)]
#[command(name = "studentd", version, about)]
pub struct Cli {
    /// Open this workspace at startup instead of waiting for `workspace.select`.
    #[arg(long, env = "STUDENTD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Emit log lines as JSON.
    #[arg(long)]
    pub log_json: bool,
}
