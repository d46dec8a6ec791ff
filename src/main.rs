mod backup;
mod catalog;
mod config;
mod counter;
mod db;
mod directory;
mod error;
mod faculty;
mod identity;
mod ipc;
mod ledger;
mod logging;
mod model;
mod registry;
#[cfg(test)]
mod testutil;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() {
    let cli = config::Cli::parse();
    logging::init(cli.log_json);

    let mut state = ipc::AppState::default();
    if let Some(path) = cli.workspace.as_deref() {
        if let Err(e) = state.open_workspace(path) {
            tracing::error!(workspace = %path.display(), error = %format!("{e:#}"), "startup workspace failed to open");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        let Some(resp) = ipc::handle_line(&mut state, &line) else {
            continue;
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
