use crate::backup;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn io_failed(e: anyhow::Error, path: &str) -> HandlerErr {
    tracing::warn!(path, error = %e, "backup io failed");
    HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: Some(json!({ "path": path })),
    }
}

/// Explicit `workspacePath`, else the selected workspace.
fn target_workspace(state: &AppState, params: &serde_json::Value) -> Result<PathBuf, HandlerErr> {
    params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        })
}

fn export_bundle(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_str(params, "outPath")?;
    let workspace = target_workspace(state, params)?;

    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = conn.execute_batch("PRAGMA wal_checkpoint(FULL)") {
            tracing::debug!(error = %e, "wal checkpoint skipped");
        }
    }

    let summary = backup::export_workspace_bundle(&workspace, &PathBuf::from(&out_path))
        .map_err(|e| io_failed(e, &out_path))?;
    tracing::info!(path = %out_path, "workspace exported");
    Ok(json!({
        "path": out_path,
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
    }))
}

fn import_bundle(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let in_path = get_required_str(params, "inPath")?;
    let workspace = target_workspace(state, params)?;
    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr {
            code: "not_found",
            message: "bundle file not found".to_string(),
            details: Some(json!({ "path": in_path })),
        });
    }

    // The database file is about to be replaced.
    let previous = state.workspace.clone();
    state.close_db();
    let summary = match backup::import_workspace_bundle(&src, &workspace) {
        Ok(summary) => summary,
        Err(e) => {
            // The old database is still in place; keep serving it.
            if let Some(previous) = previous {
                if let Err(reopen) = state.open_workspace(&previous) {
                    tracing::error!(error = %reopen, "reopen after failed import");
                }
            }
            return Err(io_failed(e, &in_path));
        }
    };
    state
        .open_workspace(&workspace)
        .map_err(|e| HandlerErr {
            code: "db_open_failed",
            message: format!("{e:#}"),
            details: None,
        })?;
    Ok(json!({
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": summary.bundle_format_detected,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(reply(&req.id, export_bundle(state, &req.params))),
        "backup.importWorkspaceBundle" => Some(reply(&req.id, import_bundle(state, &req.params))),
        _ => None,
    }
}
