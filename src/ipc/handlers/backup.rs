use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let workspace = state.workspace.clone().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })?;
    let out_path = PathBuf::from(get_required_str(&req.params, "outPath")?);

    let summary =
        backup::export_workspace_bundle(&workspace, &out_path).map_err(|e| HandlerErr {
            code: "backup_failed",
            message: format!("{e:?}"),
            details: None,
        })?;
    Ok(ok(
        &req.id,
        json!({
            "outPath": out_path.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "dbSha256": summary.db_sha256,
        }),
    ))
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) => PathBuf::from(v),
        None => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let Some(workspace) = state.workspace.clone() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    // Drop the open connection before the database file is replaced.
    state.db = None;
    let summary = match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(v) => v,
        Err(e) => {
            // Reopen whatever is on disk so the daemon stays usable.
            state.db = db::open_db(&workspace).ok();
            return err(&req.id, "restore_failed", format!("{e:?}"), None);
        }
    };

    match db::open_db(&workspace) {
        Ok(conn) => {
            state.db = Some(conn);
            ok(
                &req.id,
                json!({ "bundleFormat": summary.bundle_format_detected }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req).unwrap_or_else(|e| e.response(&req.id))),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
