use crate::calc::TestMethod;
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn settings_json(conn: &rusqlite::Connection) -> Result<serde_json::Value, HandlerErr> {
    let s = db::load_settings(conn).map_err(HandlerErr::db)?;
    Ok(json!({
        "currentPeriod": s.current_period,
        "activeSemesterKey": s.active_semester_key,
        "testMethod": s.test_method.key(),
        "currentWeek": s.current_week,
    }))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    Ok(ok(&req.id, settings_json(conn)?))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let patch = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch object"))?;

    for (key, value) in patch {
        match key.as_str() {
            "currentPeriod" => {
                let v = value
                    .as_str()
                    .filter(|s| *s == "period1" || *s == "period2")
                    .ok_or_else(|| {
                        HandlerErr::bad_params("currentPeriod must be period1 or period2")
                    })?;
                db::settings_set_json(conn, "current_period", &json!(v))
                    .map_err(HandlerErr::db)?;
            }
            "activeSemesterKey" => {
                let v = value
                    .as_str()
                    .filter(|s| *s == "semester1" || *s == "semester2")
                    .ok_or_else(|| {
                        HandlerErr::bad_params("activeSemesterKey must be semester1 or semester2")
                    })?;
                db::settings_set_json(conn, "active_semester_key", &json!(v))
                    .map_err(HandlerErr::db)?;
            }
            "testMethod" => {
                let v = value
                    .as_str()
                    .and_then(TestMethod::from_key)
                    .ok_or_else(|| HandlerErr::bad_params("testMethod must be best or average"))?;
                db::settings_set_json(conn, "test_method", &json!(v.key()))
                    .map_err(HandlerErr::db)?;
            }
            "currentWeek" => {
                let v = value
                    .as_u64()
                    .filter(|w| (1..=20).contains(w))
                    .ok_or_else(|| HandlerErr::bad_params("currentWeek must be 1..=20"))?;
                db::settings_set_json(conn, "current_week", &json!(v)).map_err(HandlerErr::db)?;
            }
            other => {
                return Err(HandlerErr::bad_params(format!(
                    "unknown settings field: {}",
                    other
                )));
            }
        }
    }

    Ok(ok(&req.id, settings_json(conn)?))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_get(state, req),
        "settings.update" => handle_update(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
