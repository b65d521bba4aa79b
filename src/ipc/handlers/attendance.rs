use crate::attendance::{format_date_key, semester_of};
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_str, get_required_u32, require_db, resolve_student, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn require_kind(params: &serde_json::Value) -> Result<String, HandlerErr> {
    match params.get("kind").and_then(|v| v.as_str()) {
        Some("class") => Ok("class".to_string()),
        Some("book") => Ok("book".to_string()),
        _ => Err(HandlerErr::bad_params("kind must be class or book")),
    }
}

fn require_date_key(
    params: &serde_json::Value,
    default_semester: &str,
) -> Result<String, HandlerErr> {
    let semester =
        get_optional_str(params, "semester").unwrap_or_else(|| default_semester.to_string());
    let week = get_required_u32(params, "week")?;
    let day = get_required_u32(params, "day")?;
    format_date_key(&semester, week, day).map_err(|e| HandlerErr::bad_params(e.to_string()))
}

fn handle_mark(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;
    let row = resolve_student(conn, &req.params)?;
    let kind = require_kind(&req.params)?;
    let date_key = require_date_key(&req.params, &settings.active_semester_key)?;

    db::absence_mark(conn, &row.id, &date_key, &kind).map_err(HandlerErr::db)?;
    Ok(ok(
        &req.id,
        json!({ "studentId": row.id, "dateKey": date_key, "kind": kind }),
    ))
}

fn handle_clear(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;
    let row = resolve_student(conn, &req.params)?;
    let kind = require_kind(&req.params)?;
    let date_key = require_date_key(&req.params, &settings.active_semester_key)?;

    let cleared = db::absence_clear(conn, &row.id, &date_key, &kind).map_err(HandlerErr::db)?;
    Ok(ok(&req.id, json!({ "cleared": cleared })))
}

/// Per-semester absence counts. Stored keys may predate semester prefixes;
/// attribution goes through `semester_of`, which sends bare keys to
/// semester1.
fn handle_summary(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let rows = match get_optional_str(&req.params, "studentId")
        .or_else(|| get_optional_str(&req.params, "nationalId"))
    {
        Some(_) => vec![resolve_student(conn, &req.params)?],
        None => db::list_students(conn).map_err(HandlerErr::db)?,
    };

    let mut students: Vec<serde_json::Value> = Vec::with_capacity(rows.len());
    for row in &rows {
        let absences = db::absences_for_student(conn, &row.id).map_err(HandlerErr::db)?;
        let mut counts = json!({
            "semester1": { "class": 0, "book": 0 },
            "semester2": { "class": 0, "book": 0 },
        });
        let mut keys: Vec<serde_json::Value> = Vec::with_capacity(absences.len());
        for (date_key, kind) in &absences {
            let semester = semester_of(date_key);
            if let Some(n) = counts[semester][kind.as_str()].as_u64() {
                counts[semester][kind.as_str()] = json!(n + 1);
            }
            keys.push(json!({ "dateKey": date_key, "kind": kind }));
        }
        students.push(json!({
            "studentId": row.id,
            "name": row.name,
            "counts": counts,
            "absences": keys,
        }));
    }

    Ok(ok(&req.id, json!({ "students": students })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.mark" => handle_mark(state, req),
        "attendance.clear" => handle_clear(state, req),
        "attendance.summary" => handle_summary(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
