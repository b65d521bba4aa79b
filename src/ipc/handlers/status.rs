use crate::db;
use crate::hijri;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, normalized_book, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::status::{classify, TaskKind};
use serde_json::json;

/// Per-student classification against the active curriculum. `kind` narrows
/// to one task kind; `today` overrides the Riyadh clock (Hijri string),
/// which pins batch runs and tests to a known day.
fn handle_overview(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;

    let semester =
        get_optional_str(&req.params, "semester").unwrap_or(settings.active_semester_key.clone());
    let period = get_optional_str(&req.params, "period").unwrap_or(settings.current_period.clone());
    let today = get_optional_str(&req.params, "today").unwrap_or_else(hijri::today);
    hijri::parse(&today).map_err(|e| HandlerErr::bad_params(e.to_string()))?;

    let kinds: Vec<TaskKind> = match get_optional_str(&req.params, "kind") {
        Some(k) => vec![TaskKind::from_key(&k)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown task kind: {}", k)))?],
        None => TaskKind::ALL.to_vec(),
    };

    let curriculum = db::curriculum_for(conn, &semester, &period).map_err(HandlerErr::db)?;
    let rows = db::list_students(conn).map_err(HandlerErr::db)?;

    let mut students: Vec<serde_json::Value> = Vec::with_capacity(rows.len());
    for row in &rows {
        let (book, flags) = normalized_book(row)?;
        let semester_grades = book
            .semester(&semester)
            .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;
        let period_grades = semester_grades
            .period(&period)
            .ok_or_else(|| HandlerErr::bad_params("period must be period1 or period2"))?;

        let mut statuses = serde_json::Map::new();
        for kind in &kinds {
            let report = classify(
                *kind,
                period_grades.slots(kind.category()),
                &curriculum,
                &today,
            )
            .map_err(|e| HandlerErr {
                code: "bad_date",
                message: e.to_string(),
                details: None,
            })?;
            statuses.insert(
                kind.key().to_string(),
                json!({
                    "status": report.progress.key(),
                    "note": report.note,
                }),
            );
        }

        students.push(json!({
            "studentId": row.id,
            "name": row.name,
            "nationalId": row.national_id,
            "statuses": statuses,
            "flags": flags,
        }));
    }

    Ok(ok(
        &req.id,
        json!({
            "semester": semester,
            "period": period,
            "today": today,
            "students": students,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "status.overview" => handle_overview(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
