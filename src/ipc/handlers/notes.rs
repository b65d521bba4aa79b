use crate::db;
use crate::grades::WEEKLY_NOTE_SLOTS;
use crate::hijri;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, normalized_book, require_db, resolve_student, store_book,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::status::{classify, Progress, TaskKind};
use serde_json::json;

fn week_index(params: &serde_json::Value, default_week: u32) -> Result<usize, HandlerErr> {
    let week = match params.get("week") {
        None | Some(serde_json::Value::Null) => default_week as u64,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| HandlerErr::bad_params("week must be an integer"))?,
    };
    if !(1..=WEEKLY_NOTE_SLOTS as u64).contains(&week) {
        return Err(HandlerErr::bad_params(format!(
            "week must be 1..={}",
            WEEKLY_NOTE_SLOTS
        )));
    }
    Ok(week as usize - 1)
}

fn handle_weekly_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;
    let mut row = resolve_student(conn, &req.params)?;

    let semester =
        get_optional_str(&req.params, "semester").unwrap_or(settings.active_semester_key.clone());
    let week = week_index(&req.params, settings.current_week)?;
    let text = get_required_str(&req.params, "text")?;
    if text.trim().is_empty() {
        return Err(HandlerErr::bad_params("text must not be empty"));
    }

    let (mut book, _flags) = normalized_book(&row)?;
    let semester_grades = book
        .semester_mut(&semester)
        .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;
    semester_grades.weekly_notes[week].push(text);

    store_book(&mut row, &book)?;
    db::upsert_student(conn, &row).map_err(HandlerErr::db)?;
    Ok(ok(
        &req.id,
        json!({ "studentId": row.id, "week": week + 1 }),
    ))
}

fn handle_weekly_list(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;
    let row = resolve_student(conn, &req.params)?;
    let semester =
        get_optional_str(&req.params, "semester").unwrap_or(settings.active_semester_key);

    let (book, _flags) = normalized_book(&row)?;
    let semester_grades = book
        .semester(&semester)
        .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;

    Ok(ok(
        &req.id,
        json!({
            "studentId": row.id,
            "semester": semester,
            "weeklyNotes": semester_grades.weekly_notes,
        }),
    ))
}

/// Batch catch-up notes: only students the classifier marks late for the
/// given kind receive one, written into the current week.
fn handle_catchup(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;

    let kind_key = get_required_str(&req.params, "kind")?;
    let kind = TaskKind::from_key(&kind_key)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown task kind: {}", kind_key)))?;
    let semester =
        get_optional_str(&req.params, "semester").unwrap_or(settings.active_semester_key.clone());
    let period = get_optional_str(&req.params, "period").unwrap_or(settings.current_period.clone());
    let today = get_optional_str(&req.params, "today").unwrap_or_else(hijri::today);
    hijri::parse(&today).map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    let week = settings.current_week as usize - 1;

    let curriculum = db::curriculum_for(conn, &semester, &period).map_err(HandlerErr::db)?;
    let rows = db::list_students(conn).map_err(HandlerErr::db)?;

    let mut noted: Vec<serde_json::Value> = Vec::new();
    let mut skipped = 0usize;
    for row in &rows {
        let (mut book, _flags) = normalized_book(row)?;
        let report = {
            let semester_grades = book
                .semester(&semester)
                .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;
            let period_grades = semester_grades
                .period(&period)
                .ok_or_else(|| HandlerErr::bad_params("period must be period1 or period2"))?;
            classify(
                kind,
                period_grades.slots(kind.category()),
                &curriculum,
                &today,
            )
            .map_err(|e| HandlerErr {
                code: "bad_date",
                message: e.to_string(),
                details: None,
            })?
        };

        if report.progress != Progress::Late {
            skipped += 1;
            continue;
        }

        let text = get_optional_str(&req.params, "text")
            .unwrap_or_else(|| format!("catch-up ({}): {}", kind.key(), report.note));
        let semester_grades = book
            .semester_mut(&semester)
            .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;
        semester_grades.weekly_notes[week].push(text);

        let mut updated = row.clone();
        store_book(&mut updated, &book)?;
        db::upsert_student(conn, &updated).map_err(HandlerErr::db)?;
        noted.push(json!({ "studentId": row.id, "name": row.name }));
    }

    Ok(ok(
        &req.id,
        json!({
            "kind": kind.key(),
            "week": week + 1,
            "noted": noted,
            "skipped": skipped,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "notes.weekly.add" => handle_weekly_add(state, req),
        "notes.weekly.list" => handle_weekly_list(state, req),
        "notes.catchup" => handle_catchup(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
