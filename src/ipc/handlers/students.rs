use crate::db::{self, StudentRow};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_str, get_required_str, normalized_book, require_db, resolve_student,
    student_summary_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn next_sort_order(conn: &Connection) -> Result<i64, HandlerErr> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
        [],
        |r| r.get(0),
    )
    .map_err(HandlerErr::db)
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let rows = db::list_students(conn).map_err(HandlerErr::db)?;

    let mut students: Vec<serde_json::Value> = Vec::with_capacity(rows.len());
    for row in &rows {
        let (book, flags) = normalized_book(row)?;
        let mut entry = student_summary_json(row, &flags);
        entry["grades"] = serde_json::to_value(&book).map_err(|e| HandlerErr {
            code: "internal",
            message: e.to_string(),
            details: None,
        })?;
        students.push(entry);
    }

    Ok(ok(&req.id, json!({ "students": students })))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_required_str(&req.params, "name")?;
    let national_id = get_required_str(&req.params, "nationalId")?;
    if name.trim().is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    if national_id.trim().is_empty() {
        return Err(HandlerErr::bad_params("nationalId must not be empty"));
    }
    if db::get_student_by_national_id(conn, &national_id)
        .map_err(HandlerErr::db)?
        .is_some()
    {
        return Err(HandlerErr {
            code: "conflict",
            message: format!("a student with national id {} already exists", national_id),
            details: None,
        });
    }

    let row = StudentRow {
        id: Uuid::new_v4().to_string(),
        teacher_id: get_optional_str(&req.params, "teacherId"),
        name,
        national_id,
        parent_phone: get_optional_str(&req.params, "parentPhone"),
        phone: get_optional_str(&req.params, "phone"),
        photo: get_optional_str(&req.params, "photo"),
        grade_level: get_optional_str(&req.params, "gradeLevel"),
        section: get_optional_str(&req.params, "section"),
        grades_json: "null".to_string(),
        acquired_stars: 0,
        consumed_stars: 0,
        sort_order: next_sort_order(conn)?,
    };
    db::upsert_student(conn, &row).map_err(HandlerErr::db)?;

    Ok(ok(&req.id, json!({ "studentId": row.id })))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let mut row = resolve_student(conn, &req.params)?;
    let patch = req
        .params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerErr::bad_params("missing patch object"))?;

    for (key, value) in patch {
        let text = || value.as_str().map(|s| s.to_string());
        match key.as_str() {
            "name" => {
                row.name = value
                    .as_str()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| HandlerErr::bad_params("name must be a non-empty string"))?
                    .to_string();
            }
            "teacherId" => row.teacher_id = text(),
            "parentPhone" => row.parent_phone = text(),
            "phone" => row.phone = text(),
            "photo" => row.photo = text(),
            "gradeLevel" => row.grade_level = text(),
            "section" => row.section = text(),
            "sortOrder" => {
                row.sort_order = value
                    .as_i64()
                    .ok_or_else(|| HandlerErr::bad_params("sortOrder must be an integer"))?;
            }
            other => {
                return Err(HandlerErr::bad_params(format!(
                    "unknown student field: {}",
                    other
                )));
            }
        }
    }

    db::upsert_student(conn, &row).map_err(HandlerErr::db)?;
    Ok(ok(&req.id, json!({ "studentId": row.id })))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let row = resolve_student(conn, &req.params)?;
    let deleted = db::delete_student(conn, &row.id).map_err(HandlerErr::db)?;
    Ok(ok(&req.id, json!({ "deleted": deleted })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
