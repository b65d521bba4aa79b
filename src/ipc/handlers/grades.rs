use crate::db;
use crate::grades::{validate_score, Category};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_required_str, normalized_book, require_db, resolve_student, store_book, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let mut row = resolve_student(conn, &req.params)?;

    let semester = get_required_str(&req.params, "semester")?;
    let period = get_required_str(&req.params, "period")?;
    let category_key = get_required_str(&req.params, "category")?;
    let category = Category::from_key(&category_key)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown category: {}", category_key)))?;

    let index = req
        .params
        .get("index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .ok_or_else(|| HandlerErr::bad_params("missing or non-integer index"))?;
    if index >= category.slot_count() {
        return Err(HandlerErr::bad_params(format!(
            "{} has {} slots, index {} is out of range",
            category.key(),
            category.slot_count(),
            index
        )));
    }

    let value = match req.params.get("value") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => {
            let n = v
                .as_f64()
                .ok_or_else(|| HandlerErr::bad_params("value must be a number or null"))?;
            // Category maxima are the entry contract; the stored record is
            // not touched on rejection.
            validate_score(category, n).map_err(|e| HandlerErr {
                code: "score_out_of_range",
                message: e.to_string(),
                details: Some(json!({
                    "category": category.key(),
                    "max": category.max_score(),
                })),
            })?;
            Some(n)
        }
    };

    let (mut book, flags) = normalized_book(&row)?;
    let semester_grades = book
        .semester_mut(&semester)
        .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;
    let period_grades = semester_grades
        .period_mut(&period)
        .ok_or_else(|| HandlerErr::bad_params("period must be period1 or period2"))?;
    period_grades.slots_mut(category)[index] = value;

    store_book(&mut row, &book)?;
    db::upsert_student(conn, &row).map_err(HandlerErr::db)?;

    Ok(ok(
        &req.id,
        json!({ "studentId": row.id, "flags": flags }),
    ))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let row = resolve_student(conn, &req.params)?;
    let (book, flags) = normalized_book(&row)?;
    let grades_json = serde_json::to_value(&book).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })?;
    Ok(ok(
        &req.id,
        json!({
            "studentId": row.id,
            "grades": grades_json,
            "flags": flags,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.update" => handle_update(state, req),
        "grades.get" => handle_get(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
