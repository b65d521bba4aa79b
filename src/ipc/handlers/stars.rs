use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_optional_str, normalized_book, require_db, resolve_student, store_book, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn delta(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .and_then(|n| i64::try_from(n).ok())
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

/// Both counters only ever grow; the balance is derived. Consuming past the
/// acquired total is rejected at save time.
fn handle_adjust(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;
    let mut row = resolve_student(conn, &req.params)?;

    let semester =
        get_optional_str(&req.params, "semester").unwrap_or(settings.active_semester_key);
    let acquire = delta(&req.params, "acquire")?;
    let consume = delta(&req.params, "consume")?;
    if acquire == 0 && consume == 0 {
        return Err(HandlerErr::bad_params("nothing to adjust"));
    }

    let (mut book, _flags) = normalized_book(&row)?;
    let ledger = &mut book
        .semester_mut(&semester)
        .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?
        .stars;

    let acquired = ledger
        .acquired
        .checked_add(acquire)
        .ok_or_else(|| HandlerErr::bad_params("star counter overflow"))?;
    let consumed = ledger
        .consumed
        .checked_add(consume)
        .ok_or_else(|| HandlerErr::bad_params("star counter overflow"))?;
    if consumed > acquired {
        return Err(HandlerErr {
            code: "insufficient_stars",
            message: format!(
                "cannot consume {} star(s): only {} available",
                consume,
                ledger.balance()
            ),
            details: None,
        });
    }
    ledger.acquired = acquired;
    ledger.consumed = consumed;
    let balance = ledger.balance();

    // The legacy top-level counters remain a mirror of semester1's ledger.
    row.acquired_stars = book.semester1.stars.acquired;
    row.consumed_stars = book.semester1.stars.consumed;
    store_book(&mut row, &book)?;
    db::upsert_student(conn, &row).map_err(HandlerErr::db)?;

    Ok(ok(
        &req.id,
        json!({
            "studentId": row.id,
            "semester": semester,
            "acquired": acquired,
            "consumed": consumed,
            "stars": balance,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "stars.adjust" => handle_adjust(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
