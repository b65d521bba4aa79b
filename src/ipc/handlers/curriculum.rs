use crate::db;
use crate::hijri;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::status::{CurriculumItem, TaskKind};
use serde_json::json;

fn require_scope(params: &serde_json::Value) -> Result<(String, String), HandlerErr> {
    let semester = get_required_str(params, "semester")?;
    if semester != "semester1" && semester != "semester2" {
        return Err(HandlerErr::bad_params(
            "semester must be semester1 or semester2",
        ));
    }
    let period = get_required_str(params, "period")?;
    if period != "period1" && period != "period2" {
        return Err(HandlerErr::bad_params("period must be period1 or period2"));
    }
    Ok((semester, period))
}

fn handle_set(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let (semester, period) = require_scope(&req.params)?;
    let kind_key = get_required_str(&req.params, "kind")?;
    let kind = TaskKind::from_key(&kind_key)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown task kind: {}", kind_key)))?;

    let raw_items = req
        .params
        .get("items")
        .and_then(|v| v.as_array())
        .ok_or_else(|| HandlerErr::bad_params("missing items array"))?;

    let mut items: Vec<CurriculumItem> = Vec::with_capacity(raw_items.len());
    for (i, raw) in raw_items.iter().enumerate() {
        let name = raw
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| HandlerErr::bad_params(format!("items[{}] missing name", i)))?;
        let due_date = raw
            .get("dueDate")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerErr::bad_params(format!("items[{}] missing dueDate", i)))?;
        // Due dates drive lateness; a garbled one is rejected here, not
        // discovered during classification.
        hijri::parse(due_date).map_err(|e| HandlerErr::bad_params(e.to_string()))?;

        let start = raw.get("start").and_then(|v| v.as_str()).map(String::from);
        let end = raw.get("end").and_then(|v| v.as_str()).map(String::from);
        if kind.is_quran() && (start.is_none() || end.is_none()) {
            return Err(HandlerErr::bad_params(format!(
                "items[{}]: {} items require a start and end verse reference",
                i,
                kind.key()
            )));
        }

        items.push(CurriculumItem {
            name: name.to_string(),
            kind: kind.key().to_string(),
            due_date: due_date.to_string(),
            start,
            end,
        });
    }

    db::replace_curriculum(conn, &semester, &period, kind.key(), &items)
        .map_err(HandlerErr::db)?;
    Ok(ok(&req.id, json!({ "count": items.len() })))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let (semester, period) = require_scope(&req.params)?;
    let items = db::curriculum_for(conn, &semester, &period).map_err(HandlerErr::db)?;
    let items_json = serde_json::to_value(&items).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })?;
    Ok(ok(&req.id, json!({ "items": items_json })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "curriculum.set" => handle_set(state, req),
        "curriculum.list" => handle_list(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
