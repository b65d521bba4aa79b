use crate::db::StudentRow;
use crate::grades::{self, GradeBook};
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }

    pub fn db(e: impl std::fmt::Display) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state.db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_required_u32(params: &serde_json::Value, key: &str) -> Result<u32, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing or non-integer {}", key)))
}

/// Looks a student up by `studentId` or, failing that, `nationalId`.
pub fn resolve_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<StudentRow, HandlerErr> {
    if let Some(id) = get_optional_str(params, "studentId") {
        return crate::db::get_student(conn, &id)
            .map_err(HandlerErr::db)?
            .ok_or_else(|| HandlerErr::not_found("student not found"));
    }
    if let Some(nid) = get_optional_str(params, "nationalId") {
        return crate::db::get_student_by_national_id(conn, &nid)
            .map_err(HandlerErr::db)?
            .ok_or_else(|| HandlerErr::not_found("student not found"));
    }
    Err(HandlerErr::bad_params("missing studentId or nationalId"))
}

/// Normalizes the stored grades blob, feeding the row's legacy star
/// counters in as the semester1 fallback.
pub fn normalized_book(row: &StudentRow) -> Result<(GradeBook, Vec<String>), HandlerErr> {
    let raw: serde_json::Value = serde_json::from_str(&row.grades_json).map_err(|e| HandlerErr {
        code: "bad_stored_record",
        message: format!("grades blob for {} is invalid JSON: {}", row.national_id, e),
        details: None,
    })?;
    let normalized = grades::normalize(&raw, Some((row.acquired_stars, row.consumed_stars)));
    Ok((normalized.book, normalized.flags))
}

/// Serializes the canonical book back into the row before an upsert.
pub fn store_book(row: &mut StudentRow, book: &GradeBook) -> Result<(), HandlerErr> {
    row.grades_json = serde_json::to_string(book).map_err(|e| HandlerErr {
        code: "internal",
        message: format!("failed to serialize grades: {}", e),
        details: None,
    })?;
    Ok(())
}

pub fn student_summary_json(row: &StudentRow, flags: &[String]) -> serde_json::Value {
    json!({
        "id": row.id,
        "teacherId": row.teacher_id,
        "name": row.name,
        "nationalId": row.national_id,
        "parentPhone": row.parent_phone,
        "phone": row.phone,
        "photo": row.photo,
        "gradeLevel": row.grade_level,
        "section": row.section,
        "acquiredStars": row.acquired_stars,
        "consumedStars": row.consumed_stars,
        "stars": row.acquired_stars - row.consumed_stars,
        "sortOrder": row.sort_order,
        "flags": flags,
    })
}
