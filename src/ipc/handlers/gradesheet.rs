use crate::calc::{self, category_score, format_score, sheet_method};
use crate::db;
use crate::grades::Category;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, normalized_book, require_db, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// The comprehensive per-class sheet: one row per student, one 2-decimal
/// column per category, plus the composite totals. The teacher's
/// `testMethod` setting picks best-vs-average for the tests column only;
/// the composite total always takes tests by sum.
fn handle_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db)?;

    let semester =
        get_optional_str(&req.params, "semester").unwrap_or(settings.active_semester_key.clone());
    let period = get_optional_str(&req.params, "period").unwrap_or(settings.current_period.clone());

    let rows = db::list_students(conn).map_err(HandlerErr::db)?;
    let mut sheet: Vec<serde_json::Value> = Vec::with_capacity(rows.len());
    for row in &rows {
        let (book, flags) = normalized_book(row)?;
        let semester_grades = book
            .semester(&semester)
            .ok_or_else(|| HandlerErr::bad_params("semester must be semester1 or semester2"))?;
        let period_grades = semester_grades
            .period(&period)
            .ok_or_else(|| HandlerErr::bad_params("period must be period1 or period2"))?;

        let mut categories = serde_json::Map::new();
        for category in Category::ALL {
            let method = sheet_method(category, settings.test_method);
            let score = category_score(period_grades.slots(category), method);
            categories.insert(category.key().to_string(), json!(format_score(score)));
        }

        sheet.push(json!({
            "studentId": row.id,
            "name": row.name,
            "nationalId": row.national_id,
            "categories": categories,
            "majorAssessments": format_score(calc::major_assessments(period_grades)),
            "coursework": format_score(calc::coursework(period_grades)),
            "finalTotal": format_score(calc::final_total(period_grades)),
            "flags": flags,
        }));
    }

    Ok(ok(
        &req.id,
        json!({
            "semester": semester,
            "period": period,
            "testMethod": settings.test_method.key(),
            "students": sheet,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "gradesheet.open" => handle_open(state, req),
        _ => return None,
    };
    Some(result.unwrap_or_else(|e| e.response(&req.id)))
}
