use crate::attendance::WEEKS_PER_SEMESTER;
use crate::calc::TestMethod;
use crate::status::CurriculumItem;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "rasid.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            teacher_id TEXT,
            name TEXT NOT NULL,
            national_id TEXT NOT NULL UNIQUE,
            parent_phone TEXT,
            phone TEXT,
            photo TEXT,
            grade_level TEXT,
            section TEXT,
            grades TEXT NOT NULL DEFAULT 'null',
            acquired_stars INTEGER NOT NULL DEFAULT 0,
            consumed_stars INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    // Workspaces created before the timestamp column existed.
    ensure_students_updated_at(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS absences(
            student_id TEXT NOT NULL,
            date_key TEXT NOT NULL,
            kind TEXT NOT NULL,
            PRIMARY KEY(student_id, date_key, kind),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_absences_student ON absences(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum(
            id TEXT PRIMARY KEY,
            semester TEXT NOT NULL,
            period TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            due_date TEXT NOT NULL,
            start_ref TEXT,
            end_ref TEXT,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_curriculum_scope ON curriculum(semester, period, kind)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// The ambient period/semester/test-method context, loaded once per request
/// and passed explicitly into calculators and classifiers.
#[derive(Debug, Clone)]
pub struct ActiveSettings {
    pub current_period: String,
    pub active_semester_key: String,
    pub test_method: TestMethod,
    pub current_week: u32,
}

impl Default for ActiveSettings {
    fn default() -> Self {
        ActiveSettings {
            current_period: "period1".to_string(),
            active_semester_key: "semester1".to_string(),
            test_method: TestMethod::Best,
            current_week: 1,
        }
    }
}

pub fn load_settings(conn: &Connection) -> anyhow::Result<ActiveSettings> {
    let mut out = ActiveSettings::default();
    if let Some(v) = settings_get_json(conn, "current_period")? {
        if let Some(s) = v.as_str() {
            out.current_period = s.to_string();
        }
    }
    if let Some(v) = settings_get_json(conn, "active_semester_key")? {
        if let Some(s) = v.as_str() {
            out.active_semester_key = s.to_string();
        }
    }
    if let Some(v) = settings_get_json(conn, "test_method")? {
        if let Some(m) = v.as_str().and_then(TestMethod::from_key) {
            out.test_method = m;
        }
    }
    if let Some(v) = settings_get_json(conn, "current_week")? {
        // An out-of-range stored week falls back to the default; downstream
        // code indexes weekly-note slots with this value.
        if let Some(w) = v
            .as_u64()
            .filter(|w| (1..=WEEKS_PER_SEMESTER as u64).contains(w))
        {
            out.current_week = w as u32;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub teacher_id: Option<String>,
    pub name: String,
    pub national_id: String,
    pub parent_phone: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub grade_level: Option<String>,
    pub section: Option<String>,
    /// Stored grades blob, any historical shape; normalized on read.
    pub grades_json: String,
    pub acquired_stars: i64,
    pub consumed_stars: i64,
    pub sort_order: i64,
}

fn row_to_student(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        teacher_id: r.get(1)?,
        name: r.get(2)?,
        national_id: r.get(3)?,
        parent_phone: r.get(4)?,
        phone: r.get(5)?,
        photo: r.get(6)?,
        grade_level: r.get(7)?,
        section: r.get(8)?,
        grades_json: r.get(9)?,
        acquired_stars: r.get(10)?,
        consumed_stars: r.get(11)?,
        sort_order: r.get(12)?,
    })
}

const STUDENT_COLUMNS: &str = "id, teacher_id, name, national_id, parent_phone, phone, photo,
     grade_level, section, grades, acquired_stars, consumed_stars, sort_order";

pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<StudentRow>> {
    let sql = format!(
        "SELECT {} FROM students ORDER BY sort_order, name",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |r| row_to_student(r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_student(conn: &Connection, id: &str) -> anyhow::Result<Option<StudentRow>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    let row = conn
        .query_row(&sql, [id], |r| row_to_student(r))
        .optional()?;
    Ok(row)
}

pub fn get_student_by_national_id(
    conn: &Connection,
    national_id: &str,
) -> anyhow::Result<Option<StudentRow>> {
    let sql = format!(
        "SELECT {} FROM students WHERE national_id = ?",
        STUDENT_COLUMNS
    );
    let row = conn
        .query_row(&sql, [national_id], |r| row_to_student(r))
        .optional()?;
    Ok(row)
}

/// Full-record overwrite keyed by national id. Concurrent saves race with
/// last-write-wins at the whole-row level; the known limitation of the
/// source system.
pub fn upsert_student(conn: &Connection, s: &StudentRow) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(
            id, teacher_id, name, national_id, parent_phone, phone, photo,
            grade_level, section, grades, acquired_stars, consumed_stars,
            sort_order, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
         ON CONFLICT(national_id) DO UPDATE SET
            teacher_id = excluded.teacher_id,
            name = excluded.name,
            parent_phone = excluded.parent_phone,
            phone = excluded.phone,
            photo = excluded.photo,
            grade_level = excluded.grade_level,
            section = excluded.section,
            grades = excluded.grades,
            acquired_stars = excluded.acquired_stars,
            consumed_stars = excluded.consumed_stars,
            sort_order = excluded.sort_order,
            updated_at = datetime('now')",
        (
            &s.id,
            &s.teacher_id,
            &s.name,
            &s.national_id,
            &s.parent_phone,
            &s.phone,
            &s.photo,
            &s.grade_level,
            &s.section,
            &s.grades_json,
            s.acquired_stars,
            s.consumed_stars,
            s.sort_order,
        ),
    )?;
    Ok(())
}

pub fn delete_student(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    conn.execute("DELETE FROM absences WHERE student_id = ?", [id])?;
    let n = conn.execute("DELETE FROM students WHERE id = ?", [id])?;
    Ok(n > 0)
}

pub fn curriculum_for(
    conn: &Connection,
    semester: &str,
    period: &str,
) -> anyhow::Result<Vec<CurriculumItem>> {
    let mut stmt = conn.prepare(
        "SELECT name, kind, due_date, start_ref, end_ref
         FROM curriculum
         WHERE semester = ? AND period = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map((semester, period), |r| {
            Ok(CurriculumItem {
                name: r.get(0)?,
                kind: r.get(1)?,
                due_date: r.get(2)?,
                start: r.get(3)?,
                end: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Replaces the whole plan of one kind within a semester/period scope.
pub fn replace_curriculum(
    conn: &Connection,
    semester: &str,
    period: &str,
    kind: &str,
    items: &[CurriculumItem],
) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM curriculum WHERE semester = ? AND period = ? AND kind = ?",
        (semester, period, kind),
    )?;
    for (i, item) in items.iter().enumerate() {
        conn.execute(
            "INSERT INTO curriculum(id, semester, period, kind, name, due_date, start_ref, end_ref, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                uuid::Uuid::new_v4().to_string(),
                semester,
                period,
                kind,
                &item.name,
                &item.due_date,
                &item.start,
                &item.end,
                i as i64,
            ),
        )?;
    }
    Ok(())
}

pub fn absence_mark(
    conn: &Connection,
    student_id: &str,
    date_key: &str,
    kind: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO absences(student_id, date_key, kind) VALUES(?, ?, ?)
         ON CONFLICT(student_id, date_key, kind) DO NOTHING",
        (student_id, date_key, kind),
    )?;
    Ok(())
}

pub fn absence_clear(
    conn: &Connection,
    student_id: &str,
    date_key: &str,
    kind: &str,
) -> anyhow::Result<bool> {
    let n = conn.execute(
        "DELETE FROM absences WHERE student_id = ? AND date_key = ? AND kind = ?",
        (student_id, date_key, kind),
    )?;
    Ok(n > 0)
}

pub fn absences_for_student(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT date_key, kind FROM absences WHERE student_id = ? ORDER BY date_key",
    )?;
    let rows = stmt
        .query_map([student_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
