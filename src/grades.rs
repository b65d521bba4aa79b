use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const WEEKLY_NOTE_SLOTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Tests,
    Homework,
    PerformanceTasks,
    Participation,
    QuranRecitation,
    QuranMemorization,
    ClassInteraction,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Tests,
        Category::Homework,
        Category::PerformanceTasks,
        Category::Participation,
        Category::QuranRecitation,
        Category::QuranMemorization,
        Category::ClassInteraction,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::Tests => "tests",
            Category::Homework => "homework",
            Category::PerformanceTasks => "performanceTasks",
            Category::Participation => "participation",
            Category::QuranRecitation => "quranRecitation",
            Category::QuranMemorization => "quranMemorization",
            Category::ClassInteraction => "classInteraction",
        }
    }

    /// Accepted source field names, in resolution order. Historical records
    /// mix camelCase and snake_case, and `oralTest` predates
    /// `classInteraction` as the name of the same category.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Category::Tests => &["tests"],
            Category::Homework => &["homework"],
            Category::PerformanceTasks => &["performanceTasks", "performance_tasks"],
            Category::Participation => &["participation"],
            Category::QuranRecitation => &["quranRecitation", "quran_recitation"],
            Category::QuranMemorization => &["quranMemorization", "quran_memorization"],
            Category::ClassInteraction => &["classInteraction", "oralTest", "oral_test"],
        }
    }

    pub fn slot_count(self) -> usize {
        match self {
            Category::Tests => 2,
            Category::Homework => 10,
            Category::PerformanceTasks => 4,
            Category::Participation => 10,
            Category::QuranRecitation => 5,
            Category::QuranMemorization => 5,
            Category::ClassInteraction => 4,
        }
    }

    /// Per-item maximum accepted at score entry.
    pub fn max_score(self) -> f64 {
        match self {
            Category::Tests => 20.0,
            Category::Homework => 1.0,
            Category::PerformanceTasks => 10.0,
            Category::Participation => 1.0,
            Category::QuranRecitation => 10.0,
            Category::QuranMemorization => 10.0,
            Category::ClassInteraction => 10.0,
        }
    }

    pub fn from_key(s: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.key() == s)
    }
}

/// Rejects an out-of-range entry with an error naming the violated maximum.
pub fn validate_score(category: Category, value: f64) -> anyhow::Result<()> {
    if value < 0.0 {
        bail!("{} does not accept negative scores", category.key());
    }
    if value > category.max_score() {
        bail!(
            "{} accepts at most {} per item, got {}",
            category.key(),
            category.max_score(),
            value
        );
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodGrades {
    pub tests: Vec<Option<f64>>,
    pub homework: Vec<Option<f64>>,
    pub performance_tasks: Vec<Option<f64>>,
    pub participation: Vec<Option<f64>>,
    pub quran_recitation: Vec<Option<f64>>,
    pub quran_memorization: Vec<Option<f64>>,
    pub class_interaction: Vec<Option<f64>>,
}

impl Default for PeriodGrades {
    fn default() -> Self {
        PeriodGrades {
            tests: vec![None; Category::Tests.slot_count()],
            homework: vec![None; Category::Homework.slot_count()],
            performance_tasks: vec![None; Category::PerformanceTasks.slot_count()],
            participation: vec![None; Category::Participation.slot_count()],
            quran_recitation: vec![None; Category::QuranRecitation.slot_count()],
            quran_memorization: vec![None; Category::QuranMemorization.slot_count()],
            class_interaction: vec![None; Category::ClassInteraction.slot_count()],
        }
    }
}

impl PeriodGrades {
    pub fn slots(&self, category: Category) -> &[Option<f64>] {
        match category {
            Category::Tests => &self.tests,
            Category::Homework => &self.homework,
            Category::PerformanceTasks => &self.performance_tasks,
            Category::Participation => &self.participation,
            Category::QuranRecitation => &self.quran_recitation,
            Category::QuranMemorization => &self.quran_memorization,
            Category::ClassInteraction => &self.class_interaction,
        }
    }

    pub fn slots_mut(&mut self, category: Category) -> &mut Vec<Option<f64>> {
        match category {
            Category::Tests => &mut self.tests,
            Category::Homework => &mut self.homework,
            Category::PerformanceTasks => &mut self.performance_tasks,
            Category::Participation => &mut self.participation,
            Category::QuranRecitation => &mut self.quran_recitation,
            Category::QuranMemorization => &mut self.quran_memorization,
            Category::ClassInteraction => &mut self.class_interaction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StarLedger {
    pub acquired: i64,
    pub consumed: i64,
}

impl StarLedger {
    pub fn balance(&self) -> i64 {
        self.acquired - self.consumed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterGrades {
    pub period1: PeriodGrades,
    pub period2: PeriodGrades,
    pub weekly_notes: Vec<Vec<String>>,
    pub stars: StarLedger,
}

impl Default for SemesterGrades {
    fn default() -> Self {
        SemesterGrades {
            period1: PeriodGrades::default(),
            period2: PeriodGrades::default(),
            weekly_notes: vec![Vec::new(); WEEKLY_NOTE_SLOTS],
            stars: StarLedger::default(),
        }
    }
}

impl SemesterGrades {
    pub fn period(&self, key: &str) -> Option<&PeriodGrades> {
        match key {
            "period1" => Some(&self.period1),
            "period2" => Some(&self.period2),
            _ => None,
        }
    }

    pub fn period_mut(&mut self, key: &str) -> Option<&mut PeriodGrades> {
        match key {
            "period1" => Some(&mut self.period1),
            "period2" => Some(&mut self.period2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBook {
    pub semester1: SemesterGrades,
    pub semester2: SemesterGrades,
}

impl Default for GradeBook {
    fn default() -> Self {
        GradeBook {
            semester1: SemesterGrades::default(),
            semester2: SemesterGrades::default(),
        }
    }
}

impl GradeBook {
    pub fn semester(&self, key: &str) -> Option<&SemesterGrades> {
        match key {
            "semester1" => Some(&self.semester1),
            "semester2" => Some(&self.semester2),
            _ => None,
        }
    }

    pub fn semester_mut(&mut self, key: &str) -> Option<&mut SemesterGrades> {
        match key {
            "semester1" => Some(&mut self.semester1),
            "semester2" => Some(&mut self.semester2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub book: GradeBook,
    /// Shapes the normalizer could not confidently classify. Default-filled,
    /// never thrown; surfaced so the caller can show or store them.
    pub flags: Vec<String>,
}

/// Reshapes a stored grades blob into the canonical two-semester structure.
///
/// Three historical shapes are accepted:
/// 1. legacy flat: one period's categories at the top level, notes under
///    `weeklyNotes`/`weekly_notes`, stars in separate student columns;
/// 2. mid-migration: `{ period1, period2, weeklyNotes }` with no semester
///    wrapper;
/// 3. current: `{ semester1: {...}, semester2: {...} }`.
///
/// `legacy_stars` carries the student row's old top-level star counters; it
/// backfills semester1 whenever that semester has no `stars` object of its
/// own. Normalizing an already-canonical blob is a no-op.
pub fn normalize(raw: &Value, legacy_stars: Option<(i64, i64)>) -> Normalized {
    let mut flags: Vec<String> = Vec::new();
    let book = match raw {
        Value::Null => GradeBook::default(),
        Value::Object(map) => {
            if map.contains_key("semester1") || map.contains_key("semester2") {
                GradeBook {
                    semester1: normalize_semester(
                        map.get("semester1"),
                        true,
                        legacy_stars,
                        "semester1",
                        &mut flags,
                    ),
                    semester2: normalize_semester(
                        map.get("semester2"),
                        false,
                        legacy_stars,
                        "semester2",
                        &mut flags,
                    ),
                }
            } else if map.contains_key("period1") || map.contains_key("period2") {
                // Mid-migration shape: the whole payload is semester1.
                GradeBook {
                    semester1: normalize_semester(
                        Some(raw),
                        true,
                        legacy_stars,
                        "semester1",
                        &mut flags,
                    ),
                    semester2: SemesterGrades::default(),
                }
            } else {
                // Legacy flat: the payload is semester1/period1's categories.
                let mut sem1 = SemesterGrades::default();
                sem1.period1 = normalize_period(Some(raw), "semester1.period1", &mut flags);
                sem1.weekly_notes = normalize_weekly_notes(
                    first_alias(raw, &["weeklyNotes", "weekly_notes"]),
                    "semester1",
                    &mut flags,
                );
                if let Some((acquired, consumed)) = legacy_stars {
                    sem1.stars = StarLedger { acquired, consumed };
                }
                GradeBook {
                    semester1: sem1,
                    semester2: SemesterGrades::default(),
                }
            }
        }
        other => {
            flags.push(format!(
                "grades blob is {}, expected object; defaulted",
                json_kind(other)
            ));
            GradeBook::default()
        }
    };
    Normalized { book, flags }
}

fn normalize_semester(
    raw: Option<&Value>,
    is_semester1: bool,
    legacy_stars: Option<(i64, i64)>,
    path: &str,
    flags: &mut Vec<String>,
) -> SemesterGrades {
    let mut out = SemesterGrades::default();
    let map = match raw {
        None | Some(Value::Null) => {
            if is_semester1 {
                if let Some((acquired, consumed)) = legacy_stars {
                    out.stars = StarLedger { acquired, consumed };
                }
            }
            return out;
        }
        Some(Value::Object(map)) => map,
        Some(other) => {
            flags.push(format!(
                "{} is {}, expected object; defaulted",
                path,
                json_kind(other)
            ));
            return out;
        }
    };

    out.period1 = normalize_period(map.get("period1"), &format!("{}.period1", path), flags);
    out.period2 = normalize_period(map.get("period2"), &format!("{}.period2", path), flags);
    out.weekly_notes = normalize_weekly_notes(
        first_alias_map(map, &["weeklyNotes", "weekly_notes"]),
        path,
        flags,
    );

    out.stars = match map.get("stars") {
        Some(Value::Object(stars)) => StarLedger {
            acquired: stars.get("acquired").and_then(|v| v.as_i64()).unwrap_or(0),
            consumed: stars.get("consumed").and_then(|v| v.as_i64()).unwrap_or(0),
        },
        _ if is_semester1 => legacy_stars
            .map(|(acquired, consumed)| StarLedger { acquired, consumed })
            .unwrap_or_default(),
        _ => StarLedger::default(),
    };

    out
}

fn normalize_period(raw: Option<&Value>, path: &str, flags: &mut Vec<String>) -> PeriodGrades {
    let mut out = PeriodGrades::default();
    let map = match raw {
        None | Some(Value::Null) => return out,
        Some(Value::Object(map)) => map,
        Some(other) => {
            flags.push(format!(
                "{} is {}, expected object; defaulted",
                path,
                json_kind(other)
            ));
            return out;
        }
    };

    for category in Category::ALL {
        let source = first_alias_map(map, category.aliases());
        let filled = fixed_slots(
            source,
            category.slot_count(),
            &format!("{}.{}", path, category.key()),
            flags,
        );
        *out.slots_mut(category) = filled;
    }
    out
}

/// Builds a fixed-size array filled with `null`, then copies source values
/// left-to-right. Short arrays stay padded, extra legacy slots are dropped.
fn fixed_slots(
    raw: Option<&Value>,
    size: usize,
    path: &str,
    flags: &mut Vec<String>,
) -> Vec<Option<f64>> {
    let mut out = vec![None; size];
    let items = match raw {
        None | Some(Value::Null) => return out,
        Some(Value::Array(items)) => items,
        Some(other) => {
            flags.push(format!(
                "{} is {}, expected array; defaulted",
                path,
                json_kind(other)
            ));
            return out;
        }
    };

    for (i, item) in items.iter().take(size).enumerate() {
        out[i] = match item {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            // Empty string is the historical "not yet graded" marker.
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    flags.push(format!("{}[{}] holds non-numeric '{}'; dropped", path, i, s));
                    None
                }
            },
            other => {
                flags.push(format!(
                    "{}[{}] is {}, expected number; dropped",
                    path,
                    i,
                    json_kind(other)
                ));
                None
            }
        };
    }
    out
}

fn normalize_weekly_notes(
    raw: Option<&Value>,
    path: &str,
    flags: &mut Vec<String>,
) -> Vec<Vec<String>> {
    let mut out = vec![Vec::new(); WEEKLY_NOTE_SLOTS];
    let items = match raw {
        None | Some(Value::Null) => return out,
        Some(Value::Array(items)) => items,
        Some(other) => {
            flags.push(format!(
                "{}.weeklyNotes is {}, expected array; defaulted",
                path,
                json_kind(other)
            ));
            return out;
        }
    };

    for (i, week) in items.iter().take(WEEKLY_NOTE_SLOTS).enumerate() {
        match week {
            Value::Null => {}
            Value::Array(notes) => {
                out[i] = notes
                    .iter()
                    .filter_map(|n| n.as_str().map(|s| s.to_string()))
                    .collect();
            }
            // A lone string is an old single-note week.
            Value::String(s) => out[i] = vec![s.clone()],
            other => {
                flags.push(format!(
                    "{}.weeklyNotes[{}] is {}, expected array; dropped",
                    path,
                    i,
                    json_kind(other)
                ));
            }
        }
    }
    out
}

fn first_alias<'a>(raw: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    let map = raw.as_object()?;
    first_alias_map(map, aliases)
}

fn first_alias_map<'a>(
    map: &'a serde_json::Map<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    for name in aliases {
        if let Some(v) = map.get(*name) {
            if !v.is_null() {
                return Some(v);
            }
        }
    }
    None
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
