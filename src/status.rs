use crate::grades::Category;
use crate::hijri::{self, HijriDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Recitation,
    Memorization,
    Homework,
    PerformanceTask,
    Test,
}

impl TaskKind {
    pub const ALL: [TaskKind; 5] = [
        TaskKind::Recitation,
        TaskKind::Memorization,
        TaskKind::Homework,
        TaskKind::PerformanceTask,
        TaskKind::Test,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TaskKind::Recitation => "recitation",
            TaskKind::Memorization => "memorization",
            TaskKind::Homework => "homework",
            TaskKind::PerformanceTask => "performanceTask",
            TaskKind::Test => "test",
        }
    }

    pub fn from_key(s: &str) -> Option<TaskKind> {
        TaskKind::ALL.iter().copied().find(|k| k.key() == s)
    }

    pub fn category(self) -> Category {
        match self {
            TaskKind::Recitation => Category::QuranRecitation,
            TaskKind::Memorization => Category::QuranMemorization,
            TaskKind::Homework => Category::Homework,
            TaskKind::PerformanceTask => Category::PerformanceTasks,
            TaskKind::Test => Category::Tests,
        }
    }

    /// Quran kinds track cumulative progress; the rest track binary
    /// per-slot completion.
    pub fn is_quran(self) -> bool {
        matches!(self, TaskKind::Recitation | TaskKind::Memorization)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumItem {
    pub name: String,
    pub kind: String,
    pub due_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No curriculum items of this kind exist.
    NoCurriculum,
    NotStarted,
    Late,
    FullyCompleted,
}

impl Progress {
    pub fn key(self) -> &'static str {
        match self {
            Progress::NoCurriculum => "none",
            Progress::NotStarted => "not_started",
            Progress::Late => "late",
            Progress::FullyCompleted => "fully_completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub progress: Progress,
    pub note: String,
}

/// Classifies one student's standing for one task kind against the
/// curriculum. `today` is a Hijri `"YYYY/MM/DD"` string; bad dates anywhere
/// are an error, never a silent misordering.
///
/// The two families deliberately disagree on lateness: homework-family
/// lateness compares the first ungraded slot's due date with today, while
/// Quran-family lateness only checks whether the count of non-zero entries
/// lags the curriculum length. That asymmetry is source behavior.
pub fn classify(
    kind: TaskKind,
    grades: &[Option<f64>],
    curriculum: &[CurriculumItem],
    today: &str,
) -> anyhow::Result<StatusReport> {
    let items = sorted_for_kind(kind, curriculum)?;
    if items.is_empty() {
        return Ok(StatusReport {
            progress: Progress::NoCurriculum,
            note: "no curriculum defined".to_string(),
        });
    }

    if kind.is_quran() {
        return Ok(classify_quran(&items, grades));
    }
    classify_tasks(&items, grades, today)
}

/// Curriculum items of one kind, ascending by due date. The positional
/// mapping between curriculum order and grade slots depends on this sort.
pub fn sorted_for_kind<'a>(
    kind: TaskKind,
    curriculum: &'a [CurriculumItem],
) -> anyhow::Result<Vec<&'a CurriculumItem>> {
    let mut dated: Vec<(&CurriculumItem, HijriDate)> = Vec::new();
    for item in curriculum.iter().filter(|i| i.kind == kind.key()) {
        let due = hijri::parse(&item.due_date)?;
        dated.push((item, due));
    }
    dated.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(dated.into_iter().map(|(item, _)| item).collect())
}

fn classify_tasks(
    items: &[&CurriculumItem],
    grades: &[Option<f64>],
    today: &str,
) -> anyhow::Result<StatusReport> {
    let gap = grades.iter().position(|g| g.is_none());
    let current = match gap {
        None => None,
        Some(idx) if idx >= items.len() => None,
        Some(idx) => Some(items[idx]),
    };

    let Some(current) = current else {
        return Ok(StatusReport {
            progress: Progress::FullyCompleted,
            note: "all assigned items completed".to_string(),
        });
    };

    if hijri::compare(today, &current.due_date)? == Ordering::Greater {
        Ok(StatusReport {
            progress: Progress::Late,
            note: format!("'{}' overdue since {}", current.name, current.due_date),
        })
    } else {
        Ok(StatusReport {
            progress: Progress::NotStarted,
            note: format!(
                "'{}' not yet completed, due {}",
                current.name, current.due_date
            ),
        })
    }
}

fn classify_quran(items: &[&CurriculumItem], grades: &[Option<f64>]) -> StatusReport {
    // A zero grade records an attempt that did not stick; only entries > 0
    // advance Quran progress.
    let completed = grades.iter().filter(|g| matches!(g, Some(v) if *v > 0.0)).count();
    let total = items.len();

    if completed == 0 {
        return StatusReport {
            progress: Progress::NotStarted,
            note: format!("not started; first target is '{}'", items[0].name),
        };
    }
    if completed >= total {
        return StatusReport {
            progress: Progress::FullyCompleted,
            note: format!("fully completed through '{}'", items[total - 1].name),
        };
    }
    StatusReport {
        progress: Progress::Late,
        note: format!(
            "last completed '{}'; next required '{}'",
            items[completed - 1].name,
            items[completed].name
        ),
    }
}
