use crate::grades::{Category, PeriodGrades};

/// Weight ceilings of the fixed grading scheme. Historical exports depend on
/// these exact values; they are named here, not configurable.
pub const TESTS_CEILING: f64 = 40.0;
pub const RECITATION_CEILING: f64 = 10.0;
pub const MEMORIZATION_CEILING: f64 = 10.0;
pub const MAJOR_ASSESSMENTS_CEILING: f64 =
    TESTS_CEILING + RECITATION_CEILING + MEMORIZATION_CEILING;

pub const HOMEWORK_CEILING: f64 = 10.0;
pub const PARTICIPATION_CEILING: f64 = 10.0;
pub const PERFORMANCE_TASKS_CEILING: f64 = 10.0;
pub const CLASS_INTERACTION_CEILING: f64 = 10.0;
pub const COURSEWORK_CEILING: f64 = HOMEWORK_CEILING
    + PARTICIPATION_CEILING
    + PERFORMANCE_TASKS_CEILING
    + CLASS_INTERACTION_CEILING;

pub const FINAL_TOTAL_CEILING: f64 = MAJOR_ASSESSMENTS_CEILING + COURSEWORK_CEILING;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMethod {
    Sum,
    Best,
    Average,
}

impl ScoreMethod {
    pub fn key(self) -> &'static str {
        match self {
            ScoreMethod::Sum => "sum",
            ScoreMethod::Best => "best",
            ScoreMethod::Average => "average",
        }
    }

    pub fn from_key(s: &str) -> Option<ScoreMethod> {
        match s {
            "sum" => Some(ScoreMethod::Sum),
            "best" => Some(ScoreMethod::Best),
            "average" => Some(ScoreMethod::Average),
            _ => None,
        }
    }
}

/// Tests aggregation in the comprehensive grade sheet. A per-teacher setting;
/// everywhere outside the grade sheet, tests aggregate by sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMethod {
    Best,
    Average,
}

impl TestMethod {
    pub fn key(self) -> &'static str {
        match self {
            TestMethod::Best => "best",
            TestMethod::Average => "average",
        }
    }

    pub fn from_key(s: &str) -> Option<TestMethod> {
        match s {
            "best" => Some(TestMethod::Best),
            "average" => Some(TestMethod::Average),
            _ => None,
        }
    }

    pub fn score_method(self) -> ScoreMethod {
        match self {
            TestMethod::Best => ScoreMethod::Best,
            TestMethod::Average => ScoreMethod::Average,
        }
    }
}

/// Aggregates one category's slot array. Ungraded slots are excluded; an
/// all-ungraded array scores 0 for every method.
pub fn category_score(values: &[Option<f64>], method: ScoreMethod) -> f64 {
    let graded: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    if graded.is_empty() {
        return 0.0;
    }
    match method {
        ScoreMethod::Sum => graded.iter().sum(),
        ScoreMethod::Best => graded.iter().cloned().fold(f64::MIN, f64::max),
        ScoreMethod::Average => graded.iter().sum::<f64>() / graded.len() as f64,
    }
}

/// All scores render with exactly two decimal places.
pub fn format_score(value: f64) -> String {
    format!("{:.2}", value)
}

/// Tests (sum) + recitation (average) + memorization (average); ceiling 60.
pub fn major_assessments(period: &PeriodGrades) -> f64 {
    category_score(period.slots(Category::Tests), ScoreMethod::Sum)
        + category_score(period.slots(Category::QuranRecitation), ScoreMethod::Average)
        + category_score(
            period.slots(Category::QuranMemorization),
            ScoreMethod::Average,
        )
}

/// Homework (sum) + participation (sum) + performance tasks (best) + class
/// interaction (best); ceiling 40.
pub fn coursework(period: &PeriodGrades) -> f64 {
    category_score(period.slots(Category::Homework), ScoreMethod::Sum)
        + category_score(period.slots(Category::Participation), ScoreMethod::Sum)
        + category_score(period.slots(Category::PerformanceTasks), ScoreMethod::Best)
        + category_score(period.slots(Category::ClassInteraction), ScoreMethod::Best)
}

/// Composite 100-point total for the active period.
pub fn final_total(period: &PeriodGrades) -> f64 {
    major_assessments(period) + coursework(period)
}

/// Aggregation used for one grade-sheet column. The `test_method` toggle
/// applies to tests only; every other category keeps its fixed method.
pub fn sheet_method(category: Category, test_method: TestMethod) -> ScoreMethod {
    match category {
        Category::Tests => test_method.score_method(),
        Category::Homework | Category::Participation => ScoreMethod::Sum,
        Category::PerformanceTasks | Category::ClassInteraction => ScoreMethod::Best,
        Category::QuranRecitation | Category::QuranMemorization => ScoreMethod::Average,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_null_scores_zero_for_every_method() {
        let arr = vec![None, None, None];
        for method in [ScoreMethod::Sum, ScoreMethod::Best, ScoreMethod::Average] {
            assert_eq!(category_score(&arr, method), 0.0);
            assert_eq!(format_score(category_score(&arr, method)), "0.00");
        }
    }

    #[test]
    fn mixed_null_entries_are_excluded() {
        let arr = vec![Some(8.0), None, Some(6.0), None, Some(10.0)];
        assert_eq!(category_score(&arr, ScoreMethod::Sum), 24.0);
        assert_eq!(category_score(&arr, ScoreMethod::Best), 10.0);
        assert_eq!(category_score(&arr, ScoreMethod::Average), 8.0);
    }

    #[test]
    fn zero_entries_count_as_graded() {
        let arr = vec![Some(0.0), Some(10.0), None];
        assert_eq!(category_score(&arr, ScoreMethod::Average), 5.0);
        assert_eq!(category_score(&arr, ScoreMethod::Best), 10.0);
    }

    #[test]
    fn two_decimal_rendering() {
        assert_eq!(format_score(7.0), "7.00");
        assert_eq!(format_score(8.333333), "8.33");
        assert_eq!(format_score(0.0), "0.00");
    }

    #[test]
    fn composite_totals_add_up() {
        let mut p = PeriodGrades::default();
        p.tests = vec![Some(15.0), Some(18.0)];
        p.quran_recitation = vec![Some(8.0), Some(10.0), None, None, None];
        p.quran_memorization = vec![Some(9.0), None, None, None, None];
        p.homework[..6].fill(Some(1.0));
        p.participation[..2].fill(Some(1.0));
        p.performance_tasks = vec![Some(7.0), Some(9.0), None, None];
        p.class_interaction = vec![Some(6.0), None, None, None];

        // 33 tests + 9 recitation + 9 memorization.
        assert_eq!(major_assessments(&p), 51.0);
        // 6 homework + 2 participation + 9 best task + 6 best interaction.
        assert_eq!(coursework(&p), 23.0);
        assert_eq!(final_total(&p), 74.0);
        assert_eq!(format_score(final_total(&p)), "74.00");
    }

    #[test]
    fn ceiling_holds_at_category_maxima() {
        let mut p = PeriodGrades::default();
        p.tests = vec![Some(20.0), Some(20.0)];
        p.quran_recitation = vec![Some(10.0); 5];
        p.quran_memorization = vec![Some(10.0); 5];
        p.homework = vec![Some(1.0); 10];
        p.participation = vec![Some(1.0); 10];
        p.performance_tasks = vec![Some(10.0); 4];
        p.class_interaction = vec![Some(10.0); 4];

        assert_eq!(major_assessments(&p), MAJOR_ASSESSMENTS_CEILING);
        assert_eq!(coursework(&p), COURSEWORK_CEILING);
        assert_eq!(final_total(&p), FINAL_TOTAL_CEILING);
        assert_eq!(format_score(final_total(&p)), "100.00");
    }

    #[test]
    fn test_method_toggle_applies_to_tests_only() {
        assert_eq!(
            sheet_method(Category::Tests, TestMethod::Best),
            ScoreMethod::Best
        );
        assert_eq!(
            sheet_method(Category::Tests, TestMethod::Average),
            ScoreMethod::Average
        );
        for cat in [
            Category::Homework,
            Category::Participation,
            Category::PerformanceTasks,
            Category::ClassInteraction,
            Category::QuranRecitation,
            Category::QuranMemorization,
        ] {
            assert_eq!(
                sheet_method(cat, TestMethod::Best),
                sheet_method(cat, TestMethod::Average)
            );
        }
    }
}
