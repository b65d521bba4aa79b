use anyhow::bail;

/// Days per school week for attendance keys (Sunday through Thursday).
pub const DAYS_PER_WEEK: u32 = 5;
pub const WEEKS_PER_SEMESTER: u32 = 20;

/// Builds the canonical `"<semester>_W<week>-D<day>"` attendance key.
pub fn format_date_key(semester: &str, week: u32, day: u32) -> anyhow::Result<String> {
    if semester != "semester1" && semester != "semester2" {
        bail!("semester must be semester1 or semester2, got '{}'", semester);
    }
    if !(1..=WEEKS_PER_SEMESTER).contains(&week) {
        bail!("week must be 1..={}, got {}", WEEKS_PER_SEMESTER, week);
    }
    if !(1..=DAYS_PER_WEEK).contains(&day) {
        bail!("day must be 1..={}, got {}", DAYS_PER_WEEK, day);
    }
    Ok(format!("{}_W{}-D{}", semester, week, day))
}

/// Semester a stored key belongs to. Keys written before semesters existed
/// have no prefix and count as semester1.
pub fn semester_of(date_key: &str) -> &'static str {
    match date_key.split_once('_') {
        Some(("semester2", _)) => "semester2",
        _ => "semester1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_builds_prefixed_keys() {
        assert_eq!(
            format_date_key("semester1", 3, 1).expect("key"),
            "semester1_W3-D1"
        );
        assert_eq!(
            format_date_key("semester2", 20, 5).expect("key"),
            "semester2_W20-D5"
        );
    }

    #[test]
    fn format_rejects_out_of_range() {
        assert!(format_date_key("semester3", 1, 1).is_err());
        assert!(format_date_key("semester1", 0, 1).is_err());
        assert!(format_date_key("semester1", 21, 1).is_err());
        assert!(format_date_key("semester1", 1, 6).is_err());
    }

    #[test]
    fn bare_legacy_keys_count_for_semester1_only() {
        assert_eq!(semester_of("W3-D1"), "semester1");
        assert_eq!(semester_of("semester1_W3-D1"), "semester1");
        assert_eq!(semester_of("semester2_W3-D1"), "semester2");
    }
}
