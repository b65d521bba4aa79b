use anyhow::{anyhow, bail};
use chrono::{Datelike, Duration, Utc};
use std::cmp::Ordering;

/// JDN of 1 Muharram 1 AH in the tabular (civil) Islamic calendar.
const ISLAMIC_EPOCH_JDN: i64 = 1948440;

/// School clock is pinned to Riyadh; the host timezone must not move the
/// Hijri day boundary.
const RIYADH_UTC_OFFSET_HOURS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HijriDate {
    pub year: i64,
    pub month: u32,
    pub day: u32,
}

impl HijriDate {
    pub fn format(&self) -> String {
        format!("{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// Strict parse of a `"YYYY/MM/DD"` Hijri date string. Garbled input is an
/// error, never an arbitrary ordering: lateness decisions depend on this.
pub fn parse(s: &str) -> anyhow::Result<HijriDate> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    if parts.len() != 3 {
        bail!("bad hijri date '{}': expected YYYY/MM/DD", s);
    }
    let year = parts[0]
        .trim()
        .parse::<i64>()
        .map_err(|_| anyhow!("bad hijri year in '{}'", s))?;
    let month = parts[1]
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("bad hijri month in '{}'", s))?;
    let day = parts[2]
        .trim()
        .parse::<u32>()
        .map_err(|_| anyhow!("bad hijri day in '{}'", s))?;
    if !(1..=12).contains(&month) {
        bail!("bad hijri date '{}': month out of range", s);
    }
    if !(1..=30).contains(&day) {
        bail!("bad hijri date '{}': day out of range", s);
    }
    Ok(HijriDate { year, month, day })
}

/// Compares two `"YYYY/MM/DD"` strings: year, then month, then day.
pub fn compare(a: &str, b: &str) -> anyhow::Result<Ordering> {
    let da = parse(a)?;
    let db = parse(b)?;
    Ok(da.cmp(&db))
}

/// Today's Hijri date as `"YYYY/MM/DD"`, from the Riyadh-pinned clock.
pub fn today() -> String {
    let now = Utc::now() + Duration::hours(RIYADH_UTC_OFFSET_HOURS);
    let d = now.date_naive();
    hijri_from_gregorian(d.year(), d.month(), d.day()).format()
}

/// Tabular (civil) Islamic calendar conversion. Deterministic arithmetic;
/// may differ from observational Umm al-Qura by a day on rare dates.
pub fn hijri_from_gregorian(year: i32, month: u32, day: u32) -> HijriDate {
    jdn_to_islamic(jdn_from_gregorian(year, month, day))
}

fn jdn_from_gregorian(year: i32, month: u32, day: u32) -> i64 {
    let a = (14 - month as i64) / 12;
    let y = year as i64 + 4800 - a;
    let m = month as i64 + 12 * a - 3;
    day as i64 + (153 * m + 2) / 5 + 365 * y + y / 4 - y / 100 + y / 400 - 32045
}

fn islamic_to_jdn(year: i64, month: u32, day: u32) -> i64 {
    let k = month as i64 - 1;
    // ceil(29.5 * k) as integer arithmetic.
    let month_offset = (59 * k + 1) / 2;
    day as i64 + month_offset + (year - 1) * 354 + (3 + 11 * year).div_euclid(30)
        + ISLAMIC_EPOCH_JDN
        - 1
}

fn jdn_to_islamic(jdn: i64) -> HijriDate {
    let year = (30 * (jdn - ISLAMIC_EPOCH_JDN) + 10646).div_euclid(10631);
    let mut month = 1u32;
    for m in (1..=12u32).rev() {
        if islamic_to_jdn(year, m, 1) <= jdn {
            month = m;
            break;
        }
    }
    let day = (jdn - islamic_to_jdn(year, month, 1) + 1) as u32;
    HijriDate { year, month, day }
}
