//! Last-resort scan for a year followed by a month and a day.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static YEAR_MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)((?:19|20)\d{2})\D+?(\d{1,2})\D+?(\d{1,2})(?:\D|$)")
        .expect("fuzzy date pattern compiles")
});

/// First `yyyy … m … d` triple (year 1900–2099) forming a valid calendar date,
/// at midnight UTC.
pub(super) fn parse(text: &str) -> Option<DateTime<Utc>> {
    YEAR_MONTH_DAY.captures_iter(text).find_map(|caps| {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(0, 0, 0)
            .map(|n| n.and_utc())
    })
}
