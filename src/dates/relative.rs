//! Relative expressions ("3 hours ago", "2天前") and literal day tokens.

use chrono::{DateTime, Months, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,9})\s*(seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago\b")
        .expect("relative English pattern compiles")
});

static RELATIVE_ZH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,9})\s*(秒|分钟|小时|天|周|个月|月|年)前").expect("relative Chinese pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn from_english(word: &str) -> Option<Unit> {
        let word = word.to_ascii_lowercase();
        let unit = match word.trim_end_matches('s') {
            "second" | "sec" => Unit::Second,
            "minute" | "min" => Unit::Minute,
            "hour" | "hr" => Unit::Hour,
            "day" => Unit::Day,
            "week" => Unit::Week,
            "month" => Unit::Month,
            "year" => Unit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn from_chinese(word: &str) -> Option<Unit> {
        let unit = match word {
            "秒" => Unit::Second,
            "分钟" => Unit::Minute,
            "小时" => Unit::Hour,
            "天" => Unit::Day,
            "周" => Unit::Week,
            "个月" | "月" => Unit::Month,
            "年" => Unit::Year,
            _ => return None,
        };
        Some(unit)
    }
}

/// Literal tokens and the number of days they sit before "now".
const LITERALS: &[(&str, i64)] = &[
    ("just now", 0),
    ("刚刚", 0),
    ("yesterday", 1),
    ("昨天", 1),
    ("today", 0),
    ("今天", 0),
];

pub(super) fn parse(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(caps) = RELATIVE_EN.captures(text) {
        let amount = caps[1].parse::<u32>().ok()?;
        let unit = Unit::from_english(&caps[2])?;
        return subtract(now, amount, unit);
    }
    if let Some(caps) = RELATIVE_ZH.captures(text) {
        let amount = caps[1].parse::<u32>().ok()?;
        let unit = Unit::from_chinese(&caps[2])?;
        return subtract(now, amount, unit);
    }

    let lower = text.trim().to_lowercase();
    LITERALS
        .iter()
        .find(|(token, _)| starts_with_token(&lower, token))
        .and_then(|(_, days)| now.checked_sub_signed(TimeDelta::try_days(*days)?))
}

/// `text` is exactly `token`, or starts with it and the next character is not
/// a letter ("yesterday, 10:30" matches, "todayville" does not).
fn starts_with_token(text: &str, token: &str) -> bool {
    match text.strip_prefix(token) {
        Some(rest) => rest.chars().next().is_none_or(|c| !c.is_alphabetic() || !token.is_ascii()),
        None => false,
    }
}

fn subtract(now: DateTime<Utc>, amount: u32, unit: Unit) -> Option<DateTime<Utc>> {
    let n = i64::from(amount);
    let delta = match unit {
        Unit::Second => TimeDelta::try_seconds(n)?,
        Unit::Minute => TimeDelta::try_minutes(n)?,
        Unit::Hour => TimeDelta::try_hours(n)?,
        Unit::Day => TimeDelta::try_days(n)?,
        Unit::Week => TimeDelta::try_weeks(n)?,
        Unit::Month => return now.checked_sub_months(Months::new(amount)),
        Unit::Year => return now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
    };
    now.checked_sub_signed(delta)
}
