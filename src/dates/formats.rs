//! Strict machine formats, the cleaning pass, and the explicit pattern tables.
//!
//! Every pattern is interpreted in UTC unless it carries an offset. Month names
//! are English only and matched case-insensitively by chrono, so there is no
//! locale-dependent ambiguity.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// A chrono format and whether it carries a time-of-day component.
#[derive(Debug, Clone, Copy)]
enum Layout {
    DateTime(&'static str),
    Date(&'static str),
}

impl Layout {
    fn parse(self, text: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(text, fmt)
                .ok()
                .map(|n| n.and_utc()),
            Layout::Date(fmt) => NaiveDate::parse_from_str(text, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|n| n.and_utc()),
        }
    }
}

/// Explicit patterns tried in order after cleaning. Slash forms try US
/// month-first before day-first so `03/04/2024` is March 4th.
const EXPLICIT: &[Layout] = &[
    Layout::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%d %H:%M"),
    Layout::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    Layout::DateTime("%Y-%m-%dT%H:%M"),
    Layout::DateTime("%Y/%m/%d %H:%M:%S"),
    Layout::DateTime("%Y/%m/%d %H:%M"),
    Layout::DateTime("%Y.%m.%d %H:%M:%S"),
    Layout::DateTime("%Y.%m.%d %H:%M"),
    Layout::DateTime("%m/%d/%Y %H:%M:%S"),
    Layout::DateTime("%m/%d/%Y %H:%M"),
    Layout::DateTime("%m/%d/%Y %I:%M %p"),
    Layout::DateTime("%d/%m/%Y %H:%M"),
    Layout::DateTime("%d.%m.%Y %H:%M"),
    Layout::DateTime("%B %d, %Y %H:%M:%S"),
    Layout::DateTime("%B %d, %Y %H:%M"),
    Layout::DateTime("%B %d, %Y %I:%M %p"),
    Layout::DateTime("%B %d, %Y at %I:%M %p"),
    Layout::DateTime("%d %B %Y %H:%M:%S"),
    Layout::DateTime("%d %B %Y %H:%M"),
    Layout::DateTime("%a, %d %B %Y %H:%M"),
    Layout::DateTime("%Y%m%d%H%M%S"),
    Layout::Date("%Y-%m-%d"),
    Layout::Date("%Y/%m/%d"),
    Layout::Date("%Y.%m.%d"),
    Layout::Date("%m/%d/%Y"),
    Layout::Date("%d/%m/%Y"),
    Layout::Date("%d.%m.%Y"),
    Layout::Date("%d-%m-%Y"),
    Layout::Date("%B %d, %Y"),
    Layout::Date("%B %d %Y"),
    Layout::Date("%d %B %Y"),
    Layout::Date("%d %B, %Y"),
    Layout::Date("%A, %B %d, %Y"),
    Layout::Date("%a, %d %B %Y"),
    Layout::Date("%Y %B %d"),
    Layout::Date("%Y%m%d"),
];

/// Offset-qualified patterns; named zones are rewritten to numeric offsets first.
const ZONED: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M %z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y/%m/%d %H:%M:%S %z",
    "%Y/%m/%d %H:%M %z",
    "%m/%d/%Y %H:%M:%S %z",
    "%m/%d/%Y %I:%M %p %z",
    "%B %d, %Y %H:%M:%S %z",
    "%B %d, %Y %H:%M %z",
    "%B %d, %Y %I:%M %p %z",
    "%B %d, %Y at %I:%M %p %z",
    "%d %B %Y %H:%M:%S %z",
    "%d %B %Y %H:%M %z",
    "%a, %d %B %Y %H:%M:%S %z",
    "%a, %d %B %Y %H:%M %z",
    "%a %B %d %H:%M:%S %z %Y",
];

const CHINESE: &[Layout] = &[
    Layout::DateTime("%Y年%m月%d日 %H:%M:%S"),
    Layout::DateTime("%Y年%m月%d日 %H:%M"),
    Layout::DateTime("%Y年%m月%d日%H:%M:%S"),
    Layout::DateTime("%Y年%m月%d日%H:%M"),
    Layout::DateTime("%Y年%m月%d日 %H时%M分"),
    Layout::DateTime("%Y年%m月%d日 %H点%M分"),
    Layout::Date("%Y年%m月%d日"),
];

/// Label prefixes stripped by the cleaning pass (compared ASCII-case-insensitively).
const LABELS: &[&str] = &[
    "last updated on",
    "last updated:",
    "last updated",
    "published on",
    "published:",
    "published",
    "posted on",
    "posted:",
    "posted",
    "updated on",
    "updated:",
    "updated",
    "date:",
    "on:",
    "发布于:",
    "发布于：",
    "发布于",
    "发布时间:",
    "发布时间：",
    "发布时间",
    "更新于:",
    "更新于：",
    "更新时间:",
    "更新时间：",
    "时间:",
    "时间：",
    "日期:",
    "日期：",
];

/// Zone abbreviations and their offsets from UTC in minutes.
const ZONES: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("UT", 0),
    ("Z", 0),
    ("EST", -5 * 60),
    ("EDT", -4 * 60),
    ("CST", -6 * 60),
    ("CDT", -5 * 60),
    ("MST", -7 * 60),
    ("MDT", -6 * 60),
    ("PST", -8 * 60),
    ("PDT", -7 * 60),
    ("AKST", -9 * 60),
    ("AKDT", -8 * 60),
    ("HST", -10 * 60),
    ("WET", 0),
    ("WEST", 60),
    ("BST", 60),
    ("CET", 60),
    ("CEST", 2 * 60),
    ("EET", 2 * 60),
    ("EEST", 3 * 60),
    ("MSK", 3 * 60),
    ("IST", 5 * 60 + 30),
    ("HKT", 8 * 60),
    ("SGT", 8 * 60),
    ("AWST", 8 * 60),
    ("JST", 9 * 60),
    ("KST", 9 * 60),
    ("ACST", 9 * 60 + 30),
    ("AEST", 10 * 60),
    ("AEDT", 11 * 60),
    ("NZST", 12 * 60),
    ("NZDT", 13 * 60),
];

static NUMERIC_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\sT\d])[+-](?:0\d|1[0-4]):?[0-5]\d\b").expect("offset pattern compiles")
});

static TRAILING_ZONE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\(?\b[A-Za-z]{3,4}\)?$").expect("zone name pattern compiles")
});

static GMT_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:GMT|UTC)\s*([+-])(\d{1,2})(?::?(\d{2}))?$").expect("GMT offset pattern compiles")
});

static TRAILING_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\(?\b([A-Za-z]{1,5})\)?$").expect("trailing word pattern compiles")
});

/// Stage 2: RFC 3339 / ISO-8601 and RFC 2822.
pub(super) fn parse_strict(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_rfc2822(text))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%a, %d %b %Y %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// Stage 3: decode entities, collapse whitespace, strip labels and, when an
/// explicit numeric offset is present, a redundant trailing zone name.
pub(super) fn clean(text: &str) -> String {
    let decoded = html_escape::decode_html_entities(text);
    let mut cleaned = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

    loop {
        let stripped = strip_label(&cleaned);
        if stripped.len() == cleaned.len() {
            break;
        }
        cleaned = stripped.to_string();
    }

    if NUMERIC_OFFSET.is_match(&cleaned) {
        cleaned = TRAILING_ZONE_NAME.replace(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

fn strip_label(text: &str) -> &str {
    for label in LABELS {
        let Some(head) = text.get(..label.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(label) {
            continue;
        }
        let rest = &text[label.len()..];
        // "published" must not eat the start of "publishedAt2024" style words.
        if label.is_ascii()
            && label.ends_with(|c: char| c.is_ascii_alphabetic())
            && rest.starts_with(|c: char| c.is_alphanumeric())
        {
            continue;
        }
        return rest.trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '：');
    }
    text
}

/// Stage 4: explicit patterns in UTC.
pub(super) fn parse_explicit(text: &str) -> Option<DateTime<Utc>> {
    EXPLICIT.iter().find_map(|layout| layout.parse(text))
}

/// Stage 5: patterns with an explicit numeric or named offset.
pub(super) fn parse_zoned(text: &str) -> Option<DateTime<Utc>> {
    let normalized = normalize_zone(text)?;
    ZONED.iter().find_map(|fmt| {
        DateTime::parse_from_str(&normalized, fmt)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Stage 6: Chinese-locale layouts.
pub(super) fn parse_chinese(text: &str) -> Option<DateTime<Utc>> {
    if !text.contains('年') {
        return None;
    }
    CHINESE.iter().find_map(|layout| layout.parse(text))
}

/// Rewrite a trailing `GMT+8` / named zone / Zulu `Z` into `+hhmm`; `None`
/// when the text carries no zone information at all.
fn normalize_zone(text: &str) -> Option<String> {
    // `10:30Z` has no word boundary before the `Z`.
    if let Some(head) = text
        .strip_suffix(['Z', 'z'])
        .filter(|head| head.ends_with(|c: char| c.is_ascii_digit()))
    {
        return Some(format!("{head}+0000"));
    }

    if let Some(caps) = GMT_OFFSET.captures(text) {
        let sign = &caps[1];
        let hours: u32 = caps[2].parse().ok()?;
        let minutes: u32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        let head = &text[..caps.get(0)?.start()];
        return Some(format!("{head} {sign}{hours:02}{minutes:02}"));
    }

    if let Some(caps) = TRAILING_WORD.captures(text) {
        let word = caps.get(1)?.as_str();
        if let Some((_, offset)) = ZONES.iter().find(|(name, _)| *name == word) {
            let head = text[..caps.get(0)?.start()].trim_end();
            return Some(format!("{head} {}", format_offset(*offset)));
        }
    }

    NUMERIC_OFFSET.is_match(text).then(|| text.to_string())
}

fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.abs();
    format!("{sign}{:02}{:02}", abs / 60, abs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_clean_strips_labels_entities_and_whitespace() {
        assert_eq!(clean("  Published:   Jan 5,\n 2024 "), "Jan 5, 2024");
        assert_eq!(clean("Posted on 2024-01-15"), "2024-01-15");
        assert_eq!(clean("发布时间：2024年1月15日"), "2024年1月15日");
        assert_eq!(clean("Jan&nbsp;5,&#32;2024"), "Jan 5, 2024");
    }

    #[test]
    fn test_clean_strips_zone_name_only_with_numeric_offset() {
        assert_eq!(
            clean("2024-01-15 10:30:00 +0800 (CST)"),
            "2024-01-15 10:30:00 +0800"
        );
        assert_eq!(clean("2024-01-15 10:30:00 EST"), "2024-01-15 10:30:00 EST");
        // A year after a dash is not an offset.
        assert_eq!(clean("Jan-15-2024 EST"), "Jan-15-2024 EST");
    }

    #[test]
    fn test_explicit_patterns() {
        let cases = [
            ("2024-01-15 10:30:00", utc(2024, 1, 15, 10, 30, 0)),
            ("2024/1/5 09:05", utc(2024, 1, 5, 9, 5, 0)),
            ("2024.01.15", utc(2024, 1, 15, 0, 0, 0)),
            ("03/04/2024", utc(2024, 3, 4, 0, 0, 0)),
            ("25/12/2023", utc(2023, 12, 25, 0, 0, 0)),
            ("25.12.2023 18:00", utc(2023, 12, 25, 18, 0, 0)),
            ("January 15, 2024", utc(2024, 1, 15, 0, 0, 0)),
            ("jan 15, 2024 3:45 PM", utc(2024, 1, 15, 15, 45, 0)),
            ("15 March 2024", utc(2024, 3, 15, 0, 0, 0)),
            ("Monday, January 15, 2024", utc(2024, 1, 15, 0, 0, 0)),
            ("20240115", utc(2024, 1, 15, 0, 0, 0)),
            ("20240115103000", utc(2024, 1, 15, 10, 30, 0)),
        ];
        for (text, expected) in cases {
            assert_eq!(parse_explicit(text), Some(expected), "pattern for {text:?}");
        }
    }

    #[test]
    fn test_zoned_patterns() {
        assert_eq!(
            parse_zoned("2024-01-15 10:30:00 +08:00"),
            Some(utc(2024, 1, 15, 2, 30, 0))
        );
        assert_eq!(
            parse_zoned("2024-01-15 10:30 GMT+8"),
            Some(utc(2024, 1, 15, 2, 30, 0))
        );
        assert_eq!(
            parse_zoned("15 January 2024 10:30 PST"),
            Some(utc(2024, 1, 15, 18, 30, 0))
        );
        assert_eq!(parse_zoned("2024-01-15 10:30:00"), None);
    }

    #[test]
    fn test_chinese_patterns() {
        assert_eq!(
            parse_chinese("2024年01月15日 08时30分"),
            Some(utc(2024, 1, 15, 8, 30, 0))
        );
        assert_eq!(
            parse_chinese("2024年1月15日10:30:15"),
            Some(utc(2024, 1, 15, 10, 30, 15))
        );
        assert_eq!(parse_chinese("January 15"), None);
    }

    #[test]
    fn test_strict_rejects_loose_text() {
        assert_eq!(parse_strict("2024-01-15"), None);
        assert_eq!(
            parse_strict("2024-01-15T10:30:00+00:00"),
            Some(utc(2024, 1, 15, 10, 30, 0))
        );
    }
}
