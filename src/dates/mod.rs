//! Heuristic normalization of human and machine date strings.
//!
//! Publish dates on the open web come in every shape imaginable: ISO stamps in
//! `datetime` attributes, RFC 2822 in feeds, "3 hours ago" in list pages,
//! `2024年1月15日` on Chinese portals, and "Posted: Jan 5, 2024 10:30 AM EST"
//! in blog themes. [`DateNormalizer::parse`] runs an ordered pipeline of
//! stages and returns the first hit:
//!
//! | # | Stage | Module |
//! |---|-------|--------|
//! | 1 | Relative expressions and literal tokens | [`relative`] |
//! | 2 | RFC 3339 / ISO-8601, RFC 2822 | [`formats`] |
//! | 3 | Cleaning (labels, entities, whitespace, redundant zone names) | [`formats`] |
//! | 4 | Explicit patterns in UTC | [`formats`] |
//! | 5 | Offset-qualified patterns | [`formats`] |
//! | 6 | Chinese patterns | [`formats`] |
//! | 7 | Fuzzy year/month/day scan | [`fuzzy`] |
//!
//! No stage can fail loudly: a stage that does not match simply hands over to
//! the next one, and `None` means nothing matched.

mod formats;
mod fuzzy;
mod relative;

use chrono::{DateTime, Utc};
use tracing::trace;

/// Source of "now" for relative expressions and the canonical-item fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock UTC time.
    #[default]
    System,
    /// A pinned instant, for tests and reproducible runs.
    Fixed(DateTime<Utc>),
}

impl Clock {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(instant) => *instant,
        }
    }
}

/// Converts arbitrary date strings into UTC instants.
#[derive(Debug, Clone, Default)]
pub struct DateNormalizer {
    clock: Clock,
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Parse `text` into an instant, or `None` if no stage recognizes it.
    pub fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(dt) = relative::parse(text, self.clock.now()) {
            trace!(%text, stage = "relative", "Parsed date");
            return Some(dt);
        }
        if let Some(dt) = formats::parse_strict(text) {
            trace!(%text, stage = "strict", "Parsed date");
            return Some(dt);
        }

        let cleaned = formats::clean(text);
        if cleaned.is_empty() {
            return None;
        }

        let staged = formats::parse_explicit(&cleaned)
            .map(|dt| (dt, "explicit"))
            .or_else(|| formats::parse_zoned(&cleaned).map(|dt| (dt, "zoned")))
            .or_else(|| formats::parse_chinese(&cleaned).map(|dt| (dt, "chinese")))
            .or_else(|| fuzzy::parse(&cleaned).map(|dt| (dt, "fuzzy")));

        match staged {
            Some((dt, stage)) => {
                trace!(%text, %cleaned, stage, "Parsed date");
                Some(dt)
            }
            None => {
                trace!(%text, %cleaned, "Unrecognized date");
                None
            }
        }
    }
}
