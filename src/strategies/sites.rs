//! Data-driven strategies for known site families.
//!
//! A [`SiteProfile`] is a declarative set of CSS selectors describing one site
//! family: where the items are, which element carries the link, and where the
//! optional fields live. Two profiles ship built in, both for the text-only
//! editions of large outlets whose markup is minimal and stable:
//!
//! | Id | Host | Item selector |
//! |----|------|---------------|
//! | `cnn-lite` | `lite.cnn.com` | `.card--lite` |
//! | `npr-text` | `text.npr.org` | `li` |
//!
//! More profiles can be supplied through configuration (`site_profiles`).
//!
//! Every item needs a link that resolves against the page URL and non-empty
//! text; items missing either are recorded as partial failures. Optional
//! fields are best effort.

use crate::error::{ConfigError, StrategyError};
use crate::strategies::dom::{CardLayout, CardSelectors};
use crate::strategies::{ExtractionStrategy, Outcome, Page};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SITE_PRIORITY: i32 = 100;

fn default_priority() -> i32 {
    SITE_PRIORITY
}

fn default_link() -> String {
    "a[href]".to_string()
}

/// Declarative selectors for one site family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub id: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Selector for each item container.
    pub item: String,
    /// Selector for the item's link, relative to the container.
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl SiteProfile {
    fn layout(&self) -> CardLayout<'_> {
        CardLayout {
            item: &self.item,
            link: &self.link,
            title: self.title.as_deref(),
            date: self.date.as_deref(),
            summary: self.summary.as_deref(),
            author: self.author.as_deref(),
            image: self.image.as_deref(),
            tags: self.tags.as_deref(),
            require_text: true,
        }
    }

    /// Check that the profile is usable before it is registered.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidProfile {
            id: self.id.clone(),
            reason,
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id".to_string()));
        }
        if self.item.trim().is_empty() {
            return Err(invalid("empty item selector".to_string()));
        }
        CardSelectors::compile(self.layout()).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}

/// Profiles that ship with the crate.
pub fn builtin_profiles() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            id: "cnn-lite".to_string(),
            domains: vec!["lite.cnn.com".to_string()],
            priority: SITE_PRIORITY,
            item: ".card--lite".to_string(),
            link: "a[href]".to_string(),
            title: None,
            date: None,
            summary: None,
            author: None,
            image: None,
            tags: None,
        },
        SiteProfile {
            id: "npr-text".to_string(),
            domains: vec!["text.npr.org".to_string()],
            priority: SITE_PRIORITY,
            item: "li".to_string(),
            link: "a.topic-title, a[href]".to_string(),
            title: None,
            date: Some("time, .topic-date".to_string()),
            summary: None,
            author: None,
            image: None,
            tags: None,
        },
    ]
}

/// [`ExtractionStrategy`] backed by a [`SiteProfile`].
#[derive(Debug, Clone)]
pub struct SiteStrategy {
    profile: SiteProfile,
}

impl SiteStrategy {
    pub fn new(profile: SiteProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }
}

impl ExtractionStrategy for SiteStrategy {
    fn id(&self) -> &str {
        &self.profile.id
    }

    fn priority(&self) -> i32 {
        self.profile.priority
    }

    fn domains(&self) -> &[String] {
        &self.profile.domains
    }

    fn extract(&self, page: &Page<'_>) -> Result<Outcome, StrategyError> {
        let cards = CardSelectors::compile(self.profile.layout())?;
        let extraction = cards.extract(page);
        debug!(
            strategy = %self.profile.id,
            count = extraction.articles.len(),
            skipped = extraction.partial_failures.len(),
            "Site profile extraction"
        );
        Ok(Outcome::Extracted(extraction))
    }
}
