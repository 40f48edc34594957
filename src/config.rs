//! YAML configuration for the CLI.
//!
//! Every section is optional:
//!
//! | Key | Type | Purpose |
//! |-----|------|---------|
//! | `fetch` | [`FetchConfig`] | timeouts, concurrency, headers |
//! | `sources` | list of [`Source`] | pages to ingest |
//! | `groups` | list of [`SourceGroup`] | labelled source lists, flattened after `sources` |
//! | `overrides` | map of source id to strategy ids | per-source strategy lists |
//! | `site_profiles` | list of [`SiteProfile`] | extra selector-driven strategies |

use crate::dates::DateNormalizer;
use crate::error::ConfigError;
use crate::fetcher::FetchConfig;
use crate::models::{Source, SourceGroup};
use crate::registry::StrategyRegistry;
use crate::strategies::sites::{SiteProfile, SiteStrategy};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub sources: Vec<Source>,
    pub groups: Vec<SourceGroup>,
    pub overrides: BTreeMap<String, Vec<String>>,
    pub site_profiles: Vec<SiteProfile>,
}

impl AppConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_yaml_str(&yaml)?;
        info!(
            sources = config.sources.len(),
            groups = config.groups.len(),
            site_profiles = config.site_profiles.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Top-level sources first, then each group's sources in order.
    pub fn all_sources(&self) -> Vec<Source> {
        self.sources
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.sources.iter()))
            .cloned()
            .collect()
    }

    /// Built-in strategies, plus configured site profiles, plus overrides.
    pub fn build_registry(&self, dates: DateNormalizer) -> Result<StrategyRegistry, ConfigError> {
        let registry = StrategyRegistry::with_builtins(dates);

        for profile in &self.site_profiles {
            profile.validate()?;
            registry.register(Arc::new(SiteStrategy::new(profile.clone())));
        }

        for (source_id, ids) in &self.overrides {
            let strategies = ids
                .iter()
                .map(|id| {
                    registry
                        .strategy(id)
                        .ok_or_else(|| ConfigError::UnknownStrategy {
                            source_id: source_id.clone(),
                            strategy: id.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            registry.set_override(source_id.clone(), strategies);
        }

        Ok(registry)
    }
}
