use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::search::{BlankFilterPolicy, SearchSettings};

const DEFAULT_CATEGORIES: &[&str] = &[
    "food",
    "cafe",
    "drink",
    "entertainment",
    "culture",
    "shop",
    "walk",
];

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: SearchSection,
    pub store: StoreSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and environment.
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("SPOTLIST_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load from an explicit file (skipped if missing) plus `SPOTLIST_*` overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder();

        if path.exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(path)));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SPOTLIST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        let mut config: Self = settings.try_deserialize()?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        config.search.validate()?;

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub default_limit: usize,
    pub max_limit: usize,
    pub collection_page_size: usize,
    pub popular_limit: usize,
    pub nearby_radius_km: f64,
    pub blank_filter: BlankFilterPolicy,
    pub categories: Vec<String>,
}

impl SearchSection {
    pub fn validate(&self) -> Result<()> {
        if self.max_limit == 0 {
            bail!("search.max_limit must be at least 1");
        }
        for (name, value) in [
            ("search.default_limit", self.default_limit),
            ("search.collection_page_size", self.collection_page_size),
            ("search.popular_limit", self.popular_limit),
        ] {
            if value == 0 || value > self.max_limit {
                bail!(
                    "{} must be between 1 and search.max_limit ({}), got {}",
                    name,
                    self.max_limit,
                    value
                );
            }
        }
        if !self.nearby_radius_km.is_finite() || self.nearby_radius_km <= 0.0 {
            bail!(
                "search.nearby_radius_km must be positive, got {}",
                self.nearby_radius_km
            );
        }
        if self.categories.iter().all(|c| c.trim().is_empty()) {
            bail!("search.categories must name at least one category");
        }
        Ok(())
    }

    pub fn to_settings(&self) -> SearchSettings {
        SearchSettings {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
            collection_page_size: self.collection_page_size,
            popular_limit: self.popular_limit,
            nearby_radius_km: self.nearby_radius_km,
            blank_filter: self.blank_filter,
        }
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        let settings = SearchSettings::default();
        Self {
            default_limit: settings.default_limit,
            max_limit: settings.max_limit,
            collection_page_size: settings.collection_page_size,
            popular_limit: settings.popular_limit,
            nearby_radius_km: settings.nearby_radius_km,
            blank_filter: settings.blank_filter,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreSection {
    /// JSON file loaded into the in-memory store at startup
    pub seed_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
