use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_TRENDING_WINDOW_DAYS: u32 = 14;
pub const DEFAULT_TRENDING_HALF_LIFE_DAYS: f64 = 3.5;
pub const DEFAULT_TRENDING_RATING_WEIGHT: f64 = 3.0;
pub const DEFAULT_BOUNCE_THRESHOLD_PERCENT: f64 = 10.0;

/// Tunables for scoring and caching.
///
/// Missing keys in a settings file fall back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringSettings {
    pub cache_ttl_seconds: i64,
    pub aggregate_cache_ttl_seconds: i64,
    pub cache_capacity: usize,
    pub trending_window_days: u32,
    pub trending_half_life_days: f64,
    pub trending_rating_weight: f64,
    pub bounce_threshold_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            aggregate_cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            trending_window_days: DEFAULT_TRENDING_WINDOW_DAYS,
            trending_half_life_days: DEFAULT_TRENDING_HALF_LIFE_DAYS,
            trending_rating_weight: DEFAULT_TRENDING_RATING_WEIGHT,
            bounce_threshold_percent: DEFAULT_BOUNCE_THRESHOLD_PERCENT,
            updated_at: None,
        }
    }
}

impl ScoringSettings {
    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        let settings: ScoringSettings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_seconds)
    }

    pub fn aggregate_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.aggregate_cache_ttl_seconds)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdateInput {
    #[serde(default)]
    pub cache_ttl_seconds: Option<i64>,
    #[serde(default)]
    pub aggregate_cache_ttl_seconds: Option<i64>,
    #[serde(default)]
    pub trending_window_days: Option<u32>,
    #[serde(default)]
    pub trending_half_life_days: Option<f64>,
    #[serde(default)]
    pub trending_rating_weight: Option<f64>,
    #[serde(default)]
    pub bounce_threshold_percent: Option<f64>,
}

impl SettingsUpdateInput {
    pub fn is_empty(&self) -> bool {
        self.cache_ttl_seconds.is_none()
            && self.aggregate_cache_ttl_seconds.is_none()
            && self.trending_window_days.is_none()
            && self.trending_half_life_days.is_none()
            && self.trending_rating_weight.is_none()
            && self.bounce_threshold_percent.is_none()
    }
}
