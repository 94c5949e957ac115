use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{SettingRow, SettingsRepository};
use crate::db::{format_timestamp, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::settings::{ScoringSettings, SettingsUpdateInput};
use crate::services::cache_service::ScoreCache;

const NAMESPACE: &str = "scoring";
const KEY_CACHE_TTL: &str = "scoring.cacheTtlSeconds";
const KEY_AGGREGATE_CACHE_TTL: &str = "scoring.aggregateCacheTtlSeconds";
const KEY_TRENDING_WINDOW: &str = "scoring.trendingWindowDays";
const KEY_TRENDING_HALF_LIFE: &str = "scoring.trendingHalfLifeDays";
const KEY_TRENDING_RATING_WEIGHT: &str = "scoring.trendingRatingWeight";
const KEY_BOUNCE_THRESHOLD: &str = "scoring.bounceThresholdPercent";

const MAX_CACHE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const MAX_TRENDING_WINDOW_DAYS: u32 = 90;
const MAX_RATING_WEIGHT: f64 = 100.0;

/// Scoring settings resolved as: built-in defaults, then an optional YAML
/// seed, then overrides persisted in `app_settings`.
pub struct SettingsService {
    db: DbPool,
    seed: ScoringSettings,
    cache: RwLock<Option<ScoringSettings>>,
    score_cache: Option<Arc<dyn ScoreCache>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> Self {
        Self::with_seed(db, ScoringSettings::default())
    }

    pub fn with_seed(db: DbPool, seed: ScoringSettings) -> Self {
        Self {
            db,
            seed,
            cache: RwLock::new(None),
            score_cache: None,
        }
    }

    /// Cache to clear whenever a change alters how scores are computed.
    pub fn with_score_cache(mut self, cache: Arc<dyn ScoreCache>) -> Self {
        self.score_cache = Some(cache);
        self
    }

    pub fn get(&self) -> AppResult<ScoringSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<ScoringSettings> {
        if input.is_empty() {
            return self.get();
        }

        let previous = self.get()?;
        let mut next = previous.clone();
        apply_update(&mut next, &input);
        validate(&next)?;

        let now = format_timestamp(Utc::now());
        self.db.with_transaction(|tx| {
            for (key, value) in changed_entries(&input) {
                SettingsRepository::upsert(tx, key, &value, &now)?;
            }
            Ok(())
        })?;
        next.updated_at = Some(now);

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(next.clone());
        }

        if affects_scores(&previous, &next) {
            self.clear_score_cache();
        }

        info!(target: "app::settings", "scoring settings updated");
        Ok(next)
    }

    /// Drops persisted overrides and returns to the seed values.
    pub fn reset(&self) -> AppResult<ScoringSettings> {
        let removed = self
            .db
            .with_connection(|conn| SettingsRepository::delete_namespace(conn, NAMESPACE))?;

        if let Ok(mut guard) = self.cache.write() {
            *guard = None;
        }
        if removed > 0 {
            self.clear_score_cache();
        }

        info!(target: "app::settings", removed, "scoring settings reset");
        self.get()
    }

    fn clear_score_cache(&self) {
        let Some(cache) = self.score_cache.as_ref() else {
            return;
        };
        match cache.clear() {
            Ok(cleared) => {
                info!(target: "app::settings", cleared, "cleared score cache after settings change")
            }
            Err(err) => warn!(
                target: "app::settings",
                error = %err,
                "failed to clear score cache after settings change"
            ),
        }
    }

    fn load_settings_from_db(&self) -> AppResult<ScoringSettings> {
        let rows = self
            .db
            .with_connection(|conn| SettingsRepository::list_namespace(conn, NAMESPACE))?;

        let mut latest_updated_at: Option<String> = None;
        let mut map: HashMap<String, SettingRow> = HashMap::new();
        for row in rows {
            latest_updated_at = match latest_updated_at {
                Some(current) if current >= row.updated_at => Some(current),
                _ => Some(row.updated_at.clone()),
            };
            map.insert(row.key.clone(), row);
        }

        let mut settings = self.seed.clone();
        settings.cache_ttl_seconds = parsed(&map, KEY_CACHE_TTL).unwrap_or(settings.cache_ttl_seconds);
        settings.aggregate_cache_ttl_seconds = parsed(&map, KEY_AGGREGATE_CACHE_TTL)
            .unwrap_or(settings.aggregate_cache_ttl_seconds);
        settings.trending_window_days =
            parsed(&map, KEY_TRENDING_WINDOW).unwrap_or(settings.trending_window_days);
        settings.trending_half_life_days =
            parsed(&map, KEY_TRENDING_HALF_LIFE).unwrap_or(settings.trending_half_life_days);
        settings.trending_rating_weight =
            parsed(&map, KEY_TRENDING_RATING_WEIGHT).unwrap_or(settings.trending_rating_weight);
        settings.bounce_threshold_percent =
            parsed(&map, KEY_BOUNCE_THRESHOLD).unwrap_or(settings.bounce_threshold_percent);
        settings.updated_at = latest_updated_at.or_else(|| self.seed.updated_at.clone());

        if let Err(err) = validate(&settings) {
            warn!(
                target: "app::settings",
                error = %err,
                "stored scoring settings invalid, falling back to seed"
            );
            return Ok(self.seed.clone());
        }

        Ok(settings)
    }
}

fn parsed<T: std::str::FromStr>(map: &HashMap<String, SettingRow>, key: &str) -> Option<T> {
    let row = map.get(key)?;
    match row.value.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(target: "app::settings", key, value = %row.value, "ignoring unreadable setting");
            None
        }
    }
}

fn apply_update(settings: &mut ScoringSettings, input: &SettingsUpdateInput) {
    if let Some(value) = input.cache_ttl_seconds {
        settings.cache_ttl_seconds = value;
    }
    if let Some(value) = input.aggregate_cache_ttl_seconds {
        settings.aggregate_cache_ttl_seconds = value;
    }
    if let Some(value) = input.trending_window_days {
        settings.trending_window_days = value;
    }
    if let Some(value) = input.trending_half_life_days {
        settings.trending_half_life_days = value;
    }
    if let Some(value) = input.trending_rating_weight {
        settings.trending_rating_weight = value;
    }
    if let Some(value) = input.bounce_threshold_percent {
        settings.bounce_threshold_percent = value;
    }
}

fn changed_entries(input: &SettingsUpdateInput) -> Vec<(&'static str, String)> {
    let mut entries = Vec::new();
    if let Some(value) = input.cache_ttl_seconds {
        entries.push((KEY_CACHE_TTL, value.to_string()));
    }
    if let Some(value) = input.aggregate_cache_ttl_seconds {
        entries.push((KEY_AGGREGATE_CACHE_TTL, value.to_string()));
    }
    if let Some(value) = input.trending_window_days {
        entries.push((KEY_TRENDING_WINDOW, value.to_string()));
    }
    if let Some(value) = input.trending_half_life_days {
        entries.push((KEY_TRENDING_HALF_LIFE, value.to_string()));
    }
    if let Some(value) = input.trending_rating_weight {
        entries.push((KEY_TRENDING_RATING_WEIGHT, value.to_string()));
    }
    if let Some(value) = input.bounce_threshold_percent {
        entries.push((KEY_BOUNCE_THRESHOLD, value.to_string()));
    }
    entries
}

fn affects_scores(previous: &ScoringSettings, next: &ScoringSettings) -> bool {
    previous.trending_window_days != next.trending_window_days
        || previous.trending_half_life_days != next.trending_half_life_days
        || previous.trending_rating_weight != next.trending_rating_weight
        || previous.bounce_threshold_percent != next.bounce_threshold_percent
}

pub fn validate(settings: &ScoringSettings) -> AppResult<()> {
    for (field, ttl) in [
        ("cacheTtlSeconds", settings.cache_ttl_seconds),
        ("aggregateCacheTtlSeconds", settings.aggregate_cache_ttl_seconds),
    ] {
        if !(0..=MAX_CACHE_TTL_SECONDS).contains(&ttl) {
            return Err(AppError::validation_with_details(
                format!("{field} must be between 0 and {MAX_CACHE_TTL_SECONDS}"),
                serde_json::json!({ "field": field, "value": ttl }),
            ));
        }
    }

    if settings.cache_capacity == 0 {
        return Err(AppError::validation("cacheCapacity must be at least 1"));
    }

    if !(1..=MAX_TRENDING_WINDOW_DAYS).contains(&settings.trending_window_days) {
        return Err(AppError::validation_with_details(
            format!("trendingWindowDays must be between 1 and {MAX_TRENDING_WINDOW_DAYS}"),
            serde_json::json!({ "field": "trendingWindowDays", "value": settings.trending_window_days }),
        ));
    }

    let half_life = settings.trending_half_life_days;
    if !half_life.is_finite() || half_life <= 0.0 {
        return Err(AppError::validation("trendingHalfLifeDays must be positive"));
    }

    let weight = settings.trending_rating_weight;
    if !weight.is_finite() || !(0.0..=MAX_RATING_WEIGHT).contains(&weight) {
        return Err(AppError::validation(format!(
            "trendingRatingWeight must be between 0 and {MAX_RATING_WEIGHT}"
        )));
    }

    let threshold = settings.bounce_threshold_percent;
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        return Err(AppError::validation(
            "bounceThresholdPercent must be between 0 and 100",
        ));
    }

    Ok(())
}
