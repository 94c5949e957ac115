pub mod activity;
pub mod analytics;
pub mod cache;
pub mod settings;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, info};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::ScoringSettings;
use crate::services::activity_service::ActivityService;
use crate::services::cache_service::{InMemoryScoreCache, ScoreCache, SqliteScoreCache};
use crate::services::invalidation::CacheInvalidator;
use crate::services::metrics_collector::SqliteMetricsCollector;
use crate::services::performance_service::PerformanceService;
use crate::services::settings_service::{self, SettingsService};

/// Where computed analytics are memoized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackend {
    #[default]
    InMemory,
    Sqlite,
}

#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    score_cache: Arc<dyn ScoreCache>,
    settings_service: Arc<SettingsService>,
    performance_service: Arc<PerformanceService>,
    activity_service: Arc<ActivityService>,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> AppResult<Self> {
        Self::with_settings(db_pool, ScoringSettings::default(), CacheBackend::default())
    }

    pub fn with_settings(
        db_pool: DbPool,
        seed: ScoringSettings,
        backend: CacheBackend,
    ) -> AppResult<Self> {
        settings_service::validate(&seed)?;

        let score_cache: Arc<dyn ScoreCache> = match backend {
            CacheBackend::InMemory => Arc::new(InMemoryScoreCache::new(seed.cache_capacity)),
            CacheBackend::Sqlite => Arc::new(SqliteScoreCache::new(db_pool.clone())),
        };

        let settings_service = Arc::new(
            SettingsService::with_seed(db_pool.clone(), seed)
                .with_score_cache(Arc::clone(&score_cache)),
        );
        let collector = Arc::new(SqliteMetricsCollector::new(db_pool.clone()));
        let performance_service = Arc::new(PerformanceService::new(
            collector,
            Arc::clone(&score_cache),
            Arc::clone(&settings_service),
        ));
        let invalidator = Arc::new(CacheInvalidator::new(Arc::clone(&score_cache)));
        let activity_service = Arc::new(ActivityService::new(db_pool.clone(), invalidator));

        info!(target: "app::command", backend = ?backend, "analytics state ready");

        Ok(Self {
            db_pool,
            score_cache,
            settings_service,
            performance_service,
            activity_service,
        })
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }

    pub fn cache(&self) -> Arc<dyn ScoreCache> {
        Arc::clone(&self.score_cache)
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings_service)
    }

    pub fn performance(&self) -> Arc<PerformanceService> {
        Arc::clone(&self.performance_service)
    }

    pub fn activity(&self) -> Arc<ActivityService> {
        Arc::clone(&self.activity_service)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::NotFound => {
                CommandError::new("NOT_FOUND", "requested resource does not exist", None)
            }
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "serialization failed", None)
            }
            AppError::SettingsFile(error) => {
                error!(target: "app::command", error = %error, "settings file error in command");
                CommandError::new("SETTINGS_FILE", error.to_string(), None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "file system access failed", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}

/// Runs store-bound work on the blocking pool so async callers never stall on SQLite.
pub(crate) async fn run_blocking<T: Send + 'static>(
    task: impl FnOnce() -> Result<T, AppError> + Send + 'static,
) -> CommandResult<T> {
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| CommandError::new("UNKNOWN", format!("background task failed: {err}"), None))?
        .map_err(CommandError::from)
}
