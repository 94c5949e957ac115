pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::commands::{AppState, CacheBackend};
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::settings::ScoringSettings;

const DATABASE_FILE: &str = "storyhub-analytics.sqlite";

/// Startup options for an embedding process.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub data_dir: PathBuf,
    /// YAML file with scoring defaults; persisted overrides still win.
    pub settings_file: Option<PathBuf>,
    pub cache_backend: CacheBackend,
    pub init_logging: bool,
}

impl BootstrapOptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            settings_file: None,
            cache_backend: CacheBackend::default(),
            init_logging: true,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Opens the database, loads settings and wires the services together.
pub fn bootstrap(options: &BootstrapOptions) -> AppResult<AppState> {
    std::fs::create_dir_all(&options.data_dir)?;
    if options.init_logging {
        crate::utils::logger::init_logging(&options.log_dir())?;
    }

    let pool = DbPool::new(options.database_path())?;
    let seed = match options.settings_file.as_deref() {
        Some(path) => load_seed(path)?,
        None => ScoringSettings::default(),
    };

    let state = AppState::with_settings(pool, seed, options.cache_backend)?;
    let purged = state.cache().purge_expired()?;
    info!(
        target: "app::db",
        data_dir = %options.data_dir.display(),
        purged,
        "analytics backend started"
    );

    Ok(state)
}

fn load_seed(path: &Path) -> AppResult<ScoringSettings> {
    let seed = ScoringSettings::from_yaml_file(path)?;
    info!(target: "app::settings", path = %path.display(), "loaded scoring settings file");
    Ok(seed)
}
