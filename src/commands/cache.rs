use serde::Serialize;

use crate::models::metrics::EntityKind;
use crate::services::invalidation::{CacheInvalidator, EntityMutationListener};

use super::{run_blocking, AppState, CommandResult};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearResult {
    pub entries_cleared: usize,
}

pub async fn cache_clear_all(state: &AppState) -> CommandResult<CacheClearResult> {
    let app_state = state.clone();
    run_blocking(move || {
        let entries_cleared = app_state.cache().clear()?;
        Ok(CacheClearResult { entries_cleared })
    })
    .await
}

pub async fn cache_purge_expired(state: &AppState) -> CommandResult<CacheClearResult> {
    let app_state = state.clone();
    run_blocking(move || {
        let entries_cleared = app_state.cache().purge_expired()?;
        Ok(CacheClearResult { entries_cleared })
    })
    .await
}

/// Manual invalidation for an entity changed outside the activity write paths.
pub async fn cache_invalidate_entity(
    state: &AppState,
    kind: String,
    id: i64,
) -> CommandResult<CacheClearResult> {
    let app_state = state.clone();
    run_blocking(move || {
        let kind: EntityKind = kind.parse()?;
        let invalidator = CacheInvalidator::new(app_state.cache());
        let entries_cleared = invalidator.on_entity_mutated(kind, id)?;
        Ok(CacheClearResult { entries_cleared })
    })
    .await
}

/// Periodically drops expired entries so a long-lived process does not keep
/// dead payloads around. The task runs until the runtime shuts down.
pub fn spawn_cache_janitor(state: AppState, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match cache_purge_expired(&state).await {
                Ok(result) if result.entries_cleared > 0 => {
                    tracing::debug!(
                        target: "app::cache",
                        purged = result.entries_cleared,
                        "cache janitor purged expired entries"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        target: "app::cache",
                        code = %err.code,
                        message = %err.message,
                        "cache janitor failed"
                    );
                }
            }
        }
    })
}
