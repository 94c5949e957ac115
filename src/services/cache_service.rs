use std::fmt;
use std::num::NonZeroUsize;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use rusqlite::{named_params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::{format_timestamp, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::member::MemberDashboard;
use crate::models::metrics::{EntityKind, MetricsWindow};
use crate::models::performance::{PerformanceReport, PlatformOverview, RankedStory};
use crate::models::settings::DEFAULT_CACHE_CAPACITY;

/// Platform-level results derived from many entities at once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AggregateScope {
    TopPerforming,
    Trending,
    PlatformOverview,
}

impl AggregateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateScope::TopPerforming => "top_performing",
            AggregateScope::Trending => "trending",
            AggregateScope::PlatformOverview => "platform_overview",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Entity {
        kind: EntityKind,
        id: i64,
        window: MetricsWindow,
    },
    Aggregate {
        scope: AggregateScope,
        window: MetricsWindow,
        limit: usize,
    },
}

impl CacheKey {
    pub fn entity(kind: EntityKind, id: i64, window: MetricsWindow) -> Self {
        CacheKey::Entity { kind, id, window }
    }

    pub fn aggregate(scope: AggregateScope, window: MetricsWindow, limit: usize) -> Self {
        CacheKey::Aggregate {
            scope,
            window,
            limit,
        }
    }

    pub fn window(&self) -> MetricsWindow {
        match self {
            CacheKey::Entity { window, .. } | CacheKey::Aggregate { window, .. } => *window,
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, CacheKey::Aggregate { .. })
    }

    pub fn belongs_to(&self, entity_kind: EntityKind, entity_id: i64) -> bool {
        matches!(self, CacheKey::Entity { kind, id, .. } if *kind == entity_kind && *id == entity_id)
    }

    /// Stable string form used as the persisted primary key.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Entity { kind, id, window } => write!(f, "{kind}:{id}:{window}"),
            CacheKey::Aggregate {
                scope,
                window,
                limit,
            } => write!(f, "aggregate:{}:{window}:{limit}", scope.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum CachedValue {
    Report(PerformanceReport),
    Member(MemberDashboard),
    Ranking(Vec<RankedStory>),
    Overview(PlatformOverview),
}

impl CachedValue {
    pub fn kind(&self) -> &'static str {
        match self {
            CachedValue::Report(_) => "report",
            CachedValue::Member(_) => "member",
            CachedValue::Ranking(_) => "ranking",
            CachedValue::Overview(_) => "overview",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: CachedValue,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Memoizes computed analytics per key with an absolute expiry.
///
/// Implementations are shared across threads. Two callers may race to
/// recompute and store the same key; the values are equivalent, so the last
/// write simply wins.
pub trait ScoreCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> AppResult<Option<CachedValue>>;

    fn put(&self, key: CacheKey, value: CachedValue, ttl: Duration) -> AppResult<()>;

    fn invalidate(&self, key: &CacheKey) -> AppResult<bool>;

    /// Drops every window of one entity. Returns the number of entries removed.
    fn invalidate_for_entity(&self, kind: EntityKind, id: i64) -> AppResult<usize>;

    fn invalidate_aggregates(&self) -> AppResult<usize>;

    fn clear(&self) -> AppResult<usize>;

    fn purge_expired(&self) -> AppResult<usize>;
}

/// Bounded in-process cache. Lookups use `peek` under a read lock so readers
/// only wait while a writer is mid-update.
pub struct InMemoryScoreCache {
    entries: RwLock<LruCache<CacheKey, CacheEntry>>,
}

impl InMemoryScoreCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_where(&self, predicate: impl Fn(&CacheKey) -> bool) -> AppResult<usize> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| AppError::other("score cache lock poisoned"))?;
        let doomed: Vec<CacheKey> = guard
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            guard.pop(key);
        }
        Ok(doomed.len())
    }
}

impl Default for InMemoryScoreCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ScoreCache for InMemoryScoreCache {
    fn get(&self, key: &CacheKey) -> AppResult<Option<CachedValue>> {
        let now = Utc::now();
        let guard = match self.entries.read() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(target: "app::cache", cache_key = %key, "score cache lock poisoned, treating as miss");
                return Ok(None);
            }
        };

        let hit = guard
            .peek(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone());

        if hit.is_some() {
            debug!(target: "app::cache", cache_key = %key, "cache hit");
        }
        Ok(hit)
    }

    fn put(&self, key: CacheKey, value: CachedValue, ttl: Duration) -> AppResult<()> {
        let expires_at = Utc::now() + ttl;
        let mut guard = self
            .entries
            .write()
            .map_err(|_| AppError::other("score cache lock poisoned"))?;
        debug!(
            target: "app::cache",
            cache_key = %key,
            value = value.kind(),
            "cached analytics value"
        );
        guard.put(
            key,
            CacheEntry {
                key,
                value,
                expires_at,
            },
        );
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> AppResult<bool> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| AppError::other("score cache lock poisoned"))?;
        Ok(guard.pop(key).is_some())
    }

    fn invalidate_for_entity(&self, kind: EntityKind, id: i64) -> AppResult<usize> {
        let removed = self.remove_where(|key| key.belongs_to(kind, id))?;
        debug!(target: "app::cache", entity_type = %kind, entity_id = id, removed, "invalidated entity entries");
        Ok(removed)
    }

    fn invalidate_aggregates(&self) -> AppResult<usize> {
        self.remove_where(CacheKey::is_aggregate)
    }

    fn clear(&self) -> AppResult<usize> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| AppError::other("score cache lock poisoned"))?;
        let cleared = guard.len();
        guard.clear();
        Ok(cleared)
    }

    fn purge_expired(&self) -> AppResult<usize> {
        let now = Utc::now();
        let mut guard = self
            .entries
            .write()
            .map_err(|_| AppError::other("score cache lock poisoned"))?;
        let expired: Vec<CacheKey> = guard
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            guard.pop(key);
        }
        if !expired.is_empty() {
            debug!(target: "app::cache", purged = expired.len(), "purged expired cache entries");
        }
        Ok(expired.len())
    }
}

/// Cache persisted in the `score_cache` table so warm results survive restarts
/// and can be shared by several processes using the same database file.
#[derive(Debug, Clone)]
pub struct SqliteScoreCache {
    db: DbPool,
}

impl SqliteScoreCache {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn hit_count(&self, key: &CacheKey) -> AppResult<Option<i64>> {
        let cache_key = key.cache_key();
        self.db.with_connection(|conn| {
            let hits = conn
                .query_row(
                    "SELECT hit_count FROM score_cache WHERE cache_key = ?1",
                    [&cache_key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(hits)
        })
    }
}

impl ScoreCache for SqliteScoreCache {
    fn get(&self, key: &CacheKey) -> AppResult<Option<CachedValue>> {
        let cache_key = key.cache_key();
        self.db.with_connection(|conn| {
            let now = format_timestamp(Utc::now());
            let payload = conn
                .query_row(
                    "SELECT payload_json FROM score_cache WHERE cache_key = ?1 AND expires_at > ?2",
                    [&cache_key, &now],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;

            let Some(payload) = payload else {
                return Ok(None);
            };

            let value: CachedValue = match serde_json::from_str(&payload) {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        target: "app::cache",
                        cache_key = %cache_key,
                        error = %err,
                        "discarding unreadable cache payload"
                    );
                    conn.execute("DELETE FROM score_cache WHERE cache_key = ?1", [&cache_key])?;
                    return Ok(None);
                }
            };

            conn.execute(
                "UPDATE score_cache SET hit_count = hit_count + 1 WHERE cache_key = ?1",
                [&cache_key],
            )?;
            debug!(target: "app::cache", cache_key = %cache_key, "cache hit");

            Ok(Some(value))
        })
    }

    fn put(&self, key: CacheKey, value: CachedValue, ttl: Duration) -> AppResult<()> {
        let payload_json = serde_json::to_string(&value)?;
        self.db
            .with_connection(|conn| upsert_entry(conn, &key, &payload_json, ttl))
    }

    fn invalidate(&self, key: &CacheKey) -> AppResult<bool> {
        let cache_key = key.cache_key();
        self.db.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM score_cache WHERE cache_key = ?1", [&cache_key])?;
            Ok(deleted > 0)
        })
    }

    fn invalidate_for_entity(&self, kind: EntityKind, id: i64) -> AppResult<usize> {
        self.db.with_connection(|conn| {
            let deleted = conn.execute(
                "DELETE FROM score_cache WHERE scope = 'entity' AND entity_type = ?1 AND entity_id = ?2",
                (kind.as_str(), id),
            )?;
            debug!(target: "app::cache", entity_type = %kind, entity_id = id, deleted, "invalidated entity entries");
            Ok(deleted)
        })
    }

    fn invalidate_aggregates(&self) -> AppResult<usize> {
        self.db.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM score_cache WHERE scope = 'aggregate'", [])?;
            Ok(deleted)
        })
    }

    fn clear(&self) -> AppResult<usize> {
        self.db.with_connection(|conn| {
            let deleted = conn.execute("DELETE FROM score_cache", [])?;
            Ok(deleted)
        })
    }

    fn purge_expired(&self) -> AppResult<usize> {
        self.db.with_connection(|conn| {
            let now = format_timestamp(Utc::now());
            let deleted = conn.execute("DELETE FROM score_cache WHERE expires_at <= ?1", [&now])?;
            if deleted > 0 {
                debug!(target: "app::cache", deleted, "purged expired cache entries");
            }
            Ok(deleted)
        })
    }
}

fn upsert_entry(
    conn: &Connection,
    key: &CacheKey,
    payload_json: &str,
    ttl: Duration,
) -> AppResult<()> {
    let now = Utc::now();
    let expires_at = now + ttl;
    let (scope, entity_type, entity_id) = match key {
        CacheKey::Entity { kind, id, .. } => ("entity", Some(kind.as_str()), Some(*id)),
        CacheKey::Aggregate { .. } => ("aggregate", None, None),
    };

    conn.execute(
        r#"
        INSERT INTO score_cache (
            cache_key,
            scope,
            entity_type,
            entity_id,
            metrics_window,
            payload_json,
            created_at,
            expires_at,
            hit_count
        ) VALUES (
            :cache_key,
            :scope,
            :entity_type,
            :entity_id,
            :metrics_window,
            :payload_json,
            :created_at,
            :expires_at,
            0
        )
        ON CONFLICT(cache_key) DO UPDATE SET
            payload_json = excluded.payload_json,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
        "#,
        named_params! {
            ":cache_key": key.cache_key(),
            ":scope": scope,
            ":entity_type": entity_type,
            ":entity_id": entity_id,
            ":metrics_window": key.window().as_str(),
            ":payload_json": payload_json,
            ":created_at": format_timestamp(now),
            ":expires_at": format_timestamp(expires_at),
        },
    )?;

    debug!(target: "app::cache", cache_key = %key, "persisted analytics value");
    Ok(())
}
