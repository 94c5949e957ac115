use chrono::{Duration, Utc};
use storyhub_analytics_lib::commands::{AppState, CacheBackend};
use storyhub_analytics_lib::db::DbPool;
use storyhub_analytics_lib::models::activity::{
    MemberCreateInput, RatingInput, ReadingProgressInput, StoryCreateInput, StoryStatus, ViewInput,
};
use storyhub_analytics_lib::models::metrics::{EntityKind, MetricsWindow};
use storyhub_analytics_lib::models::settings::{ScoringSettings, SettingsUpdateInput};
use storyhub_analytics_lib::services::cache_service::{
    AggregateScope, CacheKey, CachedValue, ScoreCache, SqliteScoreCache,
};
use tempfile::{tempdir, TempDir};

struct Env {
    state: AppState,
    story_id: i64,
    other_story_id: i64,
    reader_id: i64,
    second_reader_id: i64,
    _dir: TempDir,
}

fn setup(settings: ScoringSettings, backend: CacheBackend) -> Env {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("cache.sqlite")).expect("db pool");
    let state = AppState::with_settings(pool, settings, backend).expect("app state");

    let activity = state.activity();
    let mut members = Vec::new();
    for name in ["writer", "reader", "critic"] {
        let record = activity
            .create_member(MemberCreateInput {
                display_name: name.into(),
                email: format!("{name}@example.com"),
                joined_at: None,
            })
            .expect("create member");
        members.push(record.id);
    }

    let mut stories = Vec::new();
    for title in ["Tidewater", "Ember"] {
        let story = activity
            .create_story(StoryCreateInput {
                title: title.into(),
                author_id: Some(members[0]),
                word_count: 1_000,
                status: Some(StoryStatus::Published),
                published_at: Some((Utc::now() - Duration::days(1)).to_rfc3339()),
            })
            .expect("create story");
        stories.push(story.record.id);
    }

    Env {
        state,
        story_id: stories[0],
        other_story_id: stories[1],
        reader_id: members[1],
        second_reader_id: members[2],
        _dir: dir,
    }
}

fn view(env: &Env, story_id: i64) {
    env.state
        .activity()
        .record_view(ViewInput {
            story_id,
            member_id: Some(env.reader_id),
            occurred_at: None,
        })
        .expect("record view");
}

fn rate(env: &Env, story_id: i64, member_id: i64, rating: u8) -> usize {
    env.state
        .activity()
        .submit_rating(RatingInput {
            story_id,
            member_id,
            rating,
            occurred_at: None,
        })
        .expect("submit rating")
        .invalidated_entries
}

#[test]
fn views_are_served_stale_until_a_scoring_write() {
    let env = setup(ScoringSettings::default(), CacheBackend::InMemory);
    let performance = env.state.performance();

    view(&env, env.story_id);
    let first = performance
        .story_report(env.story_id, MetricsWindow::ThirtyDays)
        .expect("report");
    assert_eq!(first.view_count, 1);

    // Views do not invalidate: the cached report is returned as-is.
    view(&env, env.story_id);
    let cached = performance
        .story_report(env.story_id, MetricsWindow::ThirtyDays)
        .expect("report");
    assert_eq!(cached, first);

    let removed = rate(&env, env.story_id, env.reader_id, 5);
    assert!(removed >= 1);

    let fresh = performance
        .story_report(env.story_id, MetricsWindow::ThirtyDays)
        .expect("report");
    assert_eq!(fresh.view_count, 2);
    assert_eq!(fresh.total_ratings, 1);
}

#[test]
fn rating_invalidates_every_window_of_the_story_and_member() {
    let env = setup(ScoringSettings::default(), CacheBackend::InMemory);
    let performance = env.state.performance();
    let cache = env.state.cache();

    for window in MetricsWindow::ALL {
        performance
            .story_report(env.story_id, window)
            .expect("story report");
    }
    performance
        .story_report(env.other_story_id, MetricsWindow::AllTime)
        .expect("other report");
    performance
        .member_dashboard(env.reader_id, MetricsWindow::AllTime)
        .expect("member dashboard");

    rate(&env, env.story_id, env.reader_id, 3);

    for window in MetricsWindow::ALL {
        let key = CacheKey::entity(EntityKind::Story, env.story_id, window);
        assert!(cache.get(&key).expect("cache get").is_none());
    }
    let member_key = CacheKey::entity(EntityKind::Member, env.reader_id, MetricsWindow::AllTime);
    assert!(cache.get(&member_key).expect("cache get").is_none());

    let untouched = CacheKey::entity(EntityKind::Story, env.other_story_id, MetricsWindow::AllTime);
    assert!(matches!(
        cache.get(&untouched).expect("cache get"),
        Some(CachedValue::Report(_))
    ));
}

#[test]
fn scoring_writes_drop_aggregates() {
    let env = setup(ScoringSettings::default(), CacheBackend::InMemory);
    let performance = env.state.performance();
    let cache = env.state.cache();

    let before = performance
        .top_performing_stories(MetricsWindow::AllTime, 5)
        .expect("top stories");
    assert_eq!(before.len(), 2);
    let key = CacheKey::aggregate(AggregateScope::TopPerforming, MetricsWindow::AllTime, 5);
    assert!(cache.get(&key).expect("cache get").is_some());

    rate(&env, env.other_story_id, env.reader_id, 5);
    rate(&env, env.other_story_id, env.second_reader_id, 5);
    assert!(cache.get(&key).expect("cache get").is_none());

    let after = performance
        .top_performing_stories(MetricsWindow::AllTime, 5)
        .expect("top stories");
    assert_eq!(after[0].story_id, env.other_story_id);
}

#[test]
fn completing_a_story_invalidates_once() {
    let env = setup(ScoringSettings::default(), CacheBackend::InMemory);
    let activity = env.state.activity();
    let performance = env.state.performance();
    let progress = |value: f64| ReadingProgressInput {
        story_id: env.story_id,
        member_id: env.reader_id,
        reading_progress: value,
        occurred_at: None,
    };

    performance
        .story_report(env.story_id, MetricsWindow::SevenDays)
        .expect("report");
    assert_eq!(activity.update_reading_progress(progress(60.0)).unwrap().invalidated_entries, 0);

    performance
        .story_report(env.story_id, MetricsWindow::SevenDays)
        .expect("report");
    let completed = activity.update_reading_progress(progress(100.0)).unwrap();
    assert!(completed.invalidated_entries >= 1);

    let report = performance
        .story_report(env.story_id, MetricsWindow::SevenDays)
        .expect("report");
    assert_eq!(report.completion_rate, 100.0);
    assert_eq!(activity.update_reading_progress(progress(100.0)).unwrap().invalidated_entries, 0);
}

#[test]
fn zero_ttl_always_recomputes() {
    let settings = ScoringSettings {
        cache_ttl_seconds: 0,
        aggregate_cache_ttl_seconds: 0,
        ..ScoringSettings::default()
    };
    let env = setup(settings, CacheBackend::InMemory);
    let performance = env.state.performance();

    view(&env, env.story_id);
    assert_eq!(
        performance
            .story_report(env.story_id, MetricsWindow::AllTime)
            .expect("report")
            .view_count,
        1
    );
    view(&env, env.story_id);
    assert_eq!(
        performance
            .story_report(env.story_id, MetricsWindow::AllTime)
            .expect("report")
            .view_count,
        2
    );
}

#[test]
fn changing_trending_settings_clears_cache() {
    let env = setup(ScoringSettings::default(), CacheBackend::InMemory);
    let performance = env.state.performance();
    let cache = env.state.cache();

    performance
        .story_report(env.story_id, MetricsWindow::ThirtyDays)
        .expect("report");
    let key = CacheKey::entity(EntityKind::Story, env.story_id, MetricsWindow::ThirtyDays);
    assert!(cache.get(&key).expect("cache get").is_some());

    env.state
        .settings()
        .update(SettingsUpdateInput {
            trending_half_life_days: Some(1.0),
            ..Default::default()
        })
        .expect("update settings");
    assert!(cache.get(&key).expect("cache get").is_none());
}

#[test]
fn sqlite_cache_survives_a_restart() {
    let env = setup(ScoringSettings::default(), CacheBackend::Sqlite);
    let report = env
        .state
        .performance()
        .story_report(env.story_id, MetricsWindow::NinetyDays)
        .expect("report");

    let restarted = AppState::with_settings(
        env.state.db(),
        ScoringSettings::default(),
        CacheBackend::Sqlite,
    )
    .expect("restart state");
    let cached = restarted
        .performance()
        .story_report(env.story_id, MetricsWindow::NinetyDays)
        .expect("cached report");
    assert_eq!(cached.computed_at, report.computed_at);
    assert_eq!(cached.performance, report.performance);

    let key = CacheKey::entity(EntityKind::Story, env.story_id, MetricsWindow::NinetyDays);
    let hits = SqliteScoreCache::new(env.state.db())
        .hit_count(&key)
        .expect("hit count");
    assert_eq!(hits, Some(1));

    rate(&env, env.story_id, env.reader_id, 2);
    assert!(restarted.cache().get(&key).expect("cache get").is_none());
}
