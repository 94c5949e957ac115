use chrono::{Duration, Utc};
use storyhub_analytics_lib::commands::activity::{
    activity_delete_rating, activity_submit_rating, activity_update_progress, members_create,
    stories_create, stories_update,
};
use storyhub_analytics_lib::commands::analytics::{analytics_story_report, analytics_top_stories};
use storyhub_analytics_lib::commands::cache::cache_invalidate_entity;
use storyhub_analytics_lib::commands::settings::{settings_get, settings_update};
use storyhub_analytics_lib::commands::{AppState, CommandError};
use storyhub_analytics_lib::db::DbPool;
use storyhub_analytics_lib::error::AppError;
use storyhub_analytics_lib::models::activity::{
    MemberCreateInput, RatingInput, ReadingProgressInput, StoryCreateInput, StoryStatus,
    StoryUpdateInput,
};
use storyhub_analytics_lib::models::metrics::MetricsWindow;
use storyhub_analytics_lib::models::performance::AnalyticsQueryParams;
use storyhub_analytics_lib::models::settings::{ScoringSettings, SettingsUpdateInput};
use storyhub_analytics_lib::{bootstrap, BootstrapOptions};
use tempfile::{tempdir, TempDir};

struct Fixture {
    state: AppState,
    story_id: i64,
    member_id: i64,
    _dir: TempDir,
}

async fn fixture() -> Fixture {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("errors.sqlite")).expect("db pool");
    let state = AppState::new(pool).expect("app state");

    let member = members_create(
        &state,
        MemberCreateInput {
            display_name: "Rowan".into(),
            email: "rowan@example.com".into(),
            joined_at: None,
        },
    )
    .await
    .expect("create member");
    let story = stories_create(
        &state,
        StoryCreateInput {
            title: "Lanterns".into(),
            author_id: Some(member.id),
            word_count: 800,
            status: Some(StoryStatus::Published),
            published_at: None,
        },
    )
    .await
    .expect("create story");

    Fixture {
        state,
        story_id: story.record.id,
        member_id: member.id,
        _dir: dir,
    }
}

fn rating(fx: &Fixture, value: u8) -> RatingInput {
    RatingInput {
        story_id: fx.story_id,
        member_id: fx.member_id,
        rating: value,
        occurred_at: None,
    }
}

#[tokio::test]
async fn out_of_range_rating_is_a_validation_error() {
    let fx = fixture().await;
    for value in [0, 6] {
        let err = activity_submit_rating(&fx.state, rating(&fx, value))
            .await
            .expect_err("rating out of range");
        assert_eq!(err.code, "VALIDATION_ERROR");
    }
    assert!(activity_submit_rating(&fx.state, rating(&fx, 5)).await.is_ok());
}

#[tokio::test]
async fn progress_outside_bounds_carries_field_details() {
    let fx = fixture().await;
    for value in [-1.0, 100.5, f64::NAN] {
        let err = activity_update_progress(
            &fx.state,
            ReadingProgressInput {
                story_id: fx.story_id,
                member_id: fx.member_id,
                reading_progress: value,
                occurred_at: None,
            },
        )
        .await
        .expect_err("invalid progress");
        assert_eq!(err.code, "VALIDATION_ERROR");
        let details = err.details.expect("details");
        assert_eq!(details["field"], "readingProgress");
    }
}

#[tokio::test]
async fn future_timestamps_are_rejected() {
    let fx = fixture().await;
    let err = activity_submit_rating(
        &fx.state,
        RatingInput {
            occurred_at: Some(Utc::now() + Duration::hours(2)),
            ..rating(&fx, 4)
        },
    )
    .await
    .expect_err("future rating");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn future_publication_date_is_rejected() {
    let fx = fixture().await;
    let err = stories_create(
        &fx.state,
        StoryCreateInput {
            title: "Tomorrow's Tide".into(),
            author_id: Some(fx.member_id),
            word_count: 500,
            status: Some(StoryStatus::Published),
            published_at: Some("2999-01-01T00:00:00Z".into()),
        },
    )
    .await
    .expect_err("future publication");
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.details.expect("details")["field"], "publishedAt");

    let past = (Utc::now() - Duration::days(3)).to_rfc3339();
    let story = stories_create(
        &fx.state,
        StoryCreateInput {
            title: "Yesterday's Tide".into(),
            author_id: Some(fx.member_id),
            word_count: 500,
            status: Some(StoryStatus::Published),
            published_at: Some(past),
        },
    )
    .await
    .expect("past publication");
    assert!(story.record.published_at.is_some());
}

#[tokio::test]
async fn oversized_word_count_is_a_validation_error() {
    let fx = fixture().await;
    let err = stories_create(
        &fx.state,
        StoryCreateInput {
            title: "Endless".into(),
            author_id: Some(fx.member_id),
            word_count: u64::MAX,
            status: None,
            published_at: None,
        },
    )
    .await
    .expect_err("word count overflow on create");
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.details.expect("details")["field"], "wordCount");

    let err = stories_update(
        &fx.state,
        fx.story_id,
        StoryUpdateInput {
            title: None,
            word_count: Some(i64::MAX as u64 + 1),
        },
    )
    .await
    .expect_err("word count overflow on update");
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert_eq!(err.details.expect("details")["field"], "wordCount");

    let stored: i64 = fx
        .state
        .db()
        .with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT word_count FROM stories WHERE id = ?1",
                [fx.story_id],
                |row| row.get(0),
            )?)
        })
        .expect("stored word count");
    assert_eq!(stored, 800);
}

#[tokio::test]
async fn missing_entities_map_to_not_found() {
    let fx = fixture().await;

    let err = analytics_story_report(&fx.state, fx.story_id + 50, None)
        .await
        .expect_err("missing story");
    assert_eq!(err.code, "NOT_FOUND");
    assert_eq!(err.message, "requested resource does not exist");

    let err = activity_delete_rating(&fx.state, fx.story_id, fx.member_id)
        .await
        .expect_err("no rating to delete");
    assert_eq!(err.code, "NOT_FOUND");

    let err = activity_submit_rating(
        &fx.state,
        RatingInput {
            member_id: fx.member_id + 50,
            ..rating(&fx, 3)
        },
    )
    .await
    .expect_err("missing member");
    assert_eq!(err.code, "NOT_FOUND");
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let fx = fixture().await;
    let err = members_create(
        &fx.state,
        MemberCreateInput {
            display_name: "Rowan Again".into(),
            email: "ROWAN@example.com".into(),
            joined_at: None,
        },
    )
    .await
    .expect_err("duplicate email");
    assert_eq!(err.code, "CONFLICT");
}

#[tokio::test]
async fn ranking_limit_is_bounded() {
    let fx = fixture().await;
    for limit in [0, 101] {
        let err = analytics_top_stories(
            &fx.state,
            Some(AnalyticsQueryParams {
                window: Some(MetricsWindow::SevenDays),
                limit: Some(limit),
            }),
        )
        .await
        .expect_err("limit out of range");
        assert_eq!(err.code, "VALIDATION_ERROR");
        assert_eq!(err.details.expect("details")["field"], "limit");
    }

    let defaulted = analytics_top_stories(&fx.state, None).await.expect("default limit");
    assert_eq!(defaulted.len(), 1);
}

#[test]
fn unknown_window_is_rejected() {
    let parsed: Result<AnalyticsQueryParams, _> =
        serde_json::from_value(serde_json::json!({ "window": "14d" }));
    assert!(parsed.is_err());

    let err: CommandError = "14d".parse::<MetricsWindow>().unwrap_err().into();
    assert_eq!(err.code, "VALIDATION_ERROR");
    assert!(err.message.contains("14d"));
}

#[tokio::test]
async fn invalid_settings_leave_current_values() {
    let fx = fixture().await;
    let err = settings_update(
        &fx.state,
        SettingsUpdateInput {
            trending_window_days: Some(0),
            ..Default::default()
        },
    )
    .await
    .expect_err("zero window");
    assert_eq!(err.code, "VALIDATION_ERROR");

    let current = settings_get(&fx.state).await.expect("settings");
    assert_eq!(current, ScoringSettings::default());
}

#[tokio::test]
async fn unknown_entity_kind_is_a_validation_error() {
    let fx = fixture().await;
    let err = cache_invalidate_entity(&fx.state, "chapter".into(), fx.story_id)
        .await
        .expect_err("bad kind");
    assert_eq!(err.code, "VALIDATION_ERROR");
}

#[test]
fn command_error_serializes_without_empty_details() {
    let json = serde_json::to_value(CommandError::from(AppError::not_found())).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "code": "NOT_FOUND",
            "message": "requested resource does not exist",
        })
    );

    let json = serde_json::to_value(CommandError::from(AppError::validation_with_details(
        "bad input",
        serde_json::json!({ "field": "title" }),
    )))
    .unwrap();
    assert_eq!(json["details"]["field"], "title");
}

#[test]
fn malformed_settings_file_fails_bootstrap() {
    let dir = tempdir().expect("temp dir");
    let settings_path = dir.path().join("scoring.yaml");
    std::fs::write(&settings_path, "cacheTtlSeconds: [broken").expect("write settings");

    let mut options = BootstrapOptions::new(dir.path().join("data"));
    options.settings_file = Some(settings_path);
    options.init_logging = false;

    let err = bootstrap(&options).err().expect("bootstrap should fail");
    assert_eq!(CommandError::from(err).code, "SETTINGS_FILE");
}

#[test]
fn out_of_range_settings_file_fails_bootstrap() {
    let dir = tempdir().expect("temp dir");
    let settings_path = dir.path().join("scoring.yaml");
    std::fs::write(&settings_path, "trendingWindowDays: 0\n").expect("write settings");

    let mut options = BootstrapOptions::new(dir.path().join("data"));
    options.settings_file = Some(settings_path.clone());
    options.init_logging = false;

    let err = bootstrap(&options).err().expect("bootstrap should fail");
    assert_eq!(CommandError::from(err).code, "VALIDATION_ERROR");

    std::fs::write(&settings_path, "trendingWindowDays: 10\ncacheTtlSeconds: 60\n")
        .expect("rewrite settings");
    let state = bootstrap(&options).expect("bootstrap with valid seed");
    let settings = state.settings().get().expect("settings");
    assert_eq!(settings.trending_window_days, 10);
    assert_eq!(settings.cache_ttl_seconds, 60);
}
