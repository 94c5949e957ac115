use chrono::{Duration, Utc};
use storyhub_analytics_lib::commands::AppState;
use storyhub_analytics_lib::db::DbPool;
use storyhub_analytics_lib::models::activity::{
    MemberCreateInput, RatingInput, ReadingProgressInput, StoryCreateInput, StoryStatus, ViewInput,
};
use storyhub_analytics_lib::models::metrics::MetricsWindow;
use storyhub_analytics_lib::models::performance::{PerformanceBadge, PerformanceLevel};
use tempfile::tempdir;

struct Seeded {
    state: AppState,
    fresh_story: i64,
    old_story: i64,
    _dir: tempfile::TempDir,
}

fn member(state: &AppState, name: &str) -> i64 {
    state
        .activity()
        .create_member(MemberCreateInput {
            display_name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            joined_at: None,
        })
        .expect("create member")
        .id
}

fn published_story(state: &AppState, title: &str, author: i64, days_ago: i64) -> i64 {
    state
        .activity()
        .create_story(StoryCreateInput {
            title: title.into(),
            author_id: Some(author),
            word_count: 2_000,
            status: Some(StoryStatus::Published),
            published_at: Some((Utc::now() - Duration::days(days_ago)).to_rfc3339()),
        })
        .expect("create story")
        .record
        .id
}

fn view(state: &AppState, story_id: i64, times: usize) {
    for _ in 0..times {
        state
            .activity()
            .record_view(ViewInput {
                story_id,
                member_id: None,
                occurred_at: None,
            })
            .expect("record view");
    }
}

fn progress(state: &AppState, story_id: i64, member_id: i64, value: f64) {
    state
        .activity()
        .update_reading_progress(ReadingProgressInput {
            story_id,
            member_id,
            reading_progress: value,
            occurred_at: None,
        })
        .expect("update progress");
}

fn rate(state: &AppState, story_id: i64, member_id: i64, rating: u8) {
    state
        .activity()
        .submit_rating(RatingInput {
            story_id,
            member_id,
            rating,
            occurred_at: None,
        })
        .expect("submit rating");
}

fn seed() -> Seeded {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("flow.sqlite")).expect("db pool");
    let state = AppState::new(pool).expect("app state");

    let author = member(&state, "Author");
    let readers: Vec<i64> = ["Ana", "Ben", "Cy", "Dee"]
        .iter()
        .map(|name| member(&state, name))
        .collect();

    let fresh_story = published_story(&state, "Harbor Lights", author, 2);
    let old_story = published_story(&state, "Dust Roads", author, 40);

    view(&state, fresh_story, 20);
    for reader in &readers[..3] {
        progress(&state, fresh_story, *reader, 100.0);
    }
    progress(&state, fresh_story, readers[3], 5.0);
    rate(&state, fresh_story, readers[0], 5);
    rate(&state, fresh_story, readers[1], 4);

    view(&state, old_story, 2);
    progress(&state, old_story, readers[0], 30.0);

    Seeded {
        state,
        fresh_story,
        old_story,
        _dir: dir,
    }
}

#[test]
fn story_report_combines_all_components() {
    let seeded = seed();
    let report = seeded
        .state
        .performance()
        .story_report(seeded.fresh_story, MetricsWindow::ThirtyDays)
        .expect("story report");

    assert_eq!(report.view_count, 20);
    assert_eq!(report.total_ratings, 2);
    assert_eq!(report.average_rating, 4.5);
    assert_eq!(report.completion_rate, 75.0);
    assert_eq!(report.engagement_rate, 10.0);
    assert_eq!(report.bounce_rate, 5.0);
    assert_eq!(report.breakdown.views, 6.0);
    assert_eq!(report.breakdown.completion, 18.75);
    assert_eq!(report.breakdown.rating, 18.0);
    assert_eq!(report.breakdown.rating_popularity, 3.0);
    assert_eq!(report.performance.score, 56);
    assert_eq!(report.performance.level, PerformanceLevel::Average);
    assert_eq!(report.performance.badge, PerformanceBadge::ChartFlat);
    assert!(report.trending_score > 25.0 && report.trending_score <= 26.0);
}

#[test]
fn old_quiet_story_is_poor() {
    let seeded = seed();
    let report = seeded
        .state
        .performance()
        .story_report(seeded.old_story, MetricsWindow::ThirtyDays)
        .expect("story report");

    assert_eq!(report.performance.score, 9);
    assert_eq!(report.performance.level, PerformanceLevel::Poor);
    assert_eq!(report.performance.badge, PerformanceBadge::ChartDown);
    assert_eq!(report.completion_rate, 0.0);
}

#[test]
fn rankings_and_overview_cover_published_stories() {
    let seeded = seed();
    let performance = seeded.state.performance();

    let top = performance
        .top_performing_stories(MetricsWindow::ThirtyDays, 10)
        .expect("top stories");
    assert_eq!(
        top.iter().map(|entry| entry.story_id).collect::<Vec<_>>(),
        vec![seeded.fresh_story, seeded.old_story]
    );
    assert_eq!(top[0].title, "Harbor Lights");
    assert_eq!(top[0].rank, 1);
    assert_eq!(top[1].rank, 2);

    let trending = performance
        .trending_stories(MetricsWindow::SevenDays, 1)
        .expect("trending stories");
    assert_eq!(trending.len(), 1);
    assert_eq!(trending[0].story_id, seeded.fresh_story);

    let overview = performance
        .platform_overview(MetricsWindow::ThirtyDays)
        .expect("overview");
    assert_eq!(overview.story_count, 2);
    assert_eq!(overview.total_views, 22);
    assert_eq!(overview.average_score, 32.5);
    assert_eq!(overview.level_distribution.average, 1);
    assert_eq!(overview.level_distribution.poor, 1);
}

#[test]
fn drafts_are_left_out_of_rankings() {
    let seeded = seed();
    let author = member(&seeded.state, "Drafter");
    let draft = seeded
        .state
        .activity()
        .create_story(StoryCreateInput {
            title: "Unfinished".into(),
            author_id: Some(author),
            word_count: 300,
            status: None,
            published_at: None,
        })
        .expect("create draft")
        .record;
    assert_eq!(draft.status, StoryStatus::Draft);

    let top = seeded
        .state
        .performance()
        .top_performing_stories(MetricsWindow::AllTime, 10)
        .expect("top stories");
    assert!(top.iter().all(|entry| entry.story_id != draft.id));

    // Drafts still have a report of their own.
    let report = seeded
        .state
        .performance()
        .story_report(draft.id, MetricsWindow::AllTime)
        .expect("draft report");
    assert_eq!(report.view_count, 0);
}
