use chrono::{Duration, Utc};
use storyhub_analytics_lib::commands::AppState;
use storyhub_analytics_lib::db::DbPool;
use storyhub_analytics_lib::models::activity::{
    MemberCreateInput, RatingInput, ReadingProgressInput, StoryCreateInput, StoryStatus,
};
use storyhub_analytics_lib::models::member::Achievement;
use storyhub_analytics_lib::models::metrics::MetricsWindow;
use tempfile::{tempdir, TempDir};

const WORDS_PER_STORY: u64 = 1_500;

struct Library {
    state: AppState,
    reader_id: i64,
    stories: Vec<i64>,
    _dir: TempDir,
}

fn library(story_count: usize) -> Library {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("members.sqlite")).expect("db pool");
    let state = AppState::new(pool).expect("app state");
    let activity = state.activity();

    let author_id = activity
        .create_member(MemberCreateInput {
            display_name: "Quill".into(),
            email: "quill@example.com".into(),
            joined_at: None,
        })
        .expect("create author")
        .id;
    let reader_id = activity
        .create_member(MemberCreateInput {
            display_name: "  Mira Okafor ".into(),
            email: "Mira@Example.com".into(),
            joined_at: Some((Utc::now() - Duration::days(60)).to_rfc3339()),
        })
        .expect("create reader")
        .id;

    let stories = (0..story_count)
        .map(|index| {
            activity
                .create_story(StoryCreateInput {
                    title: format!("Chapter {index}"),
                    author_id: Some(author_id),
                    word_count: WORDS_PER_STORY,
                    status: Some(StoryStatus::Published),
                    published_at: Some((Utc::now() - Duration::days(45)).to_rfc3339()),
                })
                .expect("create story")
                .record
                .id
        })
        .collect();

    Library {
        state,
        reader_id,
        stories,
        _dir: dir,
    }
}

fn read(lib: &Library, story_id: i64, progress: f64, days_ago: i64) {
    lib.state
        .activity()
        .update_reading_progress(ReadingProgressInput {
            story_id,
            member_id: lib.reader_id,
            reading_progress: progress,
            occurred_at: Some(Utc::now() - Duration::days(days_ago)),
        })
        .expect("update progress");
}

#[test]
fn backfilled_reading_days_form_a_current_streak() {
    let lib = library(4);
    for (days_ago, story_id) in [0, 1, 2].into_iter().zip(&lib.stories) {
        read(&lib, *story_id, 50.0, days_ago);
    }
    read(&lib, lib.stories[3], 20.0, 10);

    let dashboard = lib
        .state
        .performance()
        .member_dashboard(lib.reader_id, MetricsWindow::AllTime)
        .expect("dashboard");

    assert_eq!(dashboard.display_name, "Mira Okafor");
    assert_eq!(dashboard.reading.streak.current_days, 3);
    assert_eq!(dashboard.reading.streak.longest_days, 3);
    assert_eq!(dashboard.reading.stories_started, 4);
    assert_eq!(dashboard.reading.stories_completed, 0);
    assert_eq!(dashboard.reading.words_read, 3 * 750 + 300);
    assert!(dashboard.reading.achievements.is_empty());
}

#[test]
fn a_week_of_completions_unlocks_achievements() {
    let lib = library(7);
    for (days_ago, story_id) in (0..7).zip(&lib.stories) {
        read(&lib, *story_id, 100.0, days_ago);
    }
    for story_id in &lib.stories[..2] {
        lib.state
            .activity()
            .submit_rating(RatingInput {
                story_id: *story_id,
                member_id: lib.reader_id,
                rating: 4,
                occurred_at: None,
            })
            .expect("submit rating");
    }

    let dashboard = lib
        .state
        .performance()
        .member_dashboard(lib.reader_id, MetricsWindow::AllTime)
        .expect("dashboard");
    let reading = &dashboard.reading;

    assert_eq!(reading.stories_completed, 7);
    assert_eq!(reading.completion_rate, 100.0);
    assert_eq!(reading.words_read, 7 * WORDS_PER_STORY);
    assert_eq!(reading.ratings_given, 2);
    assert_eq!(reading.streak.current_days, 7);
    assert_eq!(
        reading.achievements,
        vec![Achievement::FirstStoryCompleted, Achievement::WeekStreak]
    );
    assert_eq!(dashboard.report.total_ratings, 2);
}

#[test]
fn window_limits_totals_but_not_the_streak() {
    let lib = library(3);
    read(&lib, lib.stories[0], 100.0, 20);
    read(&lib, lib.stories[1], 100.0, 19);
    read(&lib, lib.stories[2], 40.0, 1);

    let dashboard = lib
        .state
        .performance()
        .member_dashboard(lib.reader_id, MetricsWindow::SevenDays)
        .expect("dashboard");

    assert_eq!(dashboard.reading.stories_started, 1);
    assert_eq!(dashboard.reading.stories_completed, 0);
    assert_eq!(dashboard.reading.words_read, 600);
    assert_eq!(dashboard.reading.streak.current_days, 1);
    assert_eq!(dashboard.reading.streak.longest_days, 2);
}

#[test]
fn unknown_member_is_not_found() {
    let lib = library(0);
    let err = lib
        .state
        .performance()
        .member_dashboard(lib.reader_id + 100, MetricsWindow::AllTime)
        .expect_err("missing member");
    assert!(err.is_not_found());
}
