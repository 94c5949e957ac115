use chrono::NaiveDate;

use crate::models::member::{Achievement, ReadingStreak, ReadingSummary, ReadingTotals};
use crate::services::scoring_engine::calculate_completion_rate;

pub const BOOKWORM_COMPLETIONS: u64 = 10;
pub const WORD_SMITH_WORDS: u64 = 100_000;
pub const WEEK_STREAK_DAYS: u32 = 7;
pub const MONTH_STREAK_DAYS: u32 = 30;
pub const CRITIC_RATINGS: u64 = 10;

/// Current and longest runs of consecutive reading days.
///
/// The current streak stays alive while the latest reading day is `today` or
/// the day before; otherwise it is zero.
pub fn calculate_reading_streak(days: &[NaiveDate], today: NaiveDate) -> ReadingStreak {
    let mut days: Vec<NaiveDate> = days.iter().copied().filter(|day| *day <= today).collect();
    days.sort_unstable();
    days.dedup();

    let Some(&latest) = days.last() else {
        return ReadingStreak::default();
    };

    let mut longest = 1u32;
    let mut run = 1u32;
    for pair in days.windows(2) {
        if (pair[1] - pair[0]).num_days() == 1 {
            run += 1;
        } else {
            run = 1;
        }
        longest = longest.max(run);
    }

    let current = if (today - latest).num_days() <= 1 {
        // `run` ends at the latest day after the loop
        run
    } else {
        0
    };

    ReadingStreak {
        current_days: current,
        longest_days: longest,
    }
}

/// Words covered by a reader at `progress` percent through a story.
pub fn words_read(word_count: u64, progress: f64) -> u64 {
    if !progress.is_finite() {
        return 0;
    }
    let fraction = progress.clamp(0.0, 100.0) / 100.0;
    (word_count as f64 * fraction).round() as u64
}

pub fn evaluate_achievements(totals: &ReadingTotals, streak: &ReadingStreak) -> Vec<Achievement> {
    let mut unlocked = Vec::new();
    if totals.stories_completed >= 1 {
        unlocked.push(Achievement::FirstStoryCompleted);
    }
    if totals.stories_completed >= BOOKWORM_COMPLETIONS {
        unlocked.push(Achievement::Bookworm);
    }
    if totals.words_read >= WORD_SMITH_WORDS {
        unlocked.push(Achievement::WordSmith);
    }
    if streak.longest_days >= WEEK_STREAK_DAYS {
        unlocked.push(Achievement::WeekStreak);
    }
    if streak.longest_days >= MONTH_STREAK_DAYS {
        unlocked.push(Achievement::MonthStreak);
    }
    if totals.ratings_given >= CRITIC_RATINGS {
        unlocked.push(Achievement::Critic);
    }
    unlocked
}

pub fn summarize(totals: ReadingTotals, streak: ReadingStreak) -> ReadingSummary {
    ReadingSummary {
        words_read: totals.words_read,
        stories_started: totals.stories_started,
        stories_completed: totals.stories_completed,
        ratings_given: totals.ratings_given,
        completion_rate: calculate_completion_rate(totals.stories_started, totals.stories_completed),
        achievements: evaluate_achievements(&totals, &streak),
        streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 20).unwrap() + Duration::days(offset)
    }

    #[test]
    fn no_days_means_no_streak() {
        assert_eq!(calculate_reading_streak(&[], day(0)), ReadingStreak::default());
    }

    #[test]
    fn streak_ending_yesterday_is_still_current() {
        let days = [day(-3), day(-2), day(-1)];
        let streak = calculate_reading_streak(&days, day(0));
        assert_eq!(streak.current_days, 3);
        assert_eq!(streak.longest_days, 3);
    }

    #[test]
    fn gap_before_today_breaks_current_streak() {
        let days = [day(-10), day(-9), day(-8), day(-7), day(-3)];
        let streak = calculate_reading_streak(&days, day(0));
        assert_eq!(streak.current_days, 0);
        assert_eq!(streak.longest_days, 4);
    }

    #[test]
    fn unordered_and_duplicate_days_are_normalized() {
        let days = [day(0), day(-1), day(0), day(-5), day(-2)];
        let streak = calculate_reading_streak(&days, day(0));
        assert_eq!(streak.current_days, 3);
        assert_eq!(streak.longest_days, 3);
    }

    #[test]
    fn future_days_are_ignored() {
        let days = [day(-1), day(2)];
        let streak = calculate_reading_streak(&days, day(0));
        assert_eq!(streak.current_days, 1);
        assert_eq!(streak.longest_days, 1);
    }

    #[test]
    fn words_read_scales_with_progress() {
        assert_eq!(words_read(2_000, 50.0), 1_000);
        assert_eq!(words_read(2_000, 150.0), 2_000);
        assert_eq!(words_read(2_000, -5.0), 0);
        assert_eq!(words_read(2_000, f64::NAN), 0);
        assert_eq!(words_read(3, 50.0), 2);
    }

    #[test]
    fn achievements_unlock_at_thresholds() {
        let totals = ReadingTotals {
            words_read: 100_000,
            stories_started: 12,
            stories_completed: 10,
            ratings_given: 9,
        };
        let streak = ReadingStreak {
            current_days: 2,
            longest_days: 7,
        };
        assert_eq!(
            evaluate_achievements(&totals, &streak),
            vec![
                Achievement::FirstStoryCompleted,
                Achievement::Bookworm,
                Achievement::WordSmith,
                Achievement::WeekStreak,
            ]
        );
    }

    #[test]
    fn summary_carries_completion_rate() {
        let totals = ReadingTotals {
            words_read: 500,
            stories_started: 3,
            stories_completed: 1,
            ratings_given: 0,
        };
        let summary = summarize(totals, ReadingStreak::default());
        assert_eq!(summary.completion_rate, 33.33);
        assert_eq!(summary.achievements, vec![Achievement::FirstStoryCompleted]);
    }
}
