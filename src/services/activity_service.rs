use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::db::repositories::interaction_repository::InteractionRepository;
use crate::db::repositories::member_repository::MemberRepository;
use crate::db::repositories::rating_repository::RatingRepository;
use crate::db::repositories::reading_history_repository::ReadingHistoryRepository;
use crate::db::repositories::story_repository::StoryRepository;
use crate::db::{format_timestamp, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::activity::{
    ActivityOutcome, InteractionInput, MemberCreateInput, MemberRecord, RatingInput,
    RatingRecord, ReadingHistoryRecord, ReadingProgressInput, StoryCreateInput, StoryRecord,
    StoryStatus, StoryUpdateInput, ViewInput,
};
use crate::services::invalidation::{EntityMutationListener, MutationEvent};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
const MAX_TITLE_LENGTH: usize = 200;

/// Write paths for reader activity. Each write that changes a score calls the
/// mutation listener after its transaction has committed.
pub struct ActivityService {
    db: DbPool,
    listener: Arc<dyn EntityMutationListener>,
}

impl ActivityService {
    pub fn new(db: DbPool, listener: Arc<dyn EntityMutationListener>) -> Self {
        Self { db, listener }
    }

    pub fn create_member(&self, input: MemberCreateInput) -> AppResult<MemberRecord> {
        let display_name = input.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AppError::validation("displayName must not be empty"));
        }
        let email = input.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AppError::validation_with_details(
                "email is not valid",
                serde_json::json!({ "field": "email" }),
            ));
        }
        let joined_at = resolve_time(
            input.joined_at.as_deref().map(parse_input_time).transpose()?,
            "joinedAt",
        )?;

        let member = self
            .db
            .with_connection(|conn| MemberRepository::insert(conn, &display_name, &email, &joined_at))?;
        info!(target: "app::activity", member_id = member.id, "member created");
        Ok(member)
    }

    pub fn create_story(&self, input: StoryCreateInput) -> AppResult<ActivityOutcome<StoryRecord>> {
        let title = validate_title(&input.title)?;
        let status = input.status.unwrap_or(StoryStatus::Draft);
        let now = format_timestamp(Utc::now());
        let word_count = validate_word_count(input.word_count)?;
        let published_at = match (status, input.published_at.as_deref()) {
            (_, Some(value)) => Some(resolve_time(Some(parse_input_time(value)?), "publishedAt")?),
            (StoryStatus::Published, None) => Some(now.clone()),
            (_, None) => None,
        };

        let story = self.db.with_transaction(|tx| {
            if let Some(author_id) = input.author_id {
                ensure_member_exists(tx, author_id)?;
            }
            StoryRepository::insert(
                tx,
                &title,
                input.author_id,
                word_count,
                status,
                published_at.as_deref(),
                &now,
            )
        })?;
        info!(target: "app::activity", story_id = story.id, status = status.as_str(), "story created");

        let invalidated_entries = if status == StoryStatus::Published {
            self.notify(MutationEvent::StoryPublished {
                story_id: story.id,
                author_id: story.author_id,
            })
        } else {
            0
        };

        Ok(ActivityOutcome {
            record: story,
            invalidated_entries,
        })
    }

    pub fn publish_story(&self, story_id: i64) -> AppResult<ActivityOutcome<StoryRecord>> {
        let now = format_timestamp(Utc::now());
        let story = self
            .db
            .with_connection(|conn| StoryRepository::publish(conn, story_id, &now))?;
        info!(target: "app::activity", story_id, "story published");

        let invalidated_entries = self.notify(MutationEvent::StoryPublished {
            story_id,
            author_id: story.author_id,
        });
        Ok(ActivityOutcome {
            record: story,
            invalidated_entries,
        })
    }

    pub fn update_story(
        &self,
        story_id: i64,
        input: StoryUpdateInput,
    ) -> AppResult<ActivityOutcome<StoryRecord>> {
        let title = input.title.as_deref().map(validate_title).transpose()?;
        let word_count = input.word_count.map(validate_word_count).transpose()?;
        let now = format_timestamp(Utc::now());
        let story = self.db.with_connection(|conn| {
            StoryRepository::update_details(conn, story_id, title.as_deref(), word_count, &now)
        })?;

        let invalidated_entries = self.notify(MutationEvent::StoryUpdated {
            story_id,
            author_id: story.author_id,
        });
        Ok(ActivityOutcome {
            record: story,
            invalidated_entries,
        })
    }

    /// Views are high-volume and never invalidate; cached reports catch up on expiry.
    pub fn record_view(&self, input: ViewInput) -> AppResult<ActivityOutcome<i64>> {
        let viewed_at = resolve_time(input.occurred_at, "occurredAt")?;
        let view_id = self.db.with_transaction(|tx| {
            ensure_story_exists(tx, input.story_id)?;
            if let Some(member_id) = input.member_id {
                ensure_member_exists(tx, member_id)?;
            }
            InteractionRepository::record_view(tx, input.story_id, input.member_id, &viewed_at)
        })?;

        Ok(ActivityOutcome {
            record: view_id,
            invalidated_entries: 0,
        })
    }

    pub fn submit_rating(&self, input: RatingInput) -> AppResult<ActivityOutcome<RatingRecord>> {
        if !(MIN_RATING..=MAX_RATING).contains(&input.rating) {
            return Err(AppError::validation_with_details(
                format!("rating must be between {MIN_RATING} and {MAX_RATING}"),
                serde_json::json!({ "field": "rating", "value": input.rating }),
            ));
        }
        let rated_at = resolve_time(input.occurred_at, "occurredAt")?;

        let (rating, created) = self.db.with_transaction(|tx| {
            ensure_story_exists(tx, input.story_id)?;
            ensure_member_exists(tx, input.member_id)?;
            RatingRepository::upsert(tx, input.story_id, input.member_id, input.rating, &rated_at)
        })?;

        let event = if created {
            MutationEvent::RatingCreated {
                story_id: input.story_id,
                member_id: input.member_id,
            }
        } else {
            MutationEvent::RatingUpdated {
                story_id: input.story_id,
                member_id: input.member_id,
            }
        };
        info!(
            target: "app::activity",
            story_id = input.story_id,
            member_id = input.member_id,
            rating = input.rating,
            created,
            "rating stored"
        );

        Ok(ActivityOutcome {
            record: rating,
            invalidated_entries: self.notify(event),
        })
    }

    pub fn delete_rating(&self, story_id: i64, member_id: i64) -> AppResult<ActivityOutcome<()>> {
        let deleted = self
            .db
            .with_connection(|conn| RatingRepository::delete(conn, story_id, member_id))?;
        if !deleted {
            return Err(AppError::not_found());
        }
        info!(target: "app::activity", story_id, member_id, "rating deleted");

        Ok(ActivityOutcome {
            record: (),
            invalidated_entries: self.notify(MutationEvent::RatingDeleted {
                story_id,
                member_id,
            }),
        })
    }

    /// Stores reading progress. Only the first transition to completion
    /// invalidates cached scores.
    pub fn update_reading_progress(
        &self,
        input: ReadingProgressInput,
    ) -> AppResult<ActivityOutcome<ReadingHistoryRecord>> {
        let progress = input.reading_progress;
        if !progress.is_finite() || !(0.0..=100.0).contains(&progress) {
            return Err(AppError::validation_with_details(
                "readingProgress must be between 0 and 100",
                serde_json::json!({ "field": "readingProgress", "value": progress }),
            ));
        }
        let read_at = resolve_time(input.occurred_at, "occurredAt")?;

        let (before, after) = self.db.with_transaction(|tx| {
            ensure_story_exists(tx, input.story_id)?;
            ensure_member_exists(tx, input.member_id)?;
            let before = ReadingHistoryRepository::find(tx, input.story_id, input.member_id)?;
            let after = ReadingHistoryRepository::upsert_progress(
                tx,
                input.story_id,
                input.member_id,
                progress,
                &read_at,
            )?;
            Ok((before, after))
        })?;

        let newly_completed =
            after.is_completed() && !before.as_ref().is_some_and(ReadingHistoryRecord::is_completed);

        let invalidated_entries = if newly_completed {
            info!(
                target: "app::activity",
                story_id = input.story_id,
                member_id = input.member_id,
                "story completed"
            );
            self.notify(MutationEvent::ReadingCompleted {
                story_id: input.story_id,
                member_id: input.member_id,
            })
        } else {
            0
        };

        Ok(ActivityOutcome {
            record: after,
            invalidated_entries,
        })
    }

    /// Bookmarks and shares feed engagement only; like views they do not invalidate.
    pub fn record_interaction(&self, input: InteractionInput) -> AppResult<ActivityOutcome<i64>> {
        let created_at = resolve_time(input.occurred_at, "occurredAt")?;
        let interaction_id = self.db.with_transaction(|tx| {
            ensure_story_exists(tx, input.story_id)?;
            if let Some(member_id) = input.member_id {
                ensure_member_exists(tx, member_id)?;
            }
            InteractionRepository::record_interaction(
                tx,
                input.story_id,
                input.member_id,
                input.kind,
                &created_at,
            )
        })?;

        Ok(ActivityOutcome {
            record: interaction_id,
            invalidated_entries: 0,
        })
    }

    /// The write has already committed, so a failed invalidation is logged and
    /// left to the cache TTL.
    fn notify(&self, event: MutationEvent) -> usize {
        match self.listener.apply(&event) {
            Ok(removed) => removed,
            Err(err) => {
                error!(
                    target: "app::activity",
                    event = event.name(),
                    error = %err,
                    "cache invalidation failed after write"
                );
                0
            }
        }
    }
}

fn validate_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("title must not be empty"));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(AppError::validation(format!(
            "title must be at most {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_word_count(word_count: u64) -> AppResult<i64> {
    i64::try_from(word_count).map_err(|_| {
        AppError::validation_with_details(
            "wordCount is too large",
            serde_json::json!({ "field": "wordCount", "value": word_count }),
        )
    })
}

fn parse_input_time(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| {
            AppError::validation_with_details(
                format!("invalid timestamp: {value}"),
                serde_json::json!({ "reason": err.to_string() }),
            )
        })
}

/// Stamps live writes with the current time and rejects backfills from the future.
fn resolve_time(occurred_at: Option<DateTime<Utc>>, field: &str) -> AppResult<String> {
    let now = Utc::now();
    match occurred_at {
        Some(at) if at > now => Err(AppError::validation_with_details(
            format!("{field} must not be in the future"),
            serde_json::json!({ "field": field }),
        )),
        Some(at) => Ok(format_timestamp(at)),
        None => Ok(format_timestamp(now)),
    }
}

fn ensure_story_exists(conn: &rusqlite::Connection, story_id: i64) -> AppResult<()> {
    StoryRepository::find_by_id(conn, story_id)?
        .map(|_| ())
        .ok_or_else(AppError::not_found)
}

fn ensure_member_exists(conn: &rusqlite::Connection, member_id: i64) -> AppResult<()> {
    if MemberRepository::exists(conn, member_id)? {
        Ok(())
    } else {
        Err(AppError::not_found())
    }
}
