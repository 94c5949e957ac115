use crate::models::activity::{
    ActivityOutcome, InteractionInput, MemberCreateInput, MemberRecord, RatingInput,
    RatingRecord, ReadingHistoryRecord, ReadingProgressInput, StoryCreateInput, StoryRecord,
    StoryUpdateInput, ViewInput,
};

use super::{run_blocking, AppState, CommandResult};

pub async fn members_create(
    state: &AppState,
    payload: MemberCreateInput,
) -> CommandResult<MemberRecord> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().create_member(payload)).await
}

pub async fn stories_create(
    state: &AppState,
    payload: StoryCreateInput,
) -> CommandResult<ActivityOutcome<StoryRecord>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().create_story(payload)).await
}

pub async fn stories_publish(
    state: &AppState,
    story_id: i64,
) -> CommandResult<ActivityOutcome<StoryRecord>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().publish_story(story_id)).await
}

pub async fn stories_update(
    state: &AppState,
    story_id: i64,
    payload: StoryUpdateInput,
) -> CommandResult<ActivityOutcome<StoryRecord>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().update_story(story_id, payload)).await
}

pub async fn activity_record_view(
    state: &AppState,
    payload: ViewInput,
) -> CommandResult<ActivityOutcome<i64>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().record_view(payload)).await
}

pub async fn activity_submit_rating(
    state: &AppState,
    payload: RatingInput,
) -> CommandResult<ActivityOutcome<RatingRecord>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().submit_rating(payload)).await
}

pub async fn activity_delete_rating(
    state: &AppState,
    story_id: i64,
    member_id: i64,
) -> CommandResult<ActivityOutcome<()>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().delete_rating(story_id, member_id)).await
}

pub async fn activity_update_progress(
    state: &AppState,
    payload: ReadingProgressInput,
) -> CommandResult<ActivityOutcome<ReadingHistoryRecord>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().update_reading_progress(payload)).await
}

pub async fn activity_record_interaction(
    state: &AppState,
    payload: InteractionInput,
) -> CommandResult<ActivityOutcome<i64>> {
    let app_state = state.clone();
    run_blocking(move || app_state.activity().record_interaction(payload)).await
}
