use crate::models::member::MemberDashboard;
use crate::models::performance::{
    AnalyticsQueryParams, PerformanceReport, PlatformOverview, RankedStory,
};

use super::{run_blocking, AppState, CommandResult};

pub async fn analytics_story_report(
    state: &AppState,
    story_id: i64,
    params: Option<AnalyticsQueryParams>,
) -> CommandResult<PerformanceReport> {
    let app_state = state.clone();
    let window = params.unwrap_or_default().window();
    run_blocking(move || app_state.performance().story_report(story_id, window)).await
}

pub async fn analytics_member_dashboard(
    state: &AppState,
    member_id: i64,
    params: Option<AnalyticsQueryParams>,
) -> CommandResult<MemberDashboard> {
    let app_state = state.clone();
    let window = params.unwrap_or_default().window();
    run_blocking(move || app_state.performance().member_dashboard(member_id, window)).await
}

pub async fn analytics_top_stories(
    state: &AppState,
    params: Option<AnalyticsQueryParams>,
) -> CommandResult<Vec<RankedStory>> {
    let app_state = state.clone();
    let params = params.unwrap_or_default();
    run_blocking(move || {
        app_state
            .performance()
            .top_performing_stories(params.window(), params.limit())
    })
    .await
}

pub async fn analytics_trending_stories(
    state: &AppState,
    params: Option<AnalyticsQueryParams>,
) -> CommandResult<Vec<RankedStory>> {
    let app_state = state.clone();
    let params = params.unwrap_or_default();
    run_blocking(move || {
        app_state
            .performance()
            .trending_stories(params.window(), params.limit())
    })
    .await
}

pub async fn analytics_platform_overview(
    state: &AppState,
    params: Option<AnalyticsQueryParams>,
) -> CommandResult<PlatformOverview> {
    let app_state = state.clone();
    let window = params.unwrap_or_default().window();
    run_blocking(move || app_state.performance().platform_overview(window)).await
}
