//! Weekly and friend activity endpoints

use axum::{extract::State, routing::get, Json, Router};
use ptrack_common::activity::{FriendActivity, WeeklyActivity};

use super::auth::CurrentUser;
use crate::{ApiResult, AppState};

/// GET /weekly-activity
///
/// The caller's current-week hours bucketed by (date, category).
pub async fn weekly_activity(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<WeeklyActivity>>> {
    Ok(Json(state.storage.get_weekly_activity(user.id()).await?))
}

/// GET /friend-activities
pub async fn friend_activities(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<FriendActivity>>> {
    let activities = state
        .storage
        .get_friend_activities(user.id(), state.settings.weekly_target_hours)
        .await?;
    Ok(Json(activities))
}

/// Build activity routes
pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/weekly-activity", get(weekly_activity))
        .route("/friend-activities", get(friend_activities))
}
