//! Suggestion endpoint

use axum::{extract::State, routing::get, Json, Router};

use super::auth::CurrentUser;
use crate::services::Suggestion;
use crate::AppState;

/// GET /suggestions
///
/// Always answers 200 with three suggestions; generator failures fall back
/// to the default set.
pub async fn get_suggestions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<Suggestion>> {
    Json(state.suggestions.generate(user.id()).await)
}

/// Build suggestion routes
pub fn suggestion_routes() -> Router<AppState> {
    Router::new().route("/suggestions", get(get_suggestions))
}
