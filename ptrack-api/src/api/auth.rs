//! Caller identity
//!
//! The caller is named by the `X-User-Id` header and must resolve to a stored
//! user. Session handling is out of scope; this extractor is where it plugs in.

use axum::{extract::FromRequestParts, http::request::Parts};
use ptrack_common::models::User;

use crate::{ApiError, AppState};

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| ApiError::Unauthorized("Malformed user id".to_string()))?;

        match state.storage.get_user(user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::debug!(user_id, "Rejecting unknown caller");
                Err(ApiError::Unauthorized("Not authenticated".to_string()))
            }
        }
    }
}
