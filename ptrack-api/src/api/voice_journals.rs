//! Voice journal endpoints
//!
//! Upload persists the audio and the entry, responds 201, then hands the
//! entry id to the enrichment dispatcher. Every other route acts only on
//! entries owned by the caller: a missing id is 404, someone else's is 403.

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use ptrack_common::models::{NewVoiceJournal, Sentiment, VoiceJournal, VoiceJournalUpdate};
use serde_json::Value;
use tracing::{info, warn};

use super::auth::CurrentUser;
use crate::{ApiError, ApiResult, AppState};

/// Title used when the client sends none
pub const DEFAULT_TITLE: &str = "Voice Journal Entry";

/// Category used when the client sends none
pub const DEFAULT_CATEGORY: &str = "journal";

/// Fields collected from the upload form
#[derive(Debug, Default)]
struct UploadForm {
    audio: Option<(Option<String>, Vec<u8>)>,
    title: Option<String>,
    category: Option<String>,
    duration: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Multipart error: {}", err.body_text()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Seconds; blank means 0, anything other than a non-negative integer is rejected
fn parse_duration(raw: Option<String>) -> ApiResult<i64> {
    let Some(raw) = non_blank(raw) else {
        return Ok(0);
    };
    match raw.parse::<i64>() {
        Ok(seconds) if seconds >= 0 => Ok(seconds),
        _ => Err(ApiError::BadRequest(format!(
            "Duration must be a non-negative integer number of seconds, got '{}'",
            raw
        ))),
    }
}

async fn read_form(multipart: &mut Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("audio") => {
                let file_name = field.file_name().map(|n| n.to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.audio = Some((file_name, bytes.to_vec()));
            }
            Some("title") => form.title = Some(field.text().await.map_err(multipart_error)?),
            Some("category") => form.category = Some(field.text().await.map_err(multipart_error)?),
            Some("duration") => form.duration = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    Ok(form)
}

/// Fetch an entry the caller owns
async fn load_owned(state: &AppState, user: &CurrentUser, id: i64) -> ApiResult<VoiceJournal> {
    let journal = state
        .storage
        .get_voice_journal(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Voice journal {}", id)))?;

    if journal.user_id != user.id() {
        return Err(ApiError::Forbidden(format!(
            "Voice journal {} belongs to another user",
            id
        )));
    }
    Ok(journal)
}

/// POST /voice-journals
pub async fn upload_voice_journal(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<VoiceJournal>)> {
    let form = read_form(&mut multipart).await?;

    let (file_name, bytes) = form
        .audio
        .ok_or_else(|| ApiError::BadRequest("No audio file uploaded".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Audio file is empty".to_string()));
    }
    let duration = parse_duration(form.duration)?;

    state.audio.ensure_dir().await?;
    let stored = state
        .audio
        .persist(user.id(), file_name.as_deref(), &bytes)
        .await?;

    let new_journal = NewVoiceJournal {
        user_id: user.id(),
        title: non_blank(form.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        audio_url: stored.url.clone(),
        date: Utc::now(),
        duration,
        category: non_blank(form.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
    };

    let journal = match state.storage.create_voice_journal(new_journal).await {
        Ok(journal) => journal,
        Err(e) => {
            if let Err(cleanup) = state.audio.delete(&stored.url).await {
                warn!(file = %stored.file_name, error = %cleanup, "Failed to remove orphaned audio");
            }
            return Err(e.into());
        }
    };

    info!(
        entry_id = journal.id,
        user_id = journal.user_id,
        bytes = bytes.len(),
        "Voice journal created"
    );

    state.enrichment.dispatch(journal.id);

    Ok((StatusCode::CREATED, Json(journal)))
}

/// GET /voice-journals
pub async fn list_voice_journals(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<VoiceJournal>>> {
    Ok(Json(state.storage.list_voice_journals(user.id()).await?))
}

/// GET /voice-journals/:id
pub async fn get_voice_journal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<VoiceJournal>> {
    Ok(Json(load_owned(&state, &user, id).await?))
}

/// PUT /voice-journals/:id
pub async fn update_voice_journal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Result<Json<VoiceJournalUpdate>, JsonRejection>,
) -> ApiResult<Json<VoiceJournal>> {
    let Json(update) = body?;
    let current = load_owned(&state, &user, id).await?;
    update.validate()?;
    if update.is_empty() {
        return Ok(Json(current));
    }
    Ok(Json(state.storage.update_voice_journal(id, update).await?))
}

/// PUT /voice-journals/:id/sentiment
pub async fn update_sentiment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Result<Json<Sentiment>, JsonRejection>,
) -> ApiResult<Json<VoiceJournal>> {
    let Json(sentiment) = body?;
    load_owned(&state, &user, id).await?;
    sentiment.validate()?;
    Ok(Json(
        state
            .storage
            .update_voice_journal_sentiment(id, sentiment)
            .await?,
    ))
}

/// Body must be `{"tags": [string, ...]}`
fn parse_tags(body: &Value) -> ApiResult<Vec<String>> {
    let invalid = || ApiError::BadRequest("Tags must be an array of strings".to_string());

    body.get("tags")
        .and_then(Value::as_array)
        .ok_or_else(invalid)?
        .iter()
        .map(|tag| tag.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// PUT /voice-journals/:id/tags
pub async fn update_tags(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<VoiceJournal>> {
    let Json(body) = body?;
    load_owned(&state, &user, id).await?;
    let tags = parse_tags(&body)?;
    Ok(Json(state.storage.update_voice_journal_tags(id, tags).await?))
}

/// DELETE /voice-journals/:id
///
/// Audio cleanup is best effort and never fails the request.
pub async fn delete_voice_journal(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let journal = load_owned(&state, &user, id).await?;

    if !state.storage.delete_voice_journal(id).await? {
        return Err(ApiError::NotFound(format!("Voice journal {}", id)));
    }

    match state.audio.delete(&journal.audio_url).await {
        Ok(true) => {}
        Ok(false) => warn!(entry_id = id, url = %journal.audio_url, "Audio file already gone"),
        Err(e) => warn!(entry_id = id, url = %journal.audio_url, error = %e, "Failed to delete audio"),
    }

    info!(entry_id = id, "Voice journal deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Build voice journal routes
pub fn voice_journal_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/voice-journals",
            get(list_voice_journals).post(upload_voice_journal),
        )
        .route(
            "/voice-journals/:id",
            get(get_voice_journal)
                .put(update_voice_journal)
                .delete(delete_voice_journal),
        )
        .route("/voice-journals/:id/sentiment", put(update_sentiment))
        .route("/voice-journals/:id/tags", put(update_tags))
}
