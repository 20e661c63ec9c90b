//! ptrack-api library interface
//!
//! Exposes the router and application state for the binary and for
//! integration testing.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use ptrack_common::Storage;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::collaborators::Collaborators;
use crate::config::ServiceSettings;
use crate::services::{
    AudioStore, EnrichmentDispatcher, EnrichmentPipeline, SuggestionGenerator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The Storage Contract backend
    pub storage: Arc<dyn Storage>,
    /// Uploaded audio payloads
    pub audio: AudioStore,
    /// Background enrichment runs
    pub enrichment: EnrichmentDispatcher,
    pub suggestions: Arc<SuggestionGenerator>,
    pub settings: ServiceSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// `collaborators = None` runs enrichment and suggestions in degraded mode
    pub fn new(
        storage: Arc<dyn Storage>,
        audio: AudioStore,
        collaborators: Option<Collaborators>,
        settings: ServiceSettings,
        max_concurrent: Option<usize>,
    ) -> Self {
        let advisor = collaborators.as_ref().map(|c| Arc::clone(&c.advisor));
        let pipeline = EnrichmentPipeline::new(Arc::clone(&storage), audio.clone(), collaborators);

        Self {
            suggestions: Arc::new(SuggestionGenerator::new(Arc::clone(&storage), advisor)),
            enrichment: EnrichmentDispatcher::new(pipeline, max_concurrent),
            storage,
            audio,
            settings,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.audio.dir());
    let body_limit = state.settings.max_upload_bytes;

    Router::new()
        .merge(api::voice_journal_routes())
        .merge(api::activity_routes())
        .merge(api::suggestion_routes())
        .merge(api::health_routes())
        .nest_service(services::audio_store::UPLOADS_URL_PREFIX, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
