//! Business logic behind the HTTP handlers

pub mod audio_store;
pub mod enrichment;
pub mod suggestions;

pub use audio_store::{AudioStore, StoredAudio};
pub use enrichment::{
    EnrichmentDispatcher, EnrichmentOutcome, EnrichmentPipeline, EnrichmentStats,
    EnrichmentStatsSnapshot,
};
pub use suggestions::{default_suggestions, Suggestion, SuggestionGenerator};
