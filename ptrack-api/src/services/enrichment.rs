//! Voice journal enrichment
//!
//! Two best-effort stages per entry, run off the request path:
//!
//! 1. Transcription: stored audio → transcriber → `transcription`
//! 2. Analysis: transcript → analyzer → `sentiment` and `tags`
//!
//! Stage 2 only runs after stage 1 wrote non-empty text. Each stage makes a
//! single attempt; any failure ends the run for that entry, is logged and
//! counted, and never reaches a caller. The pipeline only ever writes
//! `Some` values, so enrichment fields are never cleared by a run.
//!
//! [`EnrichmentDispatcher`] fires one detached task per entry, optionally
//! bounded by a semaphore, and tracks them so shutdown can wait.

use futures::FutureExt;
use ptrack_common::models::VoiceJournal;
use ptrack_common::Storage;
use serde::Serialize;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::audio_store::AudioStore;
use crate::collaborators::{AudioPayload, CollaboratorError, Collaborators};

/// How one pipeline run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// No collaborator credential configured
    Skipped,
    /// Stage 1 failed; nothing was written
    TranscriptionFailed,
    /// Transcript written; analysis failed or nothing could be stored
    AnalysisFailed,
    /// The entry disappeared while the run was in progress
    EntryGone,
    /// Both stages ran; reports which stage 2 fields were written
    Completed { sentiment: bool, tags: bool },
}

#[derive(Debug, Error)]
enum StageError {
    #[error("entry no longer exists")]
    EntryGone,

    #[error("audio unavailable: {0}")]
    Audio(#[from] std::io::Error),

    #[error("collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("storage failed: {0}")]
    Storage(ptrack_common::Error),
}

impl From<ptrack_common::Error> for StageError {
    fn from(err: ptrack_common::Error) -> Self {
        if err.is_not_found() {
            StageError::EntryGone
        } else {
            StageError::Storage(err)
        }
    }
}

/// Counters exposed on `/health`
#[derive(Debug, Default)]
pub struct EnrichmentStats {
    dispatched: AtomicU64,
    skipped: AtomicU64,
    transcribed: AtomicU64,
    analyzed: AtomicU64,
    failed: AtomicU64,
    last_error: RwLock<Option<String>>,
}

/// Point-in-time copy of [`EnrichmentStats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentStatsSnapshot {
    pub dispatched: u64,
    pub skipped: u64,
    pub transcribed: u64,
    pub analyzed: u64,
    pub failed: u64,
}

impl EnrichmentStats {
    pub fn snapshot(&self) -> EnrichmentStatsSnapshot {
        EnrichmentStatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            transcribed: self.transcribed.load(Ordering::Relaxed),
            analyzed: self.analyzed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        match self.last_error.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_failure(&self, entry_id: i64, stage: &str, error: &dyn std::fmt::Display) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        warn!(entry_id, stage, error = %error, "Enrichment stage failed");

        let message = format!("entry {} {}: {}", entry_id, stage, error);
        match self.last_error.write() {
            Ok(mut guard) => *guard = Some(message),
            Err(poisoned) => *poisoned.into_inner() = Some(message),
        }
    }
}

/// Runs both enrichment stages for one entry
pub struct EnrichmentPipeline {
    storage: Arc<dyn Storage>,
    audio: AudioStore,
    collaborators: Option<Collaborators>,
    stats: Arc<EnrichmentStats>,
}

impl EnrichmentPipeline {
    pub fn new(
        storage: Arc<dyn Storage>,
        audio: AudioStore,
        collaborators: Option<Collaborators>,
    ) -> Self {
        Self {
            storage,
            audio,
            collaborators,
            stats: Arc::new(EnrichmentStats::default()),
        }
    }

    pub fn stats(&self) -> &Arc<EnrichmentStats> {
        &self.stats
    }

    pub fn is_enabled(&self) -> bool {
        self.collaborators.is_some()
    }

    /// Run both stages for `entry_id`. Never fails; the outcome is informational.
    pub async fn run(&self, entry_id: i64) -> EnrichmentOutcome {
        let Some(collaborators) = &self.collaborators else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(entry_id, "No collaborator credential, skipping enrichment");
            return EnrichmentOutcome::Skipped;
        };

        let transcript = match self.transcribe(collaborators, entry_id).await {
            Ok(text) => text,
            Err(StageError::EntryGone) => return self.entry_gone(entry_id, "transcription"),
            Err(e) => {
                self.stats.record_failure(entry_id, "transcription", &e);
                return EnrichmentOutcome::TranscriptionFailed;
            }
        };
        self.stats.transcribed.fetch_add(1, Ordering::Relaxed);
        info!(entry_id, chars = transcript.len(), "Transcription stored");

        self.analyze(collaborators, entry_id, &transcript).await
    }

    async fn transcribe(
        &self,
        collaborators: &Collaborators,
        entry_id: i64,
    ) -> Result<String, StageError> {
        let entry = self
            .storage
            .get_voice_journal(entry_id)
            .await?
            .ok_or(StageError::EntryGone)?;

        let payload = self.read_audio(&entry).await?;
        let text = collaborators.transcriber.transcribe(payload).await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(CollaboratorError::EmptyResponse.into());
        }

        self.storage
            .update_voice_journal_transcription(entry_id, text.to_string())
            .await?;
        Ok(text.to_string())
    }

    /// A missing file whose row is also gone means the entry was deleted mid-run
    async fn read_audio(&self, entry: &VoiceJournal) -> Result<AudioPayload, StageError> {
        match self.audio.read(&entry.audio_url).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.storage.get_voice_journal(entry.id).await?.is_none() {
                    Err(StageError::EntryGone)
                } else {
                    Err(StageError::Audio(e))
                }
            }
            Err(e) => Err(StageError::Audio(e)),
        }
    }

    async fn analyze(
        &self,
        collaborators: &Collaborators,
        entry_id: i64,
        transcript: &str,
    ) -> EnrichmentOutcome {
        let analysis = match collaborators.analyzer.analyze(transcript).await {
            Ok(analysis) => analysis,
            Err(e) => {
                self.stats
                    .record_failure(entry_id, "analysis", &StageError::from(e));
                return EnrichmentOutcome::AnalysisFailed;
            }
        };
        self.stats.analyzed.fetch_add(1, Ordering::Relaxed);

        // Sentiment and tags are independent writes
        let mut sentiment_written = false;
        let mut tags_written = false;
        let mut write_failed = false;

        if let Some(sentiment) = analysis.sentiment {
            match self
                .storage
                .update_voice_journal_sentiment(entry_id, sentiment)
                .await
                .map_err(StageError::from)
            {
                Ok(_) => sentiment_written = true,
                Err(StageError::EntryGone) => return self.entry_gone(entry_id, "sentiment"),
                Err(e) => {
                    self.stats.record_failure(entry_id, "sentiment", &e);
                    write_failed = true;
                }
            }
        }

        if !analysis.tags.is_empty() {
            match self
                .storage
                .update_voice_journal_tags(entry_id, analysis.tags)
                .await
                .map_err(StageError::from)
            {
                Ok(_) => tags_written = true,
                Err(StageError::EntryGone) => return self.entry_gone(entry_id, "tags"),
                Err(e) => {
                    self.stats.record_failure(entry_id, "tags", &e);
                    write_failed = true;
                }
            }
        }

        if write_failed && !sentiment_written && !tags_written {
            return EnrichmentOutcome::AnalysisFailed;
        }

        info!(
            entry_id,
            sentiment = sentiment_written,
            tags = tags_written,
            "Enrichment completed"
        );
        EnrichmentOutcome::Completed {
            sentiment: sentiment_written,
            tags: tags_written,
        }
    }

    fn entry_gone(&self, entry_id: i64, stage: &str) -> EnrichmentOutcome {
        info!(entry_id, stage, "Entry deleted during enrichment, dropping result");
        EnrichmentOutcome::EntryGone
    }
}

/// Fires detached pipeline runs and tracks them until they finish
#[derive(Clone)]
pub struct EnrichmentDispatcher {
    pipeline: Arc<EnrichmentPipeline>,
    limiter: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
}

impl EnrichmentDispatcher {
    /// `max_concurrent = None` leaves in-flight runs unbounded
    pub fn new(pipeline: EnrichmentPipeline, max_concurrent: Option<usize>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limiter: max_concurrent.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            tracker: TaskTracker::new(),
        }
    }

    pub fn stats(&self) -> &Arc<EnrichmentStats> {
        self.pipeline.stats()
    }

    pub fn is_enabled(&self) -> bool {
        self.pipeline.is_enabled()
    }

    /// Number of runs queued or executing
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Schedule enrichment for `entry_id` without waiting for it
    pub fn dispatch(&self, entry_id: i64) {
        self.pipeline
            .stats()
            .dispatched
            .fetch_add(1, Ordering::Relaxed);

        let pipeline = Arc::clone(&self.pipeline);
        let limiter = self.limiter.clone();

        self.tracker.spawn(async move {
            let _permit = match limiter {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            debug!(entry_id, "Background enrichment task started");

            match AssertUnwindSafe(pipeline.run(entry_id)).catch_unwind().await {
                Ok(outcome) => debug!(entry_id, ?outcome, "Background enrichment task finished"),
                Err(_) => pipeline
                    .stats()
                    .record_failure(entry_id, "pipeline", &"task panicked"),
            }
        });
    }

    /// Wait for every dispatched run to finish. New dispatches are accepted again afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
