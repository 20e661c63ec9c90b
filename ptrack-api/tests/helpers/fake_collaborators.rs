//! In-process collaborator fakes
//!
//! Each fake returns a scripted reply and counts its calls.

use async_trait::async_trait;
use ptrack_api::collaborators::{
    AudioPayload, CollaboratorError, Collaborators, SuggestionModel, TextAnalysis, TextAnalyzer,
    Transcriber,
};
use ptrack_common::Storage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transcriber returning fixed text, or an API error when `reply` is `None`
pub struct ScriptedTranscriber {
    reply: Option<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<AudioPayload>>,
}

impl ScriptedTranscriber {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<AudioPayload> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, audio: AudioPayload) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(audio);
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(CollaboratorError::Api(503, "transcription unavailable".to_string())),
        }
    }
}

/// Analyzer returning a fixed analysis, or a parse error when `reply` is `None`
pub struct ScriptedAnalyzer {
    reply: Option<TextAnalysis>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    pub fn ok(analysis: TextAnalysis) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(analysis),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, text: &str) -> Result<TextAnalysis, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(text.to_string());
        self.reply
            .clone()
            .ok_or_else(|| CollaboratorError::Parse("garbled analysis".to_string()))
    }
}

/// Suggestion model returning fixed raw content, or a network error when `reply` is `None`
pub struct ScriptedAdvisor {
    reply: Option<String>,
    calls: AtomicUsize,
    contexts: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedAdvisor {
    pub fn ok(content: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(content.to_string()),
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<serde_json::Value> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuggestionModel for ScriptedAdvisor {
    async fn suggest(&self, context: &serde_json::Value) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        self.reply
            .clone()
            .ok_or_else(|| CollaboratorError::Network("connection refused".to_string()))
    }
}

/// Transcriber that deletes the entry before answering, simulating a
/// client delete racing the pipeline
pub struct DeletingTranscriber {
    pub storage: Arc<dyn Storage>,
    pub entry_id: i64,
}

#[async_trait]
impl Transcriber for DeletingTranscriber {
    async fn transcribe(&self, _audio: AudioPayload) -> Result<String, CollaboratorError> {
        self.storage
            .delete_voice_journal(self.entry_id)
            .await
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;
        Ok("spoken words".to_string())
    }
}

/// Transcriber that sleeps and records peak concurrency
#[derive(Default)]
pub struct SlowTranscriber {
    active: AtomicUsize,
    peak: AtomicUsize,
    pub delay_ms: u64,
}

impl SlowTranscriber {
    pub fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay_ms,
            ..Default::default()
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for SlowTranscriber {
    async fn transcribe(&self, _audio: AudioPayload) -> Result<String, CollaboratorError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok("slow words".to_string())
    }
}

/// Bundle fakes into a collaborator set
pub fn fake_collaborators(
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn TextAnalyzer>,
    advisor: Arc<dyn SuggestionModel>,
) -> Collaborators {
    Collaborators {
        transcriber,
        analyzer,
        advisor,
    }
}
