//! External collaborators
//!
//! Speech-to-text, transcript analysis and suggestion generation are opaque
//! remote services. Each sits behind its own trait so the pipeline and the
//! suggestion generator can be exercised with in-process fakes. Raw model
//! output is normalized here before anything reaches storage.

pub mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use ptrack_common::models::{Polarity, Sentiment};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Maximum number of topic tags kept per entry
pub const MAX_TAGS: usize = 5;

/// Collaborator errors
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from collaborator")]
    EmptyResponse,

    #[error("No collaborator credential configured")]
    MissingCredential,
}

/// Stored audio handed to the transcriber
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioPayload {
    /// MIME type guessed from the file extension
    pub fn mime_type(&self) -> &'static str {
        let ext = std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("mp3") | Some("mpga") | Some("mpeg") => "audio/mpeg",
            Some("m4a") | Some("mp4") => "audio/mp4",
            Some("wav") => "audio/wav",
            Some("ogg") | Some("oga") => "audio/ogg",
            Some("flac") => "audio/flac",
            _ => "audio/webm",
        }
    }
}

/// Normalized result of transcript analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextAnalysis {
    pub sentiment: Option<Sentiment>,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Speech to text. An empty transcript is reported as `EmptyResponse`.
    async fn transcribe(&self, audio: AudioPayload) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<TextAnalysis, CollaboratorError>;
}

#[async_trait]
pub trait SuggestionModel: Send + Sync {
    /// Ask for suggestions given a JSON user context; returns the raw model content
    async fn suggest(&self, context: &serde_json::Value) -> Result<String, CollaboratorError>;
}

/// The configured set of collaborators. Absent entirely when no credential exists.
#[derive(Clone)]
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub analyzer: Arc<dyn TextAnalyzer>,
    pub advisor: Arc<dyn SuggestionModel>,
}

impl Collaborators {
    /// One OpenAI-compatible client serving all three roles
    pub fn openai(client: OpenAiClient) -> Self {
        let client = Arc::new(client);
        Self {
            transcriber: client.clone(),
            analyzer: client.clone(),
            advisor: client,
        }
    }
}

// ============================================================================
// Analysis normalization
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    sentiment: Option<RawSentiment>,
    #[serde(default)]
    tags: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawSentiment {
    overall: String,
    #[serde(default)]
    emotions: Vec<serde_json::Value>,
    #[serde(default)]
    confidence: Option<f64>,
}

fn parse_polarity(value: &str) -> Option<Polarity> {
    match value.trim().to_ascii_lowercase().as_str() {
        "positive" => Some(Polarity::Positive),
        "negative" => Some(Polarity::Negative),
        "neutral" => Some(Polarity::Neutral),
        "mixed" => Some(Polarity::Mixed),
        _ => None,
    }
}

fn string_items(values: Vec<serde_json::Value>) -> impl Iterator<Item = String> {
    values
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
}

/// Trim, lowercase, drop blanks and duplicates, keep at most [`MAX_TAGS`]
pub fn normalize_tags<I: IntoIterator<Item = String>>(tags: I) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        out.push(tag);
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

impl TextAnalysis {
    /// Parse and normalize the analyzer's JSON output.
    ///
    /// An unknown polarity drops the sentiment but keeps the tags; a missing
    /// or non-finite confidence becomes 0; anything else is clamped to [0, 1].
    pub fn from_model_output(content: &str) -> Result<Self, CollaboratorError> {
        let raw: RawAnalysis = serde_json::from_str(content)
            .map_err(|e| CollaboratorError::Parse(format!("Analysis is not valid JSON: {}", e)))?;

        let sentiment = raw.sentiment.and_then(|s| {
            let overall = parse_polarity(&s.overall)?;
            let confidence = s
                .confidence
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(0.0);
            let emotions = string_items(s.emotions)
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            Some(Sentiment {
                overall,
                emotions,
                confidence,
            })
        });

        let tags = normalize_tags(string_items(raw.tags.unwrap_or_default()));

        Ok(Self { sentiment, tags })
    }
}
