//! OpenAI-compatible HTTP client
//!
//! Serves all three collaborator roles: `/audio/transcriptions` for speech
//! to text and `/chat/completions` in JSON mode for transcript analysis and
//! suggestions. Any server speaking the same protocol works via `base_url`.

use async_trait::async_trait;
use ptrack_common::config::CollaboratorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    AudioPayload, CollaboratorError, SuggestionModel, TextAnalysis, TextAnalyzer, Transcriber,
};

const USER_AGENT: &str = concat!("ptrack/", env!("CARGO_PKG_VERSION"));

const ANALYSIS_SYSTEM_PROMPT: &str = "You analyze personal voice journal transcripts and \
     report their emotional tone and main topics as strict JSON.";

const SUGGESTION_SYSTEM_PROMPT: &str = "You are an AI productivity assistant that analyzes \
     user data and provides personalized suggestions to improve productivity and achieve goals.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible API client
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    transcription_model: String,
    chat_model: String,
}

impl OpenAiClient {
    pub fn new(config: &CollaboratorConfig, api_key: String) -> Result<Self, CollaboratorError> {
        if api_key.trim().is_empty() {
            return Err(CollaboratorError::MissingCredential);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            transcription_model: config.transcription_model.clone(),
            chat_model: config.chat_model.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CollaboratorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Api(status.as_u16(), error_text))
    }

    /// One JSON-mode chat completion; returns the message content
    async fn complete_json(&self, system: &str, user: String) -> Result<String, CollaboratorError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!(model = %self.chat_model, "Requesting chat completion");

        let response = self
            .http_client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        let chat: ChatResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(CollaboratorError::EmptyResponse)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: AudioPayload) -> Result<String, CollaboratorError> {
        let mime = audio.mime_type();
        let size = audio.bytes.len();
        let part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(mime)
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        tracing::debug!(bytes = size, mime = mime, "Requesting transcription");

        let response = self
            .http_client
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        let transcription: TranscriptionResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let text = transcription.text.trim();
        if text.is_empty() {
            return Err(CollaboratorError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl TextAnalyzer for OpenAiClient {
    async fn analyze(&self, text: &str) -> Result<TextAnalysis, CollaboratorError> {
        let prompt = format!(
            r#"Analyze the following voice journal transcript.

Return a JSON object in exactly this format:
{{
  "sentiment": {{
    "overall": "positive|negative|neutral|mixed",
    "emotions": ["emotion label", ...],
    "confidence": 0.0 to 1.0
  }},
  "tags": ["up to 5 short topic tags"]
}}

TRANSCRIPT:
{}"#,
            text
        );

        let content = self.complete_json(ANALYSIS_SYSTEM_PROMPT, prompt).await?;
        TextAnalysis::from_model_output(&content)
    }
}

#[async_trait]
impl SuggestionModel for OpenAiClient {
    async fn suggest(&self, context: &serde_json::Value) -> Result<String, CollaboratorError> {
        let user_data = serde_json::to_string_pretty(context)
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let prompt = format!(
            r#"Based on this user's progress tracking data, generate exactly 3 personalized suggestions to help them improve their productivity and achieve their goals more effectively.

USER DATA:
{}

Each suggestion must include:
1. A title (short and actionable)
2. A detailed description explaining the suggestion and its benefits
3. A type (must be one of: "focus", "habit", or "goal")
4. An impact level (must be one of: "high", "medium", or "low")
5. An action button text (e.g., "Apply to Schedule", "View Habit", "Add Goal")

Return a JSON object in the following format:
{{
  "suggestions": [
    {{
      "id": "unique_string_id",
      "title": "Suggestion Title",
      "description": "Detailed explanation of the suggestion",
      "type": "focus|habit|goal",
      "impact": "high|medium|low",
      "action": "Action Button Text"
    }}
  ]
}}

If the user data is insufficient to make personalized suggestions, provide meaningful general productivity suggestions."#,
            user_data
        );

        self.complete_json(SUGGESTION_SYSTEM_PROMPT, prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_missing_credential() {
        let result = OpenAiClient::new(&CollaboratorConfig::default(), "  ".to_string());
        assert!(matches!(result, Err(CollaboratorError::MissingCredential)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = CollaboratorConfig {
            base_url: "http://localhost:9000/v1/".to_string(),
            ..Default::default()
        };
        let client = OpenAiClient::new(&config, "sk-test".to_string()).unwrap();
        assert_eq!(
            client.url("chat/completions"),
            "http://localhost:9000/v1/chat/completions"
        );
    }

    #[test]
    fn test_chat_request_uses_json_mode() {
        let request = ChatRequest {
            model: "gpt-4o",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
