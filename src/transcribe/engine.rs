use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::EngineConfig;
use crate::Result;

/// External transcription capability.
///
/// Receives one audio slice plus the prompt and returns the engine's raw text,
/// which is expected (but not guaranteed) to be a JSON caption array.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn generate(&self, audio: &[u8], mime_type: &str, prompt: &str) -> Result<String>;

    /// Model identifier reported in metadata
    fn model_name(&self) -> String;
}

// Generative Language API request/response shapes
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Gemini `generateContent` over REST with inline audio
pub struct GeminiEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiEngine {
    pub fn new(config: &EngineConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, audio: &[u8], mime_type: &str, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: BASE64_STANDARD.encode(audio),
                        },
                    },
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl TranscriptionEngine for GeminiEngine {
    async fn generate(&self, audio: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        let body = self.build_request(audio, mime_type, prompt);

        tracing::debug!(
            "Sending {} bytes of {} to {}",
            audio.len(),
            mime_type,
            self.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Engine request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorEnvelope>(&text)
                .ok()
                .and_then(|e| {
                    e.error
                        .message
                        .map(|m| format!("{} ({})", m, e.error.status.unwrap_or_default()))
                })
                .unwrap_or(text);
            anyhow::bail!("Engine returned HTTP {}: {}", status, detail);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse engine response")?;

        extract_text(parsed)
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        anyhow::bail!("Engine blocked the request: {}", reason);
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Engine returned no candidates"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate.finish_reason {
            anyhow::bail!("Engine returned no text (finish reason {})", reason);
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> GeminiEngine {
        let config = EngineConfig {
            base_url: "https://relay.example.com/".to_string(),
            ..EngineConfig::default()
        };
        GeminiEngine::new(&config, " key ".to_string()).unwrap()
    }

    #[test]
    fn test_endpoint_and_key() {
        let engine = engine();
        assert_eq!(
            engine.endpoint(),
            "https://relay.example.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(engine.api_key, "key");
    }

    #[test]
    fn test_request_body_shape() {
        let body = engine().build_request(b"abc", "audio/mpeg", "transcribe please");
        let json = serde_json::to_value(&body).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "audio/mpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "YWJj");
        assert_eq!(parts[1]["text"], "transcribe please");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "[{\"start\": 0,"}, {"text": " \"end\": 1, \"text\": \"hi\"}]"}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();

        assert_eq!(
            extract_text(response).unwrap(),
            r#"[{"start": 0, "end": 1, "text": "hi"}]"#
        );
    }

    #[test]
    fn test_extract_text_errors() {
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(extract_text(blocked).is_err());

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(extract_text(empty).is_err());

        let no_text: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#).unwrap();
        assert!(extract_text(no_text).is_err());
    }
}
