use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;

// ── Constants ────────────────────────────────────────────────────────────────

const USER_AGENT: &str = "image-insight-api/1.0";
const MAX_ERROR_BODY_CHARS: usize = 500;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("{0}")]
    Request(String),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream response could not be decoded: {0}")]
    Decode(String),
    #[error("upstream returned no completion text")]
    EmptyCompletion,
}

impl InferenceError {
    pub fn kind(&self) -> &'static str {
        match self {
            InferenceError::MissingApiKey => "missing_api_key",
            InferenceError::Request(_) => "transport",
            InferenceError::Upstream { .. } => "upstream",
            InferenceError::Decode(_) => "decode",
            InferenceError::EmptyCompletion => "empty_completion",
        }
    }
}

// ── Client abstraction ───────────────────────────────────────────────────────

/// One multimodal completion: instruction text plus an inline image.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub image_base64: String,
    pub mime_type: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceError>;

    /// Whether the client has what it needs to reach the service.
    fn is_configured(&self) -> bool {
        true
    }
}

// ── Gemini wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    // Function calls, thoughts, etc. that this service never asks for.
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

// ── Gemini client ────────────────────────────────────────────────────────────

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: Url,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, InferenceError> {
        let http = reqwest::ClientBuilder::new()
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        // `join` replaces the last segment unless the base path ends in `/`.
        let mut base = config.api_base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join(&format!("v1beta/models/{}:generateContent", config.model))
            .map_err(|e| InferenceError::Request(format!("invalid endpoint: {}", e)))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn complete(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        let api_key = self.api_key.as_deref().ok_or(InferenceError::MissingApiKey)?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: request.prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.mime_type,
                            data: request.image_base64,
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Request(format!("TimeoutError: {}", e))
                } else if e.is_connect() {
                    InferenceError::Request(format!("ConnectError: {}", e))
                } else {
                    InferenceError::Request(format!("RequestError: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Decode(e.to_string()))?;

        completion_text(parsed).ok_or(InferenceError::EmptyCompletion)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Concatenate the text parts of the first candidate.
fn completion_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|part| match part {
            Part::Text { text } => Some(text),
            _ => None,
        })
        .collect();
    (!text.trim().is_empty()).then_some(text)
}
