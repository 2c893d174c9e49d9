//! Calligraphy comment generation via a multimodal inference endpoint
//!
//! The work photo is sent inline as a base64 `data:` URI together with the
//! instruction text for the requested style. Failed attempts are retried a
//! fixed number of times with a fixed delay; the final error never carries the
//! underlying cause, which is only logged.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiSettings;

const USER_AGENT: &str = concat!("inkfeed/", env!("CARGO_PKG_VERSION"));

/// Comment generation errors surfaced to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommentError {
    /// No API credential configured; no request was made
    #[error("API Key 未配置")]
    NotConfigured,

    /// Every attempt failed
    #[error("AI 评语生成暂时不可用，请稍后重试，或手动填写评语。")]
    Unavailable,
}

/// Single-attempt failure, logged and retried
#[derive(Debug, Error)]
enum AttemptError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Instruction template selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentStyle {
    /// Warm and concrete, written for parents
    #[default]
    Warm,
    /// Technique-focused critique
    Strict,
    /// Motivational, stresses progress and effort
    Encouraging,
}

impl CommentStyle {
    /// Parse a style key; unknown keys fall back to `warm`
    pub fn from_key(key: &str) -> Self {
        match key.trim() {
            "strict" => Self::Strict,
            "encouraging" => Self::Encouraging,
            _ => Self::Warm,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Warm => "warm",
            Self::Strict => "strict",
            Self::Encouraging => "encouraging",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Warm => "请根据这张书法作品，给出一段温暖、具体的评语，适合家长阅读。评语应该包括：(1)正面评价点，(2)可改进的地方，(3)鼓励语言。",
            Self::Strict => "请根据这张书法作品，从技法角度给出专业的评语。重点分析笔画、笔顺、布局等方面的优缺点。",
            Self::Encouraging => "请根据这张书法作品，给出一段激励式评语，强调进步和努力。",
        }
    }
}

/// Successful generation
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedComment {
    pub text: String,
    pub model: String,
    /// Duration of the successful attempt
    pub elapsed_ms: u64,
}

/// Produces a comment for a work photo
#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(
        &self,
        image_path: &Path,
        student_name: &str,
        style: CommentStyle,
    ) -> Result<GeneratedComment, CommentError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    input: GenerationInput<'a>,
}

#[derive(Debug, Serialize)]
struct GenerationInput<'a> {
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestContent<'a> {
    Image { image: String },
    Text { text: &'a str },
}

/// Inference endpoint response body
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    pub output: Option<GenerationOutput>,
    /// Vendor error code on failures
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationOutput {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub content: MessageContent,
}

/// Message content is either plain text or a list of content blocks
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One content block
///
/// Blocks are tagged either with an explicit `"type"` field or, in the
/// endpoint's compact form, by the single payload key (`{"text": ...}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
}

impl ContentBlock {
    fn is_text(&self) -> bool {
        match self.kind.as_deref() {
            Some(kind) => kind == "text",
            None => self.text.is_some(),
        }
    }
}

impl MessageContent {
    /// The plain string, or the first text-tagged block carrying text
    ///
    /// Blank text counts as no text.
    pub fn extract_text(&self) -> Option<&str> {
        let text = match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .find_map(|b| b.is_text().then(|| b.text.as_deref()).flatten()),
        };
        text.filter(|t| !t.trim().is_empty())
    }
}

impl GenerationResponse {
    fn into_text(self) -> Result<String, AttemptError> {
        let choice = self
            .output
            .and_then(|o| o.choices.into_iter().next())
            .ok_or_else(|| AttemptError::Malformed("no choices in output".to_string()))?;

        choice
            .message
            .content
            .extract_text()
            .map(str::to_string)
            .ok_or_else(|| AttemptError::Malformed("no text block in message content".to_string()))
    }
}

// ============================================================================
// Client
// ============================================================================

/// Qwen-VL client for the DashScope multimodal generation endpoint
pub struct QwenVlClient {
    http_client: reqwest::Client,
    settings: AiSettings,
}

impl QwenVlClient {
    pub fn new(settings: AiSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http_client,
            settings,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    async fn request_once(
        &self,
        api_key: &str,
        body: &GenerationRequest<'_>,
    ) -> Result<String, AttemptError> {
        let response = self
            .http_client
            .post(&self.settings.endpoint)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<GenerationResponse>().await {
                Ok(body) => body.message.or(body.code).unwrap_or_default(),
                Err(_) => String::new(),
            };
            return Err(AttemptError::Status(status.as_u16(), detail));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Malformed(e.to_string()))?;

        parsed.into_text()
    }
}

/// Inline the photo as a `data:` URI
async fn image_data_uri(path: &Path) -> std::io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let mime = match image::guess_format(&bytes) {
        Ok(image::ImageFormat::Png) => "image/png",
        Ok(image::ImageFormat::WebP) => "image/webp",
        Ok(image::ImageFormat::Gif) => "image/gif",
        Ok(image::ImageFormat::Bmp) => "image/bmp",
        _ => "image/jpeg",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl CommentGenerator for QwenVlClient {
    async fn generate(
        &self,
        image_path: &Path,
        student_name: &str,
        style: CommentStyle,
    ) -> Result<GeneratedComment, CommentError> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            tracing::error!("Comment generation requested but no API key is configured");
            return Err(CommentError::NotConfigured);
        };

        let image = match image_data_uri(image_path).await {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(path = %image_path.display(), error = %e, "Cannot read work photo");
                return Err(CommentError::Unavailable);
            }
        };

        let body = GenerationRequest {
            model: &self.settings.model,
            input: GenerationInput {
                messages: vec![RequestMessage {
                    role: "user",
                    content: vec![
                        RequestContent::Image { image },
                        RequestContent::Text {
                            text: style.prompt(),
                        },
                    ],
                }],
            },
        };

        let max_attempts = self.settings.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if attempt == 1 {
                tracing::info!(student = %student_name, style = style.key(), model = %self.settings.model, "Requesting AI comment");
            } else {
                tracing::info!(attempt, "Retrying AI comment request");
            }

            let started = Instant::now();
            match self.request_once(api_key, &body).await {
                Ok(text) => {
                    let elapsed_ms = elapsed_ms(started);
                    tracing::info!(elapsed_ms, style = style.key(), "AI comment generated");
                    return Ok(GeneratedComment {
                        text,
                        model: self.settings.model.clone(),
                        elapsed_ms,
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, max_attempts, error = %e, "AI comment attempt failed");
                    if attempt < max_attempts {
                        sleep_before_retry(self.settings.retry_delay).await;
                    }
                }
            }
        }

        Err(CommentError::Unavailable)
    }
}

async fn sleep_before_retry(delay: Duration) {
    if !delay.is_zero() {
        tracing::debug!(?delay, "Waiting before retry");
        tokio::time::sleep(delay).await;
    }
}
