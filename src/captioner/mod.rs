//! Caption model client.
//!
//! Talks to an OpenAI-compatible chat-completion endpoint, sending the
//! screenshot inline as a `data:` URL and asking for a single short caption.
//! The response text still goes through [`crate::caption::sanitize`] —
//! models routinely ignore the "caption only" instruction.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str =
    "You are a meme caption writer. Reply with the caption text only — no quotes, no commentary.";

const USER_PROMPT: &str =
    "Write one short, funny caption for this screenshot of a web page. Caption only.";

const MAX_COMPLETION_TOKENS: u32 = 60;

#[derive(Debug, thiserror::Error)]
pub enum CaptionerError {
    #[error("no caption API key configured")]
    KeyMissing,
    #[error("caption API key rejected (401)")]
    KeyRejected,
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("caption API error: HTTP {0}")]
    Remote(StatusCode),
    /// The call succeeded but the body doesn't have the expected nested
    /// message-content field. Not a crash — the pipeline reports it and
    /// waits for the next tick.
    #[error("unexpected caption response shape: {0}")]
    ResponseFormat(String),
}

/// Client for the captioning endpoint.
#[derive(Debug, Clone)]
pub struct CaptionClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
}

impl CaptionClient {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Result<Self, CaptionerError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            model: model.into(),
        })
    }

    /// Ask the model for a caption for a PNG screenshot.
    ///
    /// Returns the raw (unsanitized) response text.
    pub async fn caption_png(&self, api_key: &str, png: &[u8]) -> Result<String, CaptionerError> {
        if api_key.is_empty() {
            return Err(CaptionerError::KeyMissing);
        }

        let data_url = format!("data:image/png;base64,{}", BASE64.encode(png));
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        { "type": "image_url", "image_url": { "url": data_url } }
                    ]
                }
            ]
        });

        debug!(model = %self.model, image_bytes = png.len(), "requesting caption");
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(CaptionerError::KeyRejected),
            s => return Err(CaptionerError::Remote(s)),
        }

        let text = resp.text().await?;
        extract_message_content(&text)
    }

    /// Validate an API key against the models listing. Any 2xx = valid.
    pub async fn validate_key(&self, api_key: &str) -> Result<bool, CaptionerError> {
        if api_key.is_empty() {
            return Err(CaptionerError::KeyMissing);
        }
        let resp = self
            .http
            .get(format!("{}/models", self.api_base))
            .bearer_auth(api_key)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}

/// Pull `choices[0].message.content` out of a chat-completion body.
fn extract_message_content(body: &str) -> Result<String, CaptionerError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| CaptionerError::ResponseFormat("body is not valid JSON".into()))?;
    value
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CaptionerError::ResponseFormat("missing choices[0].message.content".into())
        })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
