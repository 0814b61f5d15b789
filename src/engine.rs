//! Document-understanding engines: the only network boundary of the crate.
//!
//! The text pipeline hands each shard to a [`DocumentEngine`] and gets back
//! the recognised text. Layout analysis and character recognition happen
//! entirely inside the engine.
//!
//! [`DocumentAiEngine`] talks to Google Cloud Document AI over its REST API
//! (`processors/*:process`). Tests and alternative back-ends implement the
//! trait directly and inject it through
//! [`crate::config::ExtractionConfigBuilder::engine`].
//!
//! The core never retries: a failed call is reported once and aborts the
//! text pipeline.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DocumentAiSettings;
use crate::error::{EngineError, ExtractError};

/// MIME type sent with every shard.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// A service that turns a document into plain text.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Recognise `content` (of type `mime_type`) and return its full text.
    ///
    /// An empty string is a valid answer for a document with no text.
    async fn process(&self, content: &[u8], mime_type: &str) -> Result<String, EngineError>;
}

// ── Document AI ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    raw_document: RawDocument<'a>,
    imageless_mode: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: Option<ResponseDocument>,
}

#[derive(Deserialize)]
struct ResponseDocument {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Google Cloud Document AI over REST.
pub struct DocumentAiEngine {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    timeout_secs: u64,
}

impl DocumentAiEngine {
    /// Build a client for the processor described by `settings`.
    pub fn new(settings: &DocumentAiSettings, timeout_secs: u64) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: settings.process_url(),
            access_token: settings.access_token.clone(),
            timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DocumentEngine for DocumentAiEngine {
    fn name(&self) -> &str {
        "document-ai"
    }

    async fn process(&self, content: &[u8], mime_type: &str) -> Result<String, EngineError> {
        let body = ProcessRequest {
            raw_document: RawDocument {
                content: STANDARD.encode(content),
                mime_type,
            },
            imageless_mode: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout {
                        secs: self.timeout_secs,
                    }
                } else {
                    EngineError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let raw = response.text().await.unwrap_or_default();
            return Err(classify_failure(
                status.as_u16(),
                &raw,
                retry_after,
                self.timeout_secs,
            ));
        }

        let parsed: ProcessResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                EngineError::MalformedResponse(e.to_string())
            }
        })?;

        let text = parsed.document.and_then(|d| d.text).unwrap_or_default();
        debug!("Document AI returned {} chars", text.len());
        Ok(text)
    }
}

/// Map a non-2xx Document AI response onto an [`EngineError`].
///
/// `timeout_secs` is the client timeout, reported when the service itself
/// gave up on the request.
fn classify_failure(
    status: u16,
    body: &str,
    retry_after_secs: Option<u64>,
    timeout_secs: u64,
) -> EngineError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        400 => EngineError::InvalidArgument(message),
        401 | 403 => EngineError::Auth(message),
        408 | 504 => EngineError::Timeout { secs: timeout_secs },
        429 => EngineError::QuotaExceeded { retry_after_secs },
        _ => EngineError::Service { status, message },
    }
}
