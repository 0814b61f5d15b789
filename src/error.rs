//! Error types for the vetdoc-extract library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ExtractError`] (**fatal**): the pipeline cannot produce a result at all
//!   (input is not a PDF, the recognition engine rejected a shard, the engine
//!   is not configured). Returned as `Err(ExtractError)` from the
//!   [`crate::extract::DocumentExtractor`] entry points.
//!
//! * [`EngineError`]: what a [`crate::engine::DocumentEngine`] reports for a
//!   single request. The text pipeline wraps it in
//!   [`ExtractError::OcrService`] together with the failing shard index.
//!
//! * [`ImageSkip`] (**non-fatal**): one embedded image could not be decoded to
//!   learn its width. The image is dropped, the skip is logged and counted,
//!   and extraction continues with the next image.
//!
//! A field that could not be found is not an error at all; it is simply
//! `None` in [`crate::output::FieldRecord`].

use thiserror::Error;

/// All fatal errors returned by the vetdoc-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input bytes could not be parsed as a PDF document.
    #[error("Input is not a valid PDF: {detail}")]
    MalformedDocument { detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The document-understanding engine failed for one shard; the whole
    /// text pipeline is aborted.
    #[error("OCR engine failed on shard {shard}: {source}")]
    OcrService {
        shard: usize,
        #[source]
        source: EngineError,
    },

    /// No engine was injected and none could be built from the environment.
    #[error("Document engine is not configured.\n{hint}")]
    EngineNotConfigured { hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single document-engine request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The call did not complete within the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The engine rejected the call because a quota or rate limit was hit.
    #[error("quota exceeded")]
    QuotaExceeded { retry_after_secs: Option<u64> },

    /// The engine rejected the request payload (too many pages, bad MIME type…).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Credentials were missing, expired or lacked permission.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other non-success response from the service.
    #[error("service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// The request never reached the service.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// A non-fatal skip of one embedded image.
///
/// Produced when an image carries no usable `/Width` and its bytes cannot be
/// decoded either. Never propagated; see [`crate::pipeline::images`].
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("Page {page}: image /{name} skipped: {detail}")]
pub struct ImageSkip {
    /// 1-indexed page the image was found on.
    pub page: u32,
    /// XObject resource name (without the leading slash).
    pub name: String,
    pub detail: String,
}
