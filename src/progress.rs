//! Progress-callback trait for per-shard OCR events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe
//! the text pipeline as each shard goes through the document engine.
//!
//! # Example
//!
//! ```rust
//! use vetdoc_extract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl ExtractionProgressCallback for Log {
//!     fn on_shard_complete(&self, shard: usize, total: usize, text_len: usize) {
//!         eprintln!("shard {}/{}: {} chars", shard + 1, total, text_len);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Log))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the text pipeline as it processes each shard.
///
/// All methods default to no-ops. With `ocr_concurrency > 1` the shard
/// methods may be called concurrently and out of shard order.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once the document is parsed, before any engine call.
    fn on_extraction_start(&self, total_shards: usize) {
        let _ = total_shards;
    }

    /// Called just before a shard is sent to the engine (`shard` is 0-based).
    fn on_shard_start(&self, shard: usize, total_shards: usize) {
        let _ = (shard, total_shards);
    }

    /// Called when the engine returned text for a shard.
    fn on_shard_complete(&self, shard: usize, total_shards: usize, text_len: usize) {
        let _ = (shard, total_shards, text_len);
    }

    /// Called when the engine failed for a shard. The pipeline aborts next.
    fn on_shard_error(&self, shard: usize, total_shards: usize, error: &str) {
        let _ = (shard, total_shards, error);
    }

    /// Called once after every shard succeeded.
    fn on_extraction_complete(&self, total_shards: usize) {
        let _ = total_shards;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
