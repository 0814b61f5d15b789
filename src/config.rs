//! Configuration types for report extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config between the text and image pipelines and to
//! log exactly what a run used.
//!
//! Engine credentials live separately in [`DocumentAiSettings`], read from the
//! environment, so a config can be built and tested without any secrets.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{DocumentEngine, PDF_MIME_TYPE};
use crate::error::ExtractError;
use crate::pipeline::fields::FieldScanOptions;
use crate::pipeline::images::DEFAULT_MIN_IMAGE_WIDTH;
use crate::pipeline::shard::DEFAULT_MAX_PAGES_PER_SHARD;
use crate::progress::ProgressCallback;

/// Configuration for one [`crate::extract::DocumentExtractor`].
///
/// # Example
/// ```rust
/// use vetdoc_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_pages_per_shard(10)
///     .min_image_width(1024)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_pages_per_shard, 10);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum pages per request sent to the engine. Default: 15.
    ///
    /// Document AI rejects online requests above its page limit with
    /// `INVALID_ARGUMENT`; 15 is the limit of the OCR processor.
    pub max_pages_per_shard: usize,

    /// Images narrower than this (in pixels) are discarded. Default: 1300.
    ///
    /// Ultrasound captures embedded in reports are 1300 px or wider; logos,
    /// signatures and icons are far smaller.
    pub min_image_width: u32,

    /// Minimum similarity for a fuzzy heading match. Range 0.0–1.0. Default: 0.75.
    pub fuzzy_cutoff: f64,

    /// Leading alphabetic tokens compared during fuzzy matching. Default: 2.
    ///
    /// Two tokens cover the longest multi-word headings in the Spanish table
    /// (`Médico Veterinario`, `Nombre paciente`).
    pub fuzzy_token_count: usize,

    /// Maximum lines read after a heading-only line. Default: 6.
    pub continuation_lookahead: usize,

    /// Shards sent to the engine at once. Default: 1 (strictly sequential).
    ///
    /// Results are always reassembled by shard index, so raising this never
    /// reorders the text.
    pub ocr_concurrency: usize,

    /// Per-request engine timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// MIME type declared for each shard. Default: `application/pdf`.
    pub mime_type: String,

    /// Pre-constructed engine. Takes precedence over the environment.
    pub engine: Option<Arc<dyn DocumentEngine>>,

    /// Optional per-shard progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let scan = FieldScanOptions::default();
        Self {
            max_pages_per_shard: DEFAULT_MAX_PAGES_PER_SHARD,
            min_image_width: DEFAULT_MIN_IMAGE_WIDTH,
            fuzzy_cutoff: scan.fuzzy_cutoff,
            fuzzy_token_count: scan.fuzzy_token_count,
            continuation_lookahead: scan.continuation_lookahead,
            ocr_concurrency: 1,
            api_timeout_secs: 120,
            mime_type: PDF_MIME_TYPE.to_string(),
            engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_pages_per_shard", &self.max_pages_per_shard)
            .field("min_image_width", &self.min_image_width)
            .field("fuzzy_cutoff", &self.fuzzy_cutoff)
            .field("fuzzy_token_count", &self.fuzzy_token_count)
            .field("continuation_lookahead", &self.continuation_lookahead)
            .field("ocr_concurrency", &self.ocr_concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("mime_type", &self.mime_type)
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The field-scanner subset of this config.
    pub fn scan_options(&self) -> FieldScanOptions {
        FieldScanOptions {
            fuzzy_cutoff: self.fuzzy_cutoff,
            fuzzy_token_count: self.fuzzy_token_count,
            continuation_lookahead: self.continuation_lookahead,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn max_pages_per_shard(mut self, n: usize) -> Self {
        self.config.max_pages_per_shard = n;
        self
    }

    pub fn min_image_width(mut self, px: u32) -> Self {
        self.config.min_image_width = px;
        self
    }

    pub fn fuzzy_cutoff(mut self, cutoff: f64) -> Self {
        self.config.fuzzy_cutoff = cutoff.clamp(0.0, 1.0);
        self
    }

    pub fn fuzzy_token_count(mut self, n: usize) -> Self {
        self.config.fuzzy_token_count = n;
        self
    }

    pub fn continuation_lookahead(mut self, n: usize) -> Self {
        self.config.continuation_lookahead = n;
        self
    }

    pub fn ocr_concurrency(mut self, n: usize) -> Self {
        self.config.ocr_concurrency = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn mime_type(mut self, mime: impl Into<String>) -> Self {
        self.config.mime_type = mime.into();
        self
    }

    pub fn engine(mut self, engine: Arc<dyn DocumentEngine>) -> Self {
        self.config.engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_pages_per_shard == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_pages_per_shard must be ≥ 1".into(),
            ));
        }
        if c.ocr_concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "ocr_concurrency must be ≥ 1".into(),
            ));
        }
        if c.fuzzy_token_count == 0 {
            return Err(ExtractError::InvalidConfig(
                "fuzzy_token_count must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Engine settings ──────────────────────────────────────────────────────────

/// Connection details for a Document AI processor.
#[derive(Clone, Serialize, Deserialize)]
pub struct DocumentAiSettings {
    pub project_id: String,
    /// Processor region, e.g. `us` or `eu`.
    pub location: String,
    pub processor_id: String,
    /// OAuth2 bearer token with the `cloud-platform` scope.
    pub access_token: String,
    /// Full `:process` URL override (regional endpoints, proxies, emulators).
    pub endpoint: Option<String>,
}

impl fmt::Debug for DocumentAiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentAiSettings")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("processor_id", &self.processor_id)
            .field("access_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl DocumentAiSettings {
    pub const ENV_PROJECT_ID: &'static str = "DOCUMENT_AI_PROJECT_ID";
    pub const ENV_LOCATION: &'static str = "DOCUMENT_AI_LOCATION";
    pub const ENV_PROCESSOR_ID: &'static str = "DOCUMENT_AI_PROCESSOR_ID";
    pub const ENV_ACCESS_TOKEN: &'static str = "DOCUMENT_AI_ACCESS_TOKEN";
    pub const ENV_ENDPOINT: &'static str = "DOCUMENT_AI_ENDPOINT";

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ExtractError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExtractError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ExtractError::EngineNotConfigured {
                    hint: format!("Set {key} (and the other DOCUMENT_AI_* variables)."),
                })
        };

        Ok(Self {
            project_id: required(Self::ENV_PROJECT_ID)?,
            location: required(Self::ENV_LOCATION)?,
            processor_id: required(Self::ENV_PROCESSOR_ID)?,
            access_token: required(Self::ENV_ACCESS_TOKEN)?,
            endpoint: lookup(Self::ENV_ENDPOINT).filter(|v| !v.trim().is_empty()),
        })
    }

    /// The `:process` URL for this processor.
    pub fn process_url(&self) -> String {
        if let Some(ref url) = self.endpoint {
            return url.clone();
        }
        format!(
            "https://{loc}-documentai.googleapis.com/v1/projects/{project}/locations/{loc}/processors/{processor}:process",
            loc = self.location,
            project = self.project_id,
            processor = self.processor_id,
        )
    }
}
