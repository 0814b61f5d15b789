//! # vetdoc-extract
//!
//! Pull structured fields and diagnostic images out of scanned veterinary
//! reports (Spanish-language PDFs).
//!
//! ## Why this crate?
//!
//! Clinic reports arrive as PDFs that are often nothing more than scanned
//! pages. Their text layer is missing or garbage, so the text is recovered by
//! an external document-understanding engine (Google Cloud Document AI by
//! default). The recovered text is then scanned for a small set of Spanish
//! headings (`Paciente`, `Propietario`, `Diagnóstico`, …) tolerant of OCR
//! noise. The ultrasound and radiograph captures embedded in the report are
//! pulled out untouched, without re-encoding.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ text   ─ 1. Shard   split into ≤ 15-page sub-PDFs (lopdf, spawn_blocking)
//!  │           2. OCR     one engine call per shard, joined in page order
//!  │           3. Fields  heading scan → patient / owner / veterinarian /
//!  │                      diagnosis / recommendations
//!  │
//!  └─ images ─ 4. Walk    every image XObject, keep width ≥ 1300 px
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vetdoc_extract::{DocumentExtractor, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Engine configured from DOCUMENT_AI_PROJECT_ID / _LOCATION / _PROCESSOR_ID / _ACCESS_TOKEN
//!     let extractor = DocumentExtractor::from_config(ExtractionConfig::default())?;
//!     let bytes = std::fs::read("informe.pdf")?;
//!
//!     let record = extractor.process_pdf(&bytes).await?;
//!     println!("patient: {:?}", record.patient);
//!
//!     let images = extractor.extract_images(&bytes).await?;
//!     eprintln!("{} diagnostic images", images.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vetdoc` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! vetdoc-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod labels;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocumentAiSettings, ExtractionConfig, ExtractionConfigBuilder};
pub use engine::{DocumentAiEngine, DocumentEngine, PDF_MIME_TYPE};
pub use error::{EngineError, ExtractError, ImageSkip};
pub use extract::DocumentExtractor;
pub use labels::{Field, LabelAlias, LabelAliasTable};
pub use output::{ExtractionOutput, ExtractionStats, FieldRecord, ImageCandidate};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
