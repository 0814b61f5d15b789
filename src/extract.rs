//! Extraction entry points.
//!
//! A [`DocumentExtractor`] owns the engine, the label table and the config,
//! and exposes the two core operations: [`DocumentExtractor::process_pdf`]
//! (text pipeline, ending in a [`FieldRecord`]) and
//! [`DocumentExtractor::extract_images`] (image pipeline). The pipelines share
//! nothing but the input bytes; [`DocumentExtractor::extract`] runs both at
//! once.
//!
//! Neither operation persists anything. The only side effect is the engine
//! call made for each shard.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{DocumentAiSettings, ExtractionConfig};
use crate::engine::{DocumentAiEngine, DocumentEngine};
use crate::error::ExtractError;
use crate::labels::LabelAliasTable;
use crate::output::{ExtractionOutput, ExtractionStats, FieldRecord, ImageCandidate};
use crate::pipeline::images::{self, ImageScan};
use crate::pipeline::{fields, ocr, shard::Sharder};

/// Result of the text pipeline before field scanning.
#[derive(Debug)]
struct TextRun {
    text: String,
    total_pages: usize,
    shards: usize,
    duration_ms: u64,
}

/// Runs the text and image pipelines over PDF bytes.
///
/// Cheap to share: wrap it in an `Arc` and call it from many tasks. The label
/// table is read-only after construction.
pub struct DocumentExtractor {
    engine: Arc<dyn DocumentEngine>,
    labels: Arc<LabelAliasTable>,
    config: ExtractionConfig,
}

impl std::fmt::Debug for DocumentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentExtractor")
            .field("engine", &self.engine.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentExtractor {
    pub fn new(
        engine: Arc<dyn DocumentEngine>,
        labels: LabelAliasTable,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            engine,
            labels: Arc::new(labels),
            config,
        }
    }

    /// Build an extractor with the Spanish label table.
    ///
    /// The engine is resolved in priority order:
    ///
    /// 1. `config.engine`, when one was injected through the builder.
    /// 2. Document AI, configured from the `DOCUMENT_AI_*` environment
    ///    variables (see [`DocumentAiSettings::from_env`]).
    pub fn from_config(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let engine = resolve_engine(&config)?;
        info!("Using document engine '{}'", engine.name());
        Ok(Self::new(engine, LabelAliasTable::spanish(), config))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelAliasTable {
        &self.labels
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// OCR the document and extract the five report fields.
    ///
    /// # Errors
    /// - [`ExtractError::MalformedDocument`] when the bytes are not a PDF.
    /// - [`ExtractError::OcrService`] when any shard fails; no partial record
    ///   is returned.
    ///
    /// A document without recognisable headings is not an error: the record
    /// simply has every field set to `None`.
    pub async fn process_pdf(&self, bytes: &[u8]) -> Result<FieldRecord, ExtractError> {
        let run = self.text_pipeline(bytes).await?;
        Ok(self.scan_fields(&run.text))
    }

    /// Return the joined OCR text without scanning for fields.
    pub async fn extract_text(&self, bytes: &[u8]) -> Result<String, ExtractError> {
        Ok(self.text_pipeline(bytes).await?.text)
    }

    /// Raw bytes of every embedded image at least `min_image_width` wide, in
    /// page order.
    ///
    /// Images whose width cannot be determined are skipped, never fatal.
    pub async fn extract_images(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, ExtractError> {
        let scan = self.image_pipeline(bytes).await?.0;
        Ok(scan.images.into_iter().map(|c| c.bytes).collect())
    }

    /// Like [`Self::extract_images`] but keeps page, name and size metadata.
    pub async fn extract_image_candidates(
        &self,
        bytes: &[u8],
    ) -> Result<Vec<ImageCandidate>, ExtractError> {
        Ok(self.image_pipeline(bytes).await?.0.images)
    }

    /// Run both pipelines concurrently and collect everything.
    ///
    /// The image walk runs on the blocking pool while shards are with the
    /// engine. A fatal error in either pipeline fails the whole call; the
    /// text pipeline's error wins when both fail.
    pub async fn extract(&self, bytes: &[u8]) -> Result<ExtractionOutput, ExtractError> {
        let start = Instant::now();
        let (text_result, image_result) =
            tokio::join!(self.text_pipeline(bytes), self.image_pipeline(bytes));
        let run = text_result?;
        let (scan, image_duration_ms) = image_result?;

        let fields = self.scan_fields(&run.text);
        let stats = ExtractionStats {
            total_pages: run.total_pages,
            shards: run.shards,
            text_chars: run.text.chars().count(),
            fields_found: fields.found(),
            images_found: scan.images.len(),
            images_skipped: scan.skipped.len(),
            text_duration_ms: run.duration_ms,
            image_duration_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Extraction complete: {} pages, {}/5 fields, {} images in {}ms",
            stats.total_pages, stats.fields_found, stats.images_found, stats.total_duration_ms
        );

        Ok(ExtractionOutput {
            fields,
            text: run.text,
            images: scan.images,
            skipped_images: scan.skipped,
            stats,
        })
    }

    /// Synchronous wrapper around [`Self::process_pdf`].
    ///
    /// Creates a temporary tokio runtime internally; do not call it from
    /// inside an async context.
    pub fn process_pdf_sync(&self, bytes: &[u8]) -> Result<FieldRecord, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.process_pdf(bytes))
    }

    /// Synchronous wrapper around [`Self::extract`].
    pub fn extract_sync(&self, bytes: &[u8]) -> Result<ExtractionOutput, ExtractError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.extract(bytes))
    }

    // ── Pipelines ────────────────────────────────────────────────────────

    fn scan_fields(&self, text: &str) -> FieldRecord {
        let record = fields::extract_fields(text, &self.labels, &self.config.scan_options());
        debug!("Fields found: {}/5", record.found());
        record
    }

    async fn text_pipeline(&self, bytes: &[u8]) -> Result<TextRun, ExtractError> {
        let start = Instant::now();
        let owned = bytes.to_vec();
        let max_pages = self.config.max_pages_per_shard;

        // lopdf parsing is CPU-bound
        let sharder = tokio::task::spawn_blocking(move || Sharder::new(&owned, max_pages))
            .await
            .map_err(|e| ExtractError::Internal(format!("spawn_blocking panicked: {}", e)))??;

        let total_pages = sharder.total_pages();
        let shards = sharder.shard_count();
        info!(
            "PDF has {} pages → {} shards of ≤ {} pages",
            total_pages, shards, max_pages
        );

        let text = ocr::aggregate_text(ocr::shard_stream(sharder), shards, &self.engine, &self.config)
            .await?;

        Ok(TextRun {
            text,
            total_pages,
            shards,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn image_pipeline(&self, bytes: &[u8]) -> Result<(ImageScan, u64), ExtractError> {
        let start = Instant::now();
        let owned = bytes.to_vec();
        let min_width = self.config.min_image_width;

        let scan = tokio::task::spawn_blocking(move || images::extract_images(&owned, min_width))
            .await
            .map_err(|e| ExtractError::Internal(format!("spawn_blocking panicked: {}", e)))??;

        Ok((scan, start.elapsed().as_millis() as u64))
    }
}

fn resolve_engine(config: &ExtractionConfig) -> Result<Arc<dyn DocumentEngine>, ExtractError> {
    if let Some(ref engine) = config.engine {
        return Ok(Arc::clone(engine));
    }

    let settings = DocumentAiSettings::from_env()?;
    let engine = DocumentAiEngine::new(&settings, config.api_timeout_secs)?;
    Ok(Arc::new(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::pipeline::images::tests::{pdf_with_images, TestImage};
    use crate::pipeline::shard::tests::numbered_pdf;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REPORT: &str = "CLÍNICA VETERINARIA SAN ROQUE\n\
        Paciente: Firulais\n\
        Propietario\n\
        Juan Pérez\n\
        \n\
        Diagnóstico\n\
        Hígado de ecogenicidad aumentada\n\
        Recomendaciones: Control en 30 días";

    /// Returns the same text for every shard and counts the calls.
    struct FixedEngine {
        text: &'static str,
        calls: AtomicUsize,
    }

    impl FixedEngine {
        fn new(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                text,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DocumentEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn process(&self, content: &[u8], mime_type: &str) -> Result<String, EngineError> {
            assert!(content.starts_with(b"%PDF"));
            assert_eq!(mime_type, "application/pdf");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    struct RejectingEngine;

    #[async_trait]
    impl DocumentEngine for RejectingEngine {
        fn name(&self) -> &str {
            "rejecting"
        }

        async fn process(&self, _content: &[u8], _mime_type: &str) -> Result<String, EngineError> {
            Err(EngineError::InvalidArgument("Document pages exceed the limit".into()))
        }
    }

    fn extractor(engine: Arc<dyn DocumentEngine>) -> DocumentExtractor {
        DocumentExtractor::new(engine, LabelAliasTable::spanish(), ExtractionConfig::default())
    }

    #[tokio::test]
    async fn process_pdf_returns_fields() {
        let engine = FixedEngine::new(REPORT);
        let record = extractor(engine.clone()).process_pdf(&numbered_pdf(3)).await.unwrap();

        assert_eq!(record.patient.as_deref(), Some("Firulais"));
        assert_eq!(record.owner.as_deref(), Some("Juan Pérez"));
        assert_eq!(record.diagnosis.as_deref(), Some("Hígado de ecogenicidad aumentada"));
        assert_eq!(record.recommendations.as_deref(), Some("Control en 30 días"));
        assert_eq!(record.veterinarian, None);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_engine_call_per_shard() {
        let engine = FixedEngine::new("texto");
        let config = ExtractionConfig::builder().max_pages_per_shard(4).build().unwrap();
        let extractor = DocumentExtractor::new(engine.clone(), LabelAliasTable::spanish(), config);

        let text = extractor.extract_text(&numbered_pdf(10)).await.unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 3);
        assert_eq!(text, "texto\n\ntexto\n\ntexto");
    }

    #[tokio::test]
    async fn zero_page_pdf_yields_empty_results() {
        let engine = FixedEngine::new(REPORT);
        let extractor = extractor(engine.clone());
        let pdf = numbered_pdf(0);

        let output = extractor.extract(&pdf).await.unwrap();
        assert_eq!(output.text, "");
        assert!(output.fields.is_empty());
        assert!(output.images.is_empty());
        assert_eq!(output.stats.total_pages, 0);
        assert_eq!(output.stats.shards, 0);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn engine_failure_is_fatal() {
        let err = extractor(Arc::new(RejectingEngine))
            .process_pdf(&numbered_pdf(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::OcrService {
                shard: 0,
                source: EngineError::InvalidArgument(_)
            }
        ));
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_by_both_pipelines() {
        let extractor = extractor(FixedEngine::new(REPORT));
        assert!(matches!(
            extractor.process_pdf(b"hello").await,
            Err(ExtractError::MalformedDocument { .. })
        ));
        assert!(matches!(
            extractor.extract_images(b"hello").await,
            Err(ExtractError::MalformedDocument { .. })
        ));
    }

    #[tokio::test]
    async fn extract_combines_both_pipelines() {
        let pdf = pdf_with_images(vec![
            vec![TestImage::Declared(1600), TestImage::Declared(200)],
            vec![TestImage::Corrupt, TestImage::Declared(1300)],
        ]);
        let output = extractor(FixedEngine::new(REPORT)).extract(&pdf).await.unwrap();

        assert_eq!(output.fields.patient.as_deref(), Some("Firulais"));
        assert_eq!(output.images.len(), 2);
        assert_eq!(output.images[0].bytes, b"p0i0");
        assert_eq!(output.images[1].bytes, b"p1i1");
        assert_eq!(output.skipped_images.len(), 1);
        assert_eq!(output.stats.total_pages, 2);
        assert_eq!(output.stats.shards, 1);
        assert_eq!(output.stats.fields_found, 4);
        assert_eq!(output.stats.images_skipped, 1);
    }

    #[tokio::test]
    async fn extract_images_returns_raw_bytes() {
        let pdf = pdf_with_images(vec![vec![TestImage::Declared(2048)]]);
        let images = extractor(Arc::new(RejectingEngine))
            .extract_images(&pdf)
            .await
            .unwrap();
        assert_eq!(images, vec![b"p0i0".to_vec()]);
    }

    #[test]
    fn process_pdf_sync_runs_outside_a_runtime() {
        let record = extractor(FixedEngine::new("Paciente: Luna"))
            .process_pdf_sync(&numbered_pdf(1))
            .unwrap();
        assert_eq!(record.patient.as_deref(), Some("Luna"));
    }

    #[test]
    fn injected_engine_takes_precedence() {
        let config = ExtractionConfig::builder()
            .engine(FixedEngine::new(""))
            .build()
            .unwrap();
        let extractor = DocumentExtractor::from_config(config).unwrap();
        assert_eq!(extractor.engine_name(), "fixed");
    }
}
