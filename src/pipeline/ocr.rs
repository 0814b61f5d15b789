//! OCR aggregation: send shards to the document engine and join the text.
//!
//! Shards are pulled lazily from the [`Sharder`]; building a shard clones and
//! re-serialises the PDF object graph, so each one is produced on the blocking
//! pool. Engine calls are the only suspension points.
//!
//! With `ocr_concurrency > 1` up to that many calls are in flight and finish
//! in any order. Every result is written into the slot of its shard index and
//! the slots are joined only after all calls succeeded, so the output never
//! depends on completion order. The first failure drops the remaining
//! in-flight calls and aborts the whole pipeline; there is no partial text.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, warn};

use super::shard::{Shard, Sharder};
use crate::config::ExtractionConfig;
use crate::engine::DocumentEngine;
use crate::error::{EngineError, ExtractError};

/// Separator placed between the text of consecutive shards.
pub const SHARD_SEPARATOR: &str = "\n\n";

/// Join non-empty shard texts with a blank line and trim the result.
pub fn join_texts<I, S>(texts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<S> = texts.into_iter().filter(|t| !t.as_ref().is_empty()).collect();
    let joined = parts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(SHARD_SEPARATOR);
    joined.trim().to_string()
}

/// Adapt a [`Sharder`] into a stream, building each shard on the blocking pool.
pub fn shard_stream(sharder: Sharder) -> impl Stream<Item = Result<Shard, ExtractError>> {
    stream::unfold(Some(sharder), |state| async move {
        let mut sharder = state?;
        let joined = tokio::task::spawn_blocking(move || {
            let next = sharder.next();
            (sharder, next)
        })
        .await;
        match joined {
            Ok((sharder, Some(item))) => Some((item, Some(sharder))),
            Ok((_, None)) => None,
            Err(e) => Some((
                Err(ExtractError::Internal(format!("shard task panicked: {e}"))),
                None,
            )),
        }
    })
}

/// Recognise every shard and return the joined OCR text.
///
/// `total_shards` sizes the result slots and is reported to the progress
/// callback; shards with a larger index still land in order.
pub async fn aggregate_text<S>(
    shards: S,
    total_shards: usize,
    engine: &Arc<dyn DocumentEngine>,
    config: &ExtractionConfig,
) -> Result<String, ExtractError>
where
    S: Stream<Item = Result<Shard, ExtractError>>,
{
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total_shards);
    }

    let mut slots: Vec<Option<String>> = vec![None; total_shards];
    let results = shards
        .map(|item| {
            let engine = Arc::clone(engine);
            async move {
                let shard = item?;
                recognise_shard(engine.as_ref(), shard, total_shards, config).await
            }
        })
        .buffer_unordered(config.ocr_concurrency.max(1));
    let mut results = std::pin::pin!(results);

    while let Some(result) = results.next().await {
        let (index, text) = result?;
        if index >= slots.len() {
            slots.resize(index + 1, None);
        }
        slots[index] = Some(text);
    }

    let shard_count = slots.len();
    let text = join_texts(slots.into_iter().flatten());
    info!(
        "Recognised {} shards → {} chars in {}ms",
        shard_count,
        text.chars().count(),
        start.elapsed().as_millis()
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(shard_count);
    }
    Ok(text)
}

/// One engine round-trip, bounded by `api_timeout_secs`.
async fn recognise_shard(
    engine: &dyn DocumentEngine,
    shard: Shard,
    total_shards: usize,
    config: &ExtractionConfig,
) -> Result<(usize, String), ExtractError> {
    let index = shard.index;
    if let Some(ref cb) = config.progress_callback {
        cb.on_shard_start(index, total_shards);
    }
    debug!(
        "Shard {}: pages {}..{} ({} bytes) → {}",
        index,
        shard.first_page + 1,
        shard.first_page + shard.page_count,
        shard.bytes.len(),
        engine.name()
    );

    let started = Instant::now();
    let call = engine.process(&shard.bytes, &config.mime_type);
    let outcome = match tokio::time::timeout(Duration::from_secs(config.api_timeout_secs), call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            secs: config.api_timeout_secs,
        }),
    };

    match outcome {
        Ok(text) => {
            debug!(
                "Shard {}: {} chars in {}ms",
                index,
                text.len(),
                started.elapsed().as_millis()
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_shard_complete(index, total_shards, text.len());
            }
            Ok((index, text))
        }
        Err(source) => {
            warn!("Shard {}: engine '{}' failed: {}", index, engine.name(), source);
            if let Some(ref cb) = config.progress_callback {
                cb.on_shard_error(index, total_shards, &source.to_string());
            }
            Err(ExtractError::OcrService {
                shard: index,
                source,
            })
        }
    }
}
