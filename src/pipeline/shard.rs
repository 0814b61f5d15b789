//! PDF sharding: split a document into page-bounded sub-documents.
//!
//! Document-understanding engines cap the number of pages per request
//! (15 for an online Document AI call). The [`Sharder`] parses the input once
//! and then lazily yields one self-contained PDF per window of
//! `max_pages` pages. Pagination is purely mechanical: shard `k` holds pages
//! `k·M ..= min((k+1)·M, total) − 1`, in source order, byte-for-byte page
//! content untouched.
//!
//! Each shard is built by cloning the parsed object graph, deleting the pages
//! outside the window, and pruning objects that became unreachable, so
//! fonts/images used only by other pages do not inflate the upload.

use lopdf::{Document, ObjectId};
use tracing::debug;

use crate::error::ExtractError;

/// Default page bound per shard.
pub const DEFAULT_MAX_PAGES_PER_SHARD: usize = 15;

/// How far into the input the `%PDF` header may start.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Parse `bytes` as a PDF.
///
/// Bytes before the `%PDF` header (mail gateway banners, BOMs) are dropped
/// when the header starts within the first 1024 bytes; xref offsets then
/// count from the header.
pub fn load_document(bytes: &[u8]) -> Result<Document, ExtractError> {
    let Some(offset) = header_offset(bytes) else {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ExtractError::MalformedDocument {
            detail: format!("missing %PDF header (first bytes: {magic:?})"),
        });
    };
    if offset > 0 {
        debug!("Skipping {} bytes before the %PDF header", offset);
    }
    Document::load_mem(&bytes[offset..]).map_err(|e| ExtractError::MalformedDocument {
        detail: e.to_string(),
    })
}

fn header_offset(bytes: &[u8]) -> Option<usize> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW + 4)];
    window.windows(4).position(|w| w == b"%PDF")
}

/// One page-bounded sub-document.
#[derive(Debug, Clone)]
pub struct Shard {
    /// 0-based position in the shard sequence.
    pub index: usize,
    /// 0-based index of the first source page in this shard.
    pub first_page: usize,
    pub page_count: usize,
    /// Serialised PDF.
    pub bytes: Vec<u8>,
}

impl Shard {
    /// 0-based source page range covered by this shard.
    pub fn pages(&self) -> std::ops::Range<usize> {
        self.first_page..self.first_page + self.page_count
    }
}

/// Lazy, finite, single-pass iterator over the shards of one document.
pub struct Sharder {
    source: Document,
    /// 1-based page numbers as lopdf reports them, in document order.
    page_numbers: Vec<u32>,
    max_pages: usize,
    next_index: usize,
}

impl Sharder {
    /// Parse `bytes` and prepare to shard it into windows of `max_pages`.
    ///
    /// Fails with [`ExtractError::MalformedDocument`] before yielding anything
    /// if the input is not a PDF. `max_pages` of zero is treated as one.
    pub fn new(bytes: &[u8], max_pages: usize) -> Result<Self, ExtractError> {
        let source = load_document(bytes)?;
        Ok(Self::from_document(source, max_pages))
    }

    pub fn from_document(source: Document, max_pages: usize) -> Self {
        let page_numbers: Vec<u32> = source.get_pages().keys().copied().collect();
        debug!(
            "Sharding {} pages into windows of {}",
            page_numbers.len(),
            max_pages.max(1)
        );
        Self {
            source,
            page_numbers,
            max_pages: max_pages.max(1),
            next_index: 0,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.page_numbers.len()
    }

    /// Number of shards the full sequence will contain.
    pub fn shard_count(&self) -> usize {
        self.page_numbers.len().div_ceil(self.max_pages)
    }

    fn build_shard(&self, index: usize) -> Result<Shard, ExtractError> {
        let start = index * self.max_pages;
        let end = (start + self.max_pages).min(self.page_numbers.len());

        let mut doc = self.source.clone();
        let drop: Vec<u32> = self
            .page_numbers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < start || *i >= end)
            .map(|(_, n)| *n)
            .collect();
        if !drop.is_empty() {
            doc.delete_pages(&drop);
            let pruned: Vec<ObjectId> = doc.prune_objects();
            debug!("Shard {}: pruned {} unreachable objects", index, pruned.len());
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| ExtractError::Internal(format!("failed to serialise shard {index}: {e}")))?;

        Ok(Shard {
            index,
            first_page: start,
            page_count: end - start,
            bytes,
        })
    }
}

impl Iterator for Sharder {
    type Item = Result<Shard, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.shard_count() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(self.build_shard(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.shard_count().saturating_sub(self.next_index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Sharder {}
