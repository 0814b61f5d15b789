//! Pipeline stages for veterinary report extraction.
//!
//! Each submodule implements exactly one step. The text and image pipelines
//! share nothing but the input bytes.
//!
//! ## Data Flow
//!
//! ```text
//!          ┌─▶ shard ──▶ ocr ──▶ fields        (FieldRecord)
//! PDF ─────┤   (lopdf)  (engine)  (labels + similarity)
//!          └─▶ images                          (ImageCandidate*)
//!              (lopdf XObjects + width filter)
//! ```
//!
//! 1. [`shard`]: split the document into page-bounded sub-PDFs the engine
//!    accepts; CPU-bound, run on the blocking pool
//! 2. [`ocr`]: one engine call per shard, results joined in page order;
//!    the only stage with network I/O
//! 3. [`fields`]: line scanner that maps headings to the five report fields,
//!    with a [`similarity`] fallback for OCR-mangled headings
//! 4. [`images`]: embedded raster images at least `min_image_width` wide

pub mod fields;
pub mod images;
pub mod ocr;
pub mod shard;
pub mod similarity;
