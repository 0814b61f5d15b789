//! Result types produced by the extraction pipelines.

use serde::{Deserialize, Serialize};

use crate::error::ImageSkip;
use crate::labels::Field;

/// The five report fields. `None` means no label/value pair was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub patient: Option<String>,
    pub owner: Option<String>,
    pub veterinarian: Option<String>,
    pub diagnosis: Option<String>,
    pub recommendations: Option<String>,
}

impl FieldRecord {
    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set(&mut self, field: Field, value: Option<String>) {
        *self.slot_mut(field) = value;
    }

    /// Number of fields that carry a value.
    pub fn found(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.found() == 0
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::Patient => &self.patient,
            Field::Owner => &self.owner,
            Field::Veterinarian => &self.veterinarian,
            Field::Diagnosis => &self.diagnosis,
            Field::Recommendations => &self.recommendations,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Patient => &mut self.patient,
            Field::Owner => &mut self.owner,
            Field::Veterinarian => &mut self.veterinarian,
            Field::Diagnosis => &mut self.diagnosis,
            Field::Recommendations => &mut self.recommendations,
        }
    }
}

/// An embedded raster image that passed the width filter.
///
/// `bytes` is the image stream exactly as stored in the PDF (still encoded
/// with whatever `/Filter` the producer chose); it is never serialised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCandidate {
    /// 1-indexed page the image is drawn on.
    pub page: u32,
    /// XObject resource name, without the leading slash.
    pub name: String,
    pub width: u32,
    pub height: Option<u32>,
    /// Last entry of the stream's `/Filter`, e.g. `DCTDecode`.
    pub filter: Option<String>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl ImageCandidate {
    /// MIME type implied by the stream filter.
    pub fn mime_type(&self) -> &'static str {
        match self.filter.as_deref() {
            Some("DCTDecode") => "image/jpeg",
            Some("JPXDecode") => "image/jp2",
            _ => "application/octet-stream",
        }
    }

    /// File extension matching [`mime_type`](Self::mime_type).
    pub fn extension(&self) -> &'static str {
        match self.filter.as_deref() {
            Some("DCTDecode") => "jpg",
            Some("JPXDecode") => "jp2",
            _ => "bin",
        }
    }
}

/// Aggregate statistics for one [`ExtractionOutput`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    pub shards: usize,
    pub text_chars: usize,
    pub fields_found: usize,
    pub images_found: usize,
    pub images_skipped: usize,
    pub text_duration_ms: u64,
    pub image_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of running both pipelines over one document.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutput {
    pub fields: FieldRecord,
    /// Joined OCR text the fields were extracted from.
    pub text: String,
    pub images: Vec<ImageCandidate>,
    pub skipped_images: Vec<ImageSkip>,
    pub stats: ExtractionStats,
}
