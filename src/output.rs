//! Data model shared by the pipeline stages and returned to callers.
//!
//! Binary payloads (`Vec<u8>`) are skipped when serialising so a JSON report
//! of a batch stays small; sizes are reported instead.

use crate::error::DocumentError;
use crate::planner::RenderPlan;
use serde::{Deserialize, Serialize};

const POINTS_PER_INCH: f32 = 72.0;

/// One input document: a file name and its raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Physical page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    /// Raster dimensions at `dpi`, each rounded and at least 1 pixel.
    pub fn pixel_dimensions(&self, dpi: u32) -> (u32, u32) {
        (
            points_to_pixels(self.width_pt, dpi),
            points_to_pixels(self.height_pt, dpi),
        )
    }
}

fn points_to_pixels(points: f32, dpi: u32) -> u32 {
    let px = (points as f64 / POINTS_PER_INCH as f64 * dpi as f64).round();
    if px.is_finite() && px >= 1.0 {
        px.min(u32::MAX as f64) as u32
    } else {
        1
    }
}

/// What the pre-scan learns about a document without rendering it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub page_count: usize,
    pub first_page: PageSize,
    /// Plan derived from `first_page`; reused for every page.
    pub plan: RenderPlan,
}

/// Pre-scan report for one input, as returned by [`crate::convert::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub size_bytes: usize,
    pub metadata: Option<DocumentMetadata>,
    pub error: Option<DocumentError>,
}

/// A successfully flattened document.
#[derive(Debug, Clone)]
pub struct FlattenedDocument {
    /// Output file name (source stem + suffix + `.pdf`).
    pub name: String,
    /// Serialised PDF.
    pub payload: Vec<u8>,
    pub page_count: usize,
    pub plan: RenderPlan,
}

/// Lifecycle of one document inside a batch.
///
/// ```text
/// Pending ─▶ MetadataRead ─▶ Converting(1) ─▶ … ─▶ Converting(n) ─▶ Completed
///               │                 │
///               └──────▶ Failed ◀─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentState {
    Pending,
    MetadataRead,
    /// Working on this 1-indexed page.
    Converting(usize),
    Completed,
    Failed,
}

impl DocumentState {
    /// Whether moving from `self` to `next` is a legal step.
    ///
    /// `Completed` is only reachable from `Converting`; pages advance one at
    /// a time; `Failed` is reachable from `MetadataRead` or any
    /// `Converting` step. `Pending → Failed` is reserved for a document
    /// cancelled before being opened; a document that cannot be decoded
    /// fails from `MetadataRead`.
    pub fn can_transition_to(&self, next: DocumentState) -> bool {
        use DocumentState::*;
        match (*self, next) {
            (Pending, MetadataRead) | (Pending, Failed) => true,
            (MetadataRead, Converting(1)) | (MetadataRead, Failed) => true,
            (Converting(p), Converting(q)) => q == p + 1,
            (Converting(_), Completed) | (Converting(_), Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentState::Completed | DocumentState::Failed)
    }
}

/// Outcome for one input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Name of the input file.
    pub source_name: String,
    /// Output file name, unique within the batch and identical to the
    /// archive entry; equals `source_name` when the document failed.
    pub name: String,
    /// Serialised PDF; `None` on failure.
    #[serde(skip)]
    pub payload: Option<Vec<u8>>,
    /// Size of `payload` in bytes (0 on failure).
    pub payload_bytes: usize,
    pub page_count: usize,
    pub plan: Option<RenderPlan>,
    pub error: Option<DocumentError>,
    pub duration_ms: u64,
}

impl ConversionResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.payload.is_some()
    }

    pub(crate) fn success(source_name: &str, doc: FlattenedDocument, duration_ms: u64) -> Self {
        Self {
            source_name: source_name.to_string(),
            payload_bytes: doc.payload.len(),
            name: doc.name,
            page_count: doc.page_count,
            plan: Some(doc.plan),
            payload: Some(doc.payload),
            error: None,
            duration_ms,
        }
    }

    pub(crate) fn failure(source_name: &str, error: DocumentError, duration_ms: u64) -> Self {
        Self {
            source_name: source_name.to_string(),
            name: source_name.to_string(),
            payload: None,
            payload_bytes: 0,
            page_count: 0,
            plan: None,
            error: Some(error),
            duration_ms,
        }
    }
}

/// Aggregate numbers for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    pub documents_total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sum of page counts found by the pre-scan.
    pub pages_total: usize,
    /// Pages embedded across all successful outputs.
    pub pages_converted: usize,
    pub archive_bytes: usize,
    pub total_duration_ms: u64,
    pub archive_duration_ms: u64,
}

/// Everything a batch produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutput {
    /// One entry per input, in input order.
    pub results: Vec<ConversionResult>,
    /// Zip archive of every successful payload.
    #[serde(skip)]
    pub archive: Vec<u8>,
    pub archive_name: String,
    /// Plan of the first document whose metadata could be read. Display only;
    /// every document is converted with its own plan.
    pub sample_plan: Option<RenderPlan>,
    pub stats: BatchStats,
}

impl BatchOutput {
    pub fn successes(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|r| r.succeeded())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|r| !r.succeeded())
    }
}
