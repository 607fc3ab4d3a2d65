//! Progress-callback trait for batch and per-page conversion events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::FlattenConfigBuilder::progress_callback`] to receive
//! events while a batch runs. Callers forward them wherever they like: a
//! terminal progress bar, a channel (see [`crate::stream`]), a job record.
//!
//! # Example
//!
//! ```rust
//! use pdf_flatten::{BatchProgressCallback, FlattenConfig, ProgressEvent};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl BatchProgressCallback for Printer {
//!     fn on_progress(&self, event: ProgressEvent) {
//!         eprintln!("{}% ({}/{} pages)", event.percent(), event.pages_completed, event.pages_total);
//!     }
//! }
//!
//! let config = FlattenConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lowest percentage reported while pages are being converted.
pub const PERCENT_FLOOR: u8 = 5;

/// Highest percentage reported while pages are being converted; the rest of
/// the range is left for archive packaging.
pub const PERCENT_CEILING: u8 = 97;

/// Batch-wide progress snapshot.
///
/// `pages_completed` counts pages that are settled: converted, or abandoned
/// because their document failed. It never decreases within a batch and
/// equals `pages_total` once every document has been attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub documents_total: usize,
    pub documents_completed: usize,
    pub pages_total: usize,
    pub pages_completed: usize,
}

impl ProgressEvent {
    /// Completion percentage clamped to the 5–97 visible range.
    pub fn percent(&self) -> u8 {
        let total = self.pages_total.max(1) as f64;
        let pct = (self.pages_completed as f64 / total * 100.0).round();
        pct.clamp(PERCENT_FLOOR as f64, PERCENT_CEILING as f64) as u8
    }
}

/// Called by the pipeline as it works through a batch.
///
/// Implementations must be `Send + Sync`: page events fire from the blocking
/// worker thread that owns the current document. All methods have no-op
/// defaults so callers only override what they care about.
///
/// Events arrive in order; conversion is sequential, so no two calls overlap.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after the metadata pre-scan.
    ///
    /// # Arguments
    /// * `documents_total` — inputs in the batch
    /// * `pages_total`     — sum of page counts that could be read
    fn on_batch_start(&self, documents_total: usize, pages_total: usize) {
        let _ = (documents_total, pages_total);
    }

    /// Called before a document is opened for conversion.
    ///
    /// # Arguments
    /// * `index`      — 0-based position in the batch
    /// * `name`       — source file name
    /// * `page_count` — pages found by the pre-scan (0 if unreadable)
    fn on_document_start(&self, index: usize, name: &str, page_count: usize) {
        let _ = (index, name, page_count);
    }

    /// Called whenever the batch-wide page counter advances.
    fn on_progress(&self, event: ProgressEvent) {
        let _ = event;
    }

    /// Called when a document has been converted.
    ///
    /// # Arguments
    /// * `index`         — 0-based position in the batch
    /// * `output_name`   — file name of the flattened PDF
    /// * `page_count`    — pages in the output
    /// * `payload_bytes` — size of the serialised PDF
    fn on_document_complete(
        &self,
        index: usize,
        output_name: &str,
        page_count: usize,
        payload_bytes: usize,
    ) {
        let _ = (index, output_name, page_count, payload_bytes);
    }

    /// Called when a document fails; the batch continues.
    fn on_document_error(&self, index: usize, name: &str, error: &str) {
        let _ = (index, name, error);
    }

    /// Called once before the combined archive is built.
    fn on_archive_start(&self, entries: usize) {
        let _ = entries;
    }

    /// Called once after the archive is ready.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::FlattenConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
