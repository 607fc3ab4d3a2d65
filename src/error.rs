//! Error types for the pdf-flatten library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`FlattenError`] — **Fatal**: the batch cannot proceed or cannot be
//!   delivered (no readable inputs, pdfium unavailable, the final archive
//!   could not be produced). Returned as `Err(FlattenError)` from the
//!   top-level `convert*` functions.
//!
//! * [`DocumentError`] — **Document-scoped**: one document failed to decode,
//!   render, encode or assemble. Stored inside
//!   [`crate::output::ConversionResult`]; the batch moves on to the next
//!   document.
//!
//! No stage is retried. A document that fails is recorded once and the
//! orchestrator never revisits it.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-flatten library.
///
/// Per-document failures use [`DocumentError`] and are stored in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum FlattenError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// None of the supplied inputs looks like a PDF.
    #[error("No PDF inputs among {given} supplied file(s)")]
    NoPdfInputs { given: usize },

    /// A single-document conversion failed (see [`crate::convert::convert_document`]).
    #[error("Failed to flatten '{name}': {source}")]
    ConversionFailed {
        name: String,
        #[source]
        source: DocumentError,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The combined archive could not be produced after all documents ran.
    #[error("Failed to build archive '{name}': {detail}")]
    ArchiveFailed { name: String, detail: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib), or place\n\
the platform library next to the executable.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A document-scoped failure.
///
/// Any of these terminates processing of one document only. The
/// orchestrator records it in the document's
/// [`crate::output::ConversionResult`] and continues with the next input.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The bytes could not be opened as a PDF (corrupt, encrypted, not a PDF).
    #[error("decode failed: {detail}")]
    Decode { detail: String },

    /// A page could not be rasterised.
    #[error("page {page}: rasterisation failed: {detail}")]
    Render { page: usize, detail: String },

    /// A rendered page could not be compressed.
    #[error("page {page}: image encoding failed: {detail}")]
    Encode { page: usize, detail: String },

    /// The output document could not be built or serialised.
    #[error("output assembly failed: {detail}")]
    Assembly { detail: String },

    /// The caller raised the cancel flag before this document finished.
    #[error("cancelled")]
    Cancelled,

    /// The blocking worker running this document panicked or was aborted.
    #[error("worker task failed: {detail}")]
    Worker { detail: String },
}

impl DocumentError {
    /// Short machine-friendly label, used in JSON reports and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Decode { .. } => "decode",
            DocumentError::Render { .. } => "render",
            DocumentError::Encode { .. } => "encode",
            DocumentError::Assembly { .. } => "assembly",
            DocumentError::Cancelled => "cancelled",
            DocumentError::Worker { .. } => "worker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_inputs_display() {
        let e = FlattenError::NoPdfInputs { given: 3 };
        assert!(e.to_string().contains("3 supplied"), "got: {e}");
    }

    #[test]
    fn archive_failed_display() {
        let e = FlattenError::ArchiveFailed {
            name: "flattened.zip".into(),
            detail: "disk full".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("flattened.zip"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn render_error_names_page() {
        let e = DocumentError::Render {
            page: 4,
            detail: "bitmap alloc".into(),
        };
        assert!(e.to_string().contains("page 4"));
        assert_eq!(e.kind(), "render");
    }

    #[test]
    fn document_error_round_trips_through_json() {
        let e = DocumentError::Encode {
            page: 2,
            detail: "too large".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: DocumentError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn cancelled_kind() {
        assert_eq!(DocumentError::Cancelled.kind(), "cancelled");
        assert_eq!(DocumentError::Cancelled.to_string(), "cancelled");
    }
}
