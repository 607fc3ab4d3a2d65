//! # pdf-flatten
//!
//! Flatten PDF documents into image-only PDFs: every page is rasterised and
//! replaced by a single full-page JPEG.
//!
//! ## Why flatten?
//!
//! A flattened PDF carries no selectable text, vector content, form fields,
//! annotations, scripts or document metadata. What a reader sees is all
//! that remains, which makes it a simple way to sanitise documents before
//! sharing them or to normalise documents that render inconsistently.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDFs
//!  │
//!  ├─ 1. Input    read files / scan directories for *.pdf
//!  ├─ 2. Scan     page count + first-page size per document (concurrent)
//!  ├─ 3. Plan     DPI and JPEG quality from page size and memory hint
//!  ├─ 4. Render   rasterise page by page via pdfium (spawn_blocking)
//!  ├─ 5. Encode   raster → JPEG at the planned quality
//!  ├─ 6. Assemble one full-bleed image per page into a fresh PDF (lopdf)
//!  └─ 7. Archive  every successful output into one zip
//! ```
//!
//! Documents are converted one at a time. A document that fails is reported
//! and skipped; the rest of the batch still completes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_flatten::{convert_paths, FlattenConfig};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FlattenConfig::default();
//!     let output = convert_paths(&[PathBuf::from("scans/")], &config).await?;
//!     std::fs::write(&output.archive_name, &output.archive)?;
//!     eprintln!(
//!         "{} flattened, {} failed",
//!         output.stats.succeeded, output.stats.failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-flatten` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-flatten = { version = "0.1", default-features = false }
//! ```
//!
//! ## Resolution planning
//!
//! | Memory hint | Pixel budget | JPEG quality |
//! |-------------|--------------|--------------|
//! | < 4 GB      | 6 MP         | 86%          |
//! | 4–6 GB      | 9 MP         | 88%          |
//! | 6–8 GB      | 12 MP        | 90%          |
//! | ≥ 8 GB      | 16 MP        | 90%          |
//!
//! DPI targets 200 and is capped by the budget, never dropping below 130
//! unless [`BudgetPolicy::StrictBudget`] is selected.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BudgetPolicy, CancelFlag, FlattenConfig, FlattenConfigBuilder};
pub use convert::{
    convert_batch, convert_document, convert_paths, convert_sync, convert_to_file,
    flatten_document, inspect, read_metadata, write_documents,
};
pub use error::{DocumentError, FlattenError};
pub use output::{
    BatchOutput, BatchStats, ConversionResult, DocumentInfo, DocumentMetadata, DocumentState,
    FlattenedDocument, PageSize, SourceFile,
};
pub use pipeline::pdfium::PdfiumBackend;
pub use pipeline::source::{PdfBackend, RasterTarget, SourceDocument};
pub use planner::{plan, plan_with_policy, RenderPlan};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback, ProgressEvent};
pub use stream::{convert_batch_stream, BatchEvent, BatchEventStream};
