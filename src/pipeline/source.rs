//! The decode/render seam: how the pipeline talks to a PDF engine.
//!
//! [`PdfBackend`] opens a document for the duration of a closure and closes
//! it on every exit path, success or failure. The pipeline never holds an
//! engine handle beyond that scope, so a failed page cannot leak decoder
//! state into the next document.
//!
//! The production implementation is [`crate::pipeline::pdfium::PdfiumBackend`];
//! tests plug in lighter engines through
//! [`crate::config::FlattenConfigBuilder::backend`].

use crate::error::DocumentError;
use crate::output::PageSize;
use image::DynamicImage;

/// Pixel target for one page raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterTarget {
    pub width_px: u32,
    pub height_px: u32,
}

/// An open source document.
///
/// Page indices are 0-based here; user-facing messages use 1-based numbers.
pub trait SourceDocument {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Size of a page at scale 1, in points.
    fn page_size(&self, index: usize) -> Result<PageSize, DocumentError>;

    /// Rasterise a page into a fresh buffer of exactly `target` dimensions.
    fn render_page(
        &self,
        index: usize,
        target: RasterTarget,
    ) -> Result<DynamicImage, DocumentError>;
}

/// A PDF decode/render engine.
pub trait PdfBackend: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Decode `bytes`, run `body` against the open document, then release it.
    ///
    /// Errors from `body` are returned unchanged. Decode failures surface as
    /// [`DocumentError::Decode`].
    fn with_document(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        body: &mut dyn FnMut(&dyn SourceDocument) -> Result<(), DocumentError>,
    ) -> Result<(), DocumentError>;
}
