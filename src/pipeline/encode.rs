//! Image encoding: rendered page → baseline JPEG at the planned quality.
//!
//! JPEG is the right trade here: a flattened page is a photograph of the
//! page, and the output PDF embeds the bytes verbatim (`DCTDecode`), so no
//! second compression pass is needed. Alpha is dropped; pdfium renders onto
//! an opaque white background.

use crate::error::DocumentError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use tracing::debug;

/// A compressed page raster, ready to embed.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub width_px: u32,
    pub height_px: u32,
    /// Baseline JPEG bytes (RGB, 8 bits per component).
    pub jpeg: Vec<u8>,
}

/// Largest edge a baseline JPEG can describe.
pub const MAX_JPEG_EDGE: u32 = u16::MAX as u32;

/// Encode a rendered page as an RGB JPEG.
///
/// `quality` is on the 1–100 scale; `page` (1-indexed) only labels errors.
pub fn encode_page(
    img: &DynamicImage,
    quality: u8,
    page: usize,
) -> Result<EncodedImage, DocumentError> {
    let rgb = img.to_rgb8();
    let (width_px, height_px) = rgb.dimensions();

    if width_px > MAX_JPEG_EDGE || height_px > MAX_JPEG_EDGE {
        return Err(DocumentError::Encode {
            page,
            detail: format!(
                "{width_px}x{height_px} px exceeds the JPEG limit of {MAX_JPEG_EDGE} px per edge"
            ),
        });
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), width_px, height_px, ExtendedColorType::Rgb8)
        .map_err(|e| DocumentError::Encode {
            page,
            detail: e.to_string(),
        })?;

    debug!("Encoded page {} → {} bytes JPEG (q={})", page, jpeg.len(), quality);

    Ok(EncodedImage {
        width_px,
        height_px,
        jpeg,
    })
}
