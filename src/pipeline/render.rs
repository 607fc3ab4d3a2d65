//! Page rasterisation: turn one page into a pixel buffer at the planned DPI.
//!
//! ## Why compute pixels from points?
//!
//! Pages in one document can have different sizes (a landscape insert in a
//! portrait report). Each page gets its own pixel target from its own point
//! size, while the DPI stays the document's plan. The raster is therefore
//! aspect-correct and a fixed physical resolution on every page.

use crate::error::DocumentError;
use crate::output::PageSize;
use crate::pipeline::source::{RasterTarget, SourceDocument};
use image::DynamicImage;
use tracing::debug;

/// Pixel target for a page of `size` at `dpi`.
pub fn raster_target(size: PageSize, dpi: u32) -> RasterTarget {
    let (width_px, height_px) = size.pixel_dimensions(dpi);
    RasterTarget {
        width_px,
        height_px,
    }
}

/// Rasterise the 0-indexed page `index` of `doc`.
///
/// Returns the page's point size alongside the raster so the assembler can
/// size the output page exactly like the source page.
pub fn render_page(
    doc: &dyn SourceDocument,
    index: usize,
    dpi: u32,
) -> Result<(PageSize, DynamicImage), DocumentError> {
    let size = doc.page_size(index)?;
    let target = raster_target(size, dpi);

    let image = doc.render_page(index, target)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DocumentError::Render {
            page: index + 1,
            detail: "engine produced an empty raster".into(),
        });
    }
    if image.width() != target.width_px || image.height() != target.height_px {
        // Engines may round the secondary axis differently; the image is
        // stretched to the page box anyway.
        debug!(
            "Page {}: engine produced {}x{} px for a {}x{} px target",
            index + 1,
            image.width(),
            image.height(),
            target.width_px,
            target.height_px
        );
    }

    debug!(
        "Rendered page {} ({:.1}x{:.1} pt) → {}x{} px @ {} dpi",
        index + 1,
        size.width_pt,
        size.height_pt,
        target.width_px,
        target.height_px,
        dpi
    );

    Ok((size, image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct FixedDoc {
        sizes: Vec<PageSize>,
        /// Render zero-width rasters to mimic a broken engine.
        empty: bool,
    }

    impl SourceDocument for FixedDoc {
        fn page_count(&self) -> usize {
            self.sizes.len()
        }

        fn page_size(&self, index: usize) -> Result<PageSize, DocumentError> {
            self.sizes.get(index).copied().ok_or(DocumentError::Render {
                page: index + 1,
                detail: "no such page".into(),
            })
        }

        fn render_page(
            &self,
            _index: usize,
            t: RasterTarget,
        ) -> Result<DynamicImage, DocumentError> {
            let width = if self.empty { 0 } else { t.width_px };
            Ok(DynamicImage::ImageRgb8(RgbImage::new(width, t.height_px)))
        }
    }

    #[test]
    fn target_for_letter_at_200_dpi() {
        let t = raster_target(PageSize::new(612.0, 792.0), 200);
        assert_eq!((t.width_px, t.height_px), (1700, 2200));
    }

    #[test]
    fn target_for_degenerate_page() {
        let t = raster_target(PageSize::new(0.0, 0.0), 200);
        assert_eq!((t.width_px, t.height_px), (1, 1));
    }

    #[test]
    fn pages_keep_their_own_geometry() {
        let doc = FixedDoc {
            sizes: vec![PageSize::new(72.0, 144.0), PageSize::new(144.0, 72.0)],
            empty: false,
        };
        let (s0, img0) = render_page(&doc, 0, 100).unwrap();
        let (s1, img1) = render_page(&doc, 1, 100).unwrap();
        assert_eq!(s0, PageSize::new(72.0, 144.0));
        assert_eq!((img0.width(), img0.height()), (100, 200));
        assert_eq!(s1, PageSize::new(144.0, 72.0));
        assert_eq!((img1.width(), img1.height()), (200, 100));
    }

    #[test]
    fn empty_raster_is_a_render_error() {
        let doc = FixedDoc {
            sizes: vec![PageSize::new(72.0, 72.0)],
            empty: true,
        };
        let err = render_page(&doc, 0, 72).unwrap_err();
        assert!(matches!(err, DocumentError::Render { page: 1, .. }), "got {err:?}");
    }

    #[test]
    fn missing_page_propagates() {
        let doc = FixedDoc {
            sizes: vec![],
            empty: false,
        };
        assert!(render_page(&doc, 0, 72).is_err());
    }
}
