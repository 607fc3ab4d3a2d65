//! Output assembly: build an image-only PDF, one full-bleed JPEG per page.
//!
//! The output is built from scratch with lopdf rather than edited from the
//! source, so nothing from the source survives: no text, fonts, vector
//! content, annotations, forms, outlines or document metadata. Each page is
//! `MediaBox [0 0 w h]` with a single `DCTDecode` image XObject drawn by
//! `q w 0 0 h 0 0 cm /Im0 Do Q`.

use crate::error::DocumentError;
use crate::output::PageSize;
use crate::pipeline::encode::EncodedImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

const IMAGE_NAME: &str = "Im0";

/// An output PDF under construction.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    /// Start an empty document.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
        }
    }

    /// Pages appended so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append a page of exactly `size` points, covered edge to edge by `image`.
    pub fn add_image_page(
        &mut self,
        size: PageSize,
        image: EncodedImage,
    ) -> Result<(), DocumentError> {
        let (w, h) = (size.width_pt, size.height_pt);
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(DocumentError::Assembly {
                detail: format!("invalid page size {w}x{h} pt"),
            });
        }

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width_px as i64,
                "Height" => image.height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![Object::Real(w), 0.into(), 0.into(), Object::Real(h), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode().map_err(|e| DocumentError::Assembly {
            detail: format!("content stream: {e}"),
        })?;
        let content_id = self
            .doc
            .add_object(Stream::new(lopdf::Dictionary::new(), content_bytes));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(w), Object::Real(h)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    IMAGE_NAME => image_id,
                },
            },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Close the page tree and serialise.
    pub fn finish(mut self) -> Result<Vec<u8>, DocumentError> {
        if self.page_ids.is_empty() {
            return Err(DocumentError::Assembly {
                detail: "document has no pages".into(),
            });
        }

        let kids: Vec<Object> = self.page_ids.iter().copied().map(Object::Reference).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| DocumentError::Assembly {
                detail: format!("serialise: {e}"),
            })?;
        Ok(out)
    }
}
