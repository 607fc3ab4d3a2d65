//! Shared fixtures: PDFs built with lopdf and a lopdf-backed engine.
//!
//! The engine reads real PDF structure (page tree, MediaBox) but "renders"
//! plain white rasters, so batch behaviour can be tested without pdfium.

#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use pdf_flatten::{DocumentError, PageSize, PdfBackend, RasterTarget, SourceDocument, SourceFile};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};

pub const LETTER: (f32, f32) = (612.0, 792.0);
pub const A4_LANDSCAPE: (f32, f32) = (842.0, 595.0);

/// A PDF with one text line per page, pages sized as given.
pub fn make_pdf(pages: &[(f32, f32)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for (n, &(w, h)) in pages.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![36.into(), 36.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n + 1))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(w), Object::Real(h)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("fixture saves");
    out
}

pub fn pdf_file(name: &str, pages: &[(f32, f32)]) -> SourceFile {
    SourceFile::new(name, make_pdf(pages))
}

pub fn corrupt_file(name: &str) -> SourceFile {
    SourceFile::new(name, b"%PDF-1.7\nthis is not really a pdf".to_vec())
}

/// Engine backed by lopdf.
#[derive(Default)]
pub struct LopdfBackend {
    /// 1-indexed page that fails to render in every document.
    pub fail_page: Option<usize>,
    /// Number of `with_document` calls.
    pub opened: AtomicUsize,
}

impl LopdfBackend {
    pub fn failing_on(page: usize) -> Self {
        Self {
            fail_page: Some(page),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct LopdfDoc {
    doc: Document,
    pages: Vec<ObjectId>,
    fail_page: Option<usize>,
}

impl SourceDocument for LopdfDoc {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageSize, DocumentError> {
        let render_err = |detail: String| DocumentError::Render {
            page: index + 1,
            detail,
        };
        let id = *self.pages.get(index).ok_or_else(|| render_err("no such page".into()))?;
        let mb = media_box(&self.doc, id).map_err(render_err)?;
        Ok(PageSize::new(mb[2] - mb[0], mb[3] - mb[1]))
    }

    fn render_page(
        &self,
        index: usize,
        target: RasterTarget,
    ) -> Result<DynamicImage, DocumentError> {
        if self.fail_page == Some(index + 1) {
            return Err(DocumentError::Render {
                page: index + 1,
                detail: "simulated rasteriser failure".into(),
            });
        }
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            target.width_px,
            target.height_px,
            Rgb([255, 255, 255]),
        )))
    }
}

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &str {
        "lopdf-test"
    }

    fn with_document(
        &self,
        bytes: &[u8],
        _password: Option<&str>,
        body: &mut dyn FnMut(&dyn SourceDocument) -> Result<(), DocumentError>,
    ) -> Result<(), DocumentError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Decode {
            detail: e.to_string(),
        })?;
        let pages = doc.get_pages().into_values().collect();
        body(&LopdfDoc {
            doc,
            pages,
            fail_page: self.fail_page,
        })
    }
}

/// `[x0, y0, x1, y1]` of a page's MediaBox.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Result<[f32; 4], String> {
    let page = doc.get_dictionary(page_id).map_err(|e| e.to_string())?;
    let arr = page
        .get(b"MediaBox")
        .and_then(Object::as_array)
        .map_err(|e| e.to_string())?;
    if arr.len() != 4 {
        return Err(format!("MediaBox has {} entries", arr.len()));
    }
    let mut out = [0.0f32; 4];
    for (slot, obj) in out.iter_mut().zip(arr) {
        *slot = match obj {
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            other => return Err(format!("unexpected MediaBox entry {other:?}")),
        };
    }
    Ok(out)
}

/// `(name, bytes)` of every archive entry, in order.
pub fn archive_entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).expect("valid zip");
    (0..zip.len())
        .map(|i| {
            let mut f = zip.by_index(i).expect("entry");
            let mut data = Vec::new();
            f.read_to_end(&mut data).expect("entry reads");
            (f.name().to_string(), data)
        })
        .collect()
}
