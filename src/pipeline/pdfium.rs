//! pdfium-backed implementation of [`PdfBackend`].
//!
//! ## Why bind per document?
//!
//! pdfium keeps thread-local state and its document handles are not `Send`.
//! Each [`PdfBackend::with_document`] call runs on a `spawn_blocking`
//! thread, binds the library there, opens the document, and drops both
//! before returning. Nothing pdfium-owned crosses a thread boundary.

use crate::error::{DocumentError, FlattenError};
use crate::output::PageSize;
use crate::pipeline::source::{PdfBackend, RasterTarget, SourceDocument};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Decode/render engine backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Use an explicit library file, or search the usual places when `None`.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    /// Like [`PdfiumBackend::new`], honouring `PDFIUM_LIB_PATH` when no path is given.
    pub fn from_env(library_path: Option<PathBuf>) -> Self {
        let library_path = library_path.or_else(|| {
            std::env::var(PDFIUM_LIB_PATH_ENV)
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
        });
        Self { library_path }
    }

    /// Bind once up front so a missing library is reported as a batch error
    /// instead of failing every document with the same decode message.
    pub fn probe(&self) -> Result<(), FlattenError> {
        self.bind().map(|_| ()).map_err(FlattenError::PdfiumBindingFailed)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        if let Some(ref path) = self.library_path {
            return Pdfium::bind_to_library(path)
                .map(Pdfium::new)
                .map_err(|e| format!("{}: {e}", path.display()));
        }

        for dir in search_dirs() {
            let candidate = Pdfium::pdfium_platform_library_name_at_path(&dir);
            if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
                debug!("Bound pdfium from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
        }

        Pdfium::bind_to_system_library()
            .map(Pdfium::new)
            .map_err(|e| e.to_string())
    }
}

/// Directories probed before falling back to the system library.
fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            dirs.push(exe_dir.join("libs"));
            dirs.push(exe_dir.to_path_buf());

            #[cfg(target_os = "macos")]
            if let Some(contents) = exe_dir.parent() {
                dirs.push(contents.join("Resources"));
            }
        }
    }

    dirs.push(PathBuf::from("libs"));
    dirs.push(PathBuf::from("./"));
    dirs
}

impl PdfBackend for PdfiumBackend {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn with_document(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        body: &mut dyn FnMut(&dyn SourceDocument) -> Result<(), DocumentError>,
    ) -> Result<(), DocumentError> {
        let pdfium = self.bind().map_err(|detail| DocumentError::Decode {
            detail: format!("pdfium unavailable: {detail}"),
        })?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| decode_error(e, password.is_some()))?;

        let source = PdfiumDocument { document };
        info!("PDF loaded: {} pages", source.page_count());

        // `source` drops before `pdfium`: the document never outlives its binding.
        body(&source)
    }
}

fn decode_error(err: PdfiumError, had_password: bool) -> DocumentError {
    let text = format!("{err:?}");
    let detail = if text.contains("Password") || text.contains("password") {
        if had_password {
            "wrong password".to_string()
        } else {
            "document is encrypted and requires a password".to_string()
        }
    } else {
        text
    };
    DocumentError::Decode { detail }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, String> {
        let index = u16::try_from(index).map_err(|_| format!("page index {index} out of range"))?;
        self.document.pages().get(index).map_err(|e| format!("{e:?}"))
    }
}

impl SourceDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_size(&self, index: usize) -> Result<PageSize, DocumentError> {
        let page = self.page(index).map_err(|detail| DocumentError::Render {
            page: index + 1,
            detail,
        })?;
        Ok(PageSize::new(page.width().value, page.height().value))
    }

    fn render_page(
        &self,
        index: usize,
        target: RasterTarget,
    ) -> Result<DynamicImage, DocumentError> {
        let page = self.page(index).map_err(|detail| DocumentError::Render {
            page: index + 1,
            detail,
        })?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(target.width_px as i32)
            .set_target_height(target.height_px as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| DocumentError::Render {
                page: index + 1,
                detail: format!("{e:?}"),
            })?;

        Ok(bitmap.as_image())
    }
}
