//! Conversion entry points: one document, a batch, or paths on disk.
//!
//! ## Execution model
//!
//! Metadata is read for every document first, up to
//! [`FlattenConfig::metadata_concurrency`] at a time; it is read-only and
//! cheap. Conversion then runs one document at a time and one page at a
//! time, each document on a `spawn_blocking` thread. Peak memory is bounded
//! by a single page raster plus the output document being built.
//!
//! A failing document becomes a failed [`ConversionResult`]; the batch moves
//! on. Only the final archive is batch-fatal.

use crate::config::FlattenConfig;
use crate::error::{DocumentError, FlattenError};
use crate::output::{
    BatchOutput, BatchStats, ConversionResult, DocumentInfo, DocumentMetadata, DocumentState,
    FlattenedDocument, PageSize, SourceFile,
};
use crate::pipeline::archive::{build_archive, unique_entry_name};
use crate::pipeline::assemble::OutputDocument;
use crate::pipeline::pdfium::PdfiumBackend;
use crate::pipeline::source::PdfBackend;
use crate::pipeline::{encode, input, render};
use crate::planner::{self, RenderPlan};
use crate::progress::{BatchProgressCallback, NoopProgressCallback, ProgressEvent};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

// ── Blocking core ────────────────────────────────────────────────────────

/// Flatten one document on the current thread.
///
/// The plan is `plan_hint`, else the configured fixed plan, else computed
/// from page 1. `on_page(page, page_count)` fires after each page has been
/// embedded. The cancel flag is checked before every page.
///
/// Blocking: call from `spawn_blocking` or a plain thread.
pub fn flatten_document(
    backend: &dyn PdfBackend,
    source: &SourceFile,
    plan_hint: Option<RenderPlan>,
    config: &FlattenConfig,
    on_page: &mut dyn FnMut(usize, usize),
) -> Result<FlattenedDocument, DocumentError> {
    let mut state = StateTracker::new(&source.name);
    if config.cancel.is_cancelled() {
        state.fail(&DocumentError::Cancelled);
        return Err(DocumentError::Cancelled);
    }

    let mut flattened = None;
    let outcome = backend.with_document(&source.bytes, config.password.as_deref(), &mut |doc| {
        let page_count = doc.page_count();
        if page_count == 0 {
            return Err(no_pages());
        }
        state.advance(DocumentState::MetadataRead);

        let plan = match plan_hint.or(config.fixed_plan) {
            Some(plan) => plan,
            None => {
                let memory_gb = planner::resolve_memory_gb(config.memory_gb);
                plan_for(doc.page_size(0)?, config, memory_gb)
            }
        };
        debug!("{}: {} pages, plan {}", source.name, page_count, plan);

        let mut output = OutputDocument::new();
        for index in 0..page_count {
            if config.cancel.is_cancelled() {
                return Err(DocumentError::Cancelled);
            }
            state.advance(DocumentState::Converting(index + 1));

            let (size, image) = render::render_page(doc, index, plan.dpi)?;
            let encoded = encode::encode_page(&image, plan.jpeg_quality(), index + 1)?;
            drop(image);
            output.add_image_page(size, encoded)?;

            on_page(index + 1, page_count);
        }

        flattened = Some(FlattenedDocument {
            name: input::output_name(&source.name, &config.output_suffix),
            payload: output.finish()?,
            page_count,
            plan,
        });
        Ok(())
    });

    match (outcome, flattened) {
        (Ok(()), Some(doc)) => {
            state.advance(DocumentState::Completed);
            Ok(doc)
        }
        (Ok(()), None) => {
            let e = DocumentError::Decode {
                detail: format!("{} backend never opened the document", backend.name()),
            };
            state.fail(&e);
            Err(e)
        }
        (Err(e), _) => {
            state.fail(&e);
            Err(e)
        }
    }
}

/// Read page count and first-page geometry, and derive the plan.
///
/// Blocking, like [`flatten_document`].
pub fn scan_document(
    backend: &dyn PdfBackend,
    source: &SourceFile,
    config: &FlattenConfig,
    memory_gb: f64,
) -> Result<DocumentMetadata, DocumentError> {
    let mut found = None;
    backend.with_document(&source.bytes, config.password.as_deref(), &mut |doc| {
        let page_count = doc.page_count();
        if page_count == 0 {
            return Err(no_pages());
        }
        let first_page = doc.page_size(0)?;
        let plan = config
            .fixed_plan
            .unwrap_or_else(|| plan_for(first_page, config, memory_gb));
        found = Some(DocumentMetadata {
            page_count,
            first_page,
            plan,
        });
        Ok(())
    })?;

    found.ok_or_else(|| DocumentError::Decode {
        detail: format!("{} backend never opened the document", backend.name()),
    })
}

fn plan_for(first_page: PageSize, config: &FlattenConfig, memory_gb: f64) -> RenderPlan {
    planner::plan_with_policy(
        first_page.width_pt,
        first_page.height_pt,
        memory_gb,
        config.budget_policy,
    )
}

fn no_pages() -> DocumentError {
    DocumentError::Decode {
        detail: "document has no pages".into(),
    }
}

/// Follows one document through [`DocumentState`], checking every step.
struct StateTracker<'a> {
    name: &'a str,
    history: Vec<DocumentState>,
}

impl<'a> StateTracker<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            history: vec![DocumentState::Pending],
        }
    }

    fn current(&self) -> DocumentState {
        self.history
            .last()
            .copied()
            .unwrap_or(DocumentState::Pending)
    }

    fn advance(&mut self, next: DocumentState) {
        let state = self.current();
        debug_assert!(
            state.can_transition_to(next),
            "{}: illegal transition {:?} → {:?}",
            self.name,
            state,
            next
        );
        trace!("{}: {:?} → {:?}", self.name, state, next);
        self.history.push(next);
    }

    /// Move to `Failed`. A document that was never read fails from
    /// `MetadataRead` unless it was cancelled before being opened.
    fn fail(&mut self, error: &DocumentError) {
        if self.current() == DocumentState::Pending && *error != DocumentError::Cancelled {
            self.advance(DocumentState::MetadataRead);
        }
        self.advance(DocumentState::Failed);
    }
}

// ── Async entry points ───────────────────────────────────────────────────

/// Flatten a single document.
///
/// # Errors
/// [`FlattenError::ConversionFailed`] wraps the document's failure; backend
/// binding problems surface as [`FlattenError::PdfiumBindingFailed`].
pub async fn convert_document(
    source: SourceFile,
    config: &FlattenConfig,
) -> Result<FlattenedDocument, FlattenError> {
    let backend = resolve_backend(config).await?;
    let name = source.name.clone();
    let cfg = config.clone();

    let result = tokio::task::spawn_blocking(move || {
        flatten_document(backend.as_ref(), &source, None, &cfg, &mut |_, _| {})
    })
    .await
    .unwrap_or_else(|e| Err(worker_error(e)));

    result.map_err(|source| FlattenError::ConversionFailed { name, source })
}

/// Read one document's metadata without rendering anything.
pub async fn read_metadata(
    source: &SourceFile,
    config: &FlattenConfig,
) -> Result<DocumentMetadata, FlattenError> {
    let backend = resolve_backend(config).await?;
    let memory_gb = planner::resolve_memory_gb(config.memory_gb);
    let name = source.name.clone();
    let mut results = prescan(backend, &[Arc::new(source.clone())], config, memory_gb).await;

    results
        .pop()
        .unwrap_or_else(|| Err(no_pages()))
        .map_err(|source| FlattenError::ConversionFailed { name, source })
}

/// Pre-scan files on disk: page count, first-page size and plan per input.
pub async fn inspect(
    paths: &[PathBuf],
    config: &FlattenConfig,
) -> Result<Vec<DocumentInfo>, FlattenError> {
    let files = input::read_inputs(paths).await?;
    let backend = resolve_backend(config).await?;
    let memory_gb = planner::resolve_memory_gb(config.memory_gb);
    let sources: Vec<Arc<SourceFile>> = files.into_iter().map(Arc::new).collect();

    let scanned = prescan(backend, &sources, config, memory_gb).await;
    Ok(sources
        .iter()
        .zip(scanned)
        .map(|(src, meta)| {
            let (metadata, error) = match meta {
                Ok(m) => (Some(m), None),
                Err(e) => (None, Some(e)),
            };
            DocumentInfo {
                name: src.name.clone(),
                size_bytes: src.bytes.len(),
                metadata,
                error,
            }
        })
        .collect())
}

/// Flatten a batch of in-memory documents and package the results.
///
/// Returns `Ok` even when some or all documents fail; inspect
/// [`BatchOutput::failures`]. The archive holds every successful output.
///
/// # Errors
/// * [`FlattenError::NoPdfInputs`] for an empty batch.
/// * [`FlattenError::PdfiumBindingFailed`] when no engine is available.
/// * [`FlattenError::ArchiveFailed`] when packaging fails.
pub async fn convert_batch(
    files: Vec<SourceFile>,
    config: &FlattenConfig,
) -> Result<BatchOutput, FlattenError> {
    let total_start = Instant::now();
    if files.is_empty() {
        return Err(FlattenError::NoPdfInputs { given: 0 });
    }

    let backend = resolve_backend(config).await?;
    let memory_gb = planner::resolve_memory_gb(config.memory_gb);
    let callback: Arc<dyn BatchProgressCallback> = match config.progress_callback {
        Some(ref cb) => Arc::clone(cb),
        None => Arc::new(NoopProgressCallback),
    };

    let sources: Vec<Arc<SourceFile>> = files.into_iter().map(Arc::new).collect();
    let documents_total = sources.len();
    info!(
        "Starting batch: {} document(s) via {}, memory hint {:.1} GB",
        documents_total,
        backend.name(),
        memory_gb
    );

    // ── Step 1: Metadata pre-scan ────────────────────────────────────────
    let metadata = prescan(Arc::clone(&backend), &sources, config, memory_gb).await;
    let pages_total: usize = metadata.iter().flatten().map(|m| m.page_count).sum();
    let sample_plan = metadata.iter().flatten().map(|m| m.plan).next();
    if let Some(plan) = sample_plan {
        info!("Batch plan: {}", plan);
    }
    callback.on_batch_start(documents_total, pages_total);

    // ── Step 2: Sequential conversion ────────────────────────────────────
    let pages_completed = Arc::new(AtomicUsize::new(0));
    let mut results = Vec::with_capacity(documents_total);
    let mut taken_names = HashSet::new();

    for (index, (source, meta)) in sources.iter().zip(metadata).enumerate() {
        let doc_start = Instant::now();
        let estimate = meta.as_ref().map(|m| m.page_count).unwrap_or(0);
        let settled_before = pages_completed.load(Ordering::SeqCst);
        callback.on_document_start(index, &source.name, estimate);

        let outcome = match meta {
            Err(e) => Err(e),
            Ok(_) if config.cancel.is_cancelled() => Err(DocumentError::Cancelled),
            Ok(m) => {
                info!("Converting {} ({} pages)", source.name, m.page_count);
                run_document(
                    Arc::clone(&backend),
                    Arc::clone(source),
                    m.plan,
                    config,
                    Arc::clone(&callback),
                    Arc::clone(&pages_completed),
                    ProgressEvent {
                        documents_total,
                        documents_completed: index,
                        pages_total,
                        pages_completed: 0,
                    },
                )
                .await
            }
        };

        let duration_ms = doc_start.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(mut doc) => {
                // Results, callbacks and the archive all carry the same name.
                doc.name = unique_entry_name(&doc.name, &mut taken_names);
                info!(
                    "Flattened {} → {} ({} pages, {} bytes, {}ms)",
                    source.name,
                    doc.name,
                    doc.page_count,
                    doc.payload.len(),
                    duration_ms
                );
                callback.on_document_complete(index, &doc.name, doc.page_count, doc.payload.len());
                ConversionResult::success(&source.name, doc, duration_ms)
            }
            Err(e) => {
                warn!("Failed to flatten {}: {}", source.name, e);
                callback.on_document_error(index, &source.name, &e.to_string());
                ConversionResult::failure(&source.name, e, duration_ms)
            }
        };

        // Settle pages a failed document never reached so the batch total
        // is met exactly once every document has been attempted.
        let settled = pages_completed.load(Ordering::SeqCst) - settled_before;
        if settled < estimate {
            pages_completed.fetch_add(estimate - settled, Ordering::SeqCst);
        }
        callback.on_progress(ProgressEvent {
            documents_total,
            documents_completed: index + 1,
            pages_total,
            pages_completed: pages_completed.load(Ordering::SeqCst),
        });

        results.push(result);
    }

    // ── Step 3: Archive ──────────────────────────────────────────────────
    let archive_start = Instant::now();
    let succeeded = results.iter().filter(|r| r.succeeded()).count();
    callback.on_archive_start(succeeded);

    let (results, archive) = tokio::task::spawn_blocking(move || {
        let archive = build_archive(
            results
                .iter()
                .filter_map(|r| r.payload.as_deref().map(|p| (r.name.as_str(), p))),
        );
        (results, archive)
    })
    .await
    .map_err(|e| FlattenError::Internal(format!("archive task failed: {e}")))?;

    let archive = archive.map_err(|detail| FlattenError::ArchiveFailed {
        name: config.archive_name.clone(),
        detail,
    })?;
    let archive_duration_ms = archive_start.elapsed().as_millis() as u64;

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let failed = results.len() - succeeded;
    let stats = BatchStats {
        documents_total,
        succeeded,
        failed,
        pages_total,
        pages_converted: results
            .iter()
            .filter(|r| r.succeeded())
            .map(|r| r.page_count)
            .sum(),
        archive_bytes: archive.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        archive_duration_ms,
    };

    info!(
        "Batch complete: {}/{} documents, {} pages, {} archive bytes, {}ms total",
        succeeded,
        documents_total,
        stats.pages_converted,
        stats.archive_bytes,
        stats.total_duration_ms
    );
    callback.on_batch_complete(succeeded, failed);

    Ok(BatchOutput {
        results,
        archive,
        archive_name: config.archive_name.clone(),
        sample_plan,
        stats,
    })
}

/// Read PDFs from `paths` (files or directories) and run [`convert_batch`].
pub async fn convert_paths(
    paths: &[PathBuf],
    config: &FlattenConfig,
) -> Result<BatchOutput, FlattenError> {
    let files = input::read_inputs(paths).await?;
    convert_batch(files, config).await
}

/// Convert `paths` and write the archive to `archive_path`.
///
/// Uses atomic write (temp file + rename) so a crash never leaves a
/// truncated archive behind.
pub async fn convert_to_file(
    paths: &[PathBuf],
    archive_path: impl AsRef<Path>,
    config: &FlattenConfig,
) -> Result<BatchOutput, FlattenError> {
    let output = convert_paths(paths, config).await?;
    write_atomic(archive_path.as_ref(), &output.archive).await?;
    Ok(output)
}

/// Write each successful document into `dir`, returning the paths written.
///
/// Files take the names recorded in [`ConversionResult::name`], which match
/// the archive entries.
pub async fn write_documents(
    output: &BatchOutput,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, FlattenError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| FlattenError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::new();
    for result in output.successes() {
        let Some(ref payload) = result.payload else {
            continue;
        };
        let path = dir.join(&result.name);
        write_atomic(&path, payload).await?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Synchronous wrapper around [`convert_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    files: Vec<SourceFile>,
    config: &FlattenConfig,
) -> Result<BatchOutput, FlattenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FlattenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_batch(files, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The configured backend, or pdfium bound once up front.
async fn resolve_backend(config: &FlattenConfig) -> Result<Arc<dyn PdfBackend>, FlattenError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let pdfium = PdfiumBackend::from_env(config.pdfium_library_path.clone());
    let probe = pdfium.clone();
    tokio::task::spawn_blocking(move || probe.probe())
        .await
        .map_err(|e| FlattenError::Internal(format!("pdfium probe task failed: {e}")))??;

    Ok(Arc::new(pdfium))
}

/// Metadata for every source, in input order, `metadata_concurrency` at a time.
async fn prescan(
    backend: Arc<dyn PdfBackend>,
    sources: &[Arc<SourceFile>],
    config: &FlattenConfig,
    memory_gb: f64,
) -> Vec<Result<DocumentMetadata, DocumentError>> {
    stream::iter(sources.iter().cloned().map(|source| {
        let backend = Arc::clone(&backend);
        let cfg = config.clone();
        async move {
            tokio::task::spawn_blocking(move || {
                scan_document(backend.as_ref(), &source, &cfg, memory_gb)
            })
            .await
            .unwrap_or_else(|e| Err(worker_error(e)))
        }
    }))
    .buffered(config.metadata_concurrency.max(1))
    .collect()
    .await
}

/// Convert one batch document on a blocking thread, reporting each page.
async fn run_document(
    backend: Arc<dyn PdfBackend>,
    source: Arc<SourceFile>,
    plan: RenderPlan,
    config: &FlattenConfig,
    callback: Arc<dyn BatchProgressCallback>,
    pages_completed: Arc<AtomicUsize>,
    template: ProgressEvent,
) -> Result<FlattenedDocument, DocumentError> {
    let cfg = config.clone();
    tokio::task::spawn_blocking(move || {
        flatten_document(backend.as_ref(), &source, Some(plan), &cfg, &mut |_, _| {
            let done = pages_completed.fetch_add(1, Ordering::SeqCst) + 1;
            callback.on_progress(ProgressEvent {
                pages_completed: done,
                ..template
            });
        })
    })
    .await
    .unwrap_or_else(|e| Err(worker_error(e)))
}

fn worker_error(err: tokio::task::JoinError) -> DocumentError {
    DocumentError::Worker {
        detail: err.to_string(),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FlattenError> {
    let write_err = |e| FlattenError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{RasterTarget, SourceDocument};
    use image::{DynamicImage, RgbImage};
    use std::sync::Mutex;

    /// Engine over a tiny text format: `"612x792;612x792"` is a two-page
    /// Letter document. Anything unparsable fails to decode; a page written
    /// as `!` fails to render.
    struct TextBackend;

    struct TextDoc {
        pages: Vec<Option<PageSize>>,
    }

    impl SourceDocument for TextDoc {
        fn page_count(&self) -> usize {
            self.pages.len()
        }

        fn page_size(&self, index: usize) -> Result<PageSize, DocumentError> {
            Ok(self.pages[index].unwrap_or(PageSize::new(100.0, 100.0)))
        }

        fn render_page(
            &self,
            index: usize,
            t: RasterTarget,
        ) -> Result<DynamicImage, DocumentError> {
            match self.pages[index] {
                Some(_) => Ok(DynamicImage::ImageRgb8(RgbImage::new(t.width_px, t.height_px))),
                None => Err(DocumentError::Render {
                    page: index + 1,
                    detail: "broken page".into(),
                }),
            }
        }
    }

    impl PdfBackend for TextBackend {
        fn name(&self) -> &str {
            "text"
        }

        fn with_document(
            &self,
            bytes: &[u8],
            _password: Option<&str>,
            body: &mut dyn FnMut(&dyn SourceDocument) -> Result<(), DocumentError>,
        ) -> Result<(), DocumentError> {
            let text = std::str::from_utf8(bytes).map_err(|e| DocumentError::Decode {
                detail: e.to_string(),
            })?;
            let mut pages = Vec::new();
            for part in text.split(';').filter(|p| !p.is_empty()) {
                if part == "!" {
                    pages.push(None);
                    continue;
                }
                let (w, h) = part.split_once('x').ok_or_else(|| DocumentError::Decode {
                    detail: format!("bad page {part:?}"),
                })?;
                let parse = |v: &str| {
                    v.parse::<f32>().map_err(|e| DocumentError::Decode {
                        detail: e.to_string(),
                    })
                };
                pages.push(Some(PageSize::new(parse(w)?, parse(h)?)));
            }
            body(&TextDoc { pages })
        }
    }

    fn config() -> FlattenConfig {
        FlattenConfig::builder()
            .backend(Arc::new(TextBackend))
            .memory_gb(4.0)
            .fixed_plan(36, 0.5)
            .build()
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
        errors: Mutex<Vec<(usize, String)>>,
    }

    impl BatchProgressCallback for Recorder {
        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }

        fn on_document_error(&self, index: usize, _name: &str, error: &str) {
            self.errors.lock().unwrap().push((index, error.to_string()));
        }
    }

    #[test]
    fn flatten_reports_every_page() {
        let src = SourceFile::new("two.pdf", b"72x72;144x72".to_vec());
        let mut seen = Vec::new();
        let doc = flatten_document(&TextBackend, &src, None, &config(), &mut |p, n| {
            seen.push((p, n))
        })
        .unwrap();
        assert_eq!(doc.name, "two_flattened.pdf");
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.plan.dpi, 36);
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn flatten_uses_planner_without_hint() {
        let cfg = FlattenConfig::builder()
            .backend(Arc::new(TextBackend))
            .memory_gb(4.0)
            .build()
            .unwrap();
        let src = SourceFile::new("letter.pdf", b"612x792".to_vec());
        let doc = flatten_document(&TextBackend, &src, None, &cfg, &mut |_, _| {}).unwrap();
        assert_eq!(doc.plan, RenderPlan { dpi: 200, quality: 0.88 });
    }

    #[test]
    fn decode_failure_passes_through_metadata_read() {
        let mut state = StateTracker::new("broken.pdf");
        state.fail(&DocumentError::Decode {
            detail: "not a pdf".into(),
        });
        assert_eq!(
            state.history,
            vec![DocumentState::Pending, DocumentState::MetadataRead, DocumentState::Failed]
        );
    }

    #[test]
    fn cancel_before_open_fails_from_pending() {
        let mut state = StateTracker::new("later.pdf");
        state.fail(&DocumentError::Cancelled);
        assert_eq!(state.history, vec![DocumentState::Pending, DocumentState::Failed]);
    }

    #[test]
    fn render_failure_fails_from_the_page() {
        let mut state = StateTracker::new("a.pdf");
        state.advance(DocumentState::MetadataRead);
        state.advance(DocumentState::Converting(1));
        state.fail(&DocumentError::Render {
            page: 1,
            detail: "broken".into(),
        });
        assert_eq!(state.current(), DocumentState::Failed);
        assert_eq!(state.history.len(), 4);
    }

    #[test]
    fn read_metadata_plans_from_first_page() {
        let src = SourceFile::new("mixed.pdf", b"612x792;2000x2000;!".to_vec());
        let meta = tokio_test::block_on(read_metadata(&src, &config())).unwrap();
        assert_eq!(meta.page_count, 3);
        assert_eq!(meta.first_page, PageSize::new(612.0, 792.0));
    }

    #[test]
    fn hint_beats_fixed_plan() {
        let src = SourceFile::new("a.pdf", b"72x72".to_vec());
        let hint = RenderPlan { dpi: 50, quality: 0.7 };
        let doc =
            flatten_document(&TextBackend, &src, Some(hint), &config(), &mut |_, _| {}).unwrap();
        assert_eq!(doc.plan, hint);
    }

    #[test]
    fn render_failure_names_page() {
        let src = SourceFile::new("bad.pdf", b"72x72;!;72x72".to_vec());
        let mut pages = 0;
        let err = flatten_document(&TextBackend, &src, None, &config(), &mut |_, _| pages += 1)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Render { page: 2, .. }), "got {err:?}");
        assert_eq!(pages, 1);
    }

    #[test]
    fn empty_document_is_a_decode_error() {
        let src = SourceFile::new("empty.pdf", Vec::new());
        let err =
            flatten_document(&TextBackend, &src, None, &config(), &mut |_, _| {}).unwrap_err();
        assert!(matches!(err, DocumentError::Decode { .. }));
    }

    #[test]
    fn cancelled_before_start() {
        let cfg = config();
        cfg.cancel.cancel();
        let src = SourceFile::new("a.pdf", b"72x72".to_vec());
        let err = flatten_document(&TextBackend, &src, None, &cfg, &mut |_, _| {}).unwrap_err();
        assert_eq!(err, DocumentError::Cancelled);
    }

    #[test]
    fn scan_reads_first_page() {
        let cfg = FlattenConfig::builder().build().unwrap();
        let src = SourceFile::new("a.pdf", b"5000x5000;10x10".to_vec());
        let meta = scan_document(&TextBackend, &src, &cfg, 2.0).unwrap();
        assert_eq!(meta.page_count, 2);
        assert_eq!(meta.first_page, PageSize::new(5000.0, 5000.0));
        assert_eq!(meta.plan.dpi, 130);
    }

    #[tokio::test]
    async fn batch_settles_failed_pages() {
        let recorder = Arc::new(Recorder::default());
        let cfg = FlattenConfig::builder()
            .backend(Arc::new(TextBackend))
            .fixed_plan(36, 0.5)
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let files = vec![
            SourceFile::new("a.pdf", b"72x72;72x72".to_vec()),
            SourceFile::new("b.pdf", b"72x72;!;72x72".to_vec()),
            SourceFile::new("c.pdf", b"not pages".to_vec()),
            SourceFile::new("d.pdf", b"72x72".to_vec()),
        ];
        let out = convert_batch(files, &cfg).await.unwrap();

        assert_eq!(out.stats.succeeded, 2);
        assert_eq!(out.stats.failed, 2);
        assert_eq!(out.stats.pages_total, 6);
        assert_eq!(out.stats.pages_converted, 3);

        let events = recorder.events.lock().unwrap();
        assert!(events.windows(2).all(|w| w[0].pages_completed <= w[1].pages_completed));
        let last = events.last().unwrap();
        assert_eq!(last.pages_completed, last.pages_total);
        assert_eq!(last.documents_completed, 4);

        let errors = recorder.errors.lock().unwrap();
        assert_eq!(errors.iter().map(|e| e.0).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn empty_batch_is_fatal() {
        let err = convert_batch(Vec::new(), &config()).await.unwrap_err();
        assert!(matches!(err, FlattenError::NoPdfInputs { given: 0 }));
    }

    #[tokio::test]
    async fn convert_document_wraps_failure() {
        let err = convert_document(SourceFile::new("x.pdf", b"garbage".to_vec()), &config())
            .await
            .unwrap_err();
        match err {
            FlattenError::ConversionFailed { name, source } => {
                assert_eq!(name, "x.pdf");
                assert_eq!(source.kind(), "decode");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_metadata_uses_fixed_plan() {
        let meta = read_metadata(&SourceFile::new("a.pdf", b"612x792".to_vec()), &config())
            .await
            .unwrap();
        assert_eq!(meta.page_count, 1);
        assert_eq!(meta.plan.dpi, 36);
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/archive.zip");
        write_atomic(&path, b"zip").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"zip");
        assert!(!dir.path().join("out/archive.zip.tmp").exists());
    }

    #[test]
    fn sync_wrapper_runs_batch() {
        let files = vec![SourceFile::new("a.pdf", b"72x72".to_vec())];
        let out = convert_sync(files, &config()).unwrap();
        assert_eq!(out.stats.succeeded, 1);
        assert!(!out.archive.is_empty());
    }
}
