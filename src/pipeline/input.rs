//! Input resolution: turn user-supplied paths into `(name, bytes)` pairs.
//!
//! Files are accepted when they carry a `.pdf` extension (any case) or start
//! with the `%PDF` magic. Directories are scanned one level deep for `.pdf`
//! files, in name order. Anything else is skipped with a warning; whether a
//! kept file actually decodes is the pipeline's concern, reported per
//! document.

use crate::error::FlattenError;
use crate::output::SourceFile;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static PDF_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf$").unwrap());

const PDF_MAGIC: &[u8] = b"%PDF";

/// Whether a file looks like a PDF by name or content.
pub fn is_pdf_candidate(name: &str, bytes: &[u8]) -> bool {
    PDF_EXTENSION.is_match(name) || bytes.starts_with(PDF_MAGIC)
}

/// Output file name for a source: trailing `.pdf` removed, `suffix` and
/// `.pdf` appended.
///
/// ```rust
/// use pdf_flatten::pipeline::input::output_name;
///
/// assert_eq!(output_name("Report.PDF", "_flattened"), "Report_flattened.pdf");
/// assert_eq!(output_name("notes.txt", "_flattened"), "notes.txt_flattened.pdf");
/// ```
pub fn output_name(source_name: &str, suffix: &str) -> String {
    let stem = PDF_EXTENSION.replace(source_name, "");
    format!("{stem}{suffix}.pdf")
}

/// Read every PDF among `paths`.
///
/// # Errors
/// * [`FlattenError::FileNotFound`] / [`FlattenError::PermissionDenied`] for
///   a path that cannot be read.
/// * [`FlattenError::NoPdfInputs`] when nothing PDF-like remains.
pub async fn read_inputs(paths: &[PathBuf]) -> Result<Vec<SourceFile>, FlattenError> {
    let mut files = Vec::new();

    for path in paths {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error(path, e))?;

        if meta.is_dir() {
            for file_path in scan_dir(path).await? {
                files.push(read_file(&file_path).await?);
            }
            continue;
        }

        let file = read_file(path).await?;
        if is_pdf_candidate(&file.name, &file.bytes) {
            files.push(file);
        } else {
            warn!("Skipping non-PDF input: {}", path.display());
        }
    }

    if files.is_empty() {
        return Err(FlattenError::NoPdfInputs { given: paths.len() });
    }

    info!("Resolved {} PDF input(s)", files.len());
    Ok(files)
}

/// `.pdf` files directly inside `dir`, sorted by path.
async fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>, FlattenError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| io_error(dir, e))?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && PDF_EXTENSION.is_match(&file_name(&path)) {
            found.push(path);
        }
    }

    found.sort();
    debug!("Found {} PDF(s) in {}", found.len(), dir.display());
    Ok(found)
}

async fn read_file(path: &Path) -> Result<SourceFile, FlattenError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| io_error(path, e))?;
    debug!("Read {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceFile::new(file_name(path), bytes))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn io_error(path: &Path, err: std::io::Error) -> FlattenError {
    let path = path.to_path_buf();
    match err.kind() {
        ErrorKind::PermissionDenied => FlattenError::PermissionDenied { path },
        _ => FlattenError::FileNotFound { path },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_by_extension_or_magic() {
        assert!(is_pdf_candidate("a.pdf", b""));
        assert!(is_pdf_candidate("A.PdF", b"junk"));
        assert!(is_pdf_candidate("download", b"%PDF-1.7\n"));
        assert!(!is_pdf_candidate("notes.txt", b"hello"));
        assert!(!is_pdf_candidate("a.pdf.txt", b"hello"));
    }

    #[test]
    fn output_name_strips_only_trailing_pdf() {
        assert_eq!(output_name("report.pdf", "_flattened"), "report_flattened.pdf");
        assert_eq!(output_name("SCAN.PDF", "_x"), "SCAN_x.pdf");
        assert_eq!(output_name("a.pdf.pdf", "_f"), "a.pdf_f.pdf");
        assert_eq!(output_name("pdf", "_f"), "pdf_f.pdf");
        assert_eq!(output_name("report.pdf", ""), "report.pdf");
    }

    #[tokio::test]
    async fn reads_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("batch");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.pdf"), b"%PDF-b").unwrap();
        std::fs::write(sub.join("a.PDF"), b"%PDF-a").unwrap();
        std::fs::write(sub.join("readme.txt"), b"skip").unwrap();
        std::fs::create_dir(sub.join("nested.pdf")).unwrap();

        let loose = dir.path().join("magic-only");
        std::fs::write(&loose, b"%PDF-loose").unwrap();

        let files = read_inputs(&[sub, loose]).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf", "magic-only"]);
        assert_eq!(files[0].bytes, b"%PDF-a");
    }

    #[tokio::test]
    async fn missing_path_is_fatal() {
        let err = read_inputs(&[PathBuf::from("/definitely/not/here.pdf")])
            .await
            .unwrap_err();
        assert!(matches!(err, FlattenError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn no_pdfs_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"hello").unwrap();

        let err = read_inputs(&[txt, dir.path().to_path_buf()]).await.unwrap_err();
        assert!(matches!(err, FlattenError::NoPdfInputs { given: 2 }));
    }
}
