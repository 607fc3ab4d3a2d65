//! Archive packaging: every successful payload into one zip.
//!
//! Entries are stored, not deflated. Each payload is a PDF of JPEG streams
//! and would not shrink further.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip holding `entries` in order, under the names given.
///
/// Names must already be unique (see [`unique_entry_name`]); a repeat,
/// compared case-insensitively, is an error.
pub fn build_archive<'a, I>(entries: I) -> Result<Vec<u8>, String>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut seen = HashSet::new();

    for (name, payload) in entries {
        if !seen.insert(name.to_lowercase()) {
            return Err(format!("duplicate archive entry '{name}'"));
        }
        debug!("Archiving {} ({} bytes)", name, payload.len());
        writer
            .start_file(name, options)
            .map_err(|e| format!("{name}: {e}"))?;
        writer.write_all(payload).map_err(|e| format!("{name}: {e}"))?;
    }

    let cursor = writer.finish().map_err(|e| e.to_string())?;
    Ok(cursor.into_inner())
}

/// First free variant of `name`, recorded in `taken`.
///
/// Comparison is case-insensitive; archive tools on Windows and macOS would
/// otherwise overwrite one entry with the other on extraction.
pub fn unique_entry_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_back(bytes: Vec<u8>) -> Vec<(String, Vec<u8>, CompressionMethod)> {
        let mut zip = ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
        (0..zip.len())
            .map(|i| {
                let mut f = zip.by_index(i).unwrap();
                let mut data = Vec::new();
                f.read_to_end(&mut data).unwrap();
                (f.name().to_string(), data, f.compression())
            })
            .collect()
    }

    #[test]
    fn entries_keep_order_and_bytes() {
        let bytes = build_archive([
            ("a_flattened.pdf", &b"%PDF-a"[..]),
            ("b_flattened.pdf", &b"%PDF-bb"[..]),
        ])
        .unwrap();

        let entries = read_back(bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "a_flattened.pdf");
        assert_eq!(entries[0].1, b"%PDF-a");
        assert_eq!(entries[1].0, "b_flattened.pdf");
        assert_eq!(entries[1].1, b"%PDF-bb");
        assert!(entries.iter().all(|e| e.2 == CompressionMethod::Stored));
    }

    #[test]
    fn duplicate_names_are_suffixed() {
        let mut taken = HashSet::new();
        let names: Vec<String> = ["scan_flattened.pdf", "scan_flattened.pdf", "SCAN_flattened.pdf"]
            .iter()
            .map(|n| unique_entry_name(n, &mut taken))
            .collect();
        assert_eq!(
            names,
            vec!["scan_flattened.pdf", "scan_flattened (2).pdf", "SCAN_flattened (3).pdf"]
        );

        let bytes = build_archive(names.iter().map(|n| (n.as_str(), &b"x"[..]))).unwrap();
        let stored: Vec<String> = read_back(bytes).into_iter().map(|e| e.0).collect();
        assert_eq!(stored, names);
    }

    #[test]
    fn repeated_entry_is_rejected() {
        let err = build_archive([("a.pdf", &b"1"[..]), ("A.pdf", &b"2"[..])]).unwrap_err();
        assert!(err.contains("A.pdf"), "{err}");
    }

    #[test]
    fn unique_name_without_extension() {
        let mut taken = HashSet::new();
        assert_eq!(unique_entry_name("README", &mut taken), "README");
        assert_eq!(unique_entry_name("README", &mut taken), "README (2)");
    }

    #[test]
    fn unique_name_skips_existing_variants() {
        let mut taken = HashSet::new();
        unique_entry_name("x (2).pdf", &mut taken);
        unique_entry_name("x.pdf", &mut taken);
        assert_eq!(unique_entry_name("x.pdf", &mut taken), "x (3).pdf");
    }

    #[test]
    fn empty_archive_is_valid() {
        let bytes = build_archive(std::iter::empty()).unwrap();
        assert!(read_back(bytes).is_empty());
    }
}
