//! Bulk editing of caption files.

use crate::relocation::FileFailure;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption text must not be empty")]
    EmptyText,
    #[error("failed to update caption {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CaptionReport {
    pub updated: Vec<PathBuf>,
    pub errors: Vec<FileFailure>,
}

/// Prepend `text` to every file under `root` (recursively) whose extension is
/// `extension`. Contents are treated as bytes, so captions that are not valid
/// UTF-8 are preserved after the prefix.
pub fn prepend_to_captions(
    root: &Path,
    text: &str,
    extension: &str,
) -> Result<CaptionReport, CaptionError> {
    if text.is_empty() {
        return Err(CaptionError::EmptyText);
    }

    let mut report = CaptionReport::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let path = error.path().unwrap_or(root).to_path_buf();
                report.errors.push(FileFailure::new(path, &error));
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }

        match prepend(entry.path(), text.as_bytes()) {
            Ok(()) => report.updated.push(entry.into_path()),
            Err(error) => {
                tracing::warn!(%error, "caption not updated");
                report.errors.push(FileFailure::new(entry.into_path(), &error));
            }
        }
    }

    tracing::info!(
        updated = report.updated.len(),
        errors = report.errors.len(),
        "captions prefixed"
    );
    Ok(report)
}

fn prepend(path: &Path, prefix: &[u8]) -> Result<(), CaptionError> {
    let wrap = |source| CaptionError::Io {
        path: path.to_path_buf(),
        source,
    };
    let existing = fs::read(path).map_err(wrap)?;
    let mut content = Vec::with_capacity(prefix.len() + existing.len());
    content.extend_from_slice(prefix);
    content.extend_from_slice(&existing);
    fs::write(path, content).map_err(wrap)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
