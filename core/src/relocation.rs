//! Moves classified files into per-label folders without overwriting anything.

use crate::index::{Category, CategoryIndex, IndexSnapshot};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Per-file failure while relocating. Never aborts the run.
#[derive(Debug, Error)]
pub enum RelocationError {
    #[error("label {0:?} cannot be used as a folder name")]
    InvalidLabel(String),
    #[error("failed to create folder {}: {source}", .path.display())]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file name not found for {}", .0.display())]
    MissingFileName(PathBuf),
    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A file that could not be processed, with a readable reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// A primary file that reached its category folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedFile {
    pub label: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Where the companion file went, if there was one and it moved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion: Option<PathBuf>,
}

/// Outcome of a relocation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationReport {
    pub moved: Vec<MovedFile>,
    pub errors: Vec<FileFailure>,
}

impl RelocationReport {
    /// Number of primary files moved.
    pub fn moved_count(&self) -> usize {
        self.moved.len()
    }
}

/// Sorts files into `<root>/<label>/` folders.
///
/// Destination names keep the source file name; when that name is taken a
/// `_N` suffix is inserted before the extension, probing `_1`, `_2`, ... until
/// a free name turns up. Companion files (same stem, fixed extension) follow
/// their primary into the same folder and get their own, independent name.
#[derive(Clone, Debug)]
pub struct RelocationEngine {
    root: PathBuf,
    companion_extension: Option<String>,
}

impl RelocationEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            companion_extension: None,
        }
    }

    /// Extension of the companion file, without the leading dot.
    pub fn with_companion_extension(mut self, extension: Option<String>) -> Self {
        self.companion_extension = extension;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relocate everything in `index`, then clear it.
    pub fn relocate(&self, index: &CategoryIndex) -> RelocationReport {
        let snapshot = index.snapshot();
        let report = self.relocate_snapshot(&snapshot);
        index.clear();
        report
    }

    /// Relocate the files of a snapshot. Categories are processed in label
    /// order and files in list order, so the same snapshot over the same
    /// folder state always yields the same destination names.
    pub fn relocate_snapshot(&self, snapshot: &IndexSnapshot) -> RelocationReport {
        let mut report = RelocationReport::default();
        let mut processed = FxHashSet::default();
        for category in snapshot.categories() {
            self.relocate_category(category, &mut processed, &mut report);
        }
        tracing::info!(
            moved = report.moved.len(),
            errors = report.errors.len(),
            root = %self.root.display(),
            "relocation finished"
        );
        report
    }

    fn relocate_category(
        &self,
        category: &Category,
        processed: &mut FxHashSet<PathBuf>,
        report: &mut RelocationReport,
    ) {
        let folder = match self.ensure_folder(&category.label) {
            Ok(folder) => folder,
            Err(error) => {
                tracing::warn!(label = %category.label, %error, "skipping category");
                report.errors.extend(
                    category
                        .files
                        .iter()
                        .map(|path| FileFailure::new(path.clone(), &error)),
                );
                return;
            }
        };

        for source in &category.files {
            if processed.contains(source) || fs::symlink_metadata(source).is_err() {
                tracing::debug!(path = %source.display(), "source already handled or gone");
                continue;
            }

            match move_into_folder(source, &folder) {
                Ok(destination) => {
                    processed.insert(source.clone());
                    let companion = self.relocate_companion(source, &folder, processed, report);
                    tracing::debug!(
                        from = %source.display(),
                        to = %destination.display(),
                        "moved"
                    );
                    report.moved.push(MovedFile {
                        label: category.label.clone(),
                        source: source.clone(),
                        destination,
                        companion,
                    });
                }
                Err(error) => {
                    tracing::warn!(path = %source.display(), %error, "move failed");
                    report.errors.push(FileFailure::new(source.clone(), &error));
                }
            }
        }
    }

    fn relocate_companion(
        &self,
        source: &Path,
        folder: &Path,
        processed: &mut FxHashSet<PathBuf>,
        report: &mut RelocationReport,
    ) -> Option<PathBuf> {
        let extension = self.companion_extension.as_deref()?;
        let companion = find_companion(source, extension)?;

        match move_into_folder(&companion, folder) {
            Ok(destination) => {
                processed.insert(companion);
                Some(destination)
            }
            Err(error) => {
                tracing::warn!(path = %companion.display(), %error, "companion move failed");
                report.errors.push(FileFailure::new(companion, &error));
                None
            }
        }
    }

    fn ensure_folder(&self, label: &str) -> Result<PathBuf, RelocationError> {
        let folder = self.root.join(validate_label(label)?);
        fs::create_dir_all(&folder).map_err(|source| RelocationError::CreateFolder {
            path: folder.clone(),
            source,
        })?;
        Ok(folder)
    }
}

/// Sibling of `source` with the same stem and the companion extension.
///
/// The extension is compared case-insensitively, the same way candidates are
/// filtered, so `photo.TXT` still pairs with `photo.jpg`. An exact-case match
/// wins when both spellings exist.
pub fn find_companion(source: &Path, extension: &str) -> Option<PathBuf> {
    let exact = source.with_extension(extension);
    if exact != source && exact.is_file() {
        return Some(exact);
    }

    let stem = source.file_stem()?;
    let parent = source.parent().filter(|dir| !dir.as_os_str().is_empty())?;
    WalkDir::new(parent)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .find(|path| {
            path != source
                && path.file_stem() == Some(stem)
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
}

/// A label becomes exactly one folder directly below the root.
fn validate_label(label: &str) -> Result<&str, RelocationError> {
    let mut components = Path::new(label).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !label.contains(['/', '\\']) => Ok(label),
        _ => Err(RelocationError::InvalidLabel(label.to_string())),
    }
}

fn move_into_folder(source: &Path, folder: &Path) -> Result<PathBuf, RelocationError> {
    let destination = resolve_destination(folder, source)?;
    move_file(source, &destination).map_err(|error| RelocationError::Move {
        from: source.to_path_buf(),
        to: destination.clone(),
        source: error,
    })?;
    Ok(destination)
}

/// First free name for `source` inside `folder`: the original name, then
/// `stem_1.ext`, `stem_2.ext`, ...
pub fn resolve_destination(folder: &Path, source: &Path) -> Result<PathBuf, RelocationError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| RelocationError::MissingFileName(source.to_path_buf()))?;

    let mut candidate = folder.join(file_name);
    let mut index = 1;
    while is_occupied(&candidate) {
        candidate = folder.join(suffixed_name(file_name, index));
        index += 1;
    }
    Ok(candidate)
}

fn suffixed_name(file_name: &OsStr, index: usize) -> OsString {
    let name = Path::new(file_name);
    let mut suffixed = name
        .file_stem()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    suffixed.push(format!("_{}", index));
    if let Some(extension) = name.extension() {
        suffixed.push(".");
        suffixed.push(extension);
    }
    suffixed
}

// Dangling symlinks count as taken.
fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        result => result,
    }
}

// Leaves `from` in place and removes the copy if the source cannot be deleted.
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    if let Err(error) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(error);
    }
    Ok(())
}
