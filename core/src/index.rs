//! Shared label → files index filled by the batch runner.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mapping from category label to the files classified into it.
///
/// Safe to share between worker threads: [`CategoryIndex::append`] is the only
/// mutation during a batch and runs entirely under one lock, including the
/// creation of a label's list on first use. Within a label, files keep the
/// order in which workers finished classifying them.
#[derive(Debug, Default)]
pub struct CategoryIndex {
    entries: Mutex<FxHashMap<String, Vec<PathBuf>>>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` was classified as `label`.
    pub fn append(&self, label: &str, path: PathBuf) {
        let mut entries = self.lock();
        match entries.get_mut(label) {
            Some(files) => files.push(path),
            None => {
                entries.insert(label.to_owned(), vec![path]);
            }
        }
    }

    /// Consistent copy of the index, categories sorted by label.
    ///
    /// Take it only after the batch that fills the index has joined.
    pub fn snapshot(&self) -> IndexSnapshot {
        let entries = self.lock();
        let mut categories: Vec<Category> = entries
            .iter()
            .map(|(label, files)| Category {
                label: label.clone(),
                files: files.clone(),
            })
            .collect();
        categories.sort_by(|left, right| left.label.cmp(&right.label));
        IndexSnapshot { categories }
    }

    /// Empty the index so the next run starts fresh.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of files across all labels.
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn label_count(&self) -> usize {
        self.lock().len()
    }

    // A panicking writer cannot leave a half-written entry behind, so a
    // poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, FxHashMap<String, Vec<PathBuf>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One label and the files classified into it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub label: String,
    pub files: Vec<PathBuf>,
}

/// Point-in-time view of a [`CategoryIndex`], ordered by label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexSnapshot {
    categories: Vec<Category>,
}

impl IndexSnapshot {
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Files recorded under `label`, if any.
    pub fn files_for(&self, label: &str) -> Option<&[PathBuf]> {
        self.categories
            .iter()
            .find(|category| category.label == label)
            .map(|category| category.files.as_slice())
    }

    /// Label the given file was recorded under.
    pub fn label_of(&self, path: &Path) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| category.files.iter().any(|file| file == path))
            .map(|category| category.label.as_str())
    }

    pub fn total_files(&self) -> usize {
        self.categories.iter().map(|category| category.files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
