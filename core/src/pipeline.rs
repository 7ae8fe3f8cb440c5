//! Scan, classify and relocate a folder in one call.

use crate::batch::BatchRunner;
use crate::classifier::LabelClassifier;
use crate::config::{normalize_extension, ConfigurationError, SorterConfig};
use crate::index::CategoryIndex;
use crate::progress::ProgressSink;
use crate::relocation::{FileFailure, RelocationEngine};
use crate::reporting::RunReport;
use crate::scanner::{collect_candidates, tasks_for, ScanError};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;

/// Failure that stops a run before any file is moved.
#[derive(Debug, Error)]
pub enum SortError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// Sorts the images of a folder into per-label subfolders.
#[derive(Clone, Debug)]
pub struct FolderSorter {
    runner: BatchRunner,
    companion_extension: Option<String>,
}

impl FolderSorter {
    pub fn new(
        concurrency: usize,
        companion_extension: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            runner: BatchRunner::new(concurrency)?,
            companion_extension: companion_extension.map(normalize_extension).transpose()?,
        })
    }

    pub fn from_config(config: &SorterConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Self::new(config.concurrency, config.companion_extension.as_deref())
    }

    /// Normalized companion extension, without the leading dot.
    pub fn companion_extension(&self) -> Option<&str> {
        self.companion_extension.as_deref()
    }

    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.runner = self.runner.with_cancellation(flag);
        self
    }

    /// Classify every candidate directly under `root` and move it into
    /// `<root>/<label>/`, together with its companion file.
    ///
    /// Files that fail classification stay where they are and show up in
    /// [`RunReport::classification_errors`].
    pub fn sort(
        &self,
        root: &Path,
        classifier: &dyn LabelClassifier,
        sink: &dyn ProgressSink,
    ) -> Result<RunReport, SortError> {
        let candidates = collect_candidates(root, self.companion_extension.as_deref())?;
        let mut report = RunReport::new(root);
        report.candidates = candidates.len();

        let index = CategoryIndex::new();
        let batch = self
            .runner
            .run_batch(&tasks_for(candidates), classifier, &index, sink)?;
        for result in &batch.results {
            if let Some(error) = result.error() {
                report
                    .classification_errors
                    .push(FileFailure::new(result.source_path.clone(), error));
            } else if result.is_cancelled() {
                report.cancelled.push(result.source_path.clone());
            }
        }

        let relocation = RelocationEngine::new(root)
            .with_companion_extension(self.companion_extension.clone())
            .relocate(&index);
        report.moved = relocation.moved;
        report.relocation_errors = relocation.errors;

        tracing::info!(
            root = %root.display(),
            moved = report.moved.len(),
            errors = report.error_count(),
            "sort finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassificationError;
    use crate::progress::{ChannelSink, NullSink, ProgressEvent};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn by_stem(path: &Path) -> Result<String, ClassificationError> {
        let stem = path.file_stem().unwrap().to_string_lossy().into_owned();
        if stem == "broken" {
            return Err(ClassificationError::inference(path, "unreadable"));
        }
        Ok(stem.trim_end_matches(char::is_numeric).to_string())
    }

    #[test]
    fn sorts_folder_end_to_end() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("cat.jpg"), "cat image").unwrap();
        fs::write(root.join("cat.txt"), "cat caption").unwrap();
        fs::write(root.join("dog1.png"), "dog image").unwrap();
        fs::create_dir(root.join("cat")).unwrap();
        fs::write(root.join("cat/cat.jpg"), "older cat").unwrap();
        fs::write(root.join("cat/cat.txt"), "older caption").unwrap();

        let sorter = FolderSorter::new(2, Some("txt")).unwrap();
        let report = sorter.sort(root, &by_stem, &NullSink).unwrap();

        assert_eq!(report.candidates, 2);
        assert_eq!(report.moved.len(), 2);
        assert!(report.is_clean());
        assert_eq!(fs::read_to_string(root.join("cat/cat_1.jpg")).unwrap(), "cat image");
        assert_eq!(fs::read_to_string(root.join("cat/cat_1.txt")).unwrap(), "cat caption");
        assert_eq!(fs::read_to_string(root.join("dog/dog1.png")).unwrap(), "dog image");
        assert!(!root.join("cat.jpg").exists());
        assert!(!root.join("cat.txt").exists());
    }

    #[test]
    fn one_failure_leaves_one_file_behind() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        for name in ["bird1.jpg", "bird2.jpg", "broken.jpg", "fish1.jpg"] {
            fs::write(root.join(name), name).unwrap();
        }
        let (sender, receiver) = mpsc::channel();

        let report = FolderSorter::new(3, Some("txt"))
            .unwrap()
            .sort(root, &by_stem, &ChannelSink::new(sender))
            .unwrap();

        assert_eq!(report.moved.len(), 3);
        assert_eq!(report.classification_errors.len(), 1);
        assert_eq!(report.classification_errors[0].path, root.join("broken.jpg"));
        assert!(root.join("broken.jpg").exists());
        assert!(root.join("bird/bird1.jpg").exists());
        assert!(root.join("bird/bird2.jpg").exists());
        assert!(root.join("fish/fish1.jpg").exists());

        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events.last(), Some(&ProgressEvent::Completed));
    }

    #[test]
    fn classifier_panic_does_not_stop_the_run() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.jpg"), "a").unwrap();
        fs::write(root.join("b.jpg"), "b").unwrap();
        let panics_on_a = |path: &Path| -> Result<String, ClassificationError> {
            if path.ends_with("a.jpg") {
                panic!("malformed image");
            }
            Ok(String::from("cat"))
        };

        let report = FolderSorter::new(2, Some("txt"))
            .unwrap()
            .sort(root, &panics_on_a, &NullSink)
            .unwrap();

        assert!(root.join("cat/b.jpg").exists());
        assert!(root.join("a.jpg").exists());
        assert_eq!(report.classification_errors.len(), 1);
        assert_eq!(report.classification_errors[0].path, root.join("a.jpg"));
    }

    #[test]
    fn rerun_only_picks_up_what_was_left() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("cat.jpg"), "a").unwrap();
        let sorter = FolderSorter::new(1, Some("txt")).unwrap();
        sorter.sort(root, &by_stem, &NullSink).unwrap();

        let report = sorter.sort(root, &by_stem, &NullSink).unwrap();
        assert_eq!(report.candidates, 0);
        assert!(report.moved.is_empty());
        assert!(root.join("cat/cat.jpg").exists());
    }

    #[test]
    fn cancelled_run_moves_nothing() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("cat.jpg"), "a").unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Release);

        let report = FolderSorter::new(1, None)
            .unwrap()
            .with_cancellation(flag)
            .sort(root, &by_stem, &NullSink)
            .unwrap();

        assert_eq!(report.cancelled, vec![root.join("cat.jpg")]);
        assert!(report.moved.is_empty());
        assert!(root.join("cat.jpg").exists());
    }

    #[test]
    fn invalid_configuration_is_rejected_up_front() {
        let config = SorterConfig {
            concurrency: 0,
            ..SorterConfig::default()
        };
        assert!(matches!(
            FolderSorter::from_config(&config),
            Err(ConfigurationError::InvalidConcurrency(0))
        ));
        assert!(FolderSorter::new(2, Some("a/b")).is_err());
        let sorter = FolderSorter::new(2, Some(".txt")).unwrap();
        assert_eq!(sorter.companion_extension(), Some("txt"));
    }

    #[test]
    fn missing_root_fails_before_classifying() {
        let dir = tempdir().unwrap();
        let missing: PathBuf = dir.path().join("missing");
        let error = FolderSorter::new(1, None)
            .unwrap()
            .sort(&missing, &by_stem, &NullSink)
            .unwrap_err();
        assert!(matches!(error, SortError::Scan(_)));
    }
}
