//! Bounded-concurrency classification of a file list.

use crate::classifier::{ClassificationError, LabelClassifier};
use crate::config::ConfigurationError;
use crate::index::CategoryIndex;
use crate::progress::ProgressSink;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One file to classify.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassificationTask {
    source_path: PathBuf,
}

impl ClassificationTask {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

impl From<PathBuf> for ClassificationTask {
    fn from(source_path: PathBuf) -> Self {
        Self::new(source_path)
    }
}

/// What happened to a single task.
#[derive(Debug)]
pub enum TaskOutcome {
    /// Classified and recorded in the index under this label.
    Classified(String),
    /// Classification failed; the file is left out of relocation.
    Failed(ClassificationError),
    /// The run was cancelled before this task started.
    Cancelled,
}

/// Result for one [`ClassificationTask`].
#[derive(Debug)]
pub struct ClassificationResult {
    pub source_path: PathBuf,
    pub outcome: TaskOutcome,
}

impl ClassificationResult {
    pub fn label(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Classified(label) => Some(label),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ClassificationError> {
        match &self.outcome {
            TaskOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Cancelled)
    }
}

/// Results of a batch, in task submission order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ClassificationResult>,
}

impl BatchReport {
    pub fn classified(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter(|result| result.label().is_some())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter(|result| result.error().is_some())
    }

    pub fn cancelled(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter(|result| result.is_cancelled())
    }
}

/// Classifies files on a fixed-size worker pool.
///
/// At most `concurrency` classifications run at once. A worker picks the
/// next pending task as soon as it finishes the previous one, so one slow
/// image never holds back a whole chunk.
#[derive(Clone, Debug)]
pub struct BatchRunner {
    concurrency: usize,
    cancellation: Option<Arc<AtomicBool>>,
}

impl BatchRunner {
    /// Builds a runner, rejecting a concurrency of zero.
    pub fn new(concurrency: usize) -> Result<Self, ConfigurationError> {
        if concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            concurrency,
            cancellation: None,
        })
    }

    /// Tasks that have not started when `flag` becomes true are skipped.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(flag);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Classify every task, appending successes to `index`.
    ///
    /// Emits `on_start` for each task that runs, `on_error` for each failure,
    /// and a single `on_complete` once every task has finished. Classification
    /// failures never abort the batch.
    pub fn run_batch(
        &self,
        tasks: &[ClassificationTask],
        classifier: &dyn LabelClassifier,
        index: &CategoryIndex,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport, ConfigurationError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|worker| format!("imgsort-worker-{}", worker))
            .build()
            .map_err(|error| ConfigurationError::WorkerPool(error.to_string()))?;

        tracing::debug!(
            tasks = tasks.len(),
            concurrency = self.concurrency,
            "starting classification batch"
        );

        let results: Vec<ClassificationResult> = pool.install(|| {
            tasks
                .par_iter()
                .with_max_len(1)
                .map(|task| self.run_task(task, classifier, index, sink))
                .collect()
        });

        sink.on_complete();
        let report = BatchReport { results };
        tracing::info!(
            classified = report.classified().count(),
            failed = report.failed().count(),
            cancelled = report.cancelled().count(),
            "classification batch finished"
        );
        Ok(report)
    }

    fn run_task(
        &self,
        task: &ClassificationTask,
        classifier: &dyn LabelClassifier,
        index: &CategoryIndex,
        sink: &dyn ProgressSink,
    ) -> ClassificationResult {
        let path = task.source_path();
        if self.is_cancelled() {
            tracing::debug!(path = %path.display(), "skipping task after cancellation");
            return ClassificationResult {
                source_path: path.to_path_buf(),
                outcome: TaskOutcome::Cancelled,
            };
        }

        sink.on_start(path);
        let outcome = match classify_guarded(classifier, path) {
            Ok(label) => {
                tracing::debug!(path = %path.display(), %label, "classified");
                index.append(&label, path.to_path_buf());
                TaskOutcome::Classified(label)
            }
            Err(error) => {
                tracing::debug!(path = %path.display(), %error, "classification failed");
                sink.on_error(path, &error.to_string());
                TaskOutcome::Failed(error)
            }
        };

        ClassificationResult {
            source_path: path.to_path_buf(),
            outcome,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

/// A classifier that panics on one image fails that image only.
fn classify_guarded(
    classifier: &dyn LabelClassifier,
    path: &Path,
) -> Result<String, ClassificationError> {
    panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(path))).unwrap_or_else(|payload| {
        Err(ClassificationError::inference(
            path,
            format!("classifier panicked: {}", panic_message(payload.as_ref())),
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ChannelSink, NullSink, ProgressEvent};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn tasks(names: &[&str]) -> Vec<ClassificationTask> {
        names.iter().map(|name| ClassificationTask::new(*name)).collect()
    }

    fn label_by_prefix(path: &Path) -> Result<String, ClassificationError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if name.starts_with("broken") {
            return Err(ClassificationError::inference(path, "corrupt image"));
        }
        Ok(name.split('_').next().unwrap().to_string())
    }

    #[test]
    fn zero_concurrency_is_a_configuration_error() {
        assert_eq!(
            BatchRunner::new(0).unwrap_err(),
            ConfigurationError::InvalidConcurrency(0)
        );
    }

    #[test]
    fn every_file_lands_in_exactly_one_label_or_none() {
        let tasks = tasks(&["cat_1.jpg", "dog_1.jpg", "cat_2.jpg", "broken.jpg", "bird_1.png"]);
        let index = CategoryIndex::new();
        let report = BatchRunner::new(3)
            .unwrap()
            .run_batch(&tasks, &label_by_prefix, &index, &NullSink)
            .unwrap();

        let snapshot = index.snapshot();
        assert_eq!(snapshot.total_files(), 4);
        for task in &tasks {
            let hits = snapshot
                .categories()
                .iter()
                .filter(|category| category.files.iter().any(|f| f == task.source_path()))
                .count();
            let expected = if task.source_path() == Path::new("broken.jpg") { 0 } else { 1 };
            assert_eq!(hits, expected, "{}", task.source_path().display());
        }
        assert_eq!(snapshot.files_for("cat").unwrap().len(), 2);

        let paths: Vec<_> = report.results.iter().map(|r| r.source_path.clone()).collect();
        let submitted: Vec<_> = tasks.iter().map(|t| t.source_path().to_path_buf()).collect();
        assert_eq!(paths, submitted);
        assert_eq!(report.classified().count(), 4);
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn failures_are_reported_and_completion_comes_last() {
        let (sender, receiver) = mpsc::channel();
        let sink = ChannelSink::new(sender);
        let tasks = tasks(&["cat_1.jpg", "broken.jpg", "dog_1.jpg"]);
        let index = CategoryIndex::new();

        BatchRunner::new(2)
            .unwrap()
            .run_batch(&tasks, &label_by_prefix, &index, &sink)
            .unwrap();

        let events: Vec<_> = receiver.try_iter().collect();
        let started = events
            .iter()
            .filter(|event| matches!(event, ProgressEvent::Started(_)))
            .count();
        assert_eq!(started, 3);
        assert!(events.contains(&ProgressEvent::Failed {
            path: PathBuf::from("broken.jpg"),
            message: String::from("inference failed for broken.jpg: corrupt image"),
        }));
        assert_eq!(events.last(), Some(&ProgressEvent::Completed));
        assert_eq!(
            events
                .iter()
                .filter(|event| **event == ProgressEvent::Completed)
                .count(),
            1
        );
    }

    #[test]
    fn panicking_classifier_fails_only_that_file() {
        let fragile = |path: &Path| -> Result<String, ClassificationError> {
            if path == Path::new("cat_1.jpg") {
                panic!("decoder bug");
            }
            label_by_prefix(path)
        };
        let tasks = tasks(&["cat_1.jpg", "cat_2.jpg", "dog_1.jpg"]);
        let index = CategoryIndex::new();

        let report = BatchRunner::new(2)
            .unwrap()
            .run_batch(&tasks, &fragile, &index, &NullSink)
            .unwrap();

        assert_eq!(report.classified().count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source_path, PathBuf::from("cat_1.jpg"));
        assert!(failed[0]
            .error()
            .unwrap()
            .to_string()
            .contains("classifier panicked: decoder bug"));
        assert_eq!(index.snapshot().files_for("cat").unwrap(), &[PathBuf::from("cat_2.jpg")]);
    }

    #[test]
    fn concurrency_ceiling_is_respected() {
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let slow = |path: &Path| -> Result<String, ClassificationError> {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
            label_by_prefix(path)
        };
        let names: Vec<String> = (0..12).map(|i| format!("cat_{}.jpg", i)).collect();
        let tasks: Vec<_> = names.iter().map(ClassificationTask::new).collect();
        let index = CategoryIndex::new();

        BatchRunner::new(3)
            .unwrap()
            .run_batch(&tasks, &slow, &index, &NullSink)
            .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {}", peak);
        assert!(peak > 1, "tasks never overlapped");
        assert_eq!(index.len(), 12);
    }

    #[test]
    fn cancelled_runs_skip_remaining_tasks() {
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = Arc::clone(&flag);
        let cancel_after_first = move |path: &Path| -> Result<String, ClassificationError> {
            trigger.store(true, Ordering::Release);
            label_by_prefix(path)
        };
        let (sender, receiver) = mpsc::channel();
        let tasks = tasks(&["cat_1.jpg", "cat_2.jpg", "cat_3.jpg", "cat_4.jpg"]);
        let index = CategoryIndex::new();

        let report = BatchRunner::new(1)
            .unwrap()
            .with_cancellation(flag)
            .run_batch(&tasks, &cancel_after_first, &index, &ChannelSink::new(sender))
            .unwrap();

        assert_eq!(report.classified().count(), 1);
        assert_eq!(report.cancelled().count(), 3);
        assert_eq!(index.len(), 1);
        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events.last(), Some(&ProgressEvent::Completed));
    }
}
