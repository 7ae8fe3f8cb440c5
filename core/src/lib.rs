//! Sorting engine for imgsort.
//!
//! Images directly inside a folder are classified on a bounded worker pool
//! and then moved into `<folder>/<label>/` subfolders, taking their caption
//! files with them. Name collisions are resolved with a numeric suffix, so
//! nothing already in a category folder is ever overwritten.
//!
//! The classifier is injected through [`LabelClassifier`]; the `onnx`
//! feature provides an ONNX Runtime backed implementation.

pub mod batch;
pub mod captions;
pub mod classifier;
pub mod config;
pub mod index;
pub mod pipeline;
pub mod progress;
pub mod relocation;
pub mod reporting;
pub mod scanner;

pub use batch::{BatchReport, BatchRunner, ClassificationResult, ClassificationTask, TaskOutcome};
pub use captions::{prepend_to_captions, CaptionError, CaptionReport};
pub use classifier::{ClassificationError, LabelClassifier, ModelConfig, ModelInputSpec};
pub use config::{
    normalize_extension, ConfigError, ConfigurationError, SorterConfig,
    DEFAULT_COMPANION_EXTENSION, DEFAULT_CONCURRENCY, DEFAULT_CONFIG_FILE,
};
pub use index::{Category, CategoryIndex, IndexSnapshot};
pub use pipeline::{FolderSorter, SortError};
pub use progress::{
    ChannelSink, NullSink, ProgressBarSink, ProgressEvent, ProgressSink, TracingSink,
};
pub use relocation::{FileFailure, MovedFile, RelocationEngine, RelocationError, RelocationReport};
pub use reporting::{write_json, write_summary, ReportingError, RunReport};
pub use scanner::{collect_candidates, count_entries, ScanError};

#[cfg(feature = "onnx")]
pub use classifier::{init_ort_runtime, OnnxClassifier};
