//! Image classification behind a uniform adapter.
//!
//! The rest of the crate only sees [`LabelClassifier`]: an image path goes in,
//! a single category label comes out. Backends normalize the image to
//! 3-channel RGB before inference (see [`load_rgb`]) so grayscale, palette and
//! alpha images classify like any other photo.
//!
//! # Configuration
//!
//! The ONNX backend is configured under the `[model]` table of the sorter
//! configuration file (`imgsort.toml`):
//!
//! ```toml
//! [model]
//! models_dir = ".vendor/models"
//! path = "vit-base-patch16-224.onnx"
//! labels_file = "config.json"
//!
//! [model.input]
//! width = 224
//! height = 224
//! normalize = true
//! mean = [0.5, 0.5, 0.5]
//! std = [0.5, 0.5, 0.5]
//! ```
//!
//! # Runtime Initialization
//!
//! With the `onnx` feature, [`OnnxClassifier::from_config`] loads the ONNX
//! Runtime shared library named by `ort_library` on first use. The library is
//! loaded dynamically, so it has to be present at run time.
//!
//! # Test doubles
//!
//! Any `Fn(&Path) -> Result<String, ClassificationError>` closure is a
//! classifier, which keeps the batch runner testable without a model:
//!
//! ```
//! use imgsort_core::classifier::{ClassificationError, LabelClassifier};
//! use std::path::Path;
//!
//! let by_prefix = |path: &Path| -> Result<String, ClassificationError> {
//!     let name = path.file_name().unwrap().to_string_lossy();
//!     Ok(name.split('_').next().unwrap_or("other").to_string())
//! };
//! assert_eq!(by_prefix.classify(Path::new("cat_01.jpg")).unwrap(), "cat");
//! ```

mod config;
mod labels;
#[cfg(feature = "onnx")]
mod onnx;
mod runtime;

pub use config::{ModelConfig, ModelInputSpec, TensorLayout};
pub use labels::{load_labels, load_labels_from_csv, load_labels_from_json, load_labels_from_text};
#[cfg(feature = "onnx")]
pub use onnx::{init_ort_runtime, load_session, OnnxClassifier};
pub use runtime::{
    argmax, image_to_tensor, load_rgb, normalize_color, preprocess_image, ClassificationError,
    IMAGE_NET_MEAN, IMAGE_NET_STD,
};

use std::path::Path;

/// Maps one image to one category label.
///
/// Implementations are shared across worker threads and must not fail for
/// images that merely use an unusual color mode.
pub trait LabelClassifier: Send + Sync {
    /// Classify the image at `image_path`.
    fn classify(&self, image_path: &Path) -> Result<String, ClassificationError>;
}

impl<F> LabelClassifier for F
where
    F: Fn(&Path) -> Result<String, ClassificationError> + Send + Sync,
{
    fn classify(&self, image_path: &Path) -> Result<String, ClassificationError> {
        self(image_path)
    }
}
