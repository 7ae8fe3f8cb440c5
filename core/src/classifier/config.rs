//! Model description for the inference backend.
//!
//! Lives under the `[model]` table of the sorter configuration file so the
//! model can be swapped without recompiling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Memory layout of the input tensor expected by the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorLayout {
    /// Batch, channel, height, width (PyTorch exports).
    #[default]
    #[serde(rename = "NCHW")]
    Nchw,
    /// Batch, height, width, channel (TensorFlow exports).
    #[serde(rename = "NHWC")]
    Nhwc,
}

/// Input format requirements for a model. Fields missing from the
/// configuration keep their [`Default`] values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInputSpec {
    /// Input image width in pixels
    pub width: u32,
    /// Input image height in pixels
    pub height: u32,
    /// Whether to apply mean/std normalization after scaling to 0..1
    pub normalize: bool,
    pub layout: TensorLayout,
    /// Per-channel mean; `None` falls back to the ImageNet values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<[f32; 3]>,
    /// Per-channel standard deviation; `None` falls back to the ImageNet values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<[f32; 3]>,
}

impl Default for ModelInputSpec {
    // ViT-base/16 at 224px, the processor normalizes with 0.5 everywhere.
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            normalize: true,
            layout: TensorLayout::Nchw,
            mean: Some([0.5, 0.5, 0.5]),
            std: Some([0.5, 0.5, 0.5]),
        }
    }
}

/// Configuration for the classification model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base directory for relative model and label paths
    pub models_dir: PathBuf,
    /// Path to the ONNX model file (relative to `models_dir` or absolute)
    pub path: PathBuf,
    /// Path to the ONNX Runtime shared library
    pub ort_library: PathBuf,
    /// Inline class labels, indexed by output position
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Labels file (`.txt`, `.csv`, `.json` or a Hugging Face `config.json`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels_file: Option<PathBuf>,
    /// Threads used by a single inference call
    pub intra_threads: usize,
    pub input: ModelInputSpec,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(".vendor/models"),
            path: PathBuf::from("vit-base-patch16-224.onnx"),
            ort_library: default_ort_library(),
            labels: Vec::new(),
            labels_file: Some(PathBuf::from("config.json")),
            intra_threads: 1,
            input: ModelInputSpec::default(),
        }
    }
}

impl ModelConfig {
    /// Full path to the model file.
    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.path)
    }

    /// Full path to the labels file, if one is configured.
    pub fn labels_path(&self) -> Option<PathBuf> {
        self.labels_file.as_ref().map(|file| self.resolve(file))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.models_dir.join(path)
        }
    }
}

fn default_ort_library() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from(".vendor/onnxruntime/lib/onnxruntime.dll")
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from(".vendor/onnxruntime/lib/libonnxruntime.dylib")
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        PathBuf::from(".vendor/onnxruntime/lib/libonnxruntime.so")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_models_dir() {
        let config = ModelConfig::default();
        assert_eq!(
            config.model_path(),
            PathBuf::from(".vendor/models/vit-base-patch16-224.onnx")
        );
        assert_eq!(
            config.labels_path(),
            Some(PathBuf::from(".vendor/models/config.json"))
        );
    }

    #[test]
    fn absolute_paths_are_kept() {
        let absolute = std::env::temp_dir().join("model.onnx");
        let config = ModelConfig {
            path: absolute.clone(),
            ..ModelConfig::default()
        };
        assert_eq!(config.model_path(), absolute);
    }

    #[test]
    fn layout_uses_upper_case_names() {
        let spec: ModelInputSpec =
            toml::from_str("width = 299\nheight = 299\nlayout = \"NHWC\"\n").unwrap();
        assert_eq!(spec.layout, TensorLayout::Nhwc);
        assert_eq!((spec.width, spec.height), (299, 299));
    }

    #[test]
    fn partial_input_table_keeps_normalization_defaults() {
        let config: ModelConfig = toml::from_str("[input]\nwidth = 384\nheight = 384\n").unwrap();
        assert_eq!(config.input.width, 384);
        assert!(config.input.normalize);
        assert_eq!(config.input.layout, TensorLayout::Nchw);
        assert_eq!(config.input.mean, Some([0.5, 0.5, 0.5]));
        assert_eq!(config.input.std, Some([0.5, 0.5, 0.5]));
    }
}
