//! ONNX Runtime backend: a single-label image classifier.

use super::config::{ModelConfig, ModelInputSpec};
use super::labels::load_labels;
use super::runtime::{argmax, preprocess_image, ClassificationError};
use super::LabelClassifier;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Global flag to track if ORT runtime has been initialized.
static ORT_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize the ONNX Runtime from the shared library at `dylib_path`.
///
/// Idempotent: calls after the first successful initialization are no-ops.
pub fn init_ort_runtime(dylib_path: impl AsRef<Path>) -> Result<(), ClassificationError> {
    let path = dylib_path.as_ref();

    if ORT_INITIALIZED.get().is_some() {
        return Ok(());
    }

    if !path.exists() {
        return Err(ClassificationError::Setup(format!(
            "ONNX Runtime library not found at: {}",
            path.display()
        )));
    }

    let path_str = path.to_str().ok_or_else(|| {
        ClassificationError::Setup("ONNX Runtime path contains invalid UTF-8".to_string())
    })?;

    ort::init_from(path_str)
        .commit()
        .map_err(|e| ClassificationError::Setup(format!("ONNX Runtime init failed: {}", e)))?;

    let _ = ORT_INITIALIZED.set(());
    Ok(())
}

/// Load an ONNX session from a model file.
pub fn load_session(model_path: &Path, intra_threads: usize) -> Result<Session, ClassificationError> {
    if !model_path.exists() {
        return Err(ClassificationError::ModelNotFound(model_path.to_path_buf()));
    }

    let model_bytes = std::fs::read(model_path).map_err(|e| {
        ClassificationError::Setup(format!("failed to read model file: {}", e))
    })?;

    let setup = |e: ort::Error| ClassificationError::Setup(e.to_string());
    Session::builder()
        .map_err(setup)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(setup)?
        .with_intra_threads(intra_threads.max(1))
        .map_err(setup)?
        .commit_from_memory(&model_bytes)
        .map_err(setup)
}

/// Image classifier backed by an ONNX model whose first output holds one
/// logit per label.
///
/// Decoding and resizing run on the calling worker; the session itself is
/// shared and guarded by a mutex.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input: ModelInputSpec,
    labels: Vec<String>,
}

impl OnnxClassifier {
    /// Initializes the runtime and loads the model and labels from `config`.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ClassificationError> {
        init_ort_runtime(&config.ort_library)?;
        let session = load_session(&config.model_path(), config.intra_threads)?;
        let labels = load_labels(config)?;
        tracing::info!(
            model = %config.model_path().display(),
            labels = labels.len(),
            "loaded classification model"
        );
        Ok(Self {
            session: Mutex::new(session),
            input: config.input.clone(),
            labels,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl LabelClassifier for OnnxClassifier {
    fn classify(&self, image_path: &Path) -> Result<String, ClassificationError> {
        let input = preprocess_image(image_path, &self.input)?;
        let failed = |message: String| ClassificationError::inference(image_path, message);

        let input_tensor = Tensor::from_array(input).map_err(|e| failed(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| failed("inference session poisoned".to_string()))?;
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        let outputs = session
            .run(ort::inputs![input_name => input_tensor])
            .map_err(|e| failed(e.to_string()))?;
        let output = outputs
            .values()
            .next()
            .ok_or_else(|| failed("no output tensor found".to_string()))?;
        let (_, logits) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| failed(e.to_string()))?;

        let (index, _) = argmax(logits).ok_or_else(|| failed("empty model output".to_string()))?;
        self.labels
            .get(index)
            .cloned()
            .ok_or_else(|| failed(format!("class index {} has no label", index)))
    }
}
