//! Image preprocessing and shared inference utilities.

use super::config::{ModelInputSpec, TensorLayout};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default ImageNet normalization mean (RGB order).
pub const IMAGE_NET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Default ImageNet normalization standard deviation (RGB order).
pub const IMAGE_NET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Errors raised while turning an image into a label.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("cannot open {} as an image: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("inference failed for {}: {message}", .path.display())]
    Inference { path: PathBuf, message: String },
    #[error("model not found: {}", .0.display())]
    ModelNotFound(PathBuf),
    #[error("classifier setup failed: {0}")]
    Setup(String),
}

impl ClassificationError {
    /// Builds an inference failure for `path`.
    pub fn inference(path: &Path, message: impl Into<String>) -> Self {
        Self::Inference {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// The image the failure is about, when it concerns a single file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Decode { path, .. } | Self::Inference { path, .. } => Some(path),
            Self::ModelNotFound(_) | Self::Setup(_) => None,
        }
    }
}

/// Decodes an image and normalizes it to 8-bit, 3-channel RGB.
pub fn load_rgb(image_path: &Path) -> Result<RgbImage, ClassificationError> {
    let image = image::open(image_path).map_err(|source| ClassificationError::Decode {
        path: image_path.to_path_buf(),
        source,
    })?;
    Ok(normalize_color(image))
}

/// Converts grayscale, alpha, 16-bit and float images to plain RGB.
/// Images that already are RGB8 are passed through untouched.
pub fn normalize_color(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            tracing::trace!(color = ?other.color(), "converting image to RGB");
            other.to_rgb8()
        }
    }
}

/// Loads `image_path` and converts it into the input tensor described by `spec`.
pub fn preprocess_image(
    image_path: &Path,
    spec: &ModelInputSpec,
) -> Result<Array4<f32>, ClassificationError> {
    let rgb = load_rgb(image_path)?;
    Ok(image_to_tensor(&rgb, spec))
}

/// Resizes an RGB image to the model resolution and lays it out as a
/// batch-of-one float tensor.
pub fn image_to_tensor(rgb: &RgbImage, spec: &ModelInputSpec) -> Array4<f32> {
    let resized;
    let source = if rgb.dimensions() == (spec.width, spec.height) {
        rgb
    } else {
        resized = imageops::resize(rgb, spec.width, spec.height, FilterType::Triangle);
        &resized
    };

    let mean = spec.mean.unwrap_or(IMAGE_NET_MEAN);
    let std = spec.std.unwrap_or(IMAGE_NET_STD);
    let value = |x: usize, y: usize, channel: usize| {
        let raw = source.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0;
        if spec.normalize {
            (raw - mean[channel]) / std[channel]
        } else {
            raw
        }
    };

    let (width, height) = (spec.width as usize, spec.height as usize);
    match spec.layout {
        TensorLayout::Nchw => {
            Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| value(x, y, c))
        }
        TensorLayout::Nhwc => {
            Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| value(x, y, c))
        }
    }
}

/// Index and score of the highest score. Ties resolve to the lowest index;
/// NaN scores are ignored.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .fold(None, |best, (index, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((index, score)),
        })
}
