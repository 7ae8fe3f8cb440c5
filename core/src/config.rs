//! Run configuration, loaded from `imgsort.toml`.
//!
//! ```toml
//! concurrency = 4
//! companion_extension = "txt"
//!
//! [model]
//! path = "vit-base-patch16-224.onnx"
//! labels_file = "config.json"
//! ```

use crate::classifier::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "imgsort.toml";

/// Default number of images classified at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default extension of the caption file that travels with each image.
pub const DEFAULT_COMPANION_EXTENSION: &str = "txt";

/// Invalid run parameters. Raised before any file is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),
    #[error("companion extension {0:?} must be a bare extension such as \"txt\"")]
    InvalidCompanionExtension(String),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Failure to read or write the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config TOML in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parameters of a sorting run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    /// Maximum number of images classified at the same time
    pub concurrency: usize,
    /// Extension of the companion file moved along with each image; files
    /// with this extension are never classified themselves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion_extension: Option<String>,
    pub model: ModelConfig,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            companion_extension: Some(DEFAULT_COMPANION_EXTENSION.to_string()),
            model: ModelConfig::default(),
        }
    }
}

impl SorterConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from the first default location that has a file,
    /// falling back to built-in defaults.
    ///
    /// Looks in the working directory, then in the platform config directory
    /// (`~/.config/imgsort/imgsort.toml` on Linux). A file that exists but
    /// does not parse is logged and skipped.
    pub fn load_or_default() -> Self {
        for candidate in default_locations() {
            if !candidate.exists() {
                continue;
            }
            match Self::load(&candidate) {
                Ok(config) => {
                    tracing::debug!(path = %candidate.display(), "loaded configuration");
                    return config;
                }
                Err(error) => tracing::warn!(%error, "ignoring configuration file"),
            }
        }
        Self::default()
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the run parameters.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(self.concurrency));
        }
        if let Some(extension) = &self.companion_extension {
            normalize_extension(extension)?;
        }
        Ok(())
    }
}

/// Accepts bare extensions such as `txt`; a single leading dot is tolerated
/// and stripped.
pub fn normalize_extension(extension: &str) -> Result<String, ConfigurationError> {
    let bare = extension.strip_prefix('.').unwrap_or(extension);
    if bare.is_empty() || bare.contains(['.', '/', '\\']) {
        return Err(ConfigurationError::InvalidCompanionExtension(
            extension.to_string(),
        ));
    }
    Ok(bare.to_string())
}

fn default_locations() -> Vec<PathBuf> {
    let mut locations = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("imgsort");
        dir.push(DEFAULT_CONFIG_FILE);
        locations.push(dir);
    }
    locations
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_valid() {
        let config = SorterConfig::default();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.companion_extension.as_deref(), Some("txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut config = SorterConfig::default();
        config.concurrency = 9;
        config.companion_extension = Some(String::from("caption"));
        config.save(&path).unwrap();

        let loaded = SorterConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "concurrency = 2\n[model]\npath = \"resnet50.onnx\"\n").unwrap();

        let config = SorterConfig::load(&path).unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.companion_extension.as_deref(), Some("txt"));
        assert_eq!(config.model.path, PathBuf::from("resnet50.onnx"));
        assert_eq!(config.model.input.width, 224);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = SorterConfig {
            concurrency: 0,
            ..SorterConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidConcurrency(0))
        );
    }

    #[test]
    fn extensions_are_normalized() {
        assert_eq!(normalize_extension(".txt").unwrap(), "txt");
        assert_eq!(normalize_extension("json").unwrap(), "json");
        assert!(normalize_extension("").is_err());
        assert!(normalize_extension(".").is_err());
        assert!(normalize_extension("tar.gz").is_err());
        assert!(normalize_extension("a/b").is_err());
        assert!(normalize_extension("..txt").is_err());
    }

    #[test]
    fn invalid_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "concurrency = \"many\"").unwrap();
        let error = SorterConfig::load(&path).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
        assert!(error.to_string().contains("broken.toml"));
    }
}
