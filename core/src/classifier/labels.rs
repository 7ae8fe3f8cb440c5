//! Label loading for the classification backend.
//!
//! Labels map output positions of the model to category names, which in turn
//! become folder names. Supported sources:
//! - inline in the configuration
//! - plain text (one label per line)
//! - CSV with a header row, label in the second column
//! - JSON: an array, a `{"labels": [...]}` object, or a Hugging Face
//!   `config.json` carrying an `id2label` map

use super::config::ModelConfig;
use super::runtime::ClassificationError;
use csv::ReaderBuilder;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Load labels for `config`, preferring inline labels over a labels file.
pub fn load_labels(config: &ModelConfig) -> Result<Vec<String>, ClassificationError> {
    if !config.labels.is_empty() {
        return Ok(config.labels.clone());
    }

    let label_path = config.labels_path().ok_or_else(|| {
        ClassificationError::Setup("no labels or labels_file configured for the model".to_string())
    })?;
    if !label_path.exists() {
        return Err(ClassificationError::ModelNotFound(label_path));
    }

    let extension = label_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("csv") => load_labels_from_csv(&label_path),
        Some("json") => load_labels_from_json(&label_path),
        _ => load_labels_from_text(&label_path),
    }
}

/// Load labels from a CSV file.
///
/// ```csv
/// id,name
/// 0,tench
/// 1,goldfish
/// ```
pub fn load_labels_from_csv(path: &Path) -> Result<Vec<String>, ClassificationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| {
            ClassificationError::Setup(format!(
                "failed to read labels CSV {}: {}",
                path.display(),
                e
            ))
        })?;

    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| ClassificationError::Setup(format!("invalid label record: {}", e)))?;
        if let Some(name) = record.get(1) {
            let trimmed = name.trim();
            if !trimmed.is_empty() {
                labels.push(trimmed.to_string());
            }
        }
    }

    non_empty(labels, path)
}

/// Load labels from a plain text file, one label per line.
pub fn load_labels_from_text(path: &Path) -> Result<Vec<String>, ClassificationError> {
    let content = read(path)?;
    let labels = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();

    non_empty(labels, path)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LabelDocument {
    List(Vec<String>),
    Wrapped { labels: Vec<String> },
    IdMap { id2label: FxHashMap<String, String> },
}

/// Load labels from a JSON file.
pub fn load_labels_from_json(path: &Path) -> Result<Vec<String>, ClassificationError> {
    let content = read(path)?;
    let document: LabelDocument = serde_json::from_str(&content).map_err(|e| {
        ClassificationError::Setup(format!(
            "invalid JSON label format in {}: {}",
            path.display(),
            e
        ))
    })?;

    let labels = match document {
        LabelDocument::List(labels) | LabelDocument::Wrapped { labels } => labels,
        LabelDocument::IdMap { id2label } => labels_from_id_map(id2label)
            .map_err(|message| {
                ClassificationError::Setup(format!("{} in {}", message, path.display()))
            })?,
    };

    non_empty(labels, path)
}

/// Turns `{"0": "tench", "1": "goldfish"}` into a dense, position-indexed list.
fn labels_from_id_map(map: FxHashMap<String, String>) -> Result<Vec<String>, String> {
    let mut entries = map
        .into_iter()
        .map(|(id, label)| {
            id.trim()
                .parse::<usize>()
                .map(|index| (index, label))
                .map_err(|_| format!("label id {:?} is not a number", id))
        })
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|(index, _)| *index);

    entries
        .into_iter()
        .enumerate()
        .map(|(position, (index, label))| {
            if position == index {
                Ok(label)
            } else {
                Err(format!("label id {} is missing", position))
            }
        })
        .collect()
}

fn read(path: &Path) -> Result<String, ClassificationError> {
    fs::read_to_string(path).map_err(|e| {
        ClassificationError::Setup(format!(
            "failed to read label file {}: {}",
            path.display(),
            e
        ))
    })
}

fn non_empty(labels: Vec<String>, path: &Path) -> Result<Vec<String>, ClassificationError> {
    if labels.is_empty() {
        return Err(ClassificationError::Setup(format!(
            "no labels found in {}",
            path.display()
        )));
    }
    Ok(labels)
}
