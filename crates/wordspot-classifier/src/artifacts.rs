//! Artifact file management: path resolution and the label lookup table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::types::{ClassifierError, ResultExt};

/// Typed paths for the two deployment artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Pre-trained classifier exported to ONNX (`model1.onnx`).
    pub model: PathBuf,
    /// Label → class index table (`class_label_lookup.json`).
    pub labels: PathBuf,
}

impl ArtifactPaths {
    /// Default model filename.
    pub const MODEL_FILE: &str = "model1.onnx";
    /// Default label lookup filename.
    pub const LABELS_FILE: &str = "class_label_lookup.json";

    /// Construct paths for both artifacts under `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(Self::MODEL_FILE),
            labels: dir.join(Self::LABELS_FILE),
        }
    }

    /// Check that both artifacts exist.
    pub fn all_exist(&self) -> bool {
        self.model.exists() && self.labels.exists()
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::from_dir(".")
    }
}

/// Class index → label mapping, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    by_index: BTreeMap<usize, String>,
}

impl LabelMap {
    /// Build the reverse mapping from a label → index table.
    ///
    /// Two labels claiming the same index make the table ambiguous and are rejected.
    pub fn from_label_to_index(table: HashMap<String, usize>) -> Result<Self, ClassifierError> {
        if table.is_empty() {
            return Err(ClassifierError::MalformedLabels("no labels".into()));
        }

        let mut by_index = BTreeMap::new();
        for (label, index) in table {
            if let Some(existing) = by_index.insert(index, label) {
                let other = &by_index[&index];
                return Err(ClassifierError::MalformedLabels(format!(
                    "index {index} claimed by both {existing:?} and {other:?}"
                )));
            }
        }

        Ok(Self { by_index })
    }

    /// Parse a JSON object of the form `{"cat": 0, "eight": 1, ...}`.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let table: HashMap<String, usize> = serde_json::from_str(json)
            .map_err(|e| ClassifierError::MalformedLabels(e.to_string()))?;
        Self::from_label_to_index(table)
    }

    /// Parse a pickled `{label: index}` dict, as written by Python's `pickle.dump`.
    pub fn from_pickle(bytes: &[u8]) -> Result<Self, ClassifierError> {
        let table: HashMap<String, usize> =
            serde_pickle::from_slice(bytes, serde_pickle::DeOptions::new())
                .map_err(|e| ClassifierError::MalformedLabels(e.to_string()))?;
        Self::from_label_to_index(table)
    }

    /// Read and invert the label lookup file.
    ///
    /// `.pkl` and `.pickle` files are read as pickle, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        debug!(path = %path.display(), "reading label lookup");
        let bytes = std::fs::read(path).model(&format!("read {}", path.display()))?;
        let is_pickle = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pkl") || e.eq_ignore_ascii_case("pickle"));
        let labels = if is_pickle {
            Self::from_pickle(&bytes)?
        } else {
            let content = std::str::from_utf8(&bytes)
                .map_err(|e| ClassifierError::MalformedLabels(e.to_string()))?;
            Self::from_json(content)?
        };
        info!(classes = labels.len(), "label lookup loaded");
        Ok(labels)
    }

    /// Label for a class index, if the index is known.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.by_index.get(&index).map(String::as_str)
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Whether the mapping has no classes. Never true for a loaded map.
    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Labels ordered by class index.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.by_index.values().map(String::as_str)
    }

    /// Whether `label` is one of the known labels.
    pub fn contains_label(&self, label: &str) -> bool {
        self.by_index.values().any(|l| l == label)
    }
}
