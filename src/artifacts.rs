//! Persisted artifact layout and I/O for pipeline runs.
//!
//! Every stage communicates through files under an extraction directory:
//!
//! ```text
//! <extraction>/
//! ├── features.npy             raw features, f64, shape (N, D)
//! ├── image_names.json         N identifiers, the canonical index space
//! ├── feature_config.json      extractor parameters + feature_dim
//! ├── reductions/
//! │   └── <reducer>/run_<i>/   features.npy + reducer_config.json
//! └── clustering/
//!     └── <clusterer>/run_<i>/ cluster_labels.npy + cluster_config.json
//!                              (+ metrics.json after evaluation)
//! ```
//!
//! The identifier list is stored once per extraction; reduction runs reuse it
//! via [`resolve_image_names`] rather than duplicating it per run.
//!
//! Arrays travel as `.npy` (NumPy interchange), lists and manifests as JSON,
//! and the ground-truth table as CSV with `image_name`/`integer_label`
//! columns.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Feature matrix file name within a run directory.
pub const FEATURES_FILE: &str = "features.npy";
/// Cluster label file name within a clustering run directory.
pub const CLUSTER_LABELS_FILE: &str = "cluster_labels.npy";
/// Identifier list file name within an extraction directory.
pub const IMAGE_NAMES_FILE: &str = "image_names.json";
/// Metrics record file name within a clustering run directory.
pub const METRICS_FILE: &str = "metrics.json";
/// Extractor manifest file name within an extraction directory.
pub const FEATURE_CONFIG_FILE: &str = "feature_config.json";
/// Reducer manifest file name within a reduction run directory.
pub const REDUCER_CONFIG_FILE: &str = "reducer_config.json";
/// Clusterer manifest file name within a clustering run directory.
pub const CLUSTER_CONFIG_FILE: &str = "cluster_config.json";

fn open_artifact(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            Error::MissingArtifact {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Load a feature matrix from a `.npy` file.
pub fn load_features(path: &Path) -> Result<Array2<f64>> {
    let file = open_artifact(path)?;
    Array2::<f64>::read_npy(BufReader::new(file)).map_err(|source| Error::NpyRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a feature matrix as `.npy`.
pub fn save_features(path: &Path, features: &Array2<f64>) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    features
        .write_npy(&mut writer)
        .map_err(|source| Error::NpyWrite {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a cluster label array from a `.npy` file.
pub fn load_cluster_labels(path: &Path) -> Result<Array1<i64>> {
    let file = open_artifact(path)?;
    Array1::<i64>::read_npy(BufReader::new(file)).map_err(|source| Error::NpyRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a cluster label array as `.npy`.
pub fn save_cluster_labels(path: &Path, labels: &Array1<i64>) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    labels
        .write_npy(&mut writer)
        .map_err(|source| Error::NpyWrite {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the ordered identifier list from JSON.
pub fn load_image_names(path: &Path) -> Result<Vec<String>> {
    load_json(path)
}

/// Write the ordered identifier list as JSON.
pub fn save_image_names(path: &Path, names: &[String]) -> Result<()> {
    save_json(path, &names)
}

/// Deserialize any JSON artifact.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = open_artifact(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a JSON artifact in one write.
///
/// The value is rendered fully in memory first, so a serialization failure
/// leaves no file behind.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the identifier list for a run, falling back to the shared copy.
///
/// Returns `primary` when it exists. Otherwise the extraction-level copy is
/// tried: reduction runs live at `<extraction>/reductions/<reducer>/run_<i>/`,
/// so the shared [`IMAGE_NAMES_FILE`] sits four ancestors above the per-run
/// path.
///
/// # Errors
///
/// [`Error::MissingArtifact`] naming the primary path when neither location
/// holds the file.
pub fn resolve_image_names(primary: &Path) -> Result<PathBuf> {
    if primary.is_file() {
        return Ok(primary.to_path_buf());
    }

    if let Some(ancestor) = primary.ancestors().nth(4) {
        let fallback = ancestor.join(IMAGE_NAMES_FILE);
        if fallback.is_file() {
            return Ok(fallback);
        }
    }

    Err(Error::MissingArtifact {
        path: primary.to_path_buf(),
    })
}

/// Ground-truth identity table: ordered (identifier, identity) rows.
///
/// Partial overlap with an identifier list is expected. Duplicate identifiers
/// are preserved; each occurrence is treated independently downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    entries: Vec<(String, i64)>,
}

impl GroundTruth {
    /// Build a table directly from rows, preserving their order.
    pub fn from_entries(entries: Vec<(String, i64)>) -> Self {
        GroundTruth { entries }
    }

    /// Parse a CSV table with `image_name` and `integer_label` header columns.
    ///
    /// Columns may appear in any order and extra columns are ignored. Fields
    /// are unquoted, CRLF line endings are tolerated, and blank lines are
    /// skipped. Row order and duplicate identifiers are preserved.
    ///
    /// # Errors
    ///
    /// [`Error::MissingArtifact`] when the file does not exist and
    /// [`Error::GroundTruth`] with a 1-based line number for a missing
    /// required column, a short row, or a non-integer label.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = open_artifact(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .transpose()
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| Error::GroundTruth {
                path: path.to_path_buf(),
                line: 1,
                message: "missing header row".to_string(),
            })?;

        let mut name_column = None;
        let mut label_column = None;
        for (column, field) in header.trim_end_matches('\r').split(',').enumerate() {
            match field.trim() {
                "image_name" => name_column = Some(column),
                "integer_label" => label_column = Some(column),
                _ => {}
            }
        }
        let (name_column, label_column) = match (name_column, label_column) {
            (Some(name), Some(label)) => (name, label),
            _ => {
                return Err(Error::GroundTruth {
                    path: path.to_path_buf(),
                    line: 1,
                    message: "header must name image_name and integer_label columns".to_string(),
                });
            }
        };

        let mut entries = Vec::new();
        for (index, line) in lines.enumerate() {
            let line = line.map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let line = line.trim_end_matches('\r');
            let number = index + 2;

            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split(',').collect();
            let needed = name_column.max(label_column);
            if fields.len() <= needed {
                return Err(Error::GroundTruth {
                    path: path.to_path_buf(),
                    line: number,
                    message: format!(
                        "row has {} field(s), needs at least {}",
                        fields.len(),
                        needed + 1
                    ),
                });
            }

            let name = fields[name_column].trim();
            let label_text = fields[label_column].trim();
            let label: i64 = label_text.parse().map_err(|_| Error::GroundTruth {
                path: path.to_path_buf(),
                line: number,
                message: format!("integer_label '{label_text}' is not an integer"),
            })?;

            entries.push((name.to_string(), label));
        }

        Ok(GroundTruth { entries })
    }

    /// Number of rows, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.entries
            .iter()
            .map(|(name, label)| (name.as_str(), *label))
    }
}
