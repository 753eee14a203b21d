//! Feature extraction seam.
//!
//! Pixel decoding and descriptor math live behind [`FeatureExtractor`];
//! this module owns the orchestration around an implementor: walking an
//! image directory in name order, stacking per-image feature vectors into
//! one matrix, and persisting the three extraction artifacts together.
//!
//! An extraction directory produced by [`ExtractionOutput::save`] is the
//! root that every downstream reduction and clustering run hangs off.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::artifacts::{
    save_features, save_image_names, save_json, FEATURES_FILE, FEATURE_CONFIG_FILE,
    IMAGE_NAMES_FILE,
};
use crate::error::{Error, Result};

/// Target raster size applied before descriptor computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub width: u32,
    pub height: u32,
}

impl ResizeSpec {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParameter {
                name: "resize",
                message: "dimensions must be nonzero",
            });
        }
        Ok(())
    }
}

/// Neighbourhood encoding for local binary patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LbpMethod {
    Default,
    Ror,
    Uniform,
}

/// Extractor parameters, tagged by family for on-disk manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum FeatureConfig {
    RgbHistogram {
        resize: ResizeSpec,
        hist_size: usize,
    },
    Lbp {
        resize: ResizeSpec,
        points: usize,
        radius: usize,
        method: LbpMethod,
    },
    Hog {
        resize: ResizeSpec,
        orientations: usize,
        pixels_per_cell: usize,
        cells_per_block: usize,
    },
}

impl FeatureConfig {
    /// Reject parameter combinations no extractor can run with.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        match self {
            FeatureConfig::RgbHistogram { resize, hist_size } => {
                resize.validate()?;
                if *hist_size == 0 {
                    return Err(Error::InvalidParameter {
                        name: "hist_size",
                        message: "must be at least 1",
                    });
                }
            }
            FeatureConfig::Lbp {
                resize,
                points,
                radius,
                ..
            } => {
                resize.validate()?;
                if *points == 0 {
                    return Err(Error::InvalidParameter {
                        name: "points",
                        message: "must be at least 1",
                    });
                }
                if *radius == 0 {
                    return Err(Error::InvalidParameter {
                        name: "radius",
                        message: "must be at least 1",
                    });
                }
            }
            FeatureConfig::Hog {
                resize,
                orientations,
                pixels_per_cell,
                cells_per_block,
            } => {
                resize.validate()?;
                if *orientations == 0 {
                    return Err(Error::InvalidParameter {
                        name: "orientations",
                        message: "must be at least 1",
                    });
                }
                if *pixels_per_cell == 0 {
                    return Err(Error::InvalidParameter {
                        name: "pixels_per_cell",
                        message: "must be at least 1",
                    });
                }
                if *cells_per_block == 0 {
                    return Err(Error::InvalidParameter {
                        name: "cells_per_block",
                        message: "must be at least 1",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Extraction manifest persisted as `feature_config.json`.
///
/// The configuration fields are flattened alongside the measured width, so
/// the file reads as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureManifest {
    #[serde(flatten)]
    pub config: FeatureConfig,
    pub feature_dim: usize,
}

/// Per-image descriptor computation.
///
/// Implementors decode one image and turn it into a fixed-width feature
/// vector; the provided methods lift that into whole-directory extraction.
pub trait FeatureExtractor {
    /// Decoded image representation.
    type Image;

    /// Parameters this extractor was built with.
    fn config(&self) -> FeatureConfig;

    /// Decode a single image file.
    fn read_image(&self, path: &Path) -> Result<Self::Image>;

    /// Compute the feature vector for one decoded image.
    fn image_features(&self, image: &Self::Image) -> Result<Array1<f64>>;

    /// Extract features for the given files, one row per file in order.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyInput`] for an empty path list and
    /// [`Error::DimensionMismatch`] when an image yields a vector of a
    /// different width than the first.
    fn extract(&self, paths: &[PathBuf]) -> Result<Array2<f64>> {
        if paths.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut rows: Vec<Array1<f64>> = Vec::with_capacity(paths.len());
        for path in paths {
            let image = self.read_image(path)?;
            let row = self.image_features(&image)?;
            if let Some(first) = rows.first() {
                let expected = first.len();
                if row.len() != expected {
                    return Err(Error::DimensionMismatch {
                        expected,
                        found: row.len(),
                    });
                }
            }
            rows.push(row);
        }

        let width = rows[0].len();
        let mut features = Array2::zeros((rows.len(), width));
        for (index, row) in rows.iter().enumerate() {
            features.row_mut(index).assign(row);
        }
        Ok(features)
    }

    /// Extract features for every file in a directory, sorted by file name.
    ///
    /// Subdirectories are skipped. The returned identifier list holds bare
    /// file names in the same order as the feature rows.
    fn extract_dir(&self, dir: &Path) -> Result<ExtractionOutput> {
        let entries = fs::read_dir(dir).map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push((name, path));
        }
        files.sort();

        let (image_names, paths): (Vec<String>, Vec<PathBuf>) = files.into_iter().unzip();
        let features = self.extract(&paths)?;

        Ok(ExtractionOutput {
            image_names,
            features,
            config: self.config(),
        })
    }
}

/// One completed extraction: identifiers, features, and provenance.
#[derive(Debug, Clone)]
pub struct ExtractionOutput {
    /// Bare file names, one per feature row.
    pub image_names: Vec<String>,
    /// Feature matrix, shape `(N, D)`.
    pub features: Array2<f64>,
    /// Configuration the features were computed with.
    pub config: FeatureConfig,
}

impl ExtractionOutput {
    /// Manifest pairing the configuration with the measured feature width.
    pub fn manifest(&self) -> FeatureManifest {
        FeatureManifest {
            config: self.config.clone(),
            feature_dim: self.features.ncols(),
        }
    }

    /// Persist the three extraction artifacts under `dir`, creating it if
    /// needed.
    ///
    /// # Errors
    ///
    /// [`Error::IdentifierMismatch`] when the identifier list and feature
    /// matrix disagree on row count, plus any I/O failure.
    pub fn save(&self, dir: &Path) -> Result<()> {
        if self.image_names.len() != self.features.nrows() {
            return Err(Error::IdentifierMismatch {
                names: self.image_names.len(),
                features: self.features.nrows(),
            });
        }

        fs::create_dir_all(dir).map_err(|source| Error::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        save_features(&dir.join(FEATURES_FILE), &self.features)?;
        save_image_names(&dir.join(IMAGE_NAMES_FILE), &self.image_names)?;
        save_json(&dir.join(FEATURE_CONFIG_FILE), &self.manifest())
    }
}
