//! Dimensionality reduction seam.
//!
//! Training mechanics live behind [`Reducer`]; this module owns the pieces
//! around an implementor: the min-max scaling applied before training, the
//! manifest written next to reduced features, and the [`FitOutcome`] split
//! between a usable embedding and a diverged fit.
//!
//! Divergence is data, not an error. A sweep that trains many reducers
//! records a [`NumericalFailure`] and moves on; only infrastructure
//! failures surface as [`Error`](crate::error::Error).

use std::fmt;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-column min-max scaling to `[0, 1]`.
///
/// Callers conventionally fit on training rows only and apply the fitted
/// scaler to everything else. Values outside the fitted range scale past
/// the unit interval; nothing is clipped.
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    mins: Array1<f64>,
    ranges: Array1<f64>,
}

impl MinMaxScaler {
    /// Record per-column minima and ranges.
    ///
    /// A constant column gets a substitute range of 1, so it scales to 0
    /// rather than dividing by zero.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyInput`] when the matrix has no rows or no columns.
    pub fn fit(features: ArrayView2<'_, f64>) -> Result<Self> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(Error::EmptyInput);
        }

        let mut mins = Array1::from_elem(features.ncols(), f64::INFINITY);
        let mut maxs = Array1::from_elem(features.ncols(), f64::NEG_INFINITY);
        for row in features.rows() {
            for (column, &value) in row.iter().enumerate() {
                if value < mins[column] {
                    mins[column] = value;
                }
                if value > maxs[column] {
                    maxs[column] = value;
                }
            }
        }

        let ranges = Array1::from_iter(
            mins.iter()
                .zip(maxs.iter())
                .map(|(&lo, &hi)| if hi > lo { hi - lo } else { 1.0 }),
        );
        Ok(MinMaxScaler { mins, ranges })
    }

    /// Scale a matrix with the fitted column statistics.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] when the column count differs from the
    /// fitted one.
    pub fn transform(&self, features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.mins.len() {
            return Err(Error::DimensionMismatch {
                expected: self.mins.len(),
                found: features.ncols(),
            });
        }

        let mut scaled = features.to_owned();
        for mut row in scaled.rows_mut() {
            for (column, value) in row.iter_mut().enumerate() {
                *value = (*value - self.mins[column]) / self.ranges[column];
            }
        }
        Ok(scaled)
    }

    /// Fit on a matrix and scale that same matrix.
    pub fn fit_transform(features: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        MinMaxScaler::fit(features)?.transform(features)
    }
}

/// A fit that produced non-finite values instead of an embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericalFailure {
    pub message: String,
}

impl fmt::Display for NumericalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Result of one training attempt.
#[derive(Debug, Clone)]
pub enum FitOutcome {
    /// Training converged; the embedding has the configured width.
    Reduced(Array2<f64>),
    /// Training blew up numerically. The attempt is reportable, not fatal.
    Diverged(NumericalFailure),
}

/// Reducer parameters, tagged by family for on-disk manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reducer", rename_all = "snake_case")]
pub enum ReducerConfig {
    SparseAutoencoder {
        latent_dim: usize,
        lambda: f64,
        beta: f64,
        sparsity: f64,
    },
    DeepAutoencoder {
        layer_dims: Vec<usize>,
    },
}

impl ReducerConfig {
    /// Width of the embedding this configuration produces.
    pub fn latent_dim(&self) -> usize {
        match self {
            ReducerConfig::SparseAutoencoder { latent_dim, .. } => *latent_dim,
            ReducerConfig::DeepAutoencoder { layer_dims } => {
                layer_dims.last().copied().unwrap_or(0)
            }
        }
    }

    /// Reject parameter combinations no reducer can train with.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        match self {
            ReducerConfig::SparseAutoencoder {
                latent_dim,
                lambda,
                beta,
                sparsity,
            } => {
                if *latent_dim == 0 {
                    return Err(Error::InvalidParameter {
                        name: "latent_dim",
                        message: "must be at least 1",
                    });
                }
                if !lambda.is_finite() || *lambda <= 0.0 {
                    return Err(Error::InvalidParameter {
                        name: "lambda",
                        message: "must be positive",
                    });
                }
                if !beta.is_finite() || *beta <= 0.0 {
                    return Err(Error::InvalidParameter {
                        name: "beta",
                        message: "must be positive",
                    });
                }
                if !sparsity.is_finite() || *sparsity <= 0.0 || *sparsity >= 1.0 {
                    return Err(Error::InvalidParameter {
                        name: "sparsity",
                        message: "must lie strictly between 0 and 1",
                    });
                }
            }
            ReducerConfig::DeepAutoencoder { layer_dims } => {
                if layer_dims.is_empty() {
                    return Err(Error::InvalidParameter {
                        name: "layer_dims",
                        message: "must name at least one layer",
                    });
                }
                if layer_dims.contains(&0) {
                    return Err(Error::InvalidParameter {
                        name: "layer_dims",
                        message: "layer widths must be at least 1",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Reduction manifest persisted as `reducer_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerManifest {
    #[serde(flatten)]
    pub config: ReducerConfig,
    pub optimizer: String,
    pub loss: String,
}

impl ReducerManifest {
    /// Manifest with the standard training setup: adam optimizer, mean
    /// squared error loss.
    pub fn new(config: ReducerConfig) -> Self {
        ReducerManifest {
            config,
            optimizer: "adam".to_string(),
            loss: "mse".to_string(),
        }
    }
}

/// One trainable reduction model.
///
/// `fit_transform` takes `&mut self` so implementors can keep their learned
/// weights for later inspection.
pub trait Reducer {
    /// Parameters this reducer was built with.
    fn config(&self) -> ReducerConfig;

    /// Manifest to persist next to the reduced features.
    fn manifest(&self) -> ReducerManifest {
        ReducerManifest::new(self.config())
    }

    /// Train on the given features and return their embedding, or report
    /// divergence.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only. Numerical blowup is the
    /// [`FitOutcome::Diverged`] value, not an error.
    fn fit_transform(&mut self, features: ArrayView2<'_, f64>) -> Result<FitOutcome>;
}
