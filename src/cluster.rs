//! Clustering seam: label conventions, the clustering trait, and fuzzy filtering.
//!
//! The pipeline treats clustering algorithms as pluggable: a [`Clusterer`]
//! turns a feature matrix into one `i64` label per row, and points the
//! algorithm declines to assign carry the [`FUZZY`] label. Downstream
//! evaluation never scores fuzzy points with internal indices, so
//! [`remove_fuzzy`] is the one filtering primitive everything shares.
//!
//! Cluster ids need not be contiguous or start at 0; only [`FUZZY`] is
//! reserved.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cluster label for noise / unassigned points.
pub const FUZZY: i64 = -1;

/// Trait for clustering algorithms driven by the pipeline.
pub trait Clusterer {
    /// Parameters of this clusterer, recorded in the persisted run manifest.
    fn config(&self) -> ClusterConfig;

    /// Assign one cluster label per feature row.
    ///
    /// Returns an array of the same length as the number of rows. Any label
    /// other than [`FUZZY`] denotes a cluster id.
    fn cluster(&self, features: ArrayView2<'_, f64>) -> Result<Array1<i64>>;
}

/// Clustering run parameters, one explicit variant per algorithm.
///
/// Serialized field-by-field into `cluster_config.json`, tagged by the
/// `clusterer` key, so the persisted schema is an explicit contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "clusterer", rename_all = "snake_case")]
pub enum ClusterConfig {
    /// Lloyd-style k-means; repeated runs get separate run directories.
    Kmeans {
        /// Number of clusters to fit.
        n_clusters: usize,
    },
    /// Approximate rank-order clustering (Otto et al., 2018).
    ApproximateRankOrder {
        /// Size of each point's nearest-neighbour list.
        n_neighbours: usize,
        /// Rank-order distance threshold for merging.
        threshold: f64,
        /// Minimum cluster size; smaller groups become fuzzy.
        min_samples: usize,
    },
}

impl ClusterConfig {
    /// Check parameter ranges before a run is launched.
    pub fn validate(&self) -> Result<()> {
        match self {
            ClusterConfig::Kmeans { n_clusters } => {
                if *n_clusters == 0 {
                    return Err(Error::InvalidParameter {
                        name: "n_clusters",
                        message: "must be at least 1",
                    });
                }
            }
            ClusterConfig::ApproximateRankOrder {
                n_neighbours,
                threshold,
                min_samples,
            } => {
                if *n_neighbours == 0 {
                    return Err(Error::InvalidParameter {
                        name: "n_neighbours",
                        message: "must be at least 1",
                    });
                }
                if *threshold <= 0.0 {
                    return Err(Error::InvalidParameter {
                        name: "threshold",
                        message: "must be positive",
                    });
                }
                if *min_samples == 0 {
                    return Err(Error::InvalidParameter {
                        name: "min_samples",
                        message: "must be at least 1",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Drop all fuzzy points, preserving the relative order of the rest.
///
/// Returns the rows of `features` and the entries of `labels` at positions
/// where the label is not [`FUZZY`]. Pure selection; the inputs are untouched.
///
/// # Errors
///
/// [`Error::AlignmentMismatch`] when the two inputs disagree in length.
pub fn remove_fuzzy(
    features: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, i64>,
) -> Result<(Array2<f64>, Array1<i64>)> {
    if features.nrows() != labels.len() {
        return Err(Error::AlignmentMismatch {
            features: features.nrows(),
            labels: labels.len(),
        });
    }

    let keep: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &label)| label != FUZZY)
        .map(|(i, _)| i)
        .collect();

    let kept_features = features.select(Axis(0), &keep);
    let kept_labels = Array1::from_iter(keep.iter().map(|&i| labels[i]));

    Ok((kept_features, kept_labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_remove_fuzzy_filters_and_preserves_order() {
        let features = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let labels = array![0, FUZZY, 2, FUZZY];

        let (kept_features, kept_labels) = remove_fuzzy(features.view(), labels.view()).unwrap();

        assert_eq!(kept_features, array![[0.0, 0.0], [2.0, 2.0]]);
        assert_eq!(kept_labels, array![0, 2]);
    }

    #[test]
    fn test_remove_fuzzy_all_fuzzy() {
        let features = array![[1.0], [2.0], [3.0]];
        let labels = array![FUZZY, FUZZY, FUZZY];

        let (kept_features, kept_labels) = remove_fuzzy(features.view(), labels.view()).unwrap();

        assert_eq!(kept_features.nrows(), 0);
        assert_eq!(kept_features.ncols(), 1);
        assert_eq!(kept_labels.len(), 0);
    }

    #[test]
    fn test_remove_fuzzy_nothing_to_remove() {
        let features = array![[1.0], [2.0]];
        let labels = array![4, 9];

        let (kept_features, kept_labels) = remove_fuzzy(features.view(), labels.view()).unwrap();

        assert_eq!(kept_features, features);
        assert_eq!(kept_labels, labels);
    }

    #[test]
    fn test_remove_fuzzy_alignment_mismatch() {
        let features = array![[1.0], [2.0], [3.0]];
        let labels = array![0, 1];

        let result = remove_fuzzy(features.view(), labels.view());
        assert!(matches!(
            result,
            Err(Error::AlignmentMismatch {
                features: 3,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_cluster_config_json_schema() {
        let config = ClusterConfig::ApproximateRankOrder {
            n_neighbours: 200,
            threshold: 0.1,
            min_samples: 10,
        };

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["clusterer"], "approximate_rank_order");
        assert_eq!(value["n_neighbours"], 200);
        assert_eq!(value["min_samples"], 10);

        let back: ClusterConfig = serde_json::from_value(value).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_cluster_config_validate() {
        assert!(ClusterConfig::Kmeans { n_clusters: 8 }.validate().is_ok());
        assert!(ClusterConfig::Kmeans { n_clusters: 0 }.validate().is_err());

        let bad_threshold = ClusterConfig::ApproximateRankOrder {
            n_neighbours: 200,
            threshold: 0.0,
            min_samples: 10,
        };
        assert!(matches!(
            bad_threshold.validate(),
            Err(Error::InvalidParameter {
                name: "threshold",
                ..
            })
        ));
    }

    proptest! {
        #[test]
        fn remove_fuzzy_matches_naive_filter(
            labels in proptest::collection::vec(-1i64..4, 0..50),
        ) {
            // Feature value encodes the original row index
            let n = labels.len();
            let features = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
            let label_arr = Array1::from(labels.clone());

            let (kept_features, kept_labels) =
                remove_fuzzy(features.view(), label_arr.view()).unwrap();

            let expected_rows: Vec<usize> = (0..n).filter(|&i| labels[i] != FUZZY).collect();
            prop_assert_eq!(kept_labels.len(), expected_rows.len());
            for (row, &orig) in expected_rows.iter().enumerate() {
                prop_assert_eq!(kept_features[[row, 0]], orig as f64);
                prop_assert_eq!(kept_labels[row], labels[orig]);
            }
        }
    }
}
