//! Internal cluster validity indices.
//!
//! Scores computed from geometry alone, without ground truth. The evaluation
//! core calls these on the fuzzy-filtered subset of a run, never on the full
//! point set.
//!
//! # Indices Overview
//!
//! | Index | Range | Best | Measures |
//! |-------|-------|------|----------|
//! | [`silhouette_score`] | [-1, 1] | 1 | Cohesion vs. nearest-cluster separation |
//! | [`davies_bouldin_score`] | [0, inf) | 0 | Worst-case cluster overlap |
//! | [`calinski_harabasz_score`] | [0, inf) | high | Between/within dispersion ratio |
//!
//! # Preconditions
//!
//! All indices require between 2 and n - 1 distinct labels over n points;
//! anything else fails with [`Error::InsufficientClusters`]. Label values are
//! arbitrary `i64` ids, not necessarily contiguous or zero-based.
//!
//! # References
//!
//! - Rousseeuw (1987). "Silhouettes: a graphical aid to the interpretation
//!   and validation of cluster analysis"
//! - Davies & Bouldin (1979). "A Cluster Separation Measure"
//! - Caliński & Harabasz (1974). "A dendrite method for cluster analysis"

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{Error, Result};

/// Dense re-indexing of arbitrary label values into cluster ordinals.
struct ClusterIndex {
    /// Cluster ordinal of each point, in input order.
    point_cluster: Vec<usize>,
    /// Points per cluster ordinal.
    sizes: Vec<usize>,
}

fn index_clusters(labels: ArrayView1<'_, i64>) -> ClusterIndex {
    let mut ordinals: HashMap<i64, usize> = HashMap::new();
    let mut point_cluster = Vec::with_capacity(labels.len());
    let mut sizes: Vec<usize> = Vec::new();

    for &label in labels {
        let ordinal = match ordinals.get(&label) {
            Some(&ordinal) => ordinal,
            None => {
                let ordinal = sizes.len();
                let _ = ordinals.insert(label, ordinal);
                sizes.push(0);
                ordinal
            }
        };
        sizes[ordinal] += 1;
        point_cluster.push(ordinal);
    }

    ClusterIndex {
        point_cluster,
        sizes,
    }
}

fn validate(features: &ArrayView2<'_, f64>, labels: &ArrayView1<'_, i64>) -> Result<ClusterIndex> {
    if features.nrows() != labels.len() {
        return Err(Error::AlignmentMismatch {
            features: features.nrows(),
            labels: labels.len(),
        });
    }

    let index = index_clusters(*labels);
    let clusters = index.sizes.len();
    let points = labels.len();
    if clusters < 2 || clusters > points - 1 {
        return Err(Error::InsufficientClusters { clusters, points });
    }

    Ok(index)
}

#[inline]
fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[inline]
fn squared_euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Per-cluster centroids for a dense cluster index.
fn centroids(features: &ArrayView2<'_, f64>, index: &ClusterIndex) -> Array2<f64> {
    let k = index.sizes.len();
    let d = features.ncols();
    let mut centroids = Array2::<f64>::zeros((k, d));

    for (i, &c) in index.point_cluster.iter().enumerate() {
        for (dim, &value) in features.row(i).iter().enumerate() {
            centroids[[c, dim]] += value;
        }
    }
    for c in 0..k {
        let size = index.sizes[c] as f64;
        for dim in 0..d {
            centroids[[c, dim]] /= size;
        }
    }

    centroids
}

/// Mean silhouette coefficient over all points.
///
/// For each point with intra-cluster mean distance `a` and smallest
/// other-cluster mean distance `b`:
///
/// ```text
/// s = (b - a) / max(a, b)
/// ```
///
/// Points in singleton clusters score 0, and 0/0 resolves to 0. O(n^2 d).
///
/// # Errors
///
/// [`Error::AlignmentMismatch`], or [`Error::InsufficientClusters`] when
/// fewer than 2 or more than n - 1 distinct labels are present; an empty
/// input has zero distinct labels.
pub fn silhouette_score(
    features: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, i64>,
) -> Result<f64> {
    let index = validate(&features, &labels)?;
    let n = labels.len();
    let k = index.sizes.len();

    let mut total = 0.0;
    let mut dist_sums = vec![0.0f64; k];

    for i in 0..n {
        let own = index.point_cluster[i];
        if index.sizes[own] <= 1 {
            // Singleton clusters contribute a zero coefficient
            continue;
        }

        for sum in &mut dist_sums {
            *sum = 0.0;
        }
        for j in 0..n {
            if j != i {
                dist_sums[index.point_cluster[j]] += euclidean(features.row(i), features.row(j));
            }
        }

        let a = dist_sums[own] / (index.sizes[own] - 1) as f64;
        let mut b = f64::INFINITY;
        for c in 0..k {
            if c != own {
                b = b.min(dist_sums[c] / index.sizes[c] as f64);
            }
        }

        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }

    Ok(total / n as f64)
}

/// Davies-Bouldin index: mean over clusters of the worst overlap ratio.
///
/// With `S_i` the mean member distance to centroid i and `M_ij` the distance
/// between centroids i and j:
///
/// ```text
/// DB = mean_i max_{j != i} (S_i + S_j) / M_ij
/// ```
///
/// Coincident centroid pairs are excluded from the maximum; fully degenerate
/// inputs (all clusters collapsed) score 0. Lower is better.
pub fn davies_bouldin_score(
    features: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, i64>,
) -> Result<f64> {
    let index = validate(&features, &labels)?;
    let k = index.sizes.len();
    let centers = centroids(&features, &index);

    // S_i: mean distance of members to their centroid
    let mut intra = vec![0.0f64; k];
    for (i, &c) in index.point_cluster.iter().enumerate() {
        intra[c] += euclidean(features.row(i), centers.row(c));
    }
    for c in 0..k {
        intra[c] /= index.sizes[c] as f64;
    }

    let mut inter = Array2::<f64>::zeros((k, k));
    let mut all_inter_zero = true;
    for a in 0..k {
        for b in (a + 1)..k {
            let m = euclidean(centers.row(a), centers.row(b));
            inter[[a, b]] = m;
            inter[[b, a]] = m;
            if m > 0.0 {
                all_inter_zero = false;
            }
        }
    }

    let all_intra_zero = intra.iter().all(|&s| s <= 0.0);
    if all_intra_zero || all_inter_zero {
        return Ok(0.0);
    }

    let mut total = 0.0;
    for a in 0..k {
        let mut worst = 0.0f64;
        for b in 0..k {
            if b != a && inter[[a, b]] > 0.0 {
                worst = worst.max((intra[a] + intra[b]) / inter[[a, b]]);
            }
        }
        total += worst;
    }

    Ok(total / k as f64)
}

/// Calinski-Harabasz index: between-group over within-group dispersion.
///
/// ```text
/// CH = (BGD / (k - 1)) / (WGD / (n - k))
/// ```
///
/// where BGD is the size-weighted squared distance of centroids to the global
/// mean and WGD the squared distance of points to their centroid. Defined as
/// 1.0 when the within-group dispersion is zero. Higher is better.
pub fn calinski_harabasz_score(
    features: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, i64>,
) -> Result<f64> {
    let index = validate(&features, &labels)?;
    let n = labels.len();
    let k = index.sizes.len();
    let d = features.ncols();
    let centers = centroids(&features, &index);

    let mut global = vec![0.0f64; d];
    for i in 0..n {
        for (dim, &value) in features.row(i).iter().enumerate() {
            global[dim] += value;
        }
    }
    for value in &mut global {
        *value /= n as f64;
    }
    let global = Array1::from(global);

    let mut between = 0.0;
    for c in 0..k {
        between +=
            index.sizes[c] as f64 * squared_euclidean(centers.row(c), global.view());
    }

    let mut within = 0.0;
    for (i, &c) in index.point_cluster.iter().enumerate() {
        within += squared_euclidean(features.row(i), centers.row(c));
    }

    if within <= 0.0 {
        return Ok(1.0);
    }

    Ok((between / (k - 1) as f64) / (within / (n - k) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_silhouette_two_separated_clusters() {
        let features = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        let labels = array![0, 0, 1, 1];

        // Each point: a = 1, b = (10 + sqrt(101)) / 2
        let b = (10.0 + 101.0f64.sqrt()) / 2.0;
        let expected = (b - 1.0) / b;

        let score = silhouette_score(features.view(), labels.view()).unwrap();
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_singleton_cluster_scores_zero() {
        let features = array![[0.0], [0.0], [5.0]];
        let labels = array![0, 0, 7];

        // Cluster 0 points score 1 each, the singleton scores 0
        let score = silhouette_score(features.view(), labels.view()).unwrap();
        assert!((score - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_silhouette_identical_points() {
        let features = array![[1.0], [1.0], [1.0], [1.0]];
        let labels = array![0, 0, 1, 1];

        let score = silhouette_score(features.view(), labels.view()).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_silhouette_noncontiguous_labels() {
        let features = array![[0.0, 0.0], [0.0, 1.0], [10.0, 0.0], [10.0, 1.0]];
        let relabelled = array![42, 42, -9, -9];
        let canonical = array![0, 0, 1, 1];

        let a = silhouette_score(features.view(), relabelled.view()).unwrap();
        let b = silhouette_score(features.view(), canonical.view()).unwrap();
        assert!((a - b).abs() < 1e-15);
    }

    #[test]
    fn test_davies_bouldin_hand_computed() {
        let features = array![[0.0], [0.1], [10.0], [10.1]];
        let labels = array![0, 0, 1, 1];

        // S = 0.05 each, M = 10 => R = 0.01
        let score = davies_bouldin_score(features.view(), labels.view()).unwrap();
        assert!((score - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_davies_bouldin_collapsed_clusters() {
        let features = array![[1.0], [1.0], [1.0], [1.0]];
        let labels = array![0, 0, 1, 1];

        let score = davies_bouldin_score(features.view(), labels.view()).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_calinski_harabasz_hand_computed() {
        let features = array![[0.0], [2.0], [10.0], [12.0]];
        let labels = array![0, 0, 1, 1];

        // BGD = 100, WGD = 4, k = 2, n = 4 => (100 / 1) / (4 / 2) = 50
        let score = calinski_harabasz_score(features.view(), labels.view()).unwrap();
        assert!((score - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_calinski_harabasz_zero_within_dispersion() {
        let features = array![[0.0], [0.0], [5.0], [5.0]];
        let labels = array![0, 0, 1, 1];

        let score = calinski_harabasz_score(features.view(), labels.view()).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_single_cluster_rejected() {
        let features = array![[0.0], [1.0], [2.0]];
        let labels = array![4, 4, 4];

        let result = silhouette_score(features.view(), labels.view());
        assert!(matches!(
            result,
            Err(Error::InsufficientClusters {
                clusters: 1,
                points: 3
            })
        ));
    }

    #[test]
    fn test_all_distinct_labels_rejected() {
        let features = array![[0.0], [1.0], [2.0], [3.0]];
        let labels = array![0, 1, 2, 3];

        assert!(davies_bouldin_score(features.view(), labels.view()).is_err());
        assert!(calinski_harabasz_score(features.view(), labels.view()).is_err());
    }

    #[test]
    fn test_alignment_mismatch() {
        let features = array![[0.0], [1.0]];
        let labels = array![0, 1, 1];

        assert!(matches!(
            silhouette_score(features.view(), labels.view()),
            Err(Error::AlignmentMismatch {
                features: 2,
                labels: 3
            })
        ));
    }

    #[test]
    fn test_empty_input_counts_zero_clusters() {
        let features = Array2::<f64>::zeros((0, 3));
        let labels = Array1::<i64>::zeros(0);

        assert!(matches!(
            silhouette_score(features.view(), labels.view()),
            Err(Error::InsufficientClusters {
                clusters: 0,
                points: 0
            })
        ));
    }
}
