//! Pairwise clustering evaluation metrics.
//!
//! Measures for assessing clustering quality by comparing predicted cluster
//! co-membership to ground truth identity co-membership, over all unordered
//! point pairs.
//!
//! # Metrics Overview
//!
//! | Metric | Range | Best | Properties |
//! |--------|-------|------|------------|
//! | [`pairwise_precision`] | [0, 1] | 1 | Penalizes merging distinct identities |
//! | [`pairwise_recall`] | [0, 1] | 1 | Penalizes splitting one identity |
//! | [`pairwise_f1`] | [0, 1] | 1 | Harmonic mean of the above two |
//!
//! # Pair Classification
//!
//! For every unordered pair (i, j) of points:
//!
//! - **TP**: same predicted cluster and same identity
//! - **FP**: same predicted cluster, different identities
//! - **FN**: different predicted clusters, same identity
//!
//! Pairs are never materialized: counts are derived from a contingency table
//! in O(L + K_pred * K_truth) instead of O(L^2).
//!
//! # Degenerate Inputs
//!
//! Mismatched or sub-pair-length inputs and zero denominators all resolve to
//! a defined 0.0 rather than an error. A confusion matrix with no positive
//! pairs is a valid, if uninformative, outcome.
//!
//! # Example
//!
//! ```rust
//! use visage::metrics::{pairwise_f1, pairwise_precision, pairwise_recall};
//!
//! let pred = [0, 0, 0, 1];
//! let truth = [1, 1, 2, 2];
//!
//! assert!((pairwise_precision(&pred, &truth) - 1.0 / 3.0).abs() < 1e-12);
//! assert!((pairwise_recall(&pred, &truth) - 0.5).abs() < 1e-12);
//! assert!((pairwise_f1(&pred, &truth) - 0.4).abs() < 1e-12);
//! ```
//!
//! # References
//!
//! - Otto, Wang & Jain (2018). "Clustering Millions of Faces by Identity"
//!   (pairwise precision/recall for face clustering)
//! - Manning, Raghavan & Schütze (2008). "Introduction to Information
//!   Retrieval", ch. 16 (pair-counting cluster evaluation)

use std::collections::HashMap;

/// Pair-level confusion counts between a predicted clustering and ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairCounts {
    /// Pairs clustered together that share an identity.
    pub true_positives: u64,
    /// Pairs clustered together with different identities.
    pub false_positives: u64,
    /// Pairs split apart that share an identity.
    pub false_negatives: u64,
}

impl PairCounts {
    /// TP / (TP + FP), or 0.0 when no pair was clustered together.
    pub fn precision(&self) -> f64 {
        let denom = self.true_positives + self.false_positives;
        if denom > 0 {
            self.true_positives as f64 / denom as f64
        } else {
            0.0
        }
    }

    /// TP / (TP + FN), or 0.0 when no pair shares an identity.
    pub fn recall(&self) -> f64 {
        let denom = self.true_positives + self.false_negatives;
        if denom > 0 {
            self.true_positives as f64 / denom as f64
        } else {
            0.0
        }
    }
}

/// Pair-level confusion counts via contingency-table counting.
///
/// Equivalent to classifying all `L choose 2` unordered pairs, but derived
/// from per-cell and marginal pair counts of the co-occurrence table:
///
/// ```text
/// TP      = Σ_ij C(n_ij, 2)
/// TP + FP = Σ_p  C(pred cluster size, 2)
/// TP + FN = Σ_t  C(identity size, 2)
/// ```
///
/// # Arguments
///
/// * `pred` - Predicted cluster assignments
/// * `truth` - Ground truth identity labels
///
/// Returns all-zero counts when the slices differ in length or hold fewer
/// than two points.
pub fn pair_counts(pred: &[i64], truth: &[i64]) -> PairCounts {
    if pred.len() != truth.len() || pred.len() < 2 {
        return PairCounts::default();
    }

    let joint = build_contingency_table(pred, truth);

    // Marginals: predicted cluster sizes and identity sizes
    let mut pred_sizes: HashMap<i64, u64> = HashMap::new();
    let mut truth_sizes: HashMap<i64, u64> = HashMap::new();

    for (&(p, t), &count) in &joint {
        *pred_sizes.entry(p).or_insert(0) += count;
        *truth_sizes.entry(t).or_insert(0) += count;
    }

    let tp: u64 = joint.values().map(|&c| comb2(c)).sum();
    let same_pred: u64 = pred_sizes.values().map(|&c| comb2(c)).sum();
    let same_truth: u64 = truth_sizes.values().map(|&c| comb2(c)).sum();

    PairCounts {
        true_positives: tp,
        false_positives: same_pred - tp,
        false_negatives: same_truth - tp,
    }
}

/// Pairwise precision of a predicted clustering against ground truth.
///
/// Fraction of same-cluster pairs that also share an identity. Low precision
/// means clusters mix multiple identities.
///
/// # Example
///
/// ```rust
/// use visage::metrics::pairwise_precision;
///
/// // One pure cluster per identity
/// let pred = [0, 0, 1, 1];
/// let truth = [5, 5, 9, 9];
/// assert!((pairwise_precision(&pred, &truth) - 1.0).abs() < 1e-12);
/// ```
pub fn pairwise_precision(pred: &[i64], truth: &[i64]) -> f64 {
    pair_counts(pred, truth).precision()
}

/// Pairwise recall of a predicted clustering against ground truth.
///
/// Fraction of same-identity pairs that were clustered together. Low recall
/// means identities are fragmented across clusters.
pub fn pairwise_recall(pred: &[i64], truth: &[i64]) -> f64 {
    pair_counts(pred, truth).recall()
}

/// Pairwise F1: harmonic mean of pairwise precision and recall.
///
/// 0.0 when precision + recall is zero.
pub fn pairwise_f1(pred: &[i64], truth: &[i64]) -> f64 {
    let counts = pair_counts(pred, truth);
    f1_from_precision_recall(counts.precision(), counts.recall())
}

/// Harmonic mean of an already-computed precision/recall pair.
///
/// ```text
/// F1 = 2 * P * R / (P + R)
/// ```
///
/// Defined as 0.0 when P + R == 0. Kept separate from [`pairwise_f1`] so a
/// persisted F1 can be derived from the exact precision and recall values
/// being persisted with it.
pub fn f1_from_precision_recall(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

// Helper functions

fn build_contingency_table(pred: &[i64], truth: &[i64]) -> HashMap<(i64, i64), u64> {
    let mut table = HashMap::new();
    for (&p, &t) in pred.iter().zip(truth.iter()) {
        *table.entry((p, t)).or_insert(0u64) += 1;
    }
    table
}

fn comb2(n: u64) -> u64 {
    if n < 2 {
        0
    } else {
        n * (n - 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// O(L^2) reference: classify every unordered pair directly.
    fn brute_force_counts(pred: &[i64], truth: &[i64]) -> PairCounts {
        let mut tp = 0u64;
        let mut fp = 0u64;
        let mut fn_ = 0u64;

        for i in 0..pred.len() {
            for j in (i + 1)..pred.len() {
                let same_pred = pred[i] == pred[j];
                let same_truth = truth[i] == truth[j];

                match (same_pred, same_truth) {
                    (true, true) => tp += 1,
                    (true, false) => fp += 1,
                    (false, true) => fn_ += 1,
                    (false, false) => {}
                }
            }
        }

        PairCounts {
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    #[test]
    fn test_pair_counts_hand_enumerated() {
        // Pairs: (0,1) TP, (0,2) FP, (1,2) FP, (2,3) FN, rest negatives
        let pred = [0, 0, 0, 1];
        let truth = [1, 1, 2, 2];

        let counts = pair_counts(&pred, &truth);
        assert_eq!(counts.true_positives, 1);
        assert_eq!(counts.false_positives, 2);
        assert_eq!(counts.false_negatives, 1);
    }

    #[test]
    fn test_precision_recall_f1_values() {
        let pred = [0, 0, 0, 1];
        let truth = [1, 1, 2, 2];

        assert!((pairwise_precision(&pred, &truth) - 1.0 / 3.0).abs() < 1e-12);
        assert!((pairwise_recall(&pred, &truth) - 0.5).abs() < 1e-12);
        assert!((pairwise_f1(&pred, &truth) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_single_cluster_single_identity_is_perfect() {
        let pred = [3, 3, 3, 3];
        let truth = [7, 7, 7, 7];

        assert!((pairwise_precision(&pred, &truth) - 1.0).abs() < 1e-12);
        assert!((pairwise_recall(&pred, &truth) - 1.0).abs() < 1e-12);
        assert!((pairwise_f1(&pred, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_distinct_predictions_report_zero_not_panic() {
        // No same-cluster pair exists, so TP + FP == 0
        let pred = [0, 1, 2, 3];
        let truth = [5, 5, 5, 5];

        let counts = pair_counts(&pred, &truth);
        assert_eq!(counts.true_positives, 0);
        assert_eq!(counts.false_positives, 0);
        assert_eq!(counts.false_negatives, 6);

        assert_eq!(pairwise_precision(&pred, &truth), 0.0);
        assert_eq!(pairwise_recall(&pred, &truth), 0.0);
        assert_eq!(pairwise_f1(&pred, &truth), 0.0);
    }

    #[test]
    fn test_noncontiguous_label_values() {
        let pred = [7, 7, 42];
        let truth = [-3, -3, 9];

        assert!((pairwise_f1(&pred, &truth) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_returns_zero() {
        let pred = [0, 0, 1];
        let truth = [0, 0];

        assert_eq!(pair_counts(&pred, &truth), PairCounts::default());
        assert_eq!(pairwise_precision(&pred, &truth), 0.0);
    }

    #[test]
    fn test_empty_and_singleton_return_zero() {
        assert_eq!(pairwise_f1(&[], &[]), 0.0);
        assert_eq!(pairwise_f1(&[1], &[1]), 0.0);
    }

    #[test]
    fn test_f1_from_precision_recall() {
        assert_eq!(f1_from_precision_recall(0.0, 0.0), 0.0);
        assert!((f1_from_precision_recall(0.5, 0.5) - 0.5).abs() < 1e-12);
        assert!((f1_from_precision_recall(0.5, 0.25) - 1.0 / 3.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn pair_counts_match_brute_force(
            pairs in proptest::collection::vec((-1i64..6, -1i64..6), 0..60),
        ) {
            let pred: Vec<i64> = pairs.iter().map(|&(p, _)| p).collect();
            let truth: Vec<i64> = pairs.iter().map(|&(_, t)| t).collect();

            prop_assert_eq!(pair_counts(&pred, &truth), brute_force_counts(&pred, &truth));
        }

        #[test]
        fn f1_consistent_with_components(
            pairs in proptest::collection::vec((-1i64..6, -1i64..6), 2..60),
        ) {
            let pred: Vec<i64> = pairs.iter().map(|&(p, _)| p).collect();
            let truth: Vec<i64> = pairs.iter().map(|&(_, t)| t).collect();

            let p = pairwise_precision(&pred, &truth);
            let r = pairwise_recall(&pred, &truth);
            let f1 = pairwise_f1(&pred, &truth);

            prop_assert!((0.0..=1.0).contains(&p));
            prop_assert!((0.0..=1.0).contains(&r));
            if p + r > 0.0 {
                prop_assert!((f1 - 2.0 * p * r / (p + r)).abs() < 1e-12);
            } else {
                prop_assert_eq!(f1, 0.0);
            }
        }
    }
}
