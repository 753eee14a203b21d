//! # visage
//!
//! Face-image clustering pipeline primitives: artifact I/O, extraction / reduction / clustering
//! seams, and run evaluation against ground-truth identities.
//!
//! **Default build** is sequential. Fanning independent evaluation runs out across threads
//! is opt-in via the `parallel` feature flag.

pub mod artifacts;
pub mod cluster;
/// Error types used across `visage`.
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod metrics;
pub mod reduce;
pub mod sweep;
pub mod validity;


pub use crate::artifacts::{resolve_image_names, GroundTruth};
pub use crate::cluster::{remove_fuzzy, ClusterConfig, Clusterer, FUZZY};
pub use crate::evaluate::{
    build_test_set, EvalOptions, Evaluator, ScoreReport, ScoreValue, TestSet,
};

pub use error::{Error, Result};
pub use metrics::{
    f1_from_precision_recall, pair_counts, pairwise_f1, pairwise_precision, pairwise_recall,
    PairCounts,
};

pub use extract::{
    ExtractionOutput, FeatureConfig, FeatureExtractor, FeatureManifest, LbpMethod, ResizeSpec,
};
pub use reduce::{
    FitOutcome, MinMaxScaler, NumericalFailure, Reducer, ReducerConfig, ReducerManifest,
};
pub use sweep::{
    cluster_sweep, reduction_sweep, run_dir, EvaluationSweep, ReductionSweepReport, SweepOutcome,
};
pub use validity::{calinski_harabasz_score, davies_bouldin_score, silhouette_score};
