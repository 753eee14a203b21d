//! Run evaluation: reconciling a clustering run's artifacts and scoring it.
//!
//! An [`Evaluator`] names four artifacts: a feature matrix, a clustering run
//! directory holding cluster labels, an identifier list, and a ground-truth
//! table. Evaluation loads them, checks the feature/label alignment,
//! intersects ground truth with the non-fuzzy identifiers, and computes the
//! requested metric families:
//!
//! | family   | scores                          | population             |
//! |----------|---------------------------------|------------------------|
//! | counts   | `image_count`, `non_fuzzy_count`, `test_image_count`, `cluster_count` | always reported |
//! | internal | `silhouette`, `davies_bouldin`  | non-fuzzy points       |
//! | external | `precision`, `recall`, `f1`     | test set               |
//!
//! The test set is the intersection of the ground-truth table with the
//! identifiers holding a non-fuzzy cluster label, walked in table order.
//! That shared walk is what keeps the actual and predicted sequences
//! pairwise aligned; neither side is ever sorted independently.
//!
//! A failed run writes nothing. The metrics file either holds a complete
//! report or does not exist, so downstream aggregation can treat file
//! presence as the success signal.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::ArrayView1;

use crate::artifacts::{
    load_cluster_labels, load_features, load_image_names, resolve_image_names, GroundTruth,
    CLUSTER_LABELS_FILE, METRICS_FILE,
};
use crate::cluster::{remove_fuzzy, FUZZY};
use crate::error::{Error, Result};
use crate::metrics::{f1_from_precision_recall, pairwise_precision, pairwise_recall};
use crate::validity::{davies_bouldin_score, silhouette_score};

/// Which metric families to compute. Both default to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    /// Geometry scores over the non-fuzzy points.
    pub internal: bool,
    /// Ground-truth agreement scores over the test set.
    pub external: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            internal: true,
            external: true,
        }
    }
}

/// One reported value: a derived count or a computed score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreValue {
    Count(u64),
    Score(f64),
}

impl fmt::Display for ScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreValue::Count(count) => write!(f, "{count}"),
            // Debug formatting keeps the decimal point on round floats.
            ScoreValue::Score(score) => write!(f, "{score:?}"),
        }
    }
}

/// Named scalar results of one evaluation.
///
/// Keys iterate in sorted order, so persisted output is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreReport {
    scores: BTreeMap<String, ScoreValue>,
}

impl ScoreReport {
    pub fn new() -> Self {
        ScoreReport::default()
    }

    /// Record a value, replacing any previous one under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: ScoreValue) {
        let _ = self.scores.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<ScoreValue> {
        self.scores.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ScoreValue)> + '_ {
        self.scores.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Write the report as `metrics.json` inside `dir` and return its path.
    ///
    /// Every value is stringified, counts and scores alike, and the file is
    /// replaced wholesale on recomputation. The JSON text is rendered fully
    /// in memory before a single write, so a failure leaves no partial file.
    ///
    /// # Errors
    ///
    /// [`Error::NotComputed`] when the report holds no entries, plus any
    /// serialization or I/O failure.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        if self.scores.is_empty() {
            return Err(Error::NotComputed);
        }

        let stringified: BTreeMap<&str, String> = self
            .scores
            .iter()
            .map(|(name, value)| (name.as_str(), value.to_string()))
            .collect();

        let path = dir.join(METRICS_FILE);
        let text = serde_json::to_string_pretty(&stringified).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Aligned label pairs for the external metrics.
///
/// Entry `i` of both sequences refers to the same image: `actual` holds its
/// ground-truth identity, `predicted` its cluster label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSet {
    pub actual: Vec<i64>,
    pub predicted: Vec<i64>,
}

impl TestSet {
    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}

/// Intersect the ground-truth table with the non-fuzzy identifiers.
///
/// Rows are walked in table order; each row naming a known, non-fuzzy
/// identifier contributes one aligned (actual, predicted) pair. Rows naming
/// unknown or fuzzy identifiers are skipped. Duplicate table rows each
/// contribute a pair, and when the identifier list itself repeats a name,
/// the later position wins.
///
/// The identifier list may run past the label array; positions without a
/// label never enter the test set.
pub fn build_test_set(
    image_names: &[String],
    labels: ArrayView1<'_, i64>,
    truth: &GroundTruth,
) -> TestSet {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(image_names.len());
    let mut non_fuzzy: HashSet<&str> = HashSet::new();
    for (index, name) in image_names.iter().enumerate() {
        let _ = positions.insert(name.as_str(), index);
        if index < labels.len() && labels[index] != FUZZY {
            let _ = non_fuzzy.insert(name.as_str());
        }
    }

    let mut actual = Vec::new();
    let mut predicted = Vec::new();
    for (name, identity) in truth.iter() {
        if !non_fuzzy.contains(name) {
            continue;
        }
        if let Some(&position) = positions.get(name) {
            if position < labels.len() {
                actual.push(identity);
                predicted.push(labels[position]);
            }
        }
    }

    TestSet { actual, predicted }
}

/// Scores one clustering run.
///
/// Construction names the artifacts; [`evaluate`](Evaluator::evaluate)
/// loads and reconciles them and computes the requested metric families;
/// [`run`](Evaluator::run) additionally persists the report next to the
/// cluster labels.
#[derive(Debug, Clone)]
pub struct Evaluator {
    features_path: PathBuf,
    cluster_dir: PathBuf,
    image_names_path: PathBuf,
    ground_truth_path: PathBuf,
    options: EvalOptions,
}

impl Evaluator {
    /// Evaluator for the run in `cluster_dir`, with both metric families on.
    ///
    /// `features_path` names the matrix the run clustered,
    /// `image_names_path` the identifier list (resolved with the shared
    /// fallback if absent), and `ground_truth_path` the identity table.
    pub fn new(
        features_path: impl Into<PathBuf>,
        cluster_dir: impl Into<PathBuf>,
        image_names_path: impl Into<PathBuf>,
        ground_truth_path: impl Into<PathBuf>,
    ) -> Self {
        Evaluator {
            features_path: features_path.into(),
            cluster_dir: cluster_dir.into(),
            image_names_path: image_names_path.into(),
            ground_truth_path: ground_truth_path.into(),
            options: EvalOptions::default(),
        }
    }

    /// Toggle the internal metrics.
    pub fn with_internal(mut self, internal: bool) -> Self {
        self.options.internal = internal;
        self
    }

    /// Toggle the external metrics.
    pub fn with_external(mut self, external: bool) -> Self {
        self.options.external = external;
        self
    }

    /// Replace both toggles at once.
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Load the artifacts and compute the requested scores.
    ///
    /// The counts are always reported. `image_count` is the identifier-list
    /// length, which may exceed the feature count when the list describes a
    /// superset prepared before filtering; only the feature and label
    /// lengths are strictly checked against each other.
    ///
    /// # Errors
    ///
    /// [`Error::AlignmentMismatch`] when features and labels disagree in
    /// length, [`Error::MissingArtifact`] for an unresolvable input,
    /// [`Error::InsufficientClusters`] when internal metrics are requested
    /// but fewer than 2 clusters survive the fuzzy filter, plus any load
    /// failure.
    pub fn evaluate(&self) -> Result<ScoreReport> {
        let features = load_features(&self.features_path)?;
        let labels = load_cluster_labels(&self.cluster_dir.join(CLUSTER_LABELS_FILE))?;

        if features.nrows() != labels.len() {
            return Err(Error::AlignmentMismatch {
                features: features.nrows(),
                labels: labels.len(),
            });
        }

        let names_path = resolve_image_names(&self.image_names_path)?;
        let image_names = load_image_names(&names_path)?;
        let truth = GroundTruth::from_csv(&self.ground_truth_path)?;

        let mut report = ScoreReport::new();

        let image_count = image_names.len();
        let fuzzy = labels.iter().filter(|&&label| label == FUZZY).count();
        let non_fuzzy_count = image_count.saturating_sub(fuzzy);
        report.insert("image_count", ScoreValue::Count(image_count as u64));
        report.insert("non_fuzzy_count", ScoreValue::Count(non_fuzzy_count as u64));

        let test_set = build_test_set(&image_names, labels.view(), &truth);
        report.insert("test_image_count", ScoreValue::Count(test_set.len() as u64));

        let (kept_features, kept_labels) = remove_fuzzy(features.view(), labels.view())?;
        let clusters: HashSet<i64> = kept_labels.iter().copied().collect();
        report.insert("cluster_count", ScoreValue::Count(clusters.len() as u64));

        if self.options.internal {
            let silhouette = silhouette_score(kept_features.view(), kept_labels.view())?;
            let davies_bouldin = davies_bouldin_score(kept_features.view(), kept_labels.view())?;
            report.insert("silhouette", ScoreValue::Score(silhouette));
            report.insert("davies_bouldin", ScoreValue::Score(davies_bouldin));
        }

        if self.options.external {
            let precision = pairwise_precision(&test_set.predicted, &test_set.actual);
            let recall = pairwise_recall(&test_set.predicted, &test_set.actual);
            report.insert("precision", ScoreValue::Score(precision));
            report.insert("recall", ScoreValue::Score(recall));
            report.insert(
                "f1",
                ScoreValue::Score(f1_from_precision_recall(precision, recall)),
            );
        }

        Ok(report)
    }

    /// Evaluate and persist the report into the run directory.
    ///
    /// Returns the metrics file path. Any failure leaves no file behind.
    pub fn run(&self) -> Result<PathBuf> {
        self.evaluate()?.save(&self.cluster_dir)
    }
}
