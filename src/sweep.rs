//! Parameter-sweep orchestration.
//!
//! A sweep fans one input out over many configurations, writing each run's
//! artifacts into its own `run_<i>` directory. Runs share no mutable state,
//! so a failure is recorded against its configuration index and the sweep
//! moves on; the caller decides what a partial sweep is worth.
//!
//! Reduction sweeps make one further distinction: a diverged fit is an
//! expected per-configuration outcome and is recorded like any other run
//! result, while infrastructure failures abort the whole sweep.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::ArrayView2;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::artifacts::{
    save_cluster_labels, save_features, save_json, CLUSTER_CONFIG_FILE, CLUSTER_LABELS_FILE,
    FEATURES_FILE, REDUCER_CONFIG_FILE,
};
use crate::cluster::Clusterer;
use crate::error::{Error, Result};
use crate::evaluate::{EvalOptions, Evaluator};
use crate::reduce::{FitOutcome, NumericalFailure, Reducer};

/// Directory for the run at `index` under a sweep root.
pub fn run_dir(base: &Path, index: usize) -> PathBuf {
    base.join(format!("run_{index}"))
}

/// Per-run results of a sweep, keyed by configuration index.
///
/// Both lists are ordered by index. A failure aborts only its own run.
#[derive(Debug)]
pub struct SweepOutcome<T> {
    pub completed: Vec<(usize, T)>,
    pub failed: Vec<(usize, Error)>,
}

impl<T> SweepOutcome<T> {
    /// Whether every run completed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run every clusterer over one feature matrix, one run directory each.
///
/// A completed run leaves `cluster_labels.npy` and `cluster_config.json`
/// in `run_<i>` under `output_root`; a failed run leaves nothing usable
/// behind and is recorded with its index.
pub fn cluster_sweep<C: Clusterer>(
    features: ArrayView2<'_, f64>,
    clusterers: &[C],
    output_root: &Path,
) -> SweepOutcome<PathBuf> {
    let mut outcome = SweepOutcome {
        completed: Vec::new(),
        failed: Vec::new(),
    };

    for (index, clusterer) in clusterers.iter().enumerate() {
        match cluster_one(features, clusterer, &run_dir(output_root, index)) {
            Ok(dir) => outcome.completed.push((index, dir)),
            Err(error) => outcome.failed.push((index, error)),
        }
    }
    outcome
}

fn cluster_one<C: Clusterer>(
    features: ArrayView2<'_, f64>,
    clusterer: &C,
    dir: &Path,
) -> Result<PathBuf> {
    let config = clusterer.config();
    config.validate()?;
    let labels = clusterer.cluster(features)?;

    fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    save_cluster_labels(&dir.join(CLUSTER_LABELS_FILE), &labels)?;
    save_json(&dir.join(CLUSTER_CONFIG_FILE), &config)?;
    Ok(dir.to_path_buf())
}

/// Per-run results of a reduction sweep.
#[derive(Debug)]
pub struct ReductionSweepReport {
    /// Runs that produced an embedding, with their run directories.
    pub completed: Vec<(usize, PathBuf)>,
    /// Runs whose training diverged. Nothing is written for these.
    pub diverged: Vec<(usize, NumericalFailure)>,
}

/// Train every reducer on one feature matrix, one run directory each.
///
/// Callers scale the features first when the models call for it. A
/// completed run leaves `features.npy` and `reducer_config.json` in
/// `run_<i>` under `output_root`.
///
/// # Errors
///
/// Invalid configurations and I/O failures propagate and end the sweep.
/// Divergence does not; it lands in
/// [`diverged`](ReductionSweepReport::diverged).
pub fn reduction_sweep<R: Reducer>(
    features: ArrayView2<'_, f64>,
    reducers: &mut [R],
    output_root: &Path,
) -> Result<ReductionSweepReport> {
    let mut completed = Vec::new();
    let mut diverged = Vec::new();

    for (index, reducer) in reducers.iter_mut().enumerate() {
        reducer.config().validate()?;
        match reducer.fit_transform(features)? {
            FitOutcome::Reduced(reduced) => {
                let dir = run_dir(output_root, index);
                fs::create_dir_all(&dir).map_err(|source| Error::Io {
                    path: dir.clone(),
                    source,
                })?;
                save_features(&dir.join(FEATURES_FILE), &reduced)?;
                save_json(&dir.join(REDUCER_CONFIG_FILE), &reducer.manifest())?;
                completed.push((index, dir));
            }
            FitOutcome::Diverged(failure) => diverged.push((index, failure)),
        }
    }

    Ok(ReductionSweepReport { completed, diverged })
}

/// Evaluates many clustering runs against one set of shared artifacts.
///
/// The feature matrix, identifier list, and ground-truth table are fixed;
/// each run directory supplies its own cluster labels and receives its own
/// metrics file.
#[derive(Debug, Clone)]
pub struct EvaluationSweep {
    features_path: PathBuf,
    image_names_path: PathBuf,
    ground_truth_path: PathBuf,
    options: EvalOptions,
}

impl EvaluationSweep {
    pub fn new(
        features_path: impl Into<PathBuf>,
        image_names_path: impl Into<PathBuf>,
        ground_truth_path: impl Into<PathBuf>,
    ) -> Self {
        EvaluationSweep {
            features_path: features_path.into(),
            image_names_path: image_names_path.into(),
            ground_truth_path: ground_truth_path.into(),
            options: EvalOptions::default(),
        }
    }

    /// Replace the metric-family toggles.
    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    fn evaluator(&self, dir: &Path) -> Evaluator {
        Evaluator::new(
            &self.features_path,
            dir,
            &self.image_names_path,
            &self.ground_truth_path,
        )
        .with_options(self.options)
    }

    /// Evaluate each run directory, in parallel when built with the
    /// `parallel` feature.
    ///
    /// Each run reads its own labels and writes only its own metrics file,
    /// so runs need no coordination. Results come back ordered by index
    /// either way.
    pub fn evaluate_runs(&self, run_dirs: &[PathBuf]) -> SweepOutcome<PathBuf> {
        #[cfg(feature = "parallel")]
        let results: Vec<(usize, Result<PathBuf>)> = run_dirs
            .par_iter()
            .enumerate()
            .map(|(index, dir)| (index, self.evaluator(dir).run()))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<(usize, Result<PathBuf>)> = run_dirs
            .iter()
            .enumerate()
            .map(|(index, dir)| (index, self.evaluator(dir).run()))
            .collect();

        let mut outcome = SweepOutcome {
            completed: Vec::new(),
            failed: Vec::new(),
        };
        for (index, result) in results {
            match result {
                Ok(path) => outcome.completed.push((index, path)),
                Err(error) => outcome.failed.push((index, error)),
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{load_cluster_labels, load_features, load_json};
    use crate::cluster::ClusterConfig;
    use crate::reduce::ReducerConfig;
    use ndarray::{array, Array1, Array2};
    use tempfile::tempdir;

    struct FixedClusterer {
        n_clusters: usize,
    }

    impl Clusterer for FixedClusterer {
        fn config(&self) -> ClusterConfig {
            ClusterConfig::Kmeans {
                n_clusters: self.n_clusters,
            }
        }

        fn cluster(&self, features: ArrayView2<'_, f64>) -> Result<Array1<i64>> {
            // Row index modulo the cluster count, no geometry involved.
            Ok(Array1::from_iter(
                (0..features.nrows()).map(|i| (i % self.n_clusters) as i64),
            ))
        }
    }

    struct HalvingReducer {
        diverge: bool,
    }

    impl Reducer for HalvingReducer {
        fn config(&self) -> ReducerConfig {
            ReducerConfig::DeepAutoencoder {
                layer_dims: vec![1],
            }
        }

        fn fit_transform(&mut self, features: ArrayView2<'_, f64>) -> Result<FitOutcome> {
            if self.diverge {
                return Ok(FitOutcome::Diverged(NumericalFailure {
                    message: "loss went non-finite".to_string(),
                }));
            }
            let reduced = features.slice(ndarray::s![.., ..1]).to_owned();
            Ok(FitOutcome::Reduced(reduced))
        }
    }

    #[test]
    fn test_run_dir_layout() {
        assert_eq!(
            run_dir(Path::new("/tmp/out"), 7),
            Path::new("/tmp/out/run_7")
        );
    }

    #[test]
    fn test_cluster_sweep_writes_labels_and_manifest() {
        let dir = tempdir().unwrap();
        let features = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let clusterers = vec![
            FixedClusterer { n_clusters: 2 },
            FixedClusterer { n_clusters: 3 },
        ];

        let outcome = cluster_sweep(features.view(), &clusterers, dir.path());
        assert!(outcome.is_complete());
        assert_eq!(outcome.completed.len(), 2);

        let run_0 = run_dir(dir.path(), 0);
        let labels = load_cluster_labels(&run_0.join(CLUSTER_LABELS_FILE)).unwrap();
        assert_eq!(labels, array![0i64, 1, 0]);
        let config: ClusterConfig = load_json(&run_0.join(CLUSTER_CONFIG_FILE)).unwrap();
        assert_eq!(config, ClusterConfig::Kmeans { n_clusters: 2 });
    }

    #[test]
    fn test_cluster_sweep_records_failure_and_continues() {
        let dir = tempdir().unwrap();
        let features = array![[0.0], [1.0]];
        let clusterers = vec![
            FixedClusterer { n_clusters: 0 },
            FixedClusterer { n_clusters: 1 },
        ];

        let outcome = cluster_sweep(features.view(), &clusterers, dir.path());

        assert_eq!(outcome.completed.len(), 1);
        assert_eq!(outcome.completed[0].0, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, 0);
        assert!(matches!(
            outcome.failed[0].1,
            Error::InvalidParameter {
                name: "n_clusters",
                ..
            }
        ));
        assert!(!run_dir(dir.path(), 0).exists());
    }

    #[test]
    fn test_reduction_sweep_records_divergence() {
        let dir = tempdir().unwrap();
        let features = array![[1.0, 2.0], [3.0, 4.0]];
        let mut reducers = vec![
            HalvingReducer { diverge: false },
            HalvingReducer { diverge: true },
            HalvingReducer { diverge: false },
        ];

        let report = reduction_sweep(features.view(), &mut reducers, dir.path()).unwrap();

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.diverged.len(), 1);
        assert_eq!(report.diverged[0].0, 1);
        assert!(!run_dir(dir.path(), 1).exists());

        let reduced = load_features(&run_dir(dir.path(), 0).join(FEATURES_FILE)).unwrap();
        assert_eq!(reduced, array![[1.0], [3.0]]);
        let manifest: crate::reduce::ReducerManifest =
            load_json(&run_dir(dir.path(), 0).join(REDUCER_CONFIG_FILE)).unwrap();
        assert_eq!(manifest.optimizer, "adam");
    }

    #[test]
    fn test_reduction_sweep_propagates_invalid_config() {
        struct BadConfigReducer;

        impl Reducer for BadConfigReducer {
            fn config(&self) -> ReducerConfig {
                ReducerConfig::DeepAutoencoder { layer_dims: vec![] }
            }

            fn fit_transform(&mut self, _: ArrayView2<'_, f64>) -> Result<FitOutcome> {
                unreachable!("validation rejects the config first")
            }
        }

        let dir = tempdir().unwrap();
        let features = Array2::<f64>::zeros((2, 2));
        let mut reducers = vec![BadConfigReducer];

        assert!(matches!(
            reduction_sweep(features.view(), &mut reducers, dir.path()),
            Err(Error::InvalidParameter {
                name: "layer_dims",
                ..
            })
        ));
    }
}
