use std::fs;

use ndarray::array;
use tempfile::tempdir;
use visage::artifacts::{
    save_cluster_labels, save_features, save_image_names, CLUSTER_LABELS_FILE, FEATURES_FILE,
    IMAGE_NAMES_FILE,
};
use visage::Evaluator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Minimal end-to-end: artifacts on disk -> Evaluator -> metrics.json.
    // A scratch directory stands in for a real extraction run.

    let root = tempdir()?;

    // Two obvious clusters in 2D, plus one fuzzy point between them.
    let features = array![
        [0.0, 0.0],
        [0.1, 0.0],
        [0.0, 0.1],
        [10.0, 10.0],
        [10.1, 10.0],
        [10.0, 10.1],
        [5.0, 5.0],
    ];
    let labels = array![0i64, 0, 0, 1, 1, 1, -1];
    let image_names: Vec<String> = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg", "f.jpg", "g.jpg"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let features_path = root.path().join(FEATURES_FILE);
    save_features(&features_path, &features)?;

    let names_path = root.path().join(IMAGE_NAMES_FILE);
    save_image_names(&names_path, &image_names)?;

    let cluster_dir = root.path().join("clustering/kmeans/run_0");
    fs::create_dir_all(&cluster_dir)?;
    save_cluster_labels(&cluster_dir.join(CLUSTER_LABELS_FILE), &labels)?;

    // Ground truth agrees with the clustering; the fuzzy point g.jpg is
    // listed but never scored.
    let truth_path = root.path().join("ground_truth.csv");
    fs::write(
        &truth_path,
        "image_name,integer_label\n\
         a.jpg,1\nb.jpg,1\nc.jpg,1\n\
         d.jpg,2\ne.jpg,2\nf.jpg,2\n\
         g.jpg,1\n",
    )?;

    let evaluator = Evaluator::new(&features_path, &cluster_dir, &names_path, &truth_path);
    let report = evaluator.evaluate()?;
    for (name, value) in report.iter() {
        println!("{name}={value}");
    }

    let written = report.save(&cluster_dir)?;
    println!("wrote {}", written.display());

    Ok(())
}
