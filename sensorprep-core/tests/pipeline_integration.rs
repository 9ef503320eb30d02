//! End-to-end tests for a preprocessing run over an on-disk workspace.

use pretty_assertions::assert_eq;
use sensorprep_core::config::load_config;
use sensorprep_core::data::storage::{MANIFEST_FILE, RunManifest, TEST_FILE, TRAIN_FILE, VALIDATION_FILE};
use sensorprep_core::error::PrepError;
use sensorprep_core::pipeline::Pipeline;
use std::path::Path;
use tempfile::TempDir;

const CONFIG: &str = "\
windowing:
  window_size: 4
  stride: 2
split:
  test_fraction: 0.2
  validation_fraction: 0.25
  random_seed: 11
";

/// A gesture log of `n` rows, written in reverse time order with one
/// duplicated row.
fn write_workspace(root: &Path, n: usize) {
    std::fs::create_dir_all(root.join("config")).unwrap();
    std::fs::write(root.join("config/config.yaml"), CONFIG).unwrap();

    let raw = root.join("data/raw");
    std::fs::create_dir_all(&raw).unwrap();
    let mut csv = String::from("timestamp,acc_x,acc_y,gyro_z,target\n");
    for i in (0..n).rev() {
        let label = if (i / 10) % 2 == 0 { "idle" } else { "wave" };
        csv.push_str(&format!(
            "{i},{},{},{},{label}\n",
            (i as f64 * 0.1).sin(),
            (i % 7) as f64,
            if i % 13 == 0 { String::new() } else { "0.5".to_string() },
        ));
        if i == n / 2 {
            csv.push_str(&format!("{i},{},{},0.5,{label}\n", (i as f64 * 0.1).sin(), (i % 7) as f64));
        }
    }
    std::fs::write(raw.join("train.csv"), csv).unwrap();
    std::fs::write(raw.join("README.txt"), "not data").unwrap();
}

#[test]
fn test_run_workspace_writes_partitions_and_manifest() {
    let ws = TempDir::new().unwrap();
    write_workspace(ws.path(), 200);

    let config = load_config(ws.path(), None).unwrap();
    let manifest = Pipeline::new(config).unwrap().run_workspace(ws.path()).unwrap();

    // 200 rows after dedup -> floor((200 - 4) / 2) + 1 windows.
    assert_eq!(manifest.windows, 99);
    assert_eq!(manifest.feature_columns, vec!["acc_x", "acc_y", "gyro_z"]);
    assert_eq!(manifest.source.row_count, Some(201));

    let out = ws.path().join("data/processed");
    let names: Vec<_> = manifest.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec![TRAIN_FILE, VALIDATION_FILE, TEST_FILE]);
    assert_eq!(manifest.files.iter().map(|f| f.rows).sum::<usize>(), 99);

    let train = std::fs::read_to_string(out.join(TRAIN_FILE)).unwrap();
    let header = train.lines().next().unwrap();
    assert!(header.starts_with("acc_x_mean,acc_x_std,acc_x_min,acc_x_max,acc_x_skew,acc_x_kurtosis,"));
    assert!(header.ends_with(",window_start,window_end,target"));
    assert_eq!(train.lines().count(), manifest.files[0].rows + 1);

    let loaded = RunManifest::load(&out.join(MANIFEST_FILE)).unwrap();
    assert_eq!(loaded.config.split.random_seed, 11);
}

#[test]
fn test_windows_never_straddle_partitions() {
    let ws = TempDir::new().unwrap();
    write_workspace(ws.path(), 120);
    let config = load_config(ws.path(), None).unwrap();
    let pipeline = Pipeline::new(config).unwrap();
    let (batch, _) = pipeline.load_raw(ws.path()).unwrap();
    let out = pipeline.run(batch).unwrap();

    let mut starts: Vec<usize> = [&out.partitions.train, &out.partitions.validation, &out.partitions.test]
        .iter()
        .flat_map(|p| p.rows.iter().map(|r| r.window_start))
        .collect();
    let total = starts.len();
    starts.sort_unstable();
    starts.dedup();
    assert_eq!(starts.len(), total);
    assert_eq!(total, out.windows);
}

#[test]
fn test_same_seed_gives_identical_outputs() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    write_workspace(a.path(), 150);
    write_workspace(b.path(), 150);

    let run = |root: &Path| {
        let config = load_config(root, None).unwrap();
        Pipeline::new(config).unwrap().run_workspace(root).unwrap()
    };
    let (ma, mb) = (run(a.path()), run(b.path()));
    let hashes = |m: &RunManifest| m.files.iter().map(|f| f.sha256.clone()).collect::<Vec<_>>();
    assert_eq!(hashes(&ma), hashes(&mb));
}

#[test]
fn test_clean_workspace_writes_cleaned_table() {
    let ws = TempDir::new().unwrap();
    write_workspace(ws.path(), 30);
    let config = load_config(ws.path(), None).unwrap();
    let path = Pipeline::new(config).unwrap().clean_workspace(ws.path()).unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content.lines().next().unwrap(), "timestamp,acc_x,acc_y,gyro_z,target");
    // Header plus 30 rows; the duplicate is gone.
    assert_eq!(content.lines().count(), 31);
}

#[test]
fn test_missing_training_file() {
    let ws = TempDir::new().unwrap();
    std::fs::create_dir_all(ws.path().join("data/raw")).unwrap();
    let err = Pipeline::new(Default::default())
        .unwrap()
        .run_workspace(ws.path())
        .unwrap_err();
    assert!(matches!(err, PrepError::Io(_)));
    assert!(err.to_string().contains("train.csv"));
}

#[test]
fn test_rare_class_fails_split() {
    let ws = TempDir::new().unwrap();
    let raw = ws.path().join("data/raw");
    std::fs::create_dir_all(&raw).unwrap();
    let mut csv = String::from("timestamp,acc_x,target\n");
    for i in 0..40 {
        let label = if i == 39 { "fall" } else { "walk" };
        csv.push_str(&format!("{i},{i},{label}\n"));
    }
    std::fs::write(raw.join("train.csv"), csv).unwrap();

    let mut config = sensorprep_core::PrepConfig::default();
    config.windowing.window_size = 2;
    config.windowing.stride = 1;
    let err = Pipeline::new(config).unwrap().run_workspace(ws.path()).unwrap_err();
    match err {
        PrepError::InsufficientClassSamples { class, count, .. } => {
            assert_eq!(class, "fall");
            assert_eq!(count, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!ws.path().join("data/processed").join(TRAIN_FILE).exists());
}
