//! Packaging of trained model artifacts into an upload-ready dataset
//! directory.

use crate::config::PackageConfig;
use crate::data::storage::atomic_write_json;
use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "dataset-metadata.json";

/// Dataset descriptor expected by the upload tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub title: String,
    pub id: String,
    pub licenses: Vec<License>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
}

/// Outcome of a packaging run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageReport {
    pub output_dir: PathBuf,
    pub copied: Vec<String>,
    /// Configured artifacts that were not found. Not fatal.
    pub missing: Vec<String>,
}

/// Copy the configured artifacts and write the dataset metadata.
///
/// Relative directories in `config` are resolved against `workspace`.
pub fn package_artifacts(config: &PackageConfig, workspace: &Path) -> Result<PackageReport, PrepError> {
    let models_dir = workspace.join(&config.models_dir);
    let output_dir = workspace.join(&config.output_dir);
    std::fs::create_dir_all(&output_dir)?;

    let mut report = PackageReport {
        output_dir: output_dir.clone(),
        ..Default::default()
    };
    for name in &config.files {
        let src = models_dir.join(name);
        if src.is_file() {
            std::fs::copy(&src, output_dir.join(name))?;
            tracing::info!(file = %name, "Copied artifact");
            report.copied.push(name.clone());
        } else {
            tracing::warn!(path = %src.display(), "Artifact not found");
            report.missing.push(name.clone());
        }
    }

    let metadata = DatasetMetadata {
        title: config.title.clone(),
        id: config.dataset_id.clone(),
        licenses: vec![License {
            name: config.license.clone(),
        }],
    };
    atomic_write_json(&output_dir.join(METADATA_FILE), &metadata)?;

    tracing::info!(
        dir = %output_dir.display(),
        copied = report.copied.len(),
        missing = report.missing.len(),
        "Prepared model dataset"
    );
    Ok(report)
}
