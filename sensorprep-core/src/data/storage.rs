//! Persistence of cleaned tables, partitions and the run manifest.

use crate::config::PrepConfig;
use crate::data::source::{DataBatch, DataSourceInfo};
use crate::error::PrepError;
use crate::features::compute::FeatureTable;
use crate::split::Partitions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

pub const TRAIN_FILE: &str = "train_processed.csv";
pub const VALIDATION_FILE: &str = "val_processed.csv";
pub const TEST_FILE: &str = "test_processed.csv";
pub const CLEANED_FILE: &str = "train_cleaned.csv";
pub const MANIFEST_FILE: &str = "manifest.json";

/// A written output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputFile {
    pub name: String,
    pub rows: usize,
    pub sha256: String,
}

/// Record of one preprocessing run, written next to its outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub created_at: DateTime<Utc>,
    pub source: DataSourceInfo,
    pub feature_columns: Vec<String>,
    pub windows: usize,
    pub files: Vec<OutputFile>,
    pub config: PrepConfig,
}

impl RunManifest {
    pub fn load(path: &Path) -> Result<Self, PrepError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Atomically write raw bytes: write a `.tmp` sibling, then rename.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = stage(path, data)?;
    std::fs::rename(&tmp, path)
}

/// Write `data` to the `.tmp` sibling of `path`; returns the temp path.
fn stage(path: &Path, data: &[u8]) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    Ok(tmp)
}

fn discard(paths: &[PathBuf]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Atomically write pretty-printed JSON.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<(), PrepError> {
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())?;
    Ok(())
}

/// Compute SHA-256 hash of file contents.
pub fn hash_file(path: &Path) -> Result<String, PrepError> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Compute SHA-256 hash of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Render a feature cell. Non-finite values become empty cells.
fn format_stat(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

fn format_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialize a feature table to CSV bytes.
pub fn feature_table_csv(table: &FeatureTable) -> Result<Vec<u8>, PrepError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for row in &table.rows {
        let mut record: Vec<String> = row
            .stats
            .iter()
            .flat_map(|s| s.values())
            .map(format_stat)
            .collect();
        record.push(row.window_start.to_string());
        record.push(row.window_end.to_string());
        record.push(row.label.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }
    writer.into_inner().map_err(|e| PrepError::Io(e.into_error()))
}

/// Serialize a raw table to CSV bytes.
pub fn batch_csv(batch: &DataBatch) -> Result<Vec<u8>, PrepError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&batch.columns)?;
    for row in &batch.rows {
        writer.write_record(row.iter().map(format_cell))?;
    }
    writer.into_inner().map_err(|e| PrepError::Io(e.into_error()))
}

fn write_output(dir: &Path, name: &str, bytes: &[u8], rows: usize) -> Result<OutputFile, PrepError> {
    let path = dir.join(name);
    atomic_write(&path, bytes)?;
    tracing::debug!(path = %path.display(), rows, "Wrote output");
    Ok(OutputFile {
        name: name.to_string(),
        rows,
        sha256: hash_bytes(bytes),
    })
}

/// Write the three partitions and the manifest into `dir`.
///
/// All three CSVs are rendered and staged as `.tmp` files before any
/// previous output is touched; a failure up to that point leaves the last
/// run intact. The old manifest is then removed and the partitions renamed
/// into place, and the new manifest is written last. A manifest therefore
/// only ever sits next to the partitions it describes.
pub fn save_partitions(
    dir: &Path,
    partitions: &Partitions,
    source: DataSourceInfo,
    windows: usize,
    config: &PrepConfig,
) -> Result<RunManifest, PrepError> {
    let rendered = [
        (TRAIN_FILE, feature_table_csv(&partitions.train)?, partitions.train.len()),
        (
            VALIDATION_FILE,
            feature_table_csv(&partitions.validation)?,
            partitions.validation.len(),
        ),
        (TEST_FILE, feature_table_csv(&partitions.test)?, partitions.test.len()),
    ];

    let mut staged = Vec::with_capacity(rendered.len());
    for (name, bytes, _) in &rendered {
        match stage(&dir.join(name), bytes) {
            Ok(tmp) => staged.push(tmp),
            Err(e) => {
                discard(&staged);
                return Err(e.into());
            }
        }
    }

    if let Err(e) = remove_if_exists(&dir.join(MANIFEST_FILE)) {
        discard(&staged);
        return Err(e.into());
    }
    for (i, ((name, _, _), tmp)) in rendered.iter().zip(&staged).enumerate() {
        if let Err(e) = std::fs::rename(tmp, dir.join(name)) {
            discard(&staged[i..]);
            return Err(e.into());
        }
    }

    let files: Vec<OutputFile> = rendered
        .iter()
        .map(|(name, bytes, rows)| {
            tracing::debug!(file = %name, rows, "Wrote output");
            OutputFile {
                name: name.to_string(),
                rows: *rows,
                sha256: hash_bytes(bytes),
            }
        })
        .collect();

    let manifest = RunManifest {
        created_at: Utc::now(),
        source,
        feature_columns: partitions.train.channels.clone(),
        windows,
        files,
        config: config.clone(),
    };
    atomic_write_json(&dir.join(MANIFEST_FILE), &manifest)?;
    tracing::info!(dir = %dir.display(), "Saved processed data");
    Ok(manifest)
}

/// Write a cleaned raw table to `dir/train_cleaned.csv`.
pub fn save_cleaned(dir: &Path, batch: &DataBatch) -> Result<PathBuf, PrepError> {
    let bytes = batch_csv(batch)?;
    write_output(dir, CLEANED_FILE, &bytes, batch.row_count())?;
    Ok(dir.join(CLEANED_FILE))
}
