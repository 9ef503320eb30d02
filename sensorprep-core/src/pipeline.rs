//! End-to-end preprocessing: clean -> window -> features -> split -> persist.

use crate::config::{FeatureColumns, PrepConfig};
use crate::data::clean::{CleanReport, Cleaner};
use crate::data::source::{CsvSource, DataBatch, DataSource, DataSourceInfo, list_raw_files};
use crate::data::storage::{self, RunManifest};
use crate::data::table::{RecordSequence, resolve_feature_columns};
use crate::data::validate::summarize;
use crate::error::PrepError;
use crate::features::compute::{FeatureComputer, FeatureTable};
use crate::features::window::WindowExtractor;
use crate::split::{Partitions, StratifiedSplitter};
use std::path::{Path, PathBuf};

/// Cleaned data reduced to window features.
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub clean_report: CleanReport,
    pub feature_columns: Vec<String>,
    pub records: usize,
    pub table: FeatureTable,
}

/// Everything a full run produces before persistence.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub clean_report: CleanReport,
    pub feature_columns: Vec<String>,
    pub records: usize,
    pub windows: usize,
    pub partitions: Partitions,
}

/// A configured preprocessing pipeline. Holds no state between runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PrepConfig,
}

impl Pipeline {
    /// Validate the configuration up front; no data is read on failure.
    pub fn new(config: PrepConfig) -> Result<Self, PrepError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    fn cleaner(&self, require_label: bool) -> Cleaner {
        let mut required = match &self.config.windowing.feature_columns {
            FeatureColumns::Explicit(columns) => columns.clone(),
            FeatureColumns::Infer => Vec::new(),
        };
        if require_label {
            required.push(self.config.data.label_column.clone());
        }
        Cleaner::new(required, self.config.cleaning.missing_values)
            .skip_imputation(vec![self.config.data.label_column.clone()])
    }

    /// Clean a raw table without windowing. The label column is optional.
    pub fn clean(&self, batch: DataBatch) -> Result<(DataBatch, CleanReport), PrepError> {
        self.cleaner(false).clean(batch)
    }

    /// Clean, window and summarize a raw table.
    pub fn features(&self, batch: DataBatch) -> Result<PreparedFeatures, PrepError> {
        let data = &self.config.data;
        let (batch, clean_report) = self.cleaner(true).clean(batch)?;

        let feature_columns = resolve_feature_columns(
            &batch,
            &self.config.windowing.feature_columns,
            &data.timestamp_column,
            &data.label_column,
        )?;
        tracing::info!(columns = ?feature_columns, "Feature channels");

        let sequence = RecordSequence::from_batch(
            &batch,
            feature_columns.clone(),
            &data.timestamp_column,
            &data.label_column,
        )?;
        let extractor = WindowExtractor::from_config(&self.config.windowing)?;
        let windows = extractor.windows(&sequence);
        if windows.len() == 0 {
            tracing::warn!(
                records = sequence.len(),
                window_size = extractor.window_size(),
                "Sequence shorter than one window; no feature rows produced"
            );
        }

        let table = FeatureComputer::new().compute(&sequence, windows, &data.label_column)?;
        Ok(PreparedFeatures {
            clean_report,
            feature_columns,
            records: sequence.len(),
            table,
        })
    }

    /// Run every stage on an in-memory table.
    pub fn run(&self, batch: DataBatch) -> Result<PipelineOutput, PrepError> {
        let prepared = self.features(batch)?;
        let windows = prepared.table.len();
        let partitions = StratifiedSplitter::from_config(&self.config.split)?.split(prepared.table)?;
        Ok(PipelineOutput {
            clean_report: prepared.clean_report,
            feature_columns: prepared.feature_columns,
            records: prepared.records,
            windows,
            partitions,
        })
    }

    /// Read the raw training file configured for `workspace`.
    pub fn load_raw(&self, workspace: &Path) -> Result<(DataBatch, DataSourceInfo), PrepError> {
        let raw_dir = workspace.join(&self.config.data.raw_dir);
        if !raw_dir.is_dir() {
            return Err(not_found("raw data directory", &raw_dir));
        }
        let files = list_raw_files(&raw_dir)?;
        tracing::info!(
            dir = %raw_dir.display(),
            files = ?files.iter().filter_map(|f| f.file_name()).collect::<Vec<_>>(),
            "Raw data files"
        );

        let path = raw_dir.join(&self.config.data.train_file);
        if !path.is_file() {
            return Err(not_found("training file", &path));
        }
        let source = CsvSource::new(path, self.config.data.delimiter);
        let batch = source.load(None)?;
        let mut info = source.source_info();
        info.row_count = Some(batch.row_count());
        Ok((batch, info))
    }

    /// Load, process and persist a workspace. Returns the written manifest.
    pub fn run_workspace(&self, workspace: &Path) -> Result<RunManifest, PrepError> {
        let (batch, source) = self.load_raw(workspace)?;
        summarize(&batch).log();

        let output = self.run(batch)?;
        tracing::info!(
            duplicates_removed = output.clean_report.duplicates_removed,
            records = output.records,
            windows = output.windows,
            "Preprocessing finished"
        );

        let out_dir = workspace.join(&self.config.data.processed_dir);
        storage::save_partitions(&out_dir, &output.partitions, source, output.windows, &self.config)
    }

    /// Load, clean and persist a workspace's raw table without splitting.
    pub fn clean_workspace(&self, workspace: &Path) -> Result<PathBuf, PrepError> {
        let (batch, _) = self.load_raw(workspace)?;
        summarize(&batch).log();
        let (cleaned, _) = self.clean(batch)?;
        storage::save_cleaned(&workspace.join(&self.config.data.processed_dir), &cleaned)
    }
}

fn not_found(what: &str, path: &Path) -> PrepError {
    PrepError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{what} not found: {}", path.display()),
    ))
}
