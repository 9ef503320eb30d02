//! Raw table loading.

use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Literals treated as a missing value.
const MISSING_LITERALS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// A row-oriented raw table. Cells are JSON scalars; `Null` marks a
/// missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl DataBatch {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Total number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|v| v.is_null())
            .count()
    }
}

/// Information about a data source for the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
    pub row_count: Option<usize>,
}

/// Trait for loading a raw table.
pub trait DataSource {
    /// Load data from this source, optionally limiting the number of rows.
    fn load(&self, limit: Option<usize>) -> Result<DataBatch, PrepError>;

    /// Return metadata about this source.
    fn source_info(&self) -> DataSourceInfo;
}

/// CSV file data source.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }
}

impl DataSource for CsvSource {
    fn load(&self, limit: Option<usize>) -> Result<DataBatch, PrepError> {
        let delimiter = u8::try_from(self.delimiter).map_err(|_| {
            PrepError::configuration(format!(
                "CSV delimiter must be a single-byte character, got '{}'",
                self.delimiter
            ))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(PrepError::schema(format!(
                "{} has no header row",
                self.path.display()
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            if limit.is_some_and(|max| rows.len() >= max) {
                break;
            }
            let record = record?;
            rows.push(record.iter().map(parse_cell).collect());
        }

        tracing::debug!(
            path = %self.path.display(),
            rows = rows.len(),
            columns = columns.len(),
            "Loaded CSV"
        );
        Ok(DataBatch::new(columns, rows))
    }

    fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
            row_count: None,
        }
    }
}

/// Parse one raw CSV field into a typed cell.
pub fn parse_cell(raw: &str) -> serde_json::Value {
    let s = raw.trim().trim_matches('"');
    if MISSING_LITERALS.contains(&s) {
        return serde_json::Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return serde_json::Value::Number(i.into());
    }
    if let Ok(f) = s.parse::<f64>() {
        return serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(s.to_string()));
    }
    if s == "true" || s == "false" {
        return serde_json::Value::Bool(s == "true");
    }
    serde_json::Value::String(s.to_string())
}

/// List the files in a raw data directory, sorted by name.
pub fn list_raw_files(dir: &Path) -> Result<Vec<PathBuf>, PrepError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
