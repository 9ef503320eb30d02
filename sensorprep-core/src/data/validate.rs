//! Data exploration summary for raw tables.

use crate::data::clean::row_key;
use crate::data::schema::{ColumnType, infer_schema};
use crate::data::source::DataBatch;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shape, types, missing values and duplicates of a raw table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub columns: Vec<ColumnSummary>,
    pub missing_cells: usize,
    pub duplicate_rows: usize,
}

/// Per-column summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: ColumnType,
    pub missing: usize,
    pub missing_percentage: f64,
}

impl DataSummary {
    /// Count of columns per inferred type, in first-seen order.
    pub fn dtype_counts(&self) -> Vec<(ColumnType, usize)> {
        let mut counts: Vec<(ColumnType, usize)> = Vec::new();
        for col in &self.columns {
            match counts.iter_mut().find(|(t, _)| *t == col.dtype) {
                Some((_, n)) => *n += 1,
                None => counts.push((col.dtype, 1)),
            }
        }
        counts
    }

    /// Emit the summary through `tracing`.
    pub fn log(&self) {
        tracing::info!(
            rows = self.total_rows,
            columns = self.total_columns,
            missing = self.missing_cells,
            duplicates = self.duplicate_rows,
            "Data shape"
        );
        for col in &self.columns {
            tracing::debug!(
                column = %col.name,
                dtype = ?col.dtype,
                missing = col.missing,
                "Column summary"
            );
        }
    }
}

/// Summarize a raw table.
pub fn summarize(batch: &DataBatch) -> DataSummary {
    let total_rows = batch.row_count();
    let schema = infer_schema(batch);

    let columns: Vec<ColumnSummary> = schema
        .columns
        .into_iter()
        .enumerate()
        .map(|(i, col)| {
            let missing = batch
                .rows
                .iter()
                .filter(|row| row.get(i).is_none_or(|v| v.is_null()))
                .count();
            let missing_percentage = if total_rows > 0 {
                missing as f64 / total_rows as f64 * 100.0
            } else {
                0.0
            };
            ColumnSummary {
                name: col.name,
                dtype: col.dtype,
                missing,
                missing_percentage,
            }
        })
        .collect();

    let mut seen = HashSet::new();
    let duplicate_rows = batch
        .rows
        .iter()
        .filter(|row| !seen.insert(row_key(row)))
        .count();

    DataSummary {
        total_rows,
        total_columns: batch.column_count(),
        missing_cells: columns.iter().map(|c| c.missing).sum(),
        columns,
        duplicate_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_summarize() {
        let batch = DataBatch::new(
            vec!["acc_x".into(), "target".into()],
            vec![
                vec![json!(0.5), json!("wave")],
                vec![Value::Null, json!("wave")],
                vec![json!(0.5), json!("wave")],
                vec![Value::Null, json!("wave")],
            ],
        );
        let summary = summarize(&batch);
        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.total_columns, 2);
        assert_eq!(summary.missing_cells, 2);
        assert_eq!(summary.duplicate_rows, 2);
        assert_eq!(summary.columns[0].missing_percentage, 50.0);
        assert_eq!(summary.columns[1].dtype, ColumnType::String);
        assert_eq!(
            summary.dtype_counts(),
            vec![(ColumnType::Float, 1), (ColumnType::String, 1)]
        );
    }

    #[test]
    fn test_integer_and_float_rows_counted_as_duplicates() {
        let batch = DataBatch::new(
            vec!["timestamp".into(), "acc_x".into()],
            vec![
                vec![json!(3), json!(2)],
                vec![json!(3.0), json!(2.0)],
                vec![json!(3), json!(2.5)],
            ],
        );
        assert_eq!(summarize(&batch).duplicate_rows, 1);
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&DataBatch::empty());
        assert_eq!(summary.total_rows, 0);
        assert!(summary.columns.is_empty());
        assert_eq!(summary.duplicate_rows, 0);
    }
}
