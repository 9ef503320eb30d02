//! Deduplication and missing-value handling for raw tables.

use crate::config::MissingValuePolicy;
use crate::data::schema::infer_schema;
use crate::data::source::DataBatch;
use crate::error::PrepError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// What a cleaning pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub duplicates_removed: usize,
    /// Missing cells after deduplication, before imputation.
    pub missing_before: usize,
    /// Missing cells after imputation. Equal to `missing_before` when the
    /// policy is [`MissingValuePolicy::Keep`].
    pub missing_after: usize,
}

/// Order-preserving table cleaner.
#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    required_columns: Vec<String>,
    missing_values: MissingValuePolicy,
    skip_imputation: Vec<String>,
}

impl Cleaner {
    pub fn new(required_columns: Vec<String>, missing_values: MissingValuePolicy) -> Self {
        Self {
            required_columns,
            missing_values,
            skip_imputation: Vec::new(),
        }
    }

    /// Columns never imputed, such as a numeric label column.
    pub fn skip_imputation(mut self, columns: Vec<String>) -> Self {
        self.skip_imputation = columns;
        self
    }

    /// Check the schema, drop exact duplicate rows (first occurrence wins)
    /// and apply the missing-value policy.
    pub fn clean(&self, batch: DataBatch) -> Result<(DataBatch, CleanReport), PrepError> {
        self.check_schema(&batch)?;

        let rows_in = batch.row_count();
        let mut batch = drop_duplicates(batch);
        let duplicates_removed = rows_in - batch.row_count();
        let missing_before = batch.missing_count();
        if duplicates_removed > 0 {
            tracing::info!(removed = duplicates_removed, "Removed duplicate rows");
        }

        match self.missing_values {
            MissingValuePolicy::Keep => {}
            policy => fill_missing(&mut batch, policy, &self.skip_imputation),
        }

        let report = CleanReport {
            rows_in,
            duplicates_removed,
            missing_before,
            missing_after: batch.missing_count(),
        };
        Ok((batch, report))
    }

    fn check_schema(&self, batch: &DataBatch) -> Result<(), PrepError> {
        if batch.column_count() == 0 {
            return Err(PrepError::schema("table has no columns"));
        }
        let missing: Vec<&str> = self
            .required_columns
            .iter()
            .filter(|c| batch.column_index(c).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PrepError::schema(format!(
                "required columns absent: {}",
                missing.join(", ")
            )));
        }
        if let Some((i, row)) = batch
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != batch.column_count())
        {
            return Err(PrepError::schema(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                batch.column_count()
            )));
        }
        Ok(())
    }
}

fn drop_duplicates(mut batch: DataBatch) -> DataBatch {
    let mut seen = HashSet::new();
    batch.rows.retain(|row| seen.insert(row_key(row)));
    batch
}

/// Identity key for duplicate detection. Numbers compare by value, so `1`,
/// `1.0` and `-0.0`/`0` collapse; integers beyond f64 precision keep their
/// exact text.
pub(crate) fn row_key(row: &[Value]) -> String {
    const EXACT: u64 = 1 << 53;
    let mut key = String::new();
    for cell in row {
        match cell {
            Value::Number(n) => {
                let exact = n.is_f64()
                    || n.as_i64().is_some_and(|i| i.unsigned_abs() <= EXACT)
                    || n.as_u64().is_some_and(|u| u <= EXACT);
                match n.as_f64() {
                    Some(x) if exact => {
                        let x = if x == 0.0 { 0.0 } else { x };
                        key.push_str(&format!("f{:016x}", x.to_bits()));
                    }
                    _ => key.push_str(&format!("i{n}")),
                }
            }
            other => key.push_str(&other.to_string()),
        }
        key.push('\u{1f}');
    }
    key
}

/// Impute missing cells of numeric columns in place. Row count and order are
/// unchanged.
fn fill_missing(batch: &mut DataBatch, policy: MissingValuePolicy, skip: &[String]) {
    let numeric: Vec<usize> = infer_schema(batch)
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.dtype.is_numeric() && !skip.contains(&c.name))
        .map(|(i, _)| i)
        .collect();

    for col in numeric {
        let column: Vec<Option<f64>> = batch.rows.iter().map(|row| row[col].as_f64()).collect();
        let filled = match policy {
            MissingValuePolicy::Keep => continue,
            MissingValuePolicy::ForwardFill => forward_fill(&column),
            MissingValuePolicy::Interpolate => interpolate(&column),
        };
        for (row, (before, after)) in batch.rows.iter_mut().zip(column.iter().zip(filled)) {
            if before.is_none() {
                if let Some(n) = after.and_then(serde_json::Number::from_f64) {
                    row[col] = serde_json::Value::Number(n);
                }
            }
        }
    }
}

fn forward_fill(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    column
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Linear interpolation by position. Trailing gaps take the last observed
/// value; leading gaps stay missing.
fn interpolate(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = column.to_vec();
    let mut prev: Option<(usize, f64)> = None;
    for (i, v) in column.iter().enumerate() {
        let Some(v) = *v else { continue };
        if let Some((p, pv)) = prev {
            let span = (i - p) as f64;
            for (k, slot) in out.iter_mut().enumerate().take(i).skip(p + 1) {
                *slot = Some(pv + (v - pv) * (k - p) as f64 / span);
            }
        }
        prev = Some((i, v));
    }
    if let Some((p, pv)) = prev {
        for slot in out.iter_mut().skip(p + 1) {
            *slot = Some(pv);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn batch(rows: Vec<Vec<Value>>) -> DataBatch {
        DataBatch::new(vec!["timestamp".into(), "acc_x".into(), "target".into()], rows)
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let input = batch(vec![
            vec![json!(0), json!(1.0), json!("a")],
            vec![json!(1), json!(2.0), json!("a")],
            vec![json!(0), json!(1.0), json!("a")],
            vec![json!(2), json!(3.0), json!("b")],
        ]);
        let (out, report) = Cleaner::default().clean(input).unwrap();
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.rows_in, 4);
        let ts: Vec<_> = out.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(ts, vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_differing_label_is_not_duplicate() {
        let input = batch(vec![
            vec![json!(0), json!(1.0), json!("a")],
            vec![json!(0), json!(1.0), json!("b")],
        ]);
        let (out, report) = Cleaner::default().clean(input).unwrap();
        assert_eq!(report.duplicates_removed, 0);
        assert_eq!(out.row_count(), 2);
    }

    #[test]
    fn test_numerically_equal_rows_are_duplicates() {
        let input = batch(vec![
            vec![json!(0), json!(1), json!("a")],
            vec![json!(0.0), json!(1.0), json!("a")],
            vec![json!(-0.0), json!(1.0), json!("a")],
            vec![json!(0), json!("1"), json!("a")],
        ]);
        let (out, report) = Cleaner::default().clean(input).unwrap();
        assert_eq!(report.duplicates_removed, 2);
        assert_eq!(out.rows[0], vec![json!(0), json!(1), json!("a")]);
        assert_eq!(out.rows[1][1], json!("1"));
    }

    #[test]
    fn test_row_key_keeps_large_integers_exact() {
        let big = 9_007_199_254_740_993_u64;
        assert_ne!(row_key(&[json!(big)]), row_key(&[json!(big - 1)]));
        assert_eq!(row_key(&[json!(7_u64)]), row_key(&[json!(7_i64)]));
        assert_ne!(row_key(&[Value::Null]), row_key(&[json!("null")]));
    }

    #[test]
    fn test_missing_values_untouched_by_default() {
        let input = batch(vec![
            vec![json!(0), json!(1.0), json!("a")],
            vec![json!(1), Value::Null, json!("a")],
        ]);
        let (out, report) = Cleaner::default().clean(input.clone()).unwrap();
        assert_eq!(out, input);
        assert_eq!(report.missing_before, 1);
        assert_eq!(report.missing_after, 1);
    }

    #[test]
    fn test_required_column_absent() {
        let cleaner = Cleaner::new(vec!["target".into(), "gyro_z".into()], MissingValuePolicy::Keep);
        let err = cleaner.clean(batch(vec![])).unwrap_err();
        match err {
            PrepError::Schema(msg) => assert!(msg.contains("gyro_z")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_ragged_row_is_schema_error() {
        let input = batch(vec![vec![json!(0), json!(1.0)]]);
        assert!(matches!(
            Cleaner::default().clean(input),
            Err(PrepError::Schema(_))
        ));
    }

    #[test]
    fn test_forward_fill_preserves_count_and_order() {
        let input = batch(vec![
            vec![json!(0), Value::Null, json!("a")],
            vec![json!(1), json!(2.0), json!("a")],
            vec![json!(2), Value::Null, json!("a")],
            vec![json!(3), json!(5.0), json!("b")],
        ]);
        let cleaner = Cleaner::new(vec![], MissingValuePolicy::ForwardFill);
        let (out, report) = cleaner.clean(input).unwrap();
        let col: Vec<_> = out.rows.iter().map(|r| r[1].clone()).collect();
        assert_eq!(col, vec![Value::Null, json!(2.0), json!(2.0), json!(5.0)]);
        assert_eq!(report.missing_after, 1);
    }

    #[test]
    fn test_interpolate() {
        assert_eq!(
            interpolate(&[None, Some(1.0), None, None, Some(4.0), None]),
            vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(4.0)]
        );
        assert_eq!(interpolate(&[None, None]), vec![None, None]);
    }

    #[test]
    fn test_skipped_numeric_column_not_imputed() {
        let input = DataBatch::new(
            vec!["acc_x".into(), "target".into()],
            vec![
                vec![json!(1.0), json!(0)],
                vec![Value::Null, Value::Null],
            ],
        );
        let cleaner = Cleaner::new(vec![], MissingValuePolicy::ForwardFill)
            .skip_imputation(vec!["target".into()]);
        let (out, _) = cleaner.clean(input).unwrap();
        assert_eq!(out.rows[1], vec![json!(1.0), Value::Null]);
    }

    #[test]
    fn test_label_column_not_imputed() {
        let input = batch(vec![
            vec![json!(0), json!(1.0), json!("a")],
            vec![json!(1), json!(2.0), Value::Null],
        ]);
        let cleaner = Cleaner::new(vec![], MissingValuePolicy::ForwardFill);
        let (out, _) = cleaner.clean(input).unwrap();
        assert_eq!(out.rows[1][2], Value::Null);
    }
}
