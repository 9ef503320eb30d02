//! Typed, time-ordered records built from a cleaned raw table.

use crate::config::FeatureColumns;
use crate::data::schema::infer_schema;
use crate::data::source::DataBatch;
use crate::error::PrepError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

/// Date-time layouts accepted for text timestamps, besides RFC 3339.
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// An orderable timestamp.
///
/// Numeric cells and parseable date-times become `Numeric` (epoch seconds for
/// date-times). Anything else is compared as text, after every numeric value.
#[derive(Debug, Clone)]
pub enum Timestamp {
    Numeric(f64),
    Text(String),
}

impl Timestamp {
    pub fn from_cell(cell: &serde_json::Value) -> Option<Self> {
        match cell {
            serde_json::Value::Number(n) => n.as_f64().map(Self::Numeric),
            serde_json::Value::String(s) => Some(
                parse_datetime(s)
                    .map(Self::Numeric)
                    .unwrap_or_else(|| Self::Text(s.clone())),
            ),
            _ => None,
        }
    }
}

fn parse_datetime(s: &str) -> Option<f64> {
    let to_secs = |dt: NaiveDateTime| {
        let utc = dt.and_utc();
        utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) * 1e-9
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(to_secs(dt.naive_utc()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(to_secs(dt));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(to_secs)
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.total_cmp(b),
            (Self::Numeric(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

/// One observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: Option<Timestamp>,
    /// One value per channel, in [`RecordSequence::channels`] order.
    pub values: Vec<Option<f64>>,
    pub label: Option<String>,
}

/// Records ordered by timestamp ascending; records with no timestamp sort
/// last. Without a timestamp column, input order is kept.
#[derive(Debug, Clone)]
pub struct RecordSequence {
    channels: Vec<String>,
    records: Vec<Record>,
}

impl RecordSequence {
    /// Build a sequence from a cleaned table.
    ///
    /// `timestamp_column` and `label_column` are used only when present in
    /// the table. Every channel cell must be numeric or missing.
    pub fn from_batch(
        batch: &DataBatch,
        channels: Vec<String>,
        timestamp_column: &str,
        label_column: &str,
    ) -> Result<Self, PrepError> {
        let channel_idx = channels
            .iter()
            .map(|c| {
                batch
                    .column_index(c)
                    .ok_or_else(|| PrepError::schema(format!("missing feature column '{c}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let ts_idx = batch.column_index(timestamp_column);
        let label_idx = batch.column_index(label_column);

        let mut records = Vec::with_capacity(batch.row_count());
        for (row_no, row) in batch.rows.iter().enumerate() {
            let values = channel_idx
                .iter()
                .zip(&channels)
                .map(|(&i, name)| match row.get(i) {
                    None | Some(serde_json::Value::Null) => Ok(None),
                    Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
                    Some(other) => Err(PrepError::schema(format!(
                        "column '{name}' row {row_no}: expected a number, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            records.push(Record {
                timestamp: ts_idx.and_then(|i| row.get(i)).and_then(Timestamp::from_cell),
                values,
                label: label_idx.and_then(|i| row.get(i)).and_then(label_from_cell),
            });
        }

        let mut sequence = Self { channels, records };
        if ts_idx.is_some() {
            sequence.sort_by_timestamp();
        }
        Ok(sequence)
    }

    fn sort_by_timestamp(&mut self) {
        let key = |r: &Record| (r.timestamp.is_none(), r.timestamp.clone());
        let sorted = self.records.windows(2).all(|w| key(&w[0]) <= key(&w[1]));
        if !sorted {
            tracing::debug!(records = self.records.len(), "Re-sorting records by timestamp");
            self.records.sort_by_key(key);
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn label_from_cell(cell: &serde_json::Value) -> Option<String> {
    match cell {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Resolve the feature channels for a table.
///
/// `Infer` selects every numeric column other than the timestamp and label
/// columns, in table order. An explicit list must name existing columns.
pub fn resolve_feature_columns(
    batch: &DataBatch,
    selection: &FeatureColumns,
    timestamp_column: &str,
    label_column: &str,
) -> Result<Vec<String>, PrepError> {
    let columns = match selection {
        FeatureColumns::Explicit(columns) => {
            if let Some(missing) = columns.iter().find(|c| batch.column_index(c).is_none()) {
                return Err(PrepError::schema(format!(
                    "feature column '{missing}' not found in table"
                )));
            }
            columns.clone()
        }
        FeatureColumns::Infer => infer_schema(batch)
            .columns
            .into_iter()
            .filter(|c| c.dtype.is_numeric())
            .filter(|c| c.name != timestamp_column && c.name != label_column)
            .map(|c| c.name)
            .collect(),
    };
    if columns.is_empty() {
        return Err(PrepError::schema("no numeric feature columns found"));
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn batch() -> DataBatch {
        DataBatch::new(
            vec![
                "timestamp".into(),
                "acc_x".into(),
                "note".into(),
                "target".into(),
            ],
            vec![
                vec![json!(2), json!(0.2), json!("b"), json!("tap")],
                vec![json!(0), json!(0.0), json!("a"), json!("wave")],
                vec![json!(1), Value::Null, json!("c"), json!("wave")],
            ],
        )
    }

    #[test]
    fn test_infer_feature_columns_skips_timestamp_label_and_text() {
        let cols = resolve_feature_columns(&batch(), &FeatureColumns::Infer, "timestamp", "target")
            .unwrap();
        assert_eq!(cols, vec!["acc_x"]);
    }

    #[test]
    fn test_explicit_missing_column_is_schema_error() {
        let selection = FeatureColumns::Explicit(vec!["gyro_z".into()]);
        let err = resolve_feature_columns(&batch(), &selection, "timestamp", "target").unwrap_err();
        assert!(matches!(err, PrepError::Schema(_)));
    }

    #[test]
    fn test_sequence_is_sorted_by_timestamp() {
        let seq =
            RecordSequence::from_batch(&batch(), vec!["acc_x".into()], "timestamp", "target")
                .unwrap();
        let values: Vec<_> = seq.records().iter().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![Some(0.0), None, Some(0.2)]);
        assert_eq!(seq.records()[2].label.as_deref(), Some("tap"));
    }

    #[test]
    fn test_without_timestamp_column_input_order_is_kept() {
        let seq = RecordSequence::from_batch(&batch(), vec!["acc_x".into()], "time", "target")
            .unwrap();
        let values: Vec<_> = seq.records().iter().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![Some(0.2), Some(0.0), None]);
        assert!(seq.records()[0].timestamp.is_none());
    }

    #[test]
    fn test_text_channel_is_schema_error() {
        let err = RecordSequence::from_batch(&batch(), vec!["note".into()], "timestamp", "target")
            .unwrap_err();
        assert!(matches!(err, PrepError::Schema(_)));
    }

    #[test]
    fn test_datetime_timestamps_order_chronologically() {
        let a = Timestamp::from_cell(&json!("2024-01-02 00:00:00")).unwrap();
        let b = Timestamp::from_cell(&json!("2024-01-01T23:59:59Z")).unwrap();
        let c = Timestamp::from_cell(&json!("2024-01-03")).unwrap();
        assert!(b < a);
        assert!(a < c);
        assert!(matches!(a, Timestamp::Numeric(_)));
    }

    #[test]
    fn test_numeric_before_text_and_missing_last() {
        let batch = DataBatch::new(
            vec!["timestamp".into(), "v".into()],
            vec![
                vec![Value::Null, json!(3)],
                vec![json!("zulu"), json!(2)],
                vec![json!(10), json!(1)],
            ],
        );
        let seq = RecordSequence::from_batch(&batch, vec!["v".into()], "timestamp", "target")
            .unwrap();
        let values: Vec<_> = seq.records().iter().map(|r| r.values[0]).collect();
        assert_eq!(values, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }
}
