//! Per-window feature vectors.

use crate::data::table::RecordSequence;
use crate::error::PrepError;
use crate::features::stats::{ChannelStats, Moments, STAT_NAMES};
use crate::features::window::Window;
use serde::{Deserialize, Serialize};

/// Provenance column holding the first record index of a window.
pub const WINDOW_START_COLUMN: &str = "window_start";
/// Provenance column holding the exclusive end index of a window.
pub const WINDOW_END_COLUMN: &str = "window_end";

/// One summarized window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub window_start: usize,
    pub window_end: usize,
    /// One entry per channel, in [`FeatureTable::channels`] order.
    pub stats: Vec<ChannelStats>,
    /// Label of the window's last record.
    pub label: Option<String>,
}

/// Feature rows plus the column layout they share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub channels: Vec<String>,
    pub label_column: String,
    pub rows: Vec<FeatureVector>,
}

impl FeatureTable {
    pub fn new(channels: Vec<String>, label_column: impl Into<String>) -> Self {
        Self {
            channels,
            label_column: label_column.into(),
            rows: Vec::new(),
        }
    }

    /// An empty table with the same layout.
    pub fn empty_like(&self) -> Self {
        Self::new(self.channels.clone(), self.label_column.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Output header: `{channel}_{stat}` for every channel and statistic,
    /// then `window_start`, `window_end` and the label column.
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .flat_map(|c| STAT_NAMES.iter().map(move |s| format!("{c}_{s}")))
            .collect();
        names.push(WINDOW_START_COLUMN.to_string());
        names.push(WINDOW_END_COLUMN.to_string());
        names.push(self.label_column.clone());
        names
    }

    pub fn labels(&self) -> Vec<Option<&str>> {
        self.rows.iter().map(|r| r.label.as_deref()).collect()
    }
}

/// Reduces windows of a record sequence to feature vectors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureComputer;

impl FeatureComputer {
    pub fn new() -> Self {
        Self
    }

    /// Summarize every window over all channels of `sequence`.
    ///
    /// Missing values are skipped; a channel with no observed value in a
    /// window gets [`ChannelStats::MISSING`]. Rows come out ordered by
    /// ascending `window_start`.
    pub fn compute(
        &self,
        sequence: &RecordSequence,
        windows: impl IntoIterator<Item = Window>,
        label_column: &str,
    ) -> Result<FeatureTable, PrepError> {
        let mut table = FeatureTable::new(sequence.channels().to_vec(), label_column);
        for window in windows {
            table.rows.push(self.summarize(sequence, window)?);
        }
        table.rows.sort_by_key(|r| r.window_start);

        tracing::debug!(
            rows = table.len(),
            channels = table.channels.len(),
            "Computed window features"
        );
        Ok(table)
    }

    fn summarize(&self, sequence: &RecordSequence, window: Window) -> Result<FeatureVector, PrepError> {
        let records = sequence
            .records()
            .get(window.range())
            .filter(|r| !r.is_empty())
            .ok_or(PrepError::EmptyWindow {
                start: window.start,
                end: window.end,
                len: sequence.len(),
            })?;

        let mut moments = vec![Moments::new(); sequence.channels().len()];
        for record in records {
            for (acc, value) in moments.iter_mut().zip(&record.values) {
                if let Some(x) = value.filter(|x| !x.is_nan()) {
                    acc.push(x);
                }
            }
        }

        let label = records.last().and_then(|r| r.label.clone());
        Ok(FeatureVector {
            window_start: window.start,
            window_end: window.end,
            stats: moments
                .iter()
                .map(|m| m.finish().unwrap_or(ChannelStats::MISSING))
                .collect(),
            label,
        })
    }
}
