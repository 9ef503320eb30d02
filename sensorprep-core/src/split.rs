//! Stratified train/validation/test partitioning.
//!
//! The split runs in two stages over row indices:
//!
//! 1. every label class gives `max(1, round(n * test_fraction))` of its rows
//!    to `test`;
//! 2. every class gives `max(1, round(r * validation_fraction))` of its
//!    remaining `r` rows to `validation`; the rest go to `train`.
//!
//! `validation_fraction` is therefore relative to the post-test remainder, not
//! to the full table. Row selection inside a class is a seeded shuffle, so the
//! same table, fractions and seed always give the same partitions.

use crate::config::SplitConfig;
use crate::error::PrepError;
use crate::features::compute::FeatureTable;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row indices of each partition, ascending within a partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl PartitionIndices {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// The three disjoint feature tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Partitions {
    pub train: FeatureTable,
    pub validation: FeatureTable,
    pub test: FeatureTable,
}

/// Per-class row counts `(test, validation, train)` for a class of `n` rows,
/// or `None` if some partition would be empty.
pub fn allocate(n: usize, test_fraction: f64, validation_fraction: f64) -> Option<(usize, usize, usize)> {
    let n_test = ((n as f64 * test_fraction).round() as usize).max(1);
    let remainder = n.checked_sub(n_test)?;
    let n_val = ((remainder as f64 * validation_fraction).round() as usize).max(1);
    let n_train = remainder.checked_sub(n_val)?;
    (n_train >= 1).then_some((n_test, n_val, n_train))
}

/// Sizes tried around each bound before settling for the bound itself.
const SIZE_SCAN: usize = 4096;

/// Smallest class size above `count` that [`allocate`] can split three ways.
///
/// Sizes below `1.5 / (1 - test_fraction)` leave fewer than two rows after
/// the test draw, so the scan starts there. If no size fits within
/// [`SIZE_SCAN`] steps, the result is the first size from which every larger
/// class allocates; it may then overstate the true minimum.
pub fn minimum_class_size(count: usize, test_fraction: f64, validation_fraction: f64) -> usize {
    let fits = |m: usize| allocate(m, test_fraction, validation_fraction).is_some();

    let lower = to_size((1.5 / (1.0 - test_fraction) - 1e-9).ceil());
    let start = (count.max(2) + 1).max(lower);
    if let Some(m) = (start..).take(SIZE_SCAN).find(|&m| fits(m)) {
        return m;
    }

    // From `upper` on, the remainder after the test draw is at least
    // `remainder` rows, enough to leave one row each for validation and train.
    let remainder = (1.5 / (1.0 - validation_fraction)).max(2.0);
    let upper = to_size(
        ((remainder + 0.5) / (1.0 - test_fraction))
            .max(remainder + 1.0)
            .ceil(),
    )
    .max(start);
    (upper..).take(SIZE_SCAN).find(|&m| fits(m)).unwrap_or(upper)
}

fn to_size(x: f64) -> usize {
    if x.is_finite() && x < usize::MAX as f64 {
        x.max(0.0) as usize
    } else {
        usize::MAX
    }
}

/// Seeded, class-preserving splitter.
#[derive(Debug, Clone)]
pub struct StratifiedSplitter {
    test_fraction: f64,
    validation_fraction: f64,
    seed: u64,
}

impl StratifiedSplitter {
    pub fn new(test_fraction: f64, validation_fraction: f64, seed: u64) -> Result<Self, PrepError> {
        let config = SplitConfig {
            test_fraction,
            validation_fraction,
            random_seed: seed,
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &SplitConfig) -> Result<Self, PrepError> {
        config.validate()?;
        Ok(Self {
            test_fraction: config.test_fraction,
            validation_fraction: config.validation_fraction,
            seed: config.random_seed,
        })
    }

    /// Assign every row index to exactly one partition.
    ///
    /// Fails with [`PrepError::Schema`] if a row has no label and with
    /// [`PrepError::InsufficientClassSamples`] if a class cannot populate all
    /// three partitions.
    pub fn split_indices(&self, labels: &[Option<&str>]) -> Result<PartitionIndices, PrepError> {
        let mut classes: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (row, label) in labels.iter().enumerate() {
            let label = label.ok_or_else(|| PrepError::schema(format!("row {row} has no label")))?;
            classes.entry(label).or_default().push(row);
        }

        let mut plan = Vec::with_capacity(classes.len());
        for (class, rows) in &classes {
            let counts = allocate(rows.len(), self.test_fraction, self.validation_fraction)
                .ok_or_else(|| PrepError::InsufficientClassSamples {
                    class: class.to_string(),
                    count: rows.len(),
                    required: minimum_class_size(
                        rows.len(),
                        self.test_fraction,
                        self.validation_fraction,
                    ),
                })?;
            plan.push(counts);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut out = PartitionIndices::default();
        let mut remainders = Vec::with_capacity(classes.len());

        // Stage 1: test vs remainder.
        for (mut rows, &(n_test, _, _)) in classes.into_values().zip(&plan) {
            rows.shuffle(&mut rng);
            let rest = rows.split_off(n_test);
            out.test.extend(rows);
            remainders.push(rest);
        }

        // Stage 2: validation vs train, fraction relative to the remainder.
        for (mut rows, &(_, n_val, _)) in remainders.into_iter().zip(&plan) {
            rows.shuffle(&mut rng);
            let rest = rows.split_off(n_val);
            out.validation.extend(rows);
            out.train.extend(rest);
        }

        out.train.sort_unstable();
        out.validation.sort_unstable();
        out.test.sort_unstable();

        tracing::info!(
            train = out.train.len(),
            validation = out.validation.len(),
            test = out.test.len(),
            classes = plan.len(),
            "Stratified split"
        );
        Ok(out)
    }

    /// Partition a feature table. Rows are moved, never duplicated.
    pub fn split(&self, table: FeatureTable) -> Result<Partitions, PrepError> {
        let indices = self.split_indices(&table.labels())?;

        let mut train = table.empty_like();
        let mut validation = table.empty_like();
        let mut test = table.empty_like();
        let mut rows: Vec<_> = table.rows.into_iter().map(Some).collect();

        for (target, idx) in [
            (&mut train, &indices.train),
            (&mut validation, &indices.validation),
            (&mut test, &indices.test),
        ] {
            target.rows = idx.iter().filter_map(|&i| rows[i].take()).collect();
        }

        Ok(Partitions {
            train,
            validation,
            test,
        })
    }
}
