//! Single-pass summary statistics.
//!
//! Central moments are accumulated online (Welford's update extended to the
//! third and fourth moments), so each value is visited once and no window
//! buffer is kept.

use serde::{Deserialize, Serialize};

/// Statistic suffixes, in output column order.
pub const STAT_NAMES: [&str; 6] = ["mean", "std", "min", "max", "skew", "kurtosis"];

/// The six per-channel statistics of one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    /// Population standard deviation (denominator `n`).
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Third standardized moment.
    pub skew: f64,
    /// Fourth standardized moment minus 3.
    pub kurtosis: f64,
}

impl ChannelStats {
    /// Placeholder for a channel with no observed value in the window.
    pub const MISSING: Self = Self {
        mean: f64::NAN,
        std: f64::NAN,
        min: f64::NAN,
        max: f64::NAN,
        skew: f64::NAN,
        kurtosis: f64::NAN,
    };

    /// Values in [`STAT_NAMES`] order.
    pub fn values(&self) -> [f64; 6] {
        [
            self.mean,
            self.std,
            self.min,
            self.max,
            self.skew,
            self.kurtosis,
        ]
    }
}

/// Online accumulator for mean, extrema and central moments 2 to 4.
#[derive(Debug, Clone, Copy)]
pub struct Moments {
    n: u64,
    mean: f64,
    m2: f64,
    m3: f64,
    m4: f64,
    min: f64,
    max: f64,
}

impl Default for Moments {
    fn default() -> Self {
        Self {
            n: 0,
            mean: 0.0,
            m2: 0.0,
            m3: 0.0,
            m4: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Moments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn push(&mut self, x: f64) {
        let n1 = self.n as f64;
        self.n += 1;
        let n = self.n as f64;

        let delta = x - self.mean;
        let delta_n = delta / n;
        let delta_n2 = delta_n * delta_n;
        let term1 = delta * delta_n * n1;

        self.mean += delta_n;
        self.m4 += term1 * delta_n2 * (n * n - 3.0 * n + 3.0) + 6.0 * delta_n2 * self.m2
            - 4.0 * delta_n * self.m3;
        self.m3 += term1 * delta_n * (n - 2.0) - 3.0 * delta_n * self.m2;
        self.m2 += term1;

        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Final statistics, or `None` when nothing was pushed.
    pub fn finish(&self) -> Option<ChannelStats> {
        if self.n == 0 {
            return None;
        }
        let n = self.n as f64;

        // Zero variance makes skew and kurtosis 0/0; both are pinned to 0.
        if self.m2 <= 0.0 {
            return Some(ChannelStats {
                mean: self.mean,
                std: 0.0,
                min: self.min,
                max: self.max,
                skew: 0.0,
                kurtosis: 0.0,
            });
        }

        Some(ChannelStats {
            mean: self.mean,
            std: (self.m2 / n).sqrt(),
            min: self.min,
            max: self.max,
            skew: n.sqrt() * self.m3 / self.m2.powf(1.5),
            kurtosis: n * self.m4 / (self.m2 * self.m2) - 3.0,
        })
    }
}

impl FromIterator<f64> for Moments {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut moments = Self::new();
        for x in iter {
            moments.push(x);
        }
        moments
    }
}
