//! Error types for the sensorprep-core crate.

use thiserror::Error;

/// Top-level error type for preprocessing runs.
///
/// Every variant is fatal: the pipeline never retries and never produces a
/// partial set of partitions.
#[derive(Debug, Error)]
pub enum PrepError {
    /// A required column is absent or the table is malformed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A window resolved to no records. Indicates a window extraction bug.
    #[error("Empty window [{start}, {end}) over a sequence of {len} records")]
    EmptyWindow { start: usize, end: usize, len: usize },

    /// A label class is too small to appear in every partition.
    #[error(
        "Label class '{class}' has {count} rows; at least {required} are needed to populate train, validation and test"
    )]
    InsufficientClassSamples {
        class: String,
        count: usize,
        required: usize,
    },

    /// A configuration value is out of range.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config load error: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),
}

impl PrepError {
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
