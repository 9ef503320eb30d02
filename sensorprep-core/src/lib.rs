//! # sensorprep-core — sensor time-series preprocessing
//!
//! Turns a raw labelled sensor table into windowed feature tables split into
//! train, validation and test partitions.
//!
//! ## Stages
//!
//! Data flows strictly forward:
//! 1. **Cleaning** ([`data::clean`]): schema checks, duplicate removal, optional imputation
//! 2. **Windowing** ([`features::window`]): fixed-size, fixed-stride windows over the time-ordered records
//! 3. **Features** ([`features::compute`]): mean, std, min, max, skew and kurtosis per channel and window
//! 4. **Splitting** ([`split`]): seeded, stratified train/validation/test partitions
//! 5. **Persistence** ([`data::storage`]): CSV partitions plus a JSON run manifest
//!
//! [`pipeline::Pipeline`] wires the stages together.

// Foundation
pub mod config;
pub mod error;

// Stages
pub mod data;
pub mod features;
pub mod split;

// Orchestration
pub mod package;
pub mod pipeline;

// Re-exports
pub use config::{PrepConfig, load_config};
pub use error::PrepError;
pub use pipeline::{Pipeline, PipelineOutput};
