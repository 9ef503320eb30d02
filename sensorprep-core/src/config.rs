//! Configuration for preprocessing runs.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! The config file is either given explicitly or discovered as `config/config.yaml`,
//! `config/config.yml` or `config/config.toml` under the workspace directory.
//!
//! Stages never read configuration from ambient state; callers load a
//! [`PrepConfig`] once and pass the relevant section to each stage.

use crate::error::PrepError;
use figment::{
    Figment,
    providers::{Env, Format, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Candidate config files, relative to the workspace, in lookup order.
const CONFIG_CANDIDATES: &[&str] = &[
    "config/config.yaml",
    "config/config.yml",
    "config/config.toml",
];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrepConfig {
    /// Input and output locations plus column roles.
    #[serde(default)]
    pub data: DataConfig,
    /// Cleaning options.
    #[serde(default)]
    pub cleaning: CleaningConfig,
    /// Window extraction options.
    #[serde(default)]
    pub windowing: WindowConfig,
    /// Stratified split options.
    #[serde(default)]
    pub split: SplitConfig,
    /// Model artifact packaging options.
    #[serde(default)]
    pub package: PackageConfig,
}

impl PrepConfig {
    /// Move `data.window_size`, `data.stride`, `data.test_split`,
    /// `data.validation_split` and `data.random_state` onto their sections.
    /// Keys found there win over the section values.
    pub fn apply_legacy_data_keys(&mut self) {
        let data = &mut self.data;
        let mut count = 0;
        if let Some(v) = data.legacy_window_size.take() {
            self.windowing.window_size = v;
            count += 1;
        }
        if let Some(v) = data.legacy_stride.take() {
            self.windowing.stride = v;
            count += 1;
        }
        if let Some(v) = data.legacy_test_split.take() {
            self.split.test_fraction = v;
            count += 1;
        }
        if let Some(v) = data.legacy_validation_split.take() {
            self.split.validation_fraction = v;
            count += 1;
        }
        if let Some(v) = data.legacy_random_state.take() {
            self.split.random_seed = v;
            count += 1;
        }
        if count > 0 {
            tracing::warn!(
                keys = count,
                "Windowing/split keys found under `data`; prefer the `windowing` and `split` sections"
            );
        }
    }

    /// Reject out-of-range values before any data is touched.
    pub fn validate(&self) -> Result<(), PrepError> {
        self.windowing.validate()?;
        self.split.validate()?;
        if self.data.label_column.trim().is_empty() {
            return Err(PrepError::configuration("data.label_column must not be empty"));
        }
        if let FeatureColumns::Explicit(columns) = &self.windowing.feature_columns {
            if columns.iter().any(|c| *c == self.data.label_column) {
                return Err(PrepError::configuration(format!(
                    "windowing.feature_columns must not contain the label column '{}'",
                    self.data.label_column
                )));
            }
        }
        Ok(())
    }
}

/// Data locations and column roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Directory holding raw input files.
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    /// Directory receiving processed partitions.
    #[serde(default = "default_processed_dir")]
    pub processed_dir: PathBuf,
    /// Raw training file name inside `raw_dir`.
    #[serde(default = "default_train_file")]
    pub train_file: String,
    /// CSV field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Column used to order records in time. Optional in the input.
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,
    /// Categorical label column.
    #[serde(default = "default_label_column")]
    pub label_column: String,

    // Older layout keeping windowing and split keys under `data`. Moved onto
    // their sections by `PrepConfig::apply_legacy_data_keys`; never written.
    #[serde(default, rename = "window_size", skip_serializing)]
    legacy_window_size: Option<usize>,
    #[serde(default, rename = "stride", skip_serializing)]
    legacy_stride: Option<usize>,
    #[serde(default, rename = "test_split", skip_serializing)]
    legacy_test_split: Option<f64>,
    #[serde(default, rename = "validation_split", skip_serializing)]
    legacy_validation_split: Option<f64>,
    #[serde(default, rename = "random_state", skip_serializing)]
    legacy_random_state: Option<u64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
            train_file: default_train_file(),
            delimiter: default_delimiter(),
            timestamp_column: default_timestamp_column(),
            label_column: default_label_column(),
            legacy_window_size: None,
            legacy_stride: None,
            legacy_test_split: None,
            legacy_validation_split: None,
            legacy_random_state: None,
        }
    }
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_processed_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

fn default_train_file() -> String {
    "train.csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

fn default_label_column() -> String {
    "target".to_string()
}

/// How missing numeric values are handled during cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Leave missing values untouched.
    #[default]
    #[serde(rename = "none", alias = "keep")]
    Keep,
    /// Carry the last observed value forward.
    #[serde(alias = "ffill")]
    ForwardFill,
    /// Linear interpolation by row position.
    Interpolate,
}

/// Cleaning options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleaningConfig {
    #[serde(default)]
    pub missing_values: MissingValuePolicy,
}

/// Which columns become feature channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FeatureColumnsRepr", into = "FeatureColumnsRepr")]
pub enum FeatureColumns {
    /// All numeric columns except the timestamp and label columns.
    #[default]
    Infer,
    /// An explicit list, in output order.
    Explicit(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FeatureColumnsRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<FeatureColumnsRepr> for FeatureColumns {
    type Error = String;

    fn try_from(repr: FeatureColumnsRepr) -> Result<Self, Self::Error> {
        match repr {
            FeatureColumnsRepr::Keyword(k) if k.eq_ignore_ascii_case("infer") => Ok(Self::Infer),
            FeatureColumnsRepr::Keyword(k) => Err(format!(
                "feature_columns must be a list of column names or \"infer\", got \"{k}\""
            )),
            FeatureColumnsRepr::List(columns) => Ok(Self::Explicit(columns)),
        }
    }
}

impl From<FeatureColumns> for FeatureColumnsRepr {
    fn from(columns: FeatureColumns) -> Self {
        match columns {
            FeatureColumns::Infer => Self::Keyword("infer".to_string()),
            FeatureColumns::Explicit(columns) => Self::List(columns),
        }
    }
}

/// Window extraction options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    /// Records per window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Step between consecutive window starts.
    #[serde(default = "default_stride")]
    pub stride: usize,
    #[serde(default)]
    pub feature_columns: FeatureColumns,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            stride: default_stride(),
            feature_columns: FeatureColumns::Infer,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), PrepError> {
        if self.window_size == 0 {
            return Err(PrepError::configuration("windowing.window_size must be >= 1"));
        }
        if self.stride == 0 {
            return Err(PrepError::configuration("windowing.stride must be >= 1"));
        }
        if let FeatureColumns::Explicit(columns) = &self.feature_columns {
            if columns.is_empty() {
                return Err(PrepError::configuration(
                    "windowing.feature_columns must list at least one column",
                ));
            }
        }
        Ok(())
    }
}

fn default_window_size() -> usize {
    1000
}

fn default_stride() -> usize {
    500
}

/// Stratified split options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    /// Fraction of every class assigned to the test partition.
    #[serde(default = "default_fraction", alias = "test_split")]
    pub test_fraction: f64,
    /// Fraction of the post-test remainder (not of the total) assigned to
    /// the validation partition.
    #[serde(default = "default_fraction", alias = "validation_split")]
    pub validation_fraction: f64,
    /// Sole source of randomness for the split.
    #[serde(default = "default_seed", alias = "random_state")]
    pub random_seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_fraction(),
            validation_fraction: default_fraction(),
            random_seed: default_seed(),
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), PrepError> {
        for (name, value) in [
            ("split.test_fraction", self.test_fraction),
            ("split.validation_fraction", self.validation_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(PrepError::configuration(format!(
                    "{name} must be in (0, 1), got {value}"
                )));
            }
        }
        Ok(())
    }
}

fn default_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Model artifact packaging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Directory holding trained model artifacts.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    /// Directory that receives the upload-ready dataset.
    #[serde(default = "default_package_dir")]
    pub output_dir: PathBuf,
    /// Artifact file names to copy.
    #[serde(default = "default_package_files")]
    pub files: Vec<String>,
    #[serde(default = "default_package_title")]
    pub title: String,
    /// Dataset identifier, usually `<owner>/<slug>`.
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    #[serde(default = "default_license")]
    pub license: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            output_dir: default_package_dir(),
            files: default_package_files(),
            title: default_package_title(),
            dataset_id: default_dataset_id(),
            license: default_license(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models/trained")
}

fn default_package_dir() -> PathBuf {
    PathBuf::from("models/kaggle_dataset")
}

fn default_package_files() -> Vec<String> {
    vec![
        "baseline_model.pkl".to_string(),
        "baseline_scaler.pkl".to_string(),
        "baseline_features.json".to_string(),
    ]
}

fn default_package_title() -> String {
    "Sensor Window Baseline Model".to_string()
}

fn default_dataset_id() -> String {
    "username/sensor-baseline-model".to_string()
}

fn default_license() -> String {
    "CC0-1.0".to_string()
}

/// Find the config file to use: the explicit path if given, otherwise the
/// first existing candidate under `workspace`.
pub fn resolve_config_path(workspace: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| workspace.join(candidate))
        .find(|path| path.exists())
}

/// Load configuration from layered sources and validate it.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `SENSORPREP_`, nested with `__`)
/// 2. The config file (explicit, or discovered under the workspace)
/// 3. Built-in defaults
pub fn load_config(workspace: &Path, explicit: Option<&Path>) -> Result<PrepConfig, PrepError> {
    // Defaults come from the serde field defaults. Seeding them as a provider
    // would make `test_split` and friends collide with their canonical keys.
    let mut figment = Figment::new();

    if let Some(path) = resolve_config_path(workspace, explicit) {
        if !path.exists() {
            return Err(PrepError::configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        tracing::debug!(path = %path.display(), "Loading config file");
        figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(&path)),
            _ => figment.merge(Toml::file(&path)),
        };
    }

    // SENSORPREP_WINDOWING__STRIDE, SENSORPREP_SPLIT__RANDOM_SEED, etc.
    figment = figment.merge(Env::prefixed("SENSORPREP_").split("__"));

    let mut config: PrepConfig = figment.extract().map_err(Box::new)?;
    config.apply_legacy_data_keys();
    config.validate()?;
    Ok(config)
}
