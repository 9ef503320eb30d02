//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use anyhow::Context;
use sensorprep_core::config::{PrepConfig, load_config, resolve_config_path};
use sensorprep_core::data::source::{CsvSource, DataSource};
use sensorprep_core::data::validate::summarize;
use sensorprep_core::package::package_artifacts;
use sensorprep_core::pipeline::Pipeline;
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, workspace: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            seed,
            window_size,
            stride,
        } => handle_run(workspace, config, seed, window_size, stride),
        Commands::Clean => handle_clean(workspace, config),
        Commands::Inspect { file } => handle_inspect(workspace, config, file),
        Commands::Package => handle_package(workspace, config),
        Commands::Config { action } => handle_config(action, workspace, config),
    }
}

fn load(workspace: &Path, config: Option<&Path>) -> anyhow::Result<PrepConfig> {
    load_config(workspace, config).context("Failed to load config")
}

fn handle_run(
    workspace: &Path,
    config: Option<&Path>,
    seed: Option<u64>,
    window_size: Option<usize>,
    stride: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = load(workspace, config)?;

    // Apply CLI overrides
    if let Some(seed) = seed {
        config.split.random_seed = seed;
    }
    if let Some(window_size) = window_size {
        config.windowing.window_size = window_size;
    }
    if let Some(stride) = stride {
        config.windowing.stride = stride;
    }

    let pipeline = Pipeline::new(config).context("Invalid configuration")?;
    let manifest = pipeline
        .run_workspace(workspace)
        .context("Preprocessing failed")?;

    let out_dir = workspace.join(&pipeline.config().data.processed_dir);
    println!("Processed {} windows into {}", manifest.windows, out_dir.display());
    for file in &manifest.files {
        println!("  {:<22} {:>8} rows  {}", file.name, file.rows, &file.sha256[..12]);
    }
    Ok(())
}

fn handle_clean(workspace: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(load(workspace, config)?).context("Invalid configuration")?;
    let path = pipeline
        .clean_workspace(workspace)
        .context("Cleaning failed")?;
    println!("Cleaned data saved to {}", path.display());
    Ok(())
}

fn handle_inspect(workspace: &Path, config: Option<&Path>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load(workspace, config)?;
    let path = file.unwrap_or_else(|| {
        workspace
            .join(&config.data.raw_dir)
            .join(&config.data.train_file)
    });
    let batch = CsvSource::new(&path, config.data.delimiter)
        .load(None)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let summary = summarize(&batch);

    println!("{}", path.display());
    println!(
        "  rows: {}  columns: {}  missing cells: {}  duplicate rows: {}",
        summary.total_rows, summary.total_columns, summary.missing_cells, summary.duplicate_rows
    );
    for column in &summary.columns {
        println!(
            "  {:<24} {:<8} missing {:>6} ({:.2}%)",
            column.name,
            format!("{:?}", column.dtype).to_lowercase(),
            column.missing,
            column.missing_percentage
        );
    }
    Ok(())
}

fn handle_package(workspace: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = load(workspace, config)?;
    let report = package_artifacts(&config.package, workspace).context("Packaging failed")?;
    println!(
        "Packaged {} file(s) into {}",
        report.copied.len(),
        report.output_dir.display()
    );
    for name in &report.missing {
        println!("  missing: {name}");
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            if let Some(existing) = resolve_config_path(workspace, config).filter(|p| p.exists()) {
                println!(
                    "Configuration file already exists at: {}",
                    existing.display()
                );
                return Ok(());
            }

            let config_path = config
                .map(Path::to_path_buf)
                .unwrap_or_else(|| workspace.join("config").join("config.toml"));
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&PrepConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_raw(workspace: &Path, rows: usize) {
        let raw = workspace.join("data/raw");
        std::fs::create_dir_all(&raw).unwrap();
        let mut csv = String::from("timestamp,acc_x,target\n");
        for i in 0..rows {
            let label = if i % 4 < 2 { "still" } else { "shake" };
            csv.push_str(&format!("{i},{},{label}\n", (i % 5) as f64 * 0.25));
        }
        std::fs::write(raw.join("train.csv"), csv).unwrap();
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).unwrap();

        let config_path = workspace.join("config").join("config.toml");
        assert!(config_path.exists());

        // The written file must load back through the layered loader.
        let parsed = load_config(workspace, None).unwrap();
        assert_eq!(parsed.windowing.window_size, 1000);
        assert_eq!(parsed.data.label_column, "target");
    }

    #[test]
    fn test_config_init_idempotent() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path();

        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).unwrap();

        let config_path = workspace.join("config").join("config.toml");
        std::fs::write(&config_path, "[windowing]\nstride = 7\n").unwrap();

        // Second init should not overwrite
        let command = Commands::Config {
            action: ConfigAction::Init,
        };
        handle_command(command, workspace, None).unwrap();

        let content = std::fs::read_to_string(&config_path).unwrap();
        assert_eq!(content, "[windowing]\nstride = 7\n");
    }

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        let command = Commands::Config {
            action: ConfigAction::Show,
        };
        assert!(handle_command(command, dir.path(), None).is_ok());
    }

    #[test]
    fn test_run_with_overrides() {
        let dir = TempDir::new().unwrap();
        write_raw(dir.path(), 80);

        let command = Commands::Run {
            seed: Some(3),
            window_size: Some(4),
            stride: Some(2),
        };
        handle_command(command, dir.path(), None).unwrap();

        let processed = dir.path().join("data/processed");
        assert!(processed.join("train_processed.csv").exists());
        assert!(processed.join("val_processed.csv").exists());
        assert!(processed.join("test_processed.csv").exists());
        assert!(processed.join("manifest.json").exists());
    }

    #[test]
    fn test_run_rejects_zero_stride_override() {
        let dir = TempDir::new().unwrap();
        write_raw(dir.path(), 20);
        let command = Commands::Run {
            seed: None,
            window_size: Some(4),
            stride: Some(0),
        };
        let err = handle_command(command, dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("stride"));
    }

    #[test]
    fn test_clean_and_inspect() {
        let dir = TempDir::new().unwrap();
        write_raw(dir.path(), 12);

        handle_command(Commands::Clean, dir.path(), None).unwrap();
        let cleaned = dir.path().join("data/processed/train_cleaned.csv");
        assert!(cleaned.exists());

        let inspect = Commands::Inspect {
            file: Some(cleaned),
        };
        assert!(handle_command(inspect, dir.path(), None).is_ok());
    }

    #[test]
    fn test_inspect_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let inspect = Commands::Inspect { file: None };
        assert!(handle_command(inspect, dir.path(), None).is_err());
    }

    #[test]
    fn test_package_without_artifacts() {
        let dir = TempDir::new().unwrap();
        handle_command(Commands::Package, dir.path(), None).unwrap();
        assert!(
            dir.path()
                .join("models/kaggle_dataset/dataset-metadata.json")
                .exists()
        );
    }
}
