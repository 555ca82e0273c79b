//! Config command implementation.
//!
//! Manages the default calibration settings. They live in a TOML file in the
//! user's config directory and are used by `calibrate` whenever a request has
//! no `[config]` table of its own.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use curvefit_curves::calibration::CalibrationConfig;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};
use crate::output::{print_header, print_info, print_json, print_output, print_success, KeyValue};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Settings file. Defaults to `<config dir>/curvefit/calibration.toml`.
    #[arg(long, env = "CURVEFIT_CONFIG_FILE", global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the current settings
    Show,

    /// Get one setting
    Get(GetArgs),

    /// Change one setting
    Set(SetArgs),

    /// Reset all settings to defaults
    Reset,

    /// Show the settings file location
    Path,

    /// Check a calibration config file without installing it
    Validate(ValidateArgs),
}

/// Arguments for get subcommand.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Setting name, e.g. `root_finder`
    pub key: String,
}

/// Arguments for set subcommand.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Setting name, e.g. `root_finder`
    pub key: String,

    /// New value, e.g. `broyden` or `1e-10`
    pub value: String,
}

/// Arguments for validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Config file to check
    pub path: PathBuf,
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, format: OutputFormat) -> Result<()> {
    let path = settings_path(args.file)?;
    match args.command {
        ConfigCommand::Show => execute_show(&path, format),
        ConfigCommand::Get(get) => execute_get(&path, &get.key, format),
        ConfigCommand::Set(set) => execute_set(&path, &set.key, &set.value),
        ConfigCommand::Reset => execute_reset(&path),
        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Validate(validate) => {
            let config = CalibrationConfig::from_file(&validate.path)?;
            print_success(&format!(
                "{} is valid ({} root finder)",
                validate.path.display(),
                config.root_finder
            ));
            Ok(())
        }
    }
}

/// Settings file: the explicit path, or the default location.
pub fn settings_path(explicit: Option<PathBuf>) -> CliResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| CliError::Config("cannot determine a config directory".into()))?;
    Ok(base.join("curvefit").join("calibration.toml"))
}

/// Loads the settings file, or the defaults when it does not exist.
pub fn load_or_default(path: &Path) -> CliResult<CalibrationConfig> {
    if path.exists() {
        Ok(CalibrationConfig::from_file(path)?)
    } else {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        Ok(CalibrationConfig::default())
    }
}

fn save(path: &Path, config: &CalibrationConfig) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml_string()?)?;
    Ok(())
}

/// Settings as a TOML table.
fn to_table(config: &CalibrationConfig) -> CliResult<toml::Table> {
    match toml::Value::try_from(config)? {
        toml::Value::Table(table) => Ok(table),
        other => Err(CliError::Serialization(format!(
            "settings serialized to a {} instead of a table",
            other.type_str()
        ))),
    }
}

/// Parses `raw` as a TOML value, falling back to a bare string.
fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn display_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copy of `config` with `key` set to `raw`.
fn with_setting(config: &CalibrationConfig, key: &str, raw: &str) -> CliResult<CalibrationConfig> {
    let mut table = to_table(config)?;
    if !table.contains_key(key) {
        let known: Vec<&str> = table.keys().map(String::as_str).collect();
        return Err(CliError::Config(format!(
            "unknown setting '{key}' (expected one of: {})",
            known.join(", ")
        )));
    }
    table.insert(key.to_string(), parse_value(raw));

    let updated: CalibrationConfig = toml::Value::Table(table)
        .try_into()
        .map_err(|e| CliError::Config(format!("invalid value '{raw}' for {key}: {e}")))?;
    updated.validate()?;
    Ok(updated)
}

fn execute_show(path: &Path, format: OutputFormat) -> Result<()> {
    let config = load_or_default(path)?;
    let rows: Vec<KeyValue> = to_table(&config)?
        .iter()
        .map(|(key, value)| KeyValue::new(key.clone(), display_value(value)))
        .collect();

    match format {
        OutputFormat::Table => {
            print_header("Calibration Settings");
            print_output(&rows, format)?;
            print_info(&format!("Settings file: {}", path.display()));
        }
        OutputFormat::Json => print_json(&config)?,
        OutputFormat::Csv => print_output(&rows, format)?,
        OutputFormat::Minimal => print!("{}", config.to_toml_string()?),
    }
    Ok(())
}

fn execute_get(path: &Path, key: &str, format: OutputFormat) -> Result<()> {
    let config = load_or_default(path)?;
    let table = to_table(&config)?;
    let value = table
        .get(key)
        .ok_or_else(|| CliError::Config(format!("unknown setting '{key}'")))?;

    match format {
        OutputFormat::Json => {
            let mut output = serde_json::Map::new();
            output.insert(key.to_string(), serde_json::to_value(value)?);
            print_json(&output)?;
        }
        _ => println!("{}", display_value(value)),
    }
    Ok(())
}

fn execute_set(path: &Path, key: &str, raw: &str) -> Result<()> {
    let updated = with_setting(&load_or_default(path)?, key, raw)?;
    save(path, &updated)?;
    print_success(&format!("Set {key} = {raw}"));
    Ok(())
}

fn execute_reset(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    print_success("Settings reset to defaults");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use curvefit_curves::calibration::RootFinderKind;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("1e-10"), toml::Value::Float(1e-10));
        assert_eq!(parse_value("25"), toml::Value::Integer(25));
        assert_eq!(parse_value("false"), toml::Value::Boolean(false));
        assert_eq!(parse_value("broyden"), toml::Value::String("broyden".into()));
    }

    #[test]
    fn test_with_setting() {
        let config = CalibrationConfig::default();
        let updated = with_setting(&config, "root_finder", "sherman_morrison").unwrap();
        assert_eq!(updated.root_finder, RootFinderKind::ShermanMorrison);

        let updated = with_setting(&updated, "max_iterations", "25").unwrap();
        assert_eq!(updated.max_iterations, 25);
        assert_eq!(updated.root_finder, RootFinderKind::ShermanMorrison);
    }

    #[test]
    fn test_with_setting_rejects_bad_input() {
        let config = CalibrationConfig::default();
        assert!(matches!(
            with_setting(&config, "solver", "newton"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            with_setting(&config, "root_finder", "secant"),
            Err(CliError::Config(_))
        ));
        assert!(matches!(
            with_setting(&config, "max_iterations", "0"),
            Err(CliError::Calibration(_))
        ));
    }
}
