//! Configuration file loading.
//!
//! Config file is located at ~/.config/rf/config.toml unless `RF_CONFIG`
//! or `XDG_CONFIG_HOME` says otherwise.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use directories::BaseDirs;
use resource_filter::ProjectionEnv;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CliError, Result};

/// Current config file version. Increment when making breaking changes to schema.
const CONFIG_VERSION: u32 = 1;

/// Configuration file structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Config schema version for migrations.
    /// Defaults to current version when not present in file.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Key aliases, name to key.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            aliases: BTreeMap::new(),
            output: OutputConfig::default(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Enable colors.
    pub color: Option<bool>,
}

/// Gets the config file path.
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("RF_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config).join("rf").join("config.toml"));
    }

    BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".config").join("rf").join("config.toml"))
        .ok_or_else(|| CliError::Config("Could not determine config directory".to_string()))
}

/// Loads the configuration from disk. A missing file is an empty config.
pub fn load_config() -> Result<Config> {
    let path = get_config_path()?;

    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| CliError::Config(format!("Failed to read config: {}", e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| CliError::Config(format!("Failed to parse config: {}", e)))?;

    if config.version > CONFIG_VERSION {
        return Err(CliError::Config(format!(
            "Unsupported config version {} (expected {} or lower)",
            config.version, CONFIG_VERSION
        )));
    }

    debug!(path = %path.display(), aliases = config.aliases.len(), "loaded config");
    Ok(config)
}

/// Splits a `name=key` alias flag.
pub fn parse_alias_flag(flag: &str) -> Result<(String, String)> {
    match flag.split_once('=') {
        Some((name, key)) if !name.trim().is_empty() && !key.trim().is_empty() => {
            Ok((name.trim().to_string(), key.trim().to_string()))
        }
        _ => Err(CliError::Config(format!(
            "Invalid alias '{}': expected NAME=KEY",
            flag
        ))),
    }
}

/// Parses the `--now` flag.
pub fn parse_now(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|now| now.with_timezone(&Utc))
        .map_err(|e| CliError::Config(format!("Invalid --now timestamp '{}': {}", text, e)))
}

/// Builds the projection environment for a run.
///
/// Builtin transforms are the parent; config aliases are applied first so
/// that flag aliases with the same name replace them.
pub fn build_env(
    config: &Config,
    flag_aliases: &[String],
    now: Option<DateTime<Utc>>,
) -> Result<ProjectionEnv> {
    let mut aliases = config.aliases.clone();
    for flag in flag_aliases {
        let (name, key) = parse_alias_flag(flag)?;
        aliases.insert(name, key);
    }

    let mut builder = ProjectionEnv::builder().parent(ProjectionEnv::builtin());
    for (name, key) in &aliases {
        builder = builder
            .alias(name.as_str(), key)
            .map_err(|e| CliError::Config(format!("Invalid alias '{}': {}", name, e)))?;
    }
    if let Some(now) = now {
        builder = builder.fixed_clock(now);
    }
    Ok(builder.build())
}
