//! Configuration loading from disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{ConfigIssue, HelperConfig, RawConfig};

/// File name looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config_oscq.toml";

/// YAML file read by earlier installs; used when the TOML file is absent.
pub const LEGACY_CONFIG_FILE: &str = "config_oscq.yml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    /// Whether the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

/// Pick the configuration file in `dir` when none was given explicitly.
///
/// Prefers [`DEFAULT_CONFIG_FILE`], then [`LEGACY_CONFIG_FILE`]. When neither
/// exists the TOML path is returned so the not-found message names it.
pub fn default_config_path(dir: &Path) -> PathBuf {
    let primary = dir.join(DEFAULT_CONFIG_FILE);
    let legacy = dir.join(LEGACY_CONFIG_FILE);
    if !primary.exists() && legacy.exists() {
        legacy
    } else {
        primary
    }
}

/// Read and parse a configuration file.
///
/// `.yml` and `.yaml` files are read as YAML, anything else as TOML.
/// Per-key problems are returned alongside the config rather than as an
/// error; only an unreadable or unparsable document fails.
pub fn load_config(path: &Path) -> Result<(HelperConfig, Vec<ConfigIssue>), ConfigError> {
    let content = fs::read_to_string(path)?;
    let raw: RawConfig = if is_yaml(path) {
        serde_yaml::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    Ok(raw.resolve())
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"))
}

/// Load configuration, substituting defaults for anything missing or broken.
///
/// Never fails: every problem is logged and replaced by its default.
pub fn load_or_default(path: &Path) -> HelperConfig {
    match load_config(path) {
        Ok((config, issues)) => {
            for issue in &issues {
                tracing::warn!(path = %path.display(), "Invalid configuration value: {}. Using default.", issue);
            }
            tracing::info!(
                http_port = config.http_port,
                service_name = %config.service_name,
                "Loaded configuration"
            );
            config
        }
        Err(e) => {
            let config = HelperConfig::default();
            if e.is_not_found() {
                tracing::info!(
                    path = %path.display(),
                    http_port = config.http_port,
                    service_name = %config.service_name,
                    "Configuration file not found. Using default values"
                );
            } else {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    http_port = config.http_port,
                    service_name = %config.service_name,
                    "Error loading configuration. Using default values"
                );
            }
            config
        }
    }
}
