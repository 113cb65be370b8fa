//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "keel.toml";

/// Loads and validates a `keel.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `keel.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are usable.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.entries.is_empty() {
        return Err(ConfigError::MissingField("entries".to_string()));
    }
    if let Some(blank) = config.entries.iter().find(|e| e.trim().is_empty()) {
        return Err(ConfigError::ValidationError(format!(
            "entry specifier '{blank}' is empty"
        )));
    }
    if config.build.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "build.concurrency must be at least 1".to_string(),
        ));
    }
    if config.build.extensions.is_empty() {
        return Err(ConfigError::ValidationError(
            "build.extensions must list at least one extension".to_string(),
        ));
    }
    if config.build.entrypoint.is_empty() || config.build.entrypoint.contains('/') {
        return Err(ConfigError::ValidationError(format!(
            "build.entrypoint '{}' must be a plain file name",
            config.build.entrypoint
        )));
    }
    Ok(())
}
