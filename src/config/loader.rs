//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery, environment
//! detection, and layering of YAML files and process environment variables.

use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::TaskerBatchConfig;

const BASE_FILE_STEM: &str = "tasker-batch";
const ENV_PREFIX: &str = "TASKER";
const ENV_SEPARATOR: &str = "__";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: TaskerBatchConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            task_timeout_seconds = config.timeouts.task_timeout_seconds,
            max_attempts = config.runner.max_attempts,
            sweeper_enabled = config.sweeper.enabled,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already built configuration (embedding hosts, tests)
    pub fn from_config(config: TaskerBatchConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &TaskerBatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: TASKER_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("TASKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        ["yaml", "yml"]
            .iter()
            .map(|ext| config_directory.join(format!("{BASE_FILE_STEM}.{ext}")))
            .find(|path| path.exists())
            .ok_or_else(|| ConfigurationError::ConfigFileNotFound {
                directory: config_directory.display().to_string(),
            })
    }

    /// Layer base file, environment overlay and process environment
    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<TaskerBatchConfig> {
        let base_file = Self::find_config_file(config_directory)?;
        let overlay_file = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.yaml"));

        if overlay_file.exists() {
            debug!(
                "Applying environment-specific overrides from: {}",
                overlay_file.display()
            );
        }

        let merged = Config::builder()
            .add_source(File::from(base_file.clone()).format(FileFormat::Yaml))
            .add_source(
                File::from(overlay_file)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(base_file.display().to_string(), e))?;

        merged
            .try_deserialize::<TaskerBatchConfig>()
            .map_err(|e| ConfigurationError::DeserializeError(e.to_string()))
    }
}
