//! Configuration Error Types
//!
//! Specific, actionable error messages for configuration loading and validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Base configuration file not found at the expected location
    #[error("Configuration file not found in '{directory}' (expected tasker-batch.yaml)")]
    ConfigFileNotFound { directory: String },

    /// Source could not be parsed or merged
    #[error("Failed to load configuration from '{source_name}': {error}")]
    LoadError { source_name: String, error: String },

    /// Merged configuration did not match the expected structure
    #[error("Failed to deserialize configuration: {0}")]
    DeserializeError(String),

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },
}

impl ConfigurationError {
    pub fn load_error(source_name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::LoadError {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
