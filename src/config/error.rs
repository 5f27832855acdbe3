use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration or building the handler registry.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to load configuration from {source_name}: {message}")]
    Load {
        source_name: String,
        message: String,
    },

    #[error("Configuration file not found, searched: {searched:?}")]
    FileNotFound { searched: Vec<PathBuf> },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingField { field: String },

    #[error("Topic registered more than once: {topic}")]
    DuplicateTopic { topic: String },
}

impl ConfigurationError {
    pub fn load(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Load {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn duplicate_topic(topic: impl Into<String>) -> Self {
        Self::DuplicateTopic {
            topic: topic.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(err: config::ConfigError) -> Self {
        ConfigurationError::load("layered sources", err)
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
