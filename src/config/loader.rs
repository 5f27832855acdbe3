//! Configuration Loader
//!
//! Environment-aware loading: `notifier-config.yaml`, then
//! `notifier-config.<env>.yaml`, then `NOTIFIER__SECTION__KEY` variables.

use super::error::{ConfigResult, ConfigurationError};
use super::NotifierConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "notifier-config";
const ENV_PREFIX: &str = "NOTIFIER";

/// Loaded configuration together with the environment it was resolved for
#[derive(Debug)]
pub struct ConfigManager {
    config: NotifierConfig,
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
    /// Useful in tests that must not touch process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading notifier configuration"
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        let manager = ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        };

        debug!(config = %manager.debug_config(), "Configuration resolved");
        info!(
            environment = %environment,
            brokers = %manager.config.kafka.brokers,
            topics = manager.config.topics.len(),
            "Configuration loaded successfully"
        );

        Ok(Arc::new(manager))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: NotifierConfig, environment: &str) -> ConfigResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON with credential-like fields masked
    pub fn debug_config(&self) -> serde_json::Value {
        sanitize_config_for_logging(&self.config)
    }

    /// NOTIFIER_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("NOTIFIER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<NotifierConfig> {
        let base = config_directory.join(format!("{BASE_FILE_STEM}.yaml"));
        let overlay = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.yaml"));

        if !base.exists() {
            debug!(path = %base.display(), "No base configuration file, using defaults");
        }

        let layered = Config::builder()
            .add_source(File::from(base.as_path()).format(FileFormat::Yaml).required(false))
            .add_source(
                File::from(overlay.as_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load(base.display().to_string(), e))?;

        layered
            .try_deserialize::<NotifierConfig>()
            .map_err(|e| ConfigurationError::load(base.display().to_string(), e))
    }
}

fn sanitize_config_for_logging(config: &NotifierConfig) -> serde_json::Value {
    let mut value = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
    let sensitive = ["token", "secret", "password", "key", "credential"];
    sanitize_json_recursive(&mut value, &sensitive);
    value
}

fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = sensitive_patterns
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if !is_sensitive {
                    sanitize_json_recursive(val, sensitive_patterns);
                    continue;
                }

                *val = match val {
                    serde_json::Value::Null => serde_json::Value::Null,
                    serde_json::Value::String(s) if s.is_empty() => {
                        serde_json::Value::String("[EMPTY]".to_string())
                    }
                    serde_json::Value::String(s) if s.chars().count() > 8 => {
                        let len = s.chars().count();
                        let head: String = s.chars().take(2).collect();
                        let tail: String = s.chars().skip(len - 2).collect();
                        serde_json::Value::String(format!("[MASKED: {head}***{tail}]"))
                    }
                    _ => serde_json::Value::String("[MASKED]".to_string()),
                };
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}
