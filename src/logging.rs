//! # Structured Logging Module
//!
//! Environment-aware structured logging to the console and, when a directory
//! is configured, to a JSON log file per process.

use crate::config::LoggingConfig;
use chrono::Utc;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize structured logging. Subsequent calls are no-ops.
pub fn init_structured_logging(config: &LoggingConfig, environment: &str) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| get_log_level(environment));
        let pid = process::id();

        let console = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .json()
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(&log_level))
                .boxed()
        };

        let mut log_file = None;
        let file_layer = config.directory.as_ref().and_then(|dir| {
            let log_dir = PathBuf::from(dir);
            if let Err(e) = std::fs::create_dir_all(&log_dir) {
                eprintln!("Failed to create log directory {}: {e}", log_dir.display());
                return None;
            }
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            let file_name = format!("{environment}.{pid}.{timestamp}.log");
            log_file = Some(log_dir.join(&file_name));

            let appender = tracing_appender::rolling::never(&log_dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);

            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(&log_level)),
            )
        });

        // A global subscriber may already be installed by an embedding host or a test harness
        if tracing_subscriber::registry()
            .with(console)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized, keeping it");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = ?log_file,
            "Structured logging initialized"
        );
    });
}

/// Log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Shorten a device token for log output, keeping the first and last four characters
pub fn redact_token(token: &str) -> String {
    let len = token.chars().count();
    if len <= 8 {
        return "***".to_string();
    }
    let head: String = token.chars().take(4).collect();
    let tail: String = token.chars().skip(len - 4).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("staging"), "debug");
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("abc"), "***");
        assert_eq!(redact_token("12345678"), "***");
        assert_eq!(redact_token("dGhpcyBpcyBhIHRva2Vu"), "dGhp...a2Vu");
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        init_structured_logging(&config, "test");
        init_structured_logging(&config, "test");
    }
}
