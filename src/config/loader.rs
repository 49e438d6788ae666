//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = toml::from_str(content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DrainMode;

    #[test]
    fn parses_full_file() {
        let config = parse_config(
            r#"
            [[listeners]]
            name = "business"
            bind_address = "localhost:8080"

            [[listeners]]
            name = "admin"
            bind_address = "localhost:8081"

            [shutdown]
            shutdown_budget_ms = 30000
            drain_wait_ms = 10000
            callback_timeout_ms = 3000
            startup_grace_ms = 2000
            drain_mode = "fixed"

            [observability]
            log_level = "debug"
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listeners[1].name, "admin");
        assert_eq!(config.shutdown.startup_grace_ms, Some(2000));
        assert_eq!(config.shutdown.drain_mode, DrainMode::Fixed);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn example_file_is_valid() {
        let config = parse_config(include_str!("../../orchestrator.example.toml")).unwrap();
        assert_eq!(config.listeners.len(), 2);
        assert_eq!(config.observability.metrics_address, None);
    }

    #[test]
    fn rejects_duplicate_listener_names() {
        let err = parse_config(
            r#"
            [[listeners]]
            name = "api"
            bind_address = "127.0.0.1:8080"

            [[listeners]]
            name = "api"
            bind_address = "127.0.0.1:8081"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![ValidationError::DuplicateListener("api".into())]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_parse_errors() {
        let err = parse_config("[shutdown]\ndrain_mode = \"eventually\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/orchestrator.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
