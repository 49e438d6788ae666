//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Listener names are unique and non-empty
//! - Validate value ranges (budgets and timeouts > 0)
//! - Drain wait fits inside the shutdown budget
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{AppConfig, ShutdownConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("listener name must not be empty")]
    EmptyListenerName,

    #[error("listener `{0}` is declared more than once")]
    DuplicateListener(String),

    #[error("listener `{0}` has an empty bind address")]
    EmptyBindAddress(String),

    #[error("shutdown_budget_ms must be greater than zero")]
    ZeroShutdownBudget,

    #[error("callback_timeout_ms must be greater than zero")]
    ZeroCallbackTimeout,

    #[error("drain_wait_ms ({drain_wait_ms}) must be shorter than shutdown_budget_ms ({budget_ms})")]
    DrainExceedsBudget { drain_wait_ms: u64, budget_ms: u64 },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = check_listener_names(config.listeners.iter().map(|l| l.name.as_str()));
    for listener in &config.listeners {
        if listener.bind_address.trim().is_empty() {
            errors.push(ValidationError::EmptyBindAddress(listener.name.clone()));
        }
    }
    errors.extend(check_shutdown(&config.shutdown));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_shutdown(config: &ShutdownConfig) -> Result<(), Vec<ValidationError>> {
    let errors = check_shutdown(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Names must be non-empty and unique across listeners.
pub fn check_listener_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();
    for name in names {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyListenerName);
        } else if !seen.insert(name) {
            errors.push(ValidationError::DuplicateListener(name.to_string()));
        }
    }
    errors
}

fn check_shutdown(config: &ShutdownConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.shutdown_budget_ms == 0 {
        errors.push(ValidationError::ZeroShutdownBudget);
    }
    if config.callback_timeout_ms == 0 {
        errors.push(ValidationError::ZeroCallbackTimeout);
    }
    if config.shutdown_budget_ms > 0 && config.drain_wait_ms >= config.shutdown_budget_ms {
        errors.push(ValidationError::DrainExceedsBudget {
            drain_wait_ms: config.drain_wait_ms,
            budget_ms: config.shutdown_budget_ms,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ListenerConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&AppConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = AppConfig::default();
        config.listeners.push(ListenerConfig::new("admin", "127.0.0.1:9000"));
        config.listeners.push(ListenerConfig::new("", "127.0.0.1:9001"));
        config.listeners.push(ListenerConfig::new("metrics", " "));
        config.shutdown.callback_timeout_ms = 0;
        config.shutdown.drain_wait_ms = 40_000;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateListener("admin".into())));
        assert!(errors.contains(&ValidationError::EmptyListenerName));
        assert!(errors.contains(&ValidationError::EmptyBindAddress("metrics".into())));
        assert!(errors.contains(&ValidationError::ZeroCallbackTimeout));
        assert!(errors.contains(&ValidationError::DrainExceedsBudget {
            drain_wait_ms: 40_000,
            budget_ms: 30_000,
        }));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn zero_budget_is_reported_once() {
        let config = ShutdownConfig {
            shutdown_budget_ms: 0,
            ..ShutdownConfig::default()
        };
        assert_eq!(
            validate_shutdown(&config),
            Err(vec![ValidationError::ZeroShutdownBudget])
        );
    }
}
