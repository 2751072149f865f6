#![allow(clippy::result_large_err)]

use super::AgentPilotConfig;
use crate::core::error::AppError;
use crate::core::execution_summary::MAX_SAMPLE_KEYS;
use crate::core::error::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AgentPilotConfig) -> Result<(), AppError> {
        let max_keys = config.summary.max_sample_keys;
        if !(1..=MAX_SAMPLE_KEYS).contains(&max_keys) {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                format!("summary.max_sample_keys must be between 1 and {}", MAX_SAMPLE_KEYS),
            )
            .with_code("CFG-VAL-001")
            .with_field("max_sample_keys", max_keys.to_string()));
        }

        if config.compiler.default_read_action.trim().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                "compiler.default_read_action cannot be empty",
            )
            .with_code("CFG-VAL-002"));
        }

        for (method, target) in &config.compiler.delivery_plugins {
            let well_formed = target
                .split_once('.')
                .is_some_and(|(plugin, action)| !plugin.trim().is_empty() && !action.trim().is_empty());
            if !well_formed {
                return Err(AppError::new(
                    ErrorCategory::ConfigurationError,
                    format!(
                        "compiler.delivery_plugins.{} must be of the form plugin.action, got '{}'",
                        method, target
                    ),
                )
                .with_code("CFG-VAL-003")
                .with_suggestion("Write targets like email = \"google-mail.send_email\""));
            }
        }

        Ok(())
    }
}
