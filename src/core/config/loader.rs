#![allow(clippy::result_large_err)]

use super::AgentPilotConfig;
use crate::core::error::AppError;
use crate::core::error::ErrorCategory;
use std::env;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "agentpilot.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the workspace root (`workspace/agentpilot.toml`).
    /// Environment variables override file values; a missing file means defaults.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<AgentPilotConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?.unwrap_or_default();

        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Returns Ok(None) if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Option<AgentPilotConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
            .with_code("CFG-READ-001")
        })?;

        let config: AgentPilotConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("CFG-PARSE-001")
            .with_field("path", path.display().to_string())
        })?;

        Ok(Some(config))
    }

    fn apply_env_overrides(config: &mut AgentPilotConfig) {
        if let Ok(model) = env::var("AGENTPILOT_COMPILER_DEFAULT_AI_MODEL") {
            config.compiler.default_ai_model = Some(model).filter(|m| !m.trim().is_empty());
        }

        if let Ok(action) = env::var("AGENTPILOT_COMPILER_DEFAULT_READ_ACTION") {
            config.compiler.default_read_action = action;
        }

        if let Ok(max_keys) = env::var("AGENTPILOT_SUMMARY_MAX_SAMPLE_KEYS") {
            match max_keys.parse::<usize>() {
                Ok(value) => config.summary.max_sample_keys = value,
                Err(_) => tracing::warn!(
                    value = %max_keys,
                    "ignoring AGENTPILOT_SUMMARY_MAX_SAMPLE_KEYS, not a number"
                ),
            }
        }
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "AGENTPILOT_COMPILER_DEFAULT_AI_MODEL - Model stamped on generated AI steps",
            "AGENTPILOT_COMPILER_DEFAULT_READ_ACTION - Read action for data sources of unknown type (default: read)",
            "AGENTPILOT_SUMMARY_MAX_SAMPLE_KEYS - Key names reported per step, 1 to 5 (default: 5)",
            "AGENTPILOT_LOG_LEVEL - Default log level when RUST_LOG is unset",
            "AGENTPILOT_LOG_DIR - Directory for the log file",
            "AGENTPILOT_BATCH - Set to 1 to disable console logging",
        ]
    }
}
