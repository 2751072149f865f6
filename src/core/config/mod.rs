use crate::core::execution_summary::SummarySettings;
use crate::core::workflow_graph::CompilerSettings;
use serde::{Deserialize, Serialize};

/// Workspace configuration loaded from `agentpilot.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AgentPilotConfig {
    /// Step templates used by the IR compiler
    #[serde(default)]
    pub compiler: CompilerSettings,

    /// Execution summary limits
    #[serde(default)]
    pub summary: SummarySettings,
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
