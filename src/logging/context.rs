use std::env;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Interactive use from a terminal.
    LocalDev,
    /// Pipelines and scripts that should be quiet on the console.
    Batch,
}

impl ExecutionContext {
    /// Returns `true` when console sinks should be disabled.
    pub fn disables_console(self) -> bool {
        matches!(self, ExecutionContext::Batch)
    }
}

/// `AGENTPILOT_BATCH=1` selects the batch context.
pub fn detect_context() -> ExecutionContext {
    if batch_override_enabled() {
        ExecutionContext::Batch
    } else {
        ExecutionContext::LocalDev
    }
}

fn batch_override_enabled() -> bool {
    env::var("AGENTPILOT_BATCH")
        .map(|value| value.trim() == "1")
        .unwrap_or(false)
}
