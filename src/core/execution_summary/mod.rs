//! Privacy-safe digest of an execution trace.
//!
//! Step outputs reach this module already sanitized. The builder still only
//! reads their shape: counts, value types and top-level key names. No field
//! value is ever copied into the result.

pub mod messages;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use messages::{count_value, describe, write_outcome, WriteOutcome};

/// Privacy cap on the number of key names reported per step.
pub const MAX_SAMPLE_KEYS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[serde(alias = "success", alias = "succeeded", alias = "done")]
    Completed,
    #[serde(alias = "error", alias = "errored")]
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    pub step_id: String,
    #[serde(default)]
    pub step_name: Option<String>,
    #[serde(default)]
    pub step_type: Option<String>,
    #[serde(default)]
    pub plugin: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    pub status: StepStatus,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub system: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    #[serde(default)]
    pub steps: Vec<TraceStep>,
}

impl ExecutionTrace {
    /// Accepts `{steps: [...]}` or a bare array of steps.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Array(_) => Ok(Self {
                steps: serde_json::from_value(value.clone())?,
            }),
            _ => serde_json::from_value(value.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarySettings {
    pub max_sample_keys: usize,
    pub system_plugins: Vec<String>,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            max_sample_keys: MAX_SAMPLE_KEYS,
            system_plugins: vec!["system".to_string(), "internal".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTotals {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub total_items: usize,
    pub total_duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub step_id: String,
    pub step_name: String,
    pub plugin: Option<String>,
    pub action: Option<String>,
    pub status: StepStatus,
    pub item_count: usize,
    pub sample_keys: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputShape {
    pub value_type: String,
    pub item_count: usize,
    pub sample_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredExecutionResults {
    pub summary: ExecutionTotals,
    pub steps: Vec<StepSummary>,
    pub final_output: OutputShape,
}

/// Item count plus the key names seen, never the values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemShape {
    pub count: usize,
    pub sample_keys: Vec<String>,
}

fn array_field_count(value: &Value) -> Option<usize> {
    let is_array = value.get("type").and_then(Value::as_str) == Some("array");
    is_array.then(|| value.get("count").and_then(count_value)).flatten()
}

fn capped_keys<'a>(keys: impl Iterator<Item = &'a String>, max: usize) -> Vec<String> {
    let mut keys: Vec<String> = keys.cloned().collect();
    keys.sort();
    keys.truncate(max);
    keys
}

/// Count the items an output stands for.
///
/// Sanitized outputs describe arrays as `{type: "array", count}`; those counts
/// are summed. A direct `count` field comes next, then the object itself as
/// one item.
pub fn inspect_output(output: &Value, max_keys: usize) -> ItemShape {
    let max_keys = max_keys.min(MAX_SAMPLE_KEYS);
    match output {
        Value::Null => ItemShape::default(),
        Value::Array(items) => ItemShape {
            count: items.len(),
            sample_keys: items
                .first()
                .and_then(Value::as_object)
                .map(|first| capped_keys(first.keys(), max_keys))
                .unwrap_or_default(),
        },
        Value::Object(map) => {
            let arrays: Vec<(&String, usize)> = map
                .iter()
                .filter_map(|(key, value)| array_field_count(value).map(|count| (key, count)))
                .collect();
            if !arrays.is_empty() {
                return ItemShape {
                    count: arrays.iter().map(|(_, count)| count).sum(),
                    sample_keys: capped_keys(arrays.iter().map(|(key, _)| *key), max_keys),
                };
            }
            let keys = capped_keys(map.keys(), max_keys);
            match map.get("count").and_then(count_value) {
                Some(count) => ItemShape {
                    count,
                    sample_keys: keys,
                },
                None => ItemShape {
                    count: 1,
                    sample_keys: keys,
                },
            }
        }
        _ => ItemShape {
            count: 1,
            sample_keys: Vec::new(),
        },
    }
}

pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub struct ExecutionSummaryBuilder {
    settings: SummarySettings,
}

impl ExecutionSummaryBuilder {
    pub fn new(settings: SummarySettings) -> Self {
        Self { settings }
    }

    pub fn is_system_step(&self, step: &TraceStep) -> bool {
        step.system
            || step.step_id.starts_with("__")
            || step
                .plugin
                .as_deref()
                .is_some_and(|plugin| self.settings.system_plugins.iter().any(|name| name == plugin))
    }

    fn summarize_step(&self, step: &TraceStep) -> StepSummary {
        let (item_count, sample_keys, message) = match step.status {
            StepStatus::Failed => (0, Vec::new(), "Step failed".to_string()),
            StepStatus::Skipped => (0, Vec::new(), "Step skipped".to_string()),
            StepStatus::Completed => {
                let shape = inspect_output(&step.output, self.settings.max_sample_keys);
                match write_outcome(&step.output) {
                    Some(outcome) => (outcome.count, shape.sample_keys, outcome.message),
                    None => {
                        let action = step.action.as_deref().unwrap_or_default();
                        let message = describe(action, shape.count, &shape.sample_keys);
                        (shape.count, shape.sample_keys, message)
                    }
                }
            }
        };

        StepSummary {
            step_id: step.step_id.clone(),
            step_name: step.step_name.clone().unwrap_or_else(|| step.step_id.clone()),
            plugin: step.plugin.clone(),
            action: step.action.clone(),
            status: step.status,
            item_count,
            sample_keys,
            message,
        }
    }

    /// System steps are left out of the step list and every total.
    pub fn build(&self, trace: &ExecutionTrace, final_output: Option<&Value>) -> StructuredExecutionResults {
        let visible: Vec<&TraceStep> = trace.steps.iter().filter(|step| !self.is_system_step(step)).collect();
        let steps: Vec<StepSummary> = visible.iter().map(|step| self.summarize_step(step)).collect();

        let count_status = |status: StepStatus| steps.iter().filter(|step| step.status == status).count();
        let summary = ExecutionTotals {
            total_steps: steps.len(),
            completed_steps: count_status(StepStatus::Completed),
            failed_steps: count_status(StepStatus::Failed),
            skipped_steps: count_status(StepStatus::Skipped),
            total_items: steps.last().map(|step| step.item_count).unwrap_or(0),
            total_duration_ms: visible.iter().filter_map(|step| step.duration_ms).sum(),
        };

        let final_value = final_output.unwrap_or(&Value::Null);
        let shape = inspect_output(final_value, self.settings.max_sample_keys);
        let final_output = OutputShape {
            value_type: value_type(final_value).to_string(),
            item_count: shape.count,
            sample_keys: shape.sample_keys,
        };

        tracing::debug!(
            steps = summary.total_steps,
            system_steps = trace.steps.len() - visible.len(),
            total_items = summary.total_items,
            "built execution summary"
        );

        StructuredExecutionResults {
            summary,
            steps,
            final_output,
        }
    }
}

impl Default for ExecutionSummaryBuilder {
    fn default() -> Self {
        Self::new(SummarySettings::default())
    }
}

pub fn build_execution_summary(trace: &ExecutionTrace, final_output: Option<&Value>) -> StructuredExecutionResults {
    ExecutionSummaryBuilder::default().build(trace, final_output)
}
