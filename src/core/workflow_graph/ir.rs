//! Logical IR: the structured intent document the compiler consumes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalIr {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    #[serde(default)]
    pub ai_operations: Vec<AiOperation>,
    #[serde(default)]
    pub conditionals: Vec<ConditionalSpec>,
    #[serde(default)]
    pub loops: Vec<LoopSpec>,
    #[serde(default)]
    pub partitions: Vec<PartitionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping: Option<GroupingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendering: Option<RenderingSpec>,
    #[serde(default)]
    pub delivery: Vec<DeliverySpec>,
    #[serde(default)]
    pub edge_cases: Vec<EdgeCase>,
    #[serde(default)]
    pub clarifications_required: Vec<String>,
}

impl LogicalIr {
    pub fn emits_per_group(&self) -> bool {
        self.grouping.as_ref().is_some_and(|g| g.emit_per_group)
    }

    /// The first delivery that names a per-recipient source field.
    pub fn recipient_source(&self) -> Option<&str> {
        self.delivery
            .iter()
            .filter_map(|d| d.config.recipient_source.as_deref())
            .find(|source| !source.trim().is_empty())
    }

    /// Names the IR features present, for diagnostics on unsupported input.
    pub fn feature_summary(&self) -> Vec<String> {
        let mut features = Vec::new();
        let mut push = |count: usize, label: &str| {
            if count > 0 {
                features.push(format!("{} {}", count, label));
            }
        };
        push(self.data_sources.len(), "data source(s)");
        push(self.filters.len(), "filter(s)");
        push(self.transforms.len(), "transform(s)");
        push(self.ai_operations.len(), "AI operation(s)");
        push(self.conditionals.len(), "conditional(s)");
        push(self.loops.len(), "loop(s)");
        push(self.partitions.len(), "partition(s)");
        push(self.delivery.len(), "delivery method(s)");
        if self.emits_per_group() {
            features.push("per-group emission".to_string());
        }
        if self.rendering.is_some() {
            features.push("rendering".to_string());
        }
        features
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub operation: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub operation_type: String,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionalSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub when: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub over: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_path: Option<String>,
    #[serde(default)]
    pub item_fields: Vec<String>,
    #[serde(default)]
    pub deliver_per_item: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionSpec {
    #[serde(default)]
    pub id: String,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_partition: Option<String>,
    pub group_by: String,
    #[serde(default)]
    pub emit_per_group: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderingSpec {
    #[serde(rename = "type", default)]
    pub render_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliverySpec {
    pub method: String,
    #[serde(default)]
    pub config: DeliveryConfig,
}

/// Method-specific delivery settings; unrecognised keys are carried into
/// the generated step's params.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeCase {
    pub condition: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
