use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Type tag of a workflow step.
///
/// Unrecognised tags are preserved in [`StepType::Other`] so the pre-flight
/// validator can warn about them instead of losing them during parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepType {
    Action,
    Transform,
    Filter,
    ScatterGather,
    Conditional,
    AiRouter,
    SubWorkflow,
    Loop,
    Parallel,
    Aggregate,
    Decision,
    HumanInLoop,
    Delay,
    Webhook,
    Custom,
    AiProcessing,
    LlmDecision,
    Other(String),
}

impl StepType {
    pub fn as_str(&self) -> &str {
        match self {
            StepType::Action => "action",
            StepType::Transform => "transform",
            StepType::Filter => "filter",
            StepType::ScatterGather => "scatter_gather",
            StepType::Conditional => "conditional",
            StepType::AiRouter => "ai_router",
            StepType::SubWorkflow => "sub_workflow",
            StepType::Loop => "loop",
            StepType::Parallel => "parallel",
            StepType::Aggregate => "aggregate",
            StepType::Decision => "decision",
            StepType::HumanInLoop => "human_in_loop",
            StepType::Delay => "delay",
            StepType::Webhook => "webhook",
            StepType::Custom => "custom",
            StepType::AiProcessing => "ai_processing",
            StepType::LlmDecision => "llm_decision",
            StepType::Other(tag) => tag.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StepType::Other(_))
    }

    /// Steps whose configuration is resolved by a generative model at run time.
    pub fn is_ai(&self) -> bool {
        matches!(
            self,
            StepType::AiProcessing | StepType::AiRouter | StepType::LlmDecision
        )
    }
}

impl From<&str> for StepType {
    fn from(value: &str) -> Self {
        match value.trim() {
            "action" => StepType::Action,
            "transform" => StepType::Transform,
            "filter" => StepType::Filter,
            "scatter_gather" => StepType::ScatterGather,
            "conditional" => StepType::Conditional,
            "ai_router" => StepType::AiRouter,
            "sub_workflow" => StepType::SubWorkflow,
            "loop" => StepType::Loop,
            "parallel" => StepType::Parallel,
            "aggregate" => StepType::Aggregate,
            "decision" => StepType::Decision,
            "human_in_loop" => StepType::HumanInLoop,
            "delay" => StepType::Delay,
            "webhook" => StepType::Webhook,
            "custom" => StepType::Custom,
            "ai_processing" => StepType::AiProcessing,
            "llm_decision" => StepType::LlmDecision,
            other => StepType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for StepType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(StepType::from(raw.as_str()))
    }
}

/// Fan-out half of a `scatter_gather` step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScatterConfig {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub input: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub item_variable: Option<String>,
    #[serde(default, deserialize_with = "lenient::step_list")]
    pub steps: Vec<WorkflowStep>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Aggregation half of a `scatter_gather` step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatherConfig {
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub operation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A node in the executable step graph.
///
/// Steps held in `loopSteps`, `steps` or `scatter.steps` are owned by their
/// parent and are not addressable from the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient::opt_step_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub step_type: Option<StepType>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub dependencies: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub continue_on_error: Option<bool>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub plugin: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub model: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub iterate_over: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_step_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub loop_steps: Option<Vec<WorkflowStep>>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_step_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub steps: Option<Vec<WorkflowStep>>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_struct",
        skip_serializing_if = "Option::is_none"
    )]
    pub scatter: Option<ScatterConfig>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_struct",
        skip_serializing_if = "Option::is_none"
    )]
    pub gather: Option<GatherConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            step_type: Some(step_type),
            ..Self::default()
        }
    }

    pub fn is_type(&self, step_type: &StepType) -> bool {
        self.step_type.as_ref() == Some(step_type)
    }

    pub fn type_tag(&self) -> &str {
        self.step_type.as_ref().map(StepType::as_str).unwrap_or("")
    }

    pub fn has_nested_steps(&self) -> bool {
        self.loop_steps.as_ref().is_some_and(|s| !s.is_empty())
            || self.steps.as_ref().is_some_and(|s| !s.is_empty())
            || self.scatter.as_ref().is_some_and(|s| !s.steps.is_empty())
    }

    /// Direct children across every nested container, in declaration order
    /// (`loopSteps`, then `steps`, then `scatter.steps`).
    pub fn children(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.loop_steps
            .iter()
            .flatten()
            .chain(self.steps.iter().flatten())
            .chain(self.scatter.iter().flat_map(|scatter| scatter.steps.iter()))
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut WorkflowStep> {
        self.loop_steps
            .iter_mut()
            .flatten()
            .chain(self.steps.iter_mut().flatten())
            .chain(
                self.scatter
                    .iter_mut()
                    .flat_map(|scatter| scatter.steps.iter_mut()),
            )
    }

    /// Every descendant, depth-first, excluding `self`.
    pub fn descendants(&self) -> Vec<&WorkflowStep> {
        let mut out = Vec::new();
        for child in self.children() {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    pub fn for_each_descendant_mut(&mut self, f: &mut dyn FnMut(&mut WorkflowStep)) {
        for child in self.children_mut() {
            f(child);
            child.for_each_descendant_mut(f);
        }
    }

    /// Counts this step plus all of its descendants.
    pub fn tree_size(&self) -> usize {
        1 + self.children().map(WorkflowStep::tree_size).sum::<usize>()
    }

    /// Parse a step out of arbitrary JSON without failing.
    ///
    /// Falls back to an id/name/type shell when the value does not deserialize.
    pub fn from_value_lenient(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        match serde_json::from_value::<WorkflowStep>(value.clone()) {
            Ok(step) => Some(step),
            Err(err) => {
                let id = object.get("id").map(lenient::value_to_string).unwrap_or_default();
                tracing::warn!(step_id = %id, "step could not be parsed, keeping a shell: {}", err);
                Some(WorkflowStep {
                    id,
                    name: object.get("name").map(lenient::value_to_string),
                    step_type: object
                        .get("type")
                        .and_then(Value::as_str)
                        .map(StepType::from),
                    ..WorkflowStep::default()
                })
            }
        }
    }
}

/// An ordered top-level step sequence plus the plugins it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, alias = "steps", deserialize_with = "lenient::step_list")]
    pub workflow_steps: Vec<WorkflowStep>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub suggested_plugins: Vec<String>,
}

impl Workflow {
    pub fn new(steps: Vec<WorkflowStep>) -> Self {
        Self {
            workflow_steps: steps,
            suggested_plugins: Vec::new(),
        }
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.workflow_steps
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.workflow_steps.iter().find(|step| step.id == id)
    }

    /// Total number of steps including nested ones.
    pub fn total_step_count(&self) -> usize {
        self.workflow_steps.iter().map(WorkflowStep::tree_size).sum()
    }

    /// Accepts `{workflow_steps|steps|workflow: [...]}`, a wrapper object whose
    /// `workflow` field holds one of those, or a bare step array.
    pub fn from_value_lenient(value: &Value) -> Self {
        match value {
            Value::Array(_) => Workflow {
                workflow_steps: lenient::steps_from_value(value),
                suggested_plugins: Vec::new(),
            },
            Value::Object(map) => {
                let steps_value = ["workflow_steps", "steps", "workflow"]
                    .iter()
                    .filter_map(|key| map.get(*key))
                    .find(|candidate| candidate.is_array());
                if let Some(steps) = steps_value {
                    return Workflow {
                        workflow_steps: lenient::steps_from_value(steps),
                        suggested_plugins: map
                            .get("suggested_plugins")
                            .map(lenient::strings_from_value)
                            .unwrap_or_default(),
                    };
                }
                match map.get("workflow") {
                    Some(inner @ Value::Object(_)) => Workflow::from_value_lenient(inner),
                    _ => Workflow::default(),
                }
            }
            _ => Workflow::default(),
        }
    }
}

pub(crate) mod lenient {
    use super::{StepType, WorkflowStep};
    use serde::de::{DeserializeOwned, Deserializer};
    use serde::Deserialize;
    use serde_json::Value;

    pub fn value_to_string(value: &Value) -> String {
        match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            other => other.to_string(),
        }
    }

    pub fn strings_from_value(value: &Value) -> Vec<String> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(value_to_string)
                .filter(|item| !item.trim().is_empty())
                .collect(),
            Value::String(text) if !text.trim().is_empty() => vec![text.clone()],
            Value::Number(number) => vec![number.to_string()],
            _ => Vec::new(),
        }
    }

    pub fn steps_from_value(value: &Value) -> Vec<WorkflowStep> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(WorkflowStep::from_value_lenient)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value_to_string(&value))
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => None,
            other => Some(value_to_string(&other)),
        })
    }

    pub fn opt_step_type<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<StepType>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(tag) if !tag.trim().is_empty() => Some(StepType::from(tag.as_str())),
            _ => None,
        })
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Bool(flag) => Some(flag),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn string_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(strings_from_value(&value))
    }

    pub fn step_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<WorkflowStep>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(steps_from_value(&value))
    }

    pub fn opt_step_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<WorkflowStep>>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(_) => Some(steps_from_value(&value)),
            _ => None,
        })
    }

    pub fn opt_struct<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Ok(None);
        }
        Ok(serde_json::from_value(value).ok())
    }
}
