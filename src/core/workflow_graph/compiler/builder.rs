//! Step templates shared by the compilation rules.

use super::CompilerSettings;
use crate::core::workflow_graph::ir::{
    AiOperation, DataSource, DeliverySpec, FilterSpec, LogicalIr, PartitionSpec, RenderingSpec,
    TransformSpec,
};
use crate::core::workflow_graph::schema::{StepType, WorkflowStep};
use serde_json::{json, Map, Value};

/// Hands out raw `stepN` ids in emission order, nested steps included.
#[derive(Debug, Default)]
pub struct StepIdAllocator {
    issued: usize,
}

impl StepIdAllocator {
    pub fn allocate(&mut self) -> String {
        self.issued += 1;
        format!("step{}", self.issued)
    }
}

/// Emits steps for one IR and tracks which steps currently hold the data
/// that the next processing step consumes.
pub struct StepBuilder<'a> {
    pub ir: &'a LogicalIr,
    settings: &'a CompilerSettings,
    ids: StepIdAllocator,
    producers: Vec<String>,
}

impl<'a> StepBuilder<'a> {
    pub fn new(ir: &'a LogicalIr, settings: &'a CompilerSettings) -> Self {
        Self {
            ir,
            settings,
            ids: StepIdAllocator::default(),
            producers: Vec::new(),
        }
    }

    pub fn next_id(&mut self) -> String {
        self.ids.allocate()
    }

    pub fn producers(&self) -> &[String] {
        &self.producers
    }

    pub fn set_producer(&mut self, id: &str) {
        self.producers = vec![id.to_string()];
    }

    /// `{{<producer>.data}}` for the primary producer.
    pub fn data_ref(&self) -> String {
        match self.producers.first() {
            Some(id) => format!("{{{{{}.data}}}}", id),
            None => String::new(),
        }
    }

    /// Read step id for the data source named `source_id`, if one was emitted.
    pub fn read_step_for(&self, source_id: &str, reads: &[WorkflowStep]) -> Option<String> {
        reads
            .iter()
            .find(|step| {
                step.params
                    .as_ref()
                    .and_then(|params| params.get("source_id"))
                    .and_then(Value::as_str)
                    == Some(source_id)
            })
            .map(|step| step.id.clone())
    }

    pub fn emit_reads(&mut self) -> Vec<WorkflowStep> {
        let ir = self.ir;
        let mut reads = Vec::with_capacity(ir.data_sources.len());
        for source in &ir.data_sources {
            let id = self.next_id();
            reads.push(self.read_step(id, source));
        }
        self.producers = reads.iter().map(|step| step.id.clone()).collect();
        reads
    }

    /// Combines several producers into one `merge` transform that becomes the
    /// sole producer. Returns `None` when there is nothing to combine.
    pub fn merge_producers(&mut self) -> Option<WorkflowStep> {
        if self.producers.len() < 2 {
            return None;
        }
        let inputs: Vec<String> = self
            .producers
            .iter()
            .map(|id| format!("{{{{{}.data}}}}", id))
            .collect();
        let id = self.next_id();
        let mut step = template(
            id,
            StepType::Transform,
            "Merge sources".to_string(),
            format!("Combine the output of {} data sources", inputs.len()),
        );
        step.operation = Some("merge".to_string());
        step.config = Some(json!({ "inputs": inputs }));
        step.dependencies = self.producers.clone();
        self.set_producer(&step.id);
        Some(step)
    }

    /// Filters, transforms and partitions, then optionally the AI operations,
    /// each consuming the previous step's output. Several sources are merged
    /// first.
    pub fn emit_processing(&mut self, include_ai: bool) -> Vec<WorkflowStep> {
        let ir = self.ir;
        let mut steps = Vec::new();
        let has_processing = !ir.filters.is_empty()
            || !ir.transforms.is_empty()
            || !ir.partitions.is_empty()
            || (include_ai && !ir.ai_operations.is_empty());
        if has_processing {
            steps.extend(self.merge_producers());
        }
        for filter in &ir.filters {
            let id = self.next_id();
            let step = self.filter_step(id, filter);
            steps.push(self.chain(step));
        }
        for transform in &ir.transforms {
            let id = self.next_id();
            let step = self.transform_step(id, transform);
            steps.push(self.chain(step));
        }
        for partition in &ir.partitions {
            let id = self.next_id();
            let step = self.partition_step(id, partition);
            steps.push(self.chain(step));
        }
        if include_ai {
            for operation in &ir.ai_operations {
                let id = self.next_id();
                let input = operation.input.clone().unwrap_or_else(|| self.data_ref());
                let step = self.ai_step(id, operation, operation.instruction.clone(), Some(input));
                steps.push(self.chain(step));
            }
        }
        steps
    }

    /// Wires `step` to the current producers and makes it the sole producer.
    pub fn chain(&mut self, mut step: WorkflowStep) -> WorkflowStep {
        step.dependencies = self.producers.clone();
        if step.input.is_none() && !step.is_type(&StepType::Action) {
            let input = self.data_ref();
            if !input.is_empty() {
                step.input = Some(input);
            }
        }
        self.set_producer(&step.id);
        step
    }

    pub fn read_step(&self, id: String, source: &DataSource) -> WorkflowStep {
        let action = match source.source_type.as_str() {
            "tabular" | "spreadsheet" => "read_range",
            "email" => "search_emails",
            "calendar" => "list_events",
            _ => self.settings.default_read_action.as_str(),
        };
        let plugin = if source.source.trim().is_empty() {
            source.source_type.clone()
        } else {
            source.source.clone()
        };

        let mut params = Map::new();
        params.insert("source_id".into(), json!(source.id));
        params.insert("location".into(), json!(source.location));
        if let Some(tab) = &source.tab {
            params.insert("tab".into(), json!(tab));
        }
        if let Some(role) = &source.role {
            params.insert("role".into(), json!(role));
        }

        let label = if source.id.is_empty() { &source.location } else { &source.id };
        let mut step = template(
            id,
            StepType::Action,
            format!("Read {}", label),
            format!("Read {} data from {}", source.source_type, plugin),
        );
        step.plugin = Some(plugin);
        step.action = Some(action.to_string());
        step.params = Some(Value::Object(params));
        step
    }

    pub fn filter_step(&self, id: String, filter: &FilterSpec) -> WorkflowStep {
        let description = filter.description.clone().unwrap_or_else(|| {
            format!("Keep rows where {} {} {}", filter.field, filter.operator, filter.value)
        });
        let mut step = template(id, StepType::Transform, format!("Filter by {}", filter.field), description);
        step.operation = Some("filter".to_string());
        step.config = Some(json!({
            "field": filter.field,
            "operator": filter.operator,
            "value": filter.value,
        }));
        step
    }

    pub fn transform_step(&self, id: String, transform: &TransformSpec) -> WorkflowStep {
        let mut step = template(
            id,
            StepType::Transform,
            format!("Transform: {}", transform.operation),
            format!("Apply the {} operation", transform.operation),
        );
        step.operation = Some(transform.operation.clone());
        step.config = Some(Value::Object(transform.config.clone()));
        step
    }

    pub fn partition_step(&self, id: String, partition: &PartitionSpec) -> WorkflowStep {
        let mut config = match &partition.config {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        config.insert("field".into(), json!(partition.field));
        if let Some(split_by) = &partition.split_by {
            config.insert("split_by".into(), json!(split_by));
        }
        let mut step = template(
            id,
            StepType::Transform,
            format!("Partition by {}", partition.field),
            format!("Split rows on {}", partition.field),
        );
        step.operation = Some("partition".to_string());
        step.config = Some(Value::Object(config));
        step
    }

    pub fn group_step(&self, id: String, group_by: &str, input_partition: Option<&str>) -> WorkflowStep {
        let mut config = Map::new();
        config.insert("group_by".into(), json!(group_by));
        if let Some(partition) = input_partition {
            config.insert("input_partition".into(), json!(partition));
        }
        let mut step = template(
            id,
            StepType::Transform,
            format!("Group by {}", group_by),
            format!("Group rows by {}", group_by),
        );
        step.operation = Some("group".to_string());
        step.config = Some(Value::Object(config));
        step
    }

    pub fn render_step(&self, id: String, rendering: &RenderingSpec, input: String) -> WorkflowStep {
        let mut config = Map::new();
        config.insert("type".into(), json!(rendering.render_type));
        if let Some(template_text) = &rendering.template {
            config.insert("template".into(), json!(template_text));
        }
        if !rendering.columns.is_empty() {
            config.insert("columns".into(), json!(rendering.columns));
        }
        if let Some(message) = &rendering.empty_message {
            config.insert("empty_message".into(), json!(message));
        }
        let mut step = template(
            id,
            StepType::Transform,
            format!("Render {}", rendering.render_type),
            "Render the results for delivery".to_string(),
        );
        step.operation = Some("render".to_string());
        step.config = Some(Value::Object(config));
        step.input = Some(input);
        step
    }

    pub fn ai_step(
        &self,
        id: String,
        operation: &AiOperation,
        prompt: String,
        input: Option<String>,
    ) -> WorkflowStep {
        let kind = if operation.operation_type.is_empty() {
            "processing"
        } else {
            operation.operation_type.as_str()
        };
        let mut config = Map::new();
        config.insert("operation_type".into(), json!(kind));
        if let Some(schema) = &operation.output_schema {
            config.insert("output_schema".into(), schema.clone());
        }
        if let Some(constraints) = &operation.constraints {
            config.insert("constraints".into(), constraints.clone());
        }
        let mut step = template(
            id,
            StepType::AiProcessing,
            format!("AI {}", kind),
            operation.instruction.clone(),
        );
        step.prompt = Some(prompt);
        step.model = operation
            .model
            .clone()
            .or_else(|| self.settings.default_ai_model.clone());
        step.input = input.filter(|value| !value.is_empty());
        step.config = Some(Value::Object(config));
        step
    }

    /// A delivery action carrying `content`; `recipient` overrides the
    /// statically configured recipient.
    pub fn delivery_step(
        &self,
        id: String,
        delivery: &DeliverySpec,
        content: String,
        recipient: Option<String>,
    ) -> WorkflowStep {
        let (plugin, action) = self.settings.delivery_target(delivery);
        let config = &delivery.config;

        let mut params = config.extra.clone();
        if let Some(to) = recipient.or_else(|| config.recipient.clone()) {
            params.insert("to".into(), json!(to));
        }
        if let Some(subject) = &config.subject {
            params.insert("subject".into(), json!(subject));
        }
        if let Some(body) = &config.body {
            params.insert("body".into(), json!(body));
        }
        if let Some(channel) = &config.channel {
            params.insert("channel".into(), json!(channel));
        }
        if !content.is_empty() {
            params.insert("content".into(), json!(content));
        }
        self.apply_edge_cases(&mut params);

        let mut step = template(
            id,
            StepType::Action,
            format!("Deliver via {}", delivery.method),
            format!("Send results using {}.{}", plugin, action),
        );
        step.plugin = Some(plugin);
        step.action = Some(action);
        step.params = Some(Value::Object(params));
        step
    }

    fn apply_edge_cases(&self, params: &mut Map<String, Value>) {
        for edge in &self.ir.edge_cases {
            match edge.action.as_str() {
                "skip_delivery" | "skip" => {
                    params.insert("skip_if_empty".into(), Value::Bool(true));
                }
                "send_empty_result_message" | "notify" => {
                    let message = edge
                        .message
                        .clone()
                        .or_else(|| self.ir.rendering.as_ref().and_then(|r| r.empty_message.clone()))
                        .unwrap_or_else(|| "No results found.".to_string());
                    params.insert("empty_result_message".into(), json!(message));
                }
                other => {
                    tracing::debug!(condition = %edge.condition, action = other, "edge case has no delivery effect");
                }
            }
        }
    }
}

/// A step with the fields every generated step carries.
fn template(id: String, step_type: StepType, name: String, description: String) -> WorkflowStep {
    WorkflowStep {
        name: Some(name),
        description: Some(description),
        continue_on_error: Some(false),
        ..WorkflowStep::new(id, step_type)
    }
}
