use super::builder::StepBuilder;
use crate::core::workflow_graph::ir::LogicalIr;
use crate::core::workflow_graph::schema::{GatherConfig, ScatterConfig, StepType, WorkflowStep};
use serde_json::{json, Map, Value};

/// A predicate over the IR paired with the generator used when it accepts.
#[derive(Clone, Copy)]
pub struct CompilationRule {
    pub name: &'static str,
    pub description: &'static str,
    pub accepts: fn(&LogicalIr) -> bool,
    pub generate: fn(&mut StepBuilder<'_>) -> Vec<WorkflowStep>,
}

impl std::fmt::Debug for CompilationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Rules in priority order, most specific first.
pub fn built_in_rules() -> Vec<CompilationRule> {
    vec![
        CompilationRule {
            name: "grouped_delivery",
            description: "one delivery per group, fanned out with scatter_gather",
            accepts: accepts_grouped_delivery,
            generate: generate_grouped_delivery,
        },
        CompilationRule {
            name: "conditional_delivery",
            description: "deliveries guarded by a single condition",
            accepts: accepts_conditional_delivery,
            generate: generate_conditional_delivery,
        },
        CompilationRule {
            name: "per_item_loop",
            description: "AI processing (and optionally delivery) once per item",
            accepts: accepts_per_item_loop,
            generate: generate_per_item_loop,
        },
        CompilationRule {
            name: "simple",
            description: "read, process and deliver in a straight line",
            accepts: accepts_simple,
            generate: generate_simple,
        },
    ]
}

fn has_sources_and_delivery(ir: &LogicalIr) -> bool {
    !ir.data_sources.is_empty() && !ir.delivery.is_empty()
}

fn accepts_grouped_delivery(ir: &LogicalIr) -> bool {
    has_sources_and_delivery(ir) && ir.emits_per_group() && ir.recipient_source().is_some()
}

fn accepts_conditional_delivery(ir: &LogicalIr) -> bool {
    has_sources_and_delivery(ir)
        && ir.conditionals.len() == 1
        && ir.loops.is_empty()
        && !ir.emits_per_group()
}

fn accepts_per_item_loop(ir: &LogicalIr) -> bool {
    has_sources_and_delivery(ir)
        && ir.loops.len() == 1
        && ir.conditionals.is_empty()
        && !ir.emits_per_group()
}

fn accepts_simple(ir: &LogicalIr) -> bool {
    has_sources_and_delivery(ir)
        && ir.loops.is_empty()
        && ir.conditionals.is_empty()
        && !ir.emits_per_group()
}

/// Render (when configured) then every delivery, each consuming the render
/// output or `content`. Steps are chained through `dependencies`.
fn emit_tail(builder: &mut StepBuilder<'_>, content: String, recipient: Option<String>) -> Vec<WorkflowStep> {
    let ir = builder.ir;
    let mut steps = Vec::new();
    let mut content = content;
    let mut upstream: Option<String> = None;
    if let Some(rendering) = &ir.rendering {
        let id = builder.next_id();
        steps.push(builder.render_step(id.clone(), rendering, content));
        content = format!("{{{{{}.data}}}}", id);
        upstream = Some(id);
    }
    for delivery in &ir.delivery {
        let id = builder.next_id();
        let mut step = builder.delivery_step(id, delivery, content.clone(), recipient.clone());
        step.dependencies = upstream.iter().cloned().collect();
        steps.push(step);
    }
    steps
}

fn generate_simple(builder: &mut StepBuilder<'_>) -> Vec<WorkflowStep> {
    let mut steps = builder.emit_reads();
    steps.extend(builder.emit_processing(true));
    steps.extend(emit_top_level_tail(builder));
    steps
}

/// Render and deliveries at the top level, wired to the current producers.
fn emit_top_level_tail(builder: &mut StepBuilder<'_>) -> Vec<WorkflowStep> {
    let ir = builder.ir;
    let mut steps: Vec<WorkflowStep> = builder.merge_producers().into_iter().collect();
    if let Some(rendering) = &ir.rendering {
        let id = builder.next_id();
        let input = builder.data_ref();
        let step = builder.render_step(id, rendering, input);
        steps.push(builder.chain(step));
    }
    let content = builder.data_ref();
    let producers = builder.producers().to_vec();
    for delivery in &ir.delivery {
        let id = builder.next_id();
        let mut step = builder.delivery_step(id, delivery, content.clone(), None);
        step.dependencies = producers.clone();
        steps.push(step);
    }
    steps
}

fn generate_grouped_delivery(builder: &mut StepBuilder<'_>) -> Vec<WorkflowStep> {
    let ir = builder.ir;
    let mut steps = builder.emit_reads();
    steps.extend(builder.emit_processing(true));

    let (group_by, input_partition) = match &ir.grouping {
        Some(grouping) => (grouping.group_by.as_str(), grouping.input_partition.as_deref()),
        None => ("", None),
    };
    steps.extend(builder.merge_producers());
    let group_id = builder.next_id();
    let group = builder.group_step(group_id, group_by, input_partition);
    let group = builder.chain(group);
    let groups_ref = format!("{{{{{}.data.groups}}}}", group.id);
    steps.push(group);

    let recipient = ir.recipient_source().map(|source| {
        if source == group_by {
            "{{group.key}}".to_string()
        } else {
            format!("{{{{group.rows[0].{}}}}}", source)
        }
    });

    let scatter_id = builder.next_id();
    let mut scatter_step = WorkflowStep {
        name: Some(format!("Deliver per {}", group_by)),
        description: Some(format!("Send one delivery per {} group", group_by)),
        continue_on_error: Some(false),
        ..WorkflowStep::new(scatter_id, StepType::ScatterGather)
    };
    let nested = emit_tail(builder, "{{group.rows}}".to_string(), recipient);
    scatter_step.scatter = Some(ScatterConfig {
        input: Some(groups_ref),
        item_variable: Some("group".to_string()),
        steps: nested,
        extra: Map::new(),
    });
    scatter_step.gather = Some(GatherConfig {
        operation: Some("collect".to_string()),
        extra: Map::new(),
    });
    steps.push(builder.chain(scatter_step));
    steps
}

fn generate_conditional_delivery(builder: &mut StepBuilder<'_>) -> Vec<WorkflowStep> {
    let ir = builder.ir;
    let mut steps = builder.emit_reads();
    steps.extend(builder.emit_processing(true));

    let Some(conditional) = ir.conditionals.first() else {
        return steps;
    };
    steps.extend(builder.merge_producers());
    if let Some(rendering) = &ir.rendering {
        let id = builder.next_id();
        let input = builder.data_ref();
        let step = builder.render_step(id, rendering, input);
        steps.push(builder.chain(step));
    }

    let content = builder.data_ref();
    let guard_id = builder.next_id();
    let mut guard = WorkflowStep {
        name: Some(format!("Check {}", conditional.when.field)),
        description: Some(conditional.description.clone().unwrap_or_else(|| {
            format!(
                "Deliver only when {} {} {}",
                conditional.when.field, conditional.when.operator, conditional.when.value
            )
        })),
        continue_on_error: Some(false),
        condition: Some(json!({
            "field": conditional.when.field,
            "operator": conditional.when.operator,
            "value": conditional.when.value,
        })),
        ..WorkflowStep::new(guard_id, StepType::Conditional)
    };
    let mut deliveries = Vec::new();
    for delivery in &ir.delivery {
        let id = builder.next_id();
        deliveries.push(builder.delivery_step(id, delivery, content.clone(), None));
    }
    guard.steps = Some(deliveries);
    steps.push(builder.chain(guard));
    steps
}

fn generate_per_item_loop(builder: &mut StepBuilder<'_>) -> Vec<WorkflowStep> {
    let ir = builder.ir;
    let mut steps = builder.emit_reads();
    let reads = steps.clone();
    steps.extend(builder.emit_processing(false));

    let Some(loop_spec) = ir.loops.first() else {
        return steps;
    };
    let source = builder
        .read_step_for(&loop_spec.over, &reads)
        .filter(|_| ir.filters.is_empty() && ir.transforms.is_empty() && ir.partitions.is_empty())
        .or_else(|| builder.producers().first().cloned())
        .unwrap_or_default();
    let item_path = loop_spec
        .item_path
        .as_deref()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or("rows");
    let array = format!("{}.data.{}", source, item_path);

    let loop_id = builder.next_id();
    let mut body = Vec::new();
    let mut previous: Option<String> = None;
    for operation in &ir.ai_operations {
        let id = builder.next_id();
        let mut prompt = operation.instruction.clone();
        for field in &loop_spec.item_fields {
            prompt.push_str(&format!("\n{}: {{{{{}.{}}}}}", field, array, field));
        }
        let input = operation
            .input
            .clone()
            .or_else(|| previous.as_ref().map(|prev| format!("{{{{{}.data}}}}", prev)));
        let mut step = builder.ai_step(id.clone(), operation, prompt, input);
        step.dependencies = previous.iter().cloned().collect();
        body.push(step);
        previous = Some(id);
    }

    if loop_spec.deliver_per_item {
        let content = match &previous {
            Some(prev) => format!("{{{{{}.data}}}}", prev),
            None => item_content(&array, &loop_spec.item_fields),
        };
        let mut tail = emit_tail(builder, content, None);
        for step in tail.iter_mut().filter(|step| step.dependencies.is_empty()) {
            step.dependencies = previous.iter().cloned().collect();
        }
        body.extend(tail);
    }

    let mut looped = WorkflowStep {
        name: Some(format!("For each item in {}", item_path)),
        description: Some(format!("Process every item of {}", loop_spec.over)),
        continue_on_error: Some(false),
        iterate_over: Some(format!("{{{{{}}}}}", array)),
        ..WorkflowStep::new(loop_id, StepType::Loop)
    };
    looped.loop_steps = Some(body);
    steps.push(builder.chain(looped));

    if !loop_spec.deliver_per_item {
        steps.extend(emit_top_level_tail(builder));
    }
    steps
}

/// Per-item delivery content when no AI step shapes the item.
fn item_content(array: &str, fields: &[String]) -> String {
    if fields.is_empty() {
        return "{{item}}".to_string();
    }
    fields
        .iter()
        .map(|field| format!("{}: {{{{{}.{}}}}}", field, array, field))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Explains why no rule accepted `ir`.
pub fn diagnose(ir: &LogicalIr) -> Vec<String> {
    let mut errors = Vec::new();
    if ir.data_sources.is_empty() {
        errors.push("IR has no data sources; at least one is required".to_string());
    }
    if ir.delivery.is_empty() {
        errors.push("IR has no delivery method; at least one is required".to_string());
    }
    if ir.emits_per_group() && ir.recipient_source().is_none() {
        errors.push(
            "grouping.emit_per_group requires a delivery with config.recipient_source".to_string(),
        );
    }
    if ir.loops.len() > 1 {
        errors.push(format!("{} loops found; at most one loop is supported", ir.loops.len()));
    }
    if ir.conditionals.len() > 1 {
        errors.push(format!(
            "{} conditionals found; at most one conditional is supported",
            ir.conditionals.len()
        ));
    }
    if !ir.loops.is_empty() && !ir.conditionals.is_empty() {
        errors.push("loops combined with conditionals are not supported".to_string());
    }
    let features = ir.feature_summary();
    let present = if features.is_empty() {
        "an empty IR".to_string()
    } else {
        features.join(", ")
    };
    errors.push(format!(
        "No compilation rule supports this combination of IR features: {}",
        present
    ));
    errors
}
