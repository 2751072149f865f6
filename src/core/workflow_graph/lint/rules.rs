use super::{PreflightRule, ValidationIssue};
use crate::core::workflow_graph::references::{looks_like_step_id, own_reference_ids};
use crate::core::workflow_graph::schema::{StepType, WorkflowStep};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

pub fn built_in_rules() -> Vec<Box<dyn PreflightRule>> {
    vec![
        Box::new(StepIdentityRule),
        Box::new(UnknownDependencyRule),
        Box::new(DependencyOrderRule),
        Box::new(DependencyCycleRule),
        Box::new(StepTypeRule),
        Box::new(ActionFieldsRule),
    ]
}

fn location_of(step: &WorkflowStep, index: usize) -> String {
    if step.id.trim().is_empty() {
        format!("position {}", index + 1)
    } else {
        step.id.clone()
    }
}

/// First position of each top-level id.
fn positions(steps: &[WorkflowStep]) -> HashMap<&str, usize> {
    let mut out = HashMap::new();
    for (index, step) in steps.iter().enumerate() {
        if !step.id.trim().is_empty() {
            out.entry(step.id.as_str()).or_insert(index);
        }
    }
    out
}

fn nested_ids(steps: &[WorkflowStep]) -> HashSet<&str> {
    steps
        .iter()
        .flat_map(WorkflowStep::descendants)
        .map(|nested| nested.id.as_str())
        .filter(|id| !id.trim().is_empty())
        .collect()
}

/// Ids named by `{{…}}` references in the step's own fields that denote steps
/// rather than runtime variables such as `item`.
fn step_references(step: &WorkflowStep, known: &HashMap<&str, usize>, nested: &HashSet<&str>) -> Vec<String> {
    own_reference_ids(step)
        .into_iter()
        .filter(|id| known.contains_key(id.as_str()) || nested.contains(id.as_str()) || looks_like_step_id(id))
        .collect()
}

struct StepIdentityRule;

impl PreflightRule for StepIdentityRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let first_seen = positions(steps);
        let mut out = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                out.push(ValidationIssue::error(
                    "WFG-PRE-001",
                    format!("step at position {} has no id", index + 1),
                    Some(location_of(step, index)),
                    Some("give every step a unique, non-empty id"),
                ));
                continue;
            }
            let first = first_seen[step.id.as_str()];
            if first != index {
                out.push(ValidationIssue::error(
                    "WFG-PRE-001",
                    format!(
                        "duplicate step id '{}' at position {} (first defined at position {})",
                        step.id,
                        index + 1,
                        first + 1
                    ),
                    Some(step.id.clone()),
                    Some("rename steps so every step id is unique"),
                ));
            }
        }
        out
    }
}

struct UnknownDependencyRule;

impl PreflightRule for UnknownDependencyRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let known = positions(steps);
        let nested = nested_ids(steps);
        let mut out = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            for dependency in &step.dependencies {
                if !known.contains_key(dependency.as_str()) {
                    out.push(ValidationIssue::error(
                        "WFG-PRE-002",
                        format!(
                            "step '{}' depends on unknown step '{}'",
                            location_of(step, index),
                            dependency
                        ),
                        Some(location_of(step, index)),
                        Some("depend only on ids of existing top-level steps"),
                    ));
                }
            }
            for reference in step_references(step, &known, &nested) {
                if known.contains_key(reference.as_str()) {
                    continue;
                }
                let message = if nested.contains(reference.as_str()) {
                    format!(
                        "step '{}' references nested step '{}' from outside its parent",
                        location_of(step, index),
                        reference
                    )
                } else {
                    format!(
                        "step '{}' references unknown step '{}'",
                        location_of(step, index),
                        reference
                    )
                };
                out.push(ValidationIssue::error(
                    "WFG-PRE-002",
                    message,
                    Some(location_of(step, index)),
                    Some("reference only the outputs of existing top-level steps"),
                ));
            }
        }
        out
    }
}

struct DependencyOrderRule;

impl PreflightRule for DependencyOrderRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let known = positions(steps);
        let mut out = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            for dependency in &step.dependencies {
                let Some(&target) = known.get(dependency.as_str()) else {
                    continue;
                };
                if target < index {
                    continue;
                }
                let message = if target == index && *dependency == step.id {
                    format!("step '{}' (position {}) depends on itself", step.id, index + 1)
                } else {
                    format!(
                        "step '{}' (position {}) depends on step '{}' (position {}), which does not run before it",
                        location_of(step, index),
                        index + 1,
                        dependency,
                        target + 1
                    )
                };
                out.push(ValidationIssue::error(
                    "WFG-PRE-003",
                    message,
                    Some(location_of(step, index)),
                    Some("move the dependency earlier or drop it"),
                ));
            }
            for reference in own_reference_ids(step) {
                let Some(&target) = known.get(reference.as_str()) else {
                    continue;
                };
                if target < index {
                    continue;
                }
                out.push(ValidationIssue::error(
                    "WFG-PRE-003",
                    format!(
                        "step '{}' (position {}) references step '{}' (position {}), which does not run before it",
                        location_of(step, index),
                        index + 1,
                        reference,
                        target + 1
                    ),
                    Some(location_of(step, index)),
                    Some("reference only outputs of steps that run earlier"),
                ));
            }
        }
        out
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

struct DependencyCycleRule;

impl PreflightRule for DependencyCycleRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for step in steps {
            if !step.id.trim().is_empty() && !nodes.contains_key(step.id.as_str()) {
                nodes.insert(step.id.as_str(), graph.add_node(step.id.as_str()));
            }
        }
        for step in steps {
            let Some(&from) = nodes.get(step.id.as_str()) else {
                continue;
            };
            for dependency in &step.dependencies {
                if let Some(&to) = nodes.get(dependency.as_str()) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut out = Vec::new();
        let mut state = vec![Visit::New; graph.node_count()];
        for start in graph.node_indices() {
            if state[start.index()] != Visit::New {
                continue;
            }
            if let Some(cycle) = first_cycle_from(&graph, start, &mut state) {
                let path: Vec<&str> = cycle.iter().map(|node| graph[*node]).collect();
                out.push(ValidationIssue::error(
                    "WFG-PRE-004",
                    format!("dependency cycle detected: {}", path.join(" -> ")),
                    Some(graph[cycle[0]].to_string()),
                    Some("break the cycle by removing one of the dependencies"),
                ));
            }
        }
        out
    }
}

/// Depth-first search with an explicit stack. Returns the first cycle reached
/// from `start` as a closed path (first node repeated at the end).
fn first_cycle_from(
    graph: &DiGraph<&str, ()>,
    start: NodeIndex,
    state: &mut [Visit],
) -> Option<Vec<NodeIndex>> {
    let successors = |node: NodeIndex| {
        let mut next: Vec<NodeIndex> = graph.neighbors(node).collect();
        // petgraph yields the most recently added edge first
        next.reverse();
        next
    };

    let mut cycle = None;
    let mut path = vec![start];
    let mut stack = vec![(start, successors(start), 0usize)];
    state[start.index()] = Visit::Active;

    while let Some((node, next, cursor)) = stack.last_mut() {
        if let Some(&target) = next.get(*cursor) {
            *cursor += 1;
            match state[target.index()] {
                Visit::New => {
                    state[target.index()] = Visit::Active;
                    path.push(target);
                    stack.push((target, successors(target), 0));
                }
                Visit::Active if cycle.is_none() => {
                    let from = path.iter().position(|n| *n == target).unwrap_or(0);
                    let mut closed = path[from..].to_vec();
                    closed.push(target);
                    cycle = Some(closed);
                }
                _ => {}
            }
        } else {
            state[node.index()] = Visit::Done;
            stack.pop();
            path.pop();
        }
    }
    cycle
}

struct StepTypeRule;

impl PreflightRule for StepTypeRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            visit_tree(step, location_of(step, index), &mut |step, location| {
                match &step.step_type {
                    None => out.push(ValidationIssue::warning(
                        "WFG-PRE-005",
                        format!("step '{}' has no type", location),
                        Some(location.to_string()),
                        Some("set an explicit step type"),
                    )),
                    Some(StepType::Other(tag)) => out.push(ValidationIssue::warning(
                        "WFG-PRE-005",
                        format!("step '{}' has unknown type '{}'", location, tag),
                        Some(location.to_string()),
                        Some("use a known step type or upgrade the executor"),
                    )),
                    Some(_) => {}
                }
            });
        }
        out
    }
}

struct ActionFieldsRule;

impl PreflightRule for ActionFieldsRule {
    fn check(&self, steps: &[WorkflowStep]) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            visit_tree(step, location_of(step, index), &mut |step, location| {
                if !step.is_type(&StepType::Action) {
                    return;
                }
                let blank = |field: &Option<String>| {
                    field.as_deref().map_or(true, |value| value.trim().is_empty())
                };
                for (field, missing) in [("plugin", blank(&step.plugin)), ("action", blank(&step.action))] {
                    if missing {
                        out.push(ValidationIssue::error(
                            "WFG-PRE-006",
                            format!("action step '{}' is missing '{}'", location, field),
                            Some(location.to_string()),
                            Some("set both plugin and action on action steps"),
                        ));
                    }
                }
            });
        }
        out
    }
}

/// Visits `step` and its descendants, naming nested ones `parent > child`.
fn visit_tree(step: &WorkflowStep, location: String, visit: &mut dyn FnMut(&WorkflowStep, &str)) {
    visit(step, &location);
    for (position, child) in step.children().enumerate() {
        let name = if child.id.trim().is_empty() {
            format!("#{}", position + 1)
        } else {
            child.id.clone()
        };
        visit_tree(child, format!("{} > {}", location, name), visit);
    }
}
