//! Rule-based compiler from Logical IR to a canonical workflow.
//!
//! Rules are tried in a fixed priority order and the first one whose
//! predicate accepts the IR generates the raw steps. The raw output always
//! goes through the canonicalizer before it is returned.

use crate::core::workflow_graph::canonicalize::canonicalize;
use crate::core::workflow_graph::ir::{DeliverySpec, LogicalIr};
use crate::core::workflow_graph::schema::{Workflow, WorkflowStep};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

pub mod builder;
pub mod rules;

pub use builder::{StepBuilder, StepIdAllocator};
pub use rules::{built_in_rules, diagnose, CompilationRule};

/// Built-in `method -> plugin.action` delivery targets.
const DEFAULT_DELIVERY_TARGETS: &[(&str, &str, &str)] = &[
    ("email", "google-mail", "send_email"),
    ("slack", "slack", "send_message"),
    ("sheets", "google-sheets", "append_rows"),
    ("webhook", "http", "post"),
    ("sms", "twilio", "send_sms"),
];

/// Tunables for step generation, loaded from the `[compiler]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub default_ai_model: Option<String>,
    pub default_read_action: String,
    /// Overrides for the built-in delivery targets, as `plugin.action`.
    pub delivery_plugins: BTreeMap<String, String>,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            default_ai_model: None,
            default_read_action: "read".to_string(),
            delivery_plugins: BTreeMap::new(),
        }
    }
}

impl CompilerSettings {
    /// Plugin and action for a delivery. Explicit `config.plugin`/`config.action`
    /// win over configured targets, which win over the built-in table.
    pub fn delivery_target(&self, delivery: &DeliverySpec) -> (String, String) {
        let method = delivery.method.trim();
        let (mut plugin, mut action) = match self
            .delivery_plugins
            .get(method)
            .and_then(|target| target.split_once('.'))
        {
            Some((plugin, action)) => (plugin.to_string(), action.to_string()),
            None => DEFAULT_DELIVERY_TARGETS
                .iter()
                .find(|(name, _, _)| *name == method)
                .map(|(_, plugin, action)| (plugin.to_string(), action.to_string()))
                .unwrap_or_else(|| (method.to_string(), "send".to_string())),
        };
        if let Some(explicit) = delivery.config.plugin.as_deref().filter(|p| !p.trim().is_empty()) {
            plugin = explicit.to_string();
        }
        if let Some(explicit) = delivery.config.action.as_deref().filter(|a| !a.trim().is_empty()) {
            action = explicit.to_string();
        }
        (plugin, action)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompilationMetadata {
    pub rule_used: Option<String>,
    pub step_count: usize,
    pub compilation_time_ms: u64,
    pub deterministic_step_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub metadata: CompilationMetadata,
}

impl CompilationResult {
    fn failure(errors: Vec<String>, started: Instant) -> Self {
        Self {
            success: false,
            workflow: None,
            errors: Some(errors),
            metadata: CompilationMetadata {
                compilation_time_ms: elapsed_ms(started),
                ..CompilationMetadata::default()
            },
        }
    }
}

/// Result of the cheap static check run before compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreCompilationCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

pub struct IrCompiler {
    settings: CompilerSettings,
    rules: Vec<CompilationRule>,
}

impl IrCompiler {
    pub fn new(settings: CompilerSettings) -> Self {
        Self {
            settings,
            rules: built_in_rules(),
        }
    }

    pub fn rules(&self) -> &[CompilationRule] {
        &self.rules
    }

    pub fn select_rule(&self, ir: &LogicalIr) -> Option<&CompilationRule> {
        self.rules.iter().find(|rule| (rule.accepts)(ir))
    }

    pub fn compile(&self, ir: &LogicalIr) -> CompilationResult {
        let started = Instant::now();

        if !ir.clarifications_required.is_empty() {
            let mut errors = vec![format!(
                "IR needs {} clarification(s) before it can be compiled",
                ir.clarifications_required.len()
            )];
            errors.extend(
                ir.clarifications_required
                    .iter()
                    .map(|question| format!("Clarification required: {}", question)),
            );
            return CompilationResult::failure(errors, started);
        }

        let Some(rule) = self.select_rule(ir) else {
            let errors = diagnose(ir);
            tracing::debug!(errors = errors.len(), "no compilation rule accepted the IR");
            return CompilationResult::failure(errors, started);
        };
        tracing::debug!(rule = rule.name, "compilation rule selected");

        let mut builder = StepBuilder::new(ir, &self.settings);
        let raw = (rule.generate)(&mut builder);
        let mut workflow = Workflow::new(raw);
        workflow.suggested_plugins = suggested_plugins(&workflow.workflow_steps);
        let workflow = canonicalize(workflow);

        CompilationResult {
            success: true,
            metadata: CompilationMetadata {
                rule_used: Some(rule.name.to_string()),
                step_count: workflow.workflow_steps.len(),
                compilation_time_ms: elapsed_ms(started),
                deterministic_step_percentage: deterministic_step_percentage(&workflow.workflow_steps),
            },
            workflow: Some(workflow),
            errors: None,
        }
    }
}

impl Default for IrCompiler {
    fn default() -> Self {
        Self::new(CompilerSettings::default())
    }
}

pub fn compile(ir: &LogicalIr) -> CompilationResult {
    IrCompiler::default().compile(ir)
}

pub fn validate_before_compilation(ir: &LogicalIr) -> PreCompilationCheck {
    let mut errors = Vec::new();
    if ir.data_sources.is_empty() {
        errors.push("At least one data source is required".to_string());
    }
    for (index, source) in ir.data_sources.iter().enumerate() {
        if source.id.trim().is_empty() {
            errors.push(format!("Data source at position {} has no id", index + 1));
        }
    }
    if ir.delivery.is_empty() {
        errors.push("At least one delivery method is required".to_string());
    }
    for (index, delivery) in ir.delivery.iter().enumerate() {
        if delivery.method.trim().is_empty() {
            errors.push(format!("Delivery at position {} has no method", index + 1));
        }
    }
    PreCompilationCheck {
        valid: errors.is_empty(),
        errors,
    }
}

/// A step is deterministic unless it leaves a natural-language instruction
/// for a model to resolve at run time.
pub fn is_deterministic(step: &WorkflowStep) -> bool {
    let has_prompt = step.prompt.as_deref().is_some_and(|prompt| !prompt.trim().is_empty());
    let is_ai = step.step_type.as_ref().is_some_and(|kind| kind.is_ai());
    !has_prompt && !is_ai
}

/// Share of deterministic steps across every step, nested ones included,
/// rounded to two decimals.
pub fn deterministic_step_percentage(steps: &[WorkflowStep]) -> f64 {
    let all: Vec<&WorkflowStep> = steps
        .iter()
        .flat_map(|step| std::iter::once(step).chain(step.descendants()))
        .collect();
    if all.is_empty() {
        return 100.0;
    }
    let deterministic = all.iter().filter(|step| is_deterministic(step)).count();
    let percentage = deterministic as f64 / all.len() as f64 * 100.0;
    (percentage * 100.0).round() / 100.0
}

fn suggested_plugins(steps: &[WorkflowStep]) -> Vec<String> {
    let mut plugins: Vec<String> = Vec::new();
    for step in steps.iter().flat_map(|step| std::iter::once(step).chain(step.descendants())) {
        if let Some(plugin) = step.plugin.as_deref().filter(|p| !p.is_empty()) {
            if !plugins.iter().any(|known| known == plugin) {
                plugins.push(plugin.to_string());
            }
        }
    }
    plugins
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
