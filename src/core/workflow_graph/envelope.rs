//! The compiled-workflow response record handed to downstream consumers.
//!
//! `workflow.workflow_steps` and its legacy twin `workflow.workflow` are always
//! arrays, empty on failure, because consumers iterate them unconditionally.

use crate::core::workflow_graph::canonicalize::{canonicalize_value, canonicalize_with_report};
use crate::core::workflow_graph::compiler::{CompilerSettings, IrCompiler};
use crate::core::workflow_graph::ir::LogicalIr;
use crate::core::workflow_graph::lint::{validate_pre_flight, ValidationIssue};
use crate::core::workflow_graph::schema::{Workflow, WorkflowStep};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledWorkflowEnvelope {
    pub success: bool,
    pub workflow: EnvelopeWorkflow,
    pub validation: EnvelopeValidation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_plan: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeWorkflow {
    #[serde(default)]
    pub workflow_steps: Vec<WorkflowStep>,
    /// Same steps as `workflow_steps`, kept for older consumers.
    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,
    #[serde(default)]
    pub suggested_plugins: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnvelopeWorkflow {
    pub fn from_workflow(workflow: Workflow, extra: Map<String, Value>) -> Self {
        Self {
            workflow: workflow.workflow_steps.clone(),
            workflow_steps: workflow.workflow_steps,
            suggested_plugins: workflow.suggested_plugins,
            extra,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeValidation {
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
    #[serde(default)]
    pub auto_fixed: bool,
    #[serde(default)]
    pub issue_count: usize,
}

impl CompiledWorkflowEnvelope {
    /// Validates an already canonical workflow and wraps it.
    pub fn from_workflow(workflow: Workflow, auto_fixed: bool, extra: Map<String, Value>) -> Self {
        let report = validate_pre_flight(&workflow.workflow_steps);
        let issues: Vec<ValidationIssue> = report.issues().cloned().collect();
        let services = workflow.suggested_plugins.clone();
        Self {
            success: true,
            workflow: EnvelopeWorkflow::from_workflow(workflow, extra),
            validation: EnvelopeValidation {
                valid: report.valid,
                issue_count: issues.len(),
                issues,
                auto_fixed,
            },
            semantic_plan: None,
            method: None,
            model: None,
            services_used: (!services.is_empty()).then_some(services),
            prompt_length: None,
            error: None,
            debug: None,
        }
    }

    /// A well-shaped failure record with empty step arrays.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            workflow: EnvelopeWorkflow::default(),
            validation: EnvelopeValidation::default(),
            semantic_plan: None,
            method: None,
            model: None,
            services_used: None,
            prompt_length: None,
            error: Some(error.into()),
            debug: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }
}

/// Compiles `ir` and wraps the outcome, validation included.
pub fn compile_to_envelope(ir: &LogicalIr, settings: &CompilerSettings) -> CompiledWorkflowEnvelope {
    let result = IrCompiler::new(settings.clone()).compile(ir);
    let rule = result.metadata.rule_used.clone();
    let Some(workflow) = result.workflow.filter(|_| result.success) else {
        let errors = result.errors.unwrap_or_default();
        return CompiledWorkflowEnvelope::failure(errors.join("; "))
            .with_method("rule_based")
            .with_debug(json!({ "errors": errors }));
    };

    // compiler output is already canonical; a second run only reports repairs
    let (workflow, report) = canonicalize_with_report(workflow);
    let mut extra = Map::new();
    if !ir.goal.trim().is_empty() {
        extra.insert("goal".into(), json!(ir.goal));
    }
    if let Some(rule) = &rule {
        extra.insert("rule_used".into(), json!(rule));
    }
    extra.insert(
        "deterministic_step_percentage".into(),
        json!(result.metadata.deterministic_step_percentage),
    );

    let mut envelope = CompiledWorkflowEnvelope::from_workflow(workflow, report.auto_fixed(), extra)
        .with_method(match &rule {
            Some(rule) => format!("rule_based:{}", rule),
            None => "rule_based".to_string(),
        });
    envelope.model = settings.default_ai_model.clone();
    envelope
}

/// Canonicalizes and validates an untrusted step graph (for example one
/// produced by a model) and wraps it.
pub fn envelope_from_value(value: &Value) -> CompiledWorkflowEnvelope {
    let (workflow, report) = canonicalize_value(value);
    CompiledWorkflowEnvelope::from_workflow(workflow, report.auto_fixed(), Map::new())
        .with_method("canonicalized")
}
