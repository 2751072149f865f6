use crate::core::workflow_graph::canonicalize::{
    CanonicalPass, CanonicalizationReport, FieldDefaultsPass, LoopItemPass, NestedIdPass,
    NestedReferencePass, RenumberPass,
};
use crate::core::workflow_graph::schema::Workflow;
use serde_json::Value;

/// The canonicalization passes in the order they must run.
pub fn default_passes() -> Vec<Box<dyn CanonicalPass>> {
    vec![
        Box::new(NestedIdPass),
        Box::new(NestedReferencePass),
        Box::new(RenumberPass),
        Box::new(FieldDefaultsPass),
        Box::new(LoopItemPass),
    ]
}

pub fn canonicalize(workflow: Workflow) -> Workflow {
    canonicalize_with_report(workflow).0
}

pub fn canonicalize_with_report(workflow: Workflow) -> (Workflow, CanonicalizationReport) {
    let mut report = CanonicalizationReport::default();
    let mut current = workflow;
    for pass in default_passes() {
        current = pass.apply(current, &mut report);
        tracing::debug!(pass = pass.name(), steps = current.workflow_steps.len(), "canonicalization pass applied");
    }
    if report.auto_fixed() {
        tracing::debug!(repairs = report.repair_count(), "workflow repaired during canonicalization");
    }
    (current, report)
}

/// Canonicalizes untrusted JSON, degrading unreadable parts instead of failing.
pub fn canonicalize_value(value: &Value) -> (Workflow, CanonicalizationReport) {
    canonicalize_with_report(Workflow::from_value_lenient(value))
}
