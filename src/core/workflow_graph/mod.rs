//! Workflow graph compilation, canonicalization and pre-flight validation.

pub mod canonicalize;
pub mod compiler;
pub mod envelope;
pub mod ir;
pub mod lint;
pub mod references;
pub mod schema;

pub use canonicalize::{canonicalize, canonicalize_value, canonicalize_with_report, CanonicalizationReport};
pub use compiler::{
    compile, validate_before_compilation, CompilationMetadata, CompilationResult, CompilerSettings,
    IrCompiler, PreCompilationCheck,
};
pub use envelope::{compile_to_envelope, envelope_from_value, CompiledWorkflowEnvelope};
pub use ir::LogicalIr;
pub use lint::{validate_pre_flight, IssueSeverity, PreflightReport, ValidationIssue};
pub use schema::{StepType, Workflow, WorkflowStep};
