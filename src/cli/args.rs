use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CompileArgs {
    /// Logical IR document (JSON, or YAML by extension)
    #[arg(value_name = "IR_FILE")]
    pub ir: PathBuf,

    /// Emit the compiled workflow envelope instead of the raw compilation result
    #[arg(long)]
    pub envelope: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CanonicalizeArgs {
    /// Workflow document: a step array or an object holding `workflow_steps`
    #[arg(value_name = "WORKFLOW_FILE")]
    pub workflow: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Workflow document: a step array or an object holding `workflow_steps`
    #[arg(value_name = "WORKFLOW_FILE")]
    pub workflow: PathBuf,

    /// Canonicalize the workflow before running the pre-flight checks
    #[arg(long)]
    pub canonicalize: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Raw provider payload, a single record or an array
    #[arg(value_name = "PAYLOAD_FILE")]
    pub payload: PathBuf,

    /// Plugin label recorded as provenance (never used for detection)
    #[arg(long, value_name = "LABEL")]
    pub plugin: String,
}

#[derive(Args, Debug, Clone)]
pub struct SummarizeArgs {
    /// Execution trace: `{steps: [...]}` or a bare step array
    #[arg(value_name = "TRACE_FILE")]
    pub trace: PathBuf,

    /// Final pipeline output to describe alongside the steps
    #[arg(long, value_name = "FILE")]
    pub final_output: Option<PathBuf>,
}
