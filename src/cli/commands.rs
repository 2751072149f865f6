#![allow(clippy::result_large_err)]

use crate::{
    cli::args::{CanonicalizeArgs, CompileArgs, NormalizeArgs, SummarizeArgs, ValidateArgs},
    core::{
        document,
        execution_summary::{ExecutionSummaryBuilder, ExecutionTrace},
        normalizers::DataNormalizer,
        workflow_graph::{
            canonicalize_value, compile_to_envelope, validate_pre_flight, IrCompiler, LogicalIr,
            Workflow,
        },
        AgentPilotConfig, AppError, ConfigLoader, ConfigValidator, ErrorCategory,
    },
    Result,
};
use serde::Serialize;
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};

pub fn workspace_root(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(env::current_dir()?),
    }
}

fn load_config(workspace: &Path) -> Result<AgentPilotConfig> {
    let config = ConfigLoader::load_from_workspace(workspace)?;
    ConfigValidator::validate(&config)?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(AppError::from)?;
    println!("{}", rendered);
    Ok(())
}

pub fn compile(workspace: &Path, args: CompileArgs) -> Result<()> {
    let config = load_config(workspace)?;
    let ir: LogicalIr = document::load(&args.ir).map_err(AppError::from)?;
    tracing::info!(path = %args.ir.display(), features = %ir.feature_summary().join(", "), "compiling IR");

    let success = if args.envelope {
        let envelope = compile_to_envelope(&ir, &config.compiler);
        print_json(&envelope)?;
        envelope.success
    } else {
        let result = IrCompiler::new(config.compiler).compile(&ir);
        print_json(&result)?;
        result.success
    };

    if !success {
        return Err(AppError::new(ErrorCategory::CompilationError, "IR could not be compiled")
            .with_code("CLI-COMPILE-001")
            .with_field("path", args.ir.display().to_string())
            .into());
    }
    Ok(())
}

pub fn canonicalize(args: CanonicalizeArgs) -> Result<()> {
    let value = document::load_value(&args.workflow).map_err(AppError::from)?;
    let (workflow, report) = canonicalize_value(&value);
    tracing::info!(
        steps = workflow.steps().len(),
        repairs = report.repair_count(),
        "canonicalized workflow"
    );
    print_json(&json!({ "workflow": workflow, "report": report }))
}

pub fn validate(args: ValidateArgs) -> Result<()> {
    let value = document::load_value(&args.workflow).map_err(AppError::from)?;
    let workflow = if args.canonicalize {
        canonicalize_value(&value).0
    } else {
        Workflow::from_value_lenient(&value)
    };

    let report = validate_pre_flight(workflow.steps());
    print_json(&report)?;

    if !report.valid {
        return Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("workflow failed pre-flight validation with {} error(s)", report.errors.len()),
        )
        .with_code("CLI-VAL-001")
        .with_field("path", args.workflow.display().to_string())
        .into());
    }
    Ok(())
}

pub fn normalize(args: NormalizeArgs) -> Result<()> {
    let value = document::load_value(&args.payload).map_err(AppError::from)?;
    let record = DataNormalizer::new().normalize(&value, &args.plugin);
    tracing::info!(domain = %record.domain(), plugin = %args.plugin, "normalized payload");
    print_json(&record)
}

pub fn summarize(workspace: &Path, args: SummarizeArgs) -> Result<()> {
    let config = load_config(workspace)?;
    let trace_value = document::load_value(&args.trace).map_err(AppError::from)?;
    let trace = ExecutionTrace::from_value(&trace_value).map_err(|e| {
        AppError::new(
            ErrorCategory::SerializationError,
            format!("Invalid execution trace {}: {}", args.trace.display(), e),
        )
        .with_code("CLI-TRACE-001")
    })?;
    let final_output = args
        .final_output
        .as_deref()
        .map(document::load_value)
        .transpose()
        .map_err(AppError::from)?;

    let results = ExecutionSummaryBuilder::new(config.summary).build(&trace, final_output.as_ref());
    print_json(&results)
}
