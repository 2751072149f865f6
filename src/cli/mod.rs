pub mod args;
pub mod commands;

pub use args::{CanonicalizeArgs, CompileArgs, NormalizeArgs, SummarizeArgs, ValidateArgs};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
WORKFLOW COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "agentpilot")]
#[command(version = crate::VERSION)]
#[command(about = "Compile, repair and validate agent workflow graphs")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: compile an IR, validate the workflow, then summarize an execution trace."
)]
pub struct Args {
    /// Workspace holding agentpilot.toml and .agentpilot/ (default: current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "Compile a logical IR into a workflow",
        long_about = "Compile picks the first compilation rule that accepts the IR, generates its steps and canonicalizes them.",
        after_help = "Example:\n    agentpilot compile ir.json --envelope"
    )]
    Compile(CompileArgs),
    #[command(
        about = "Repair step ids, references and fields",
        long_about = "Canonicalize runs the five repair passes and prints the workflow with a report of what changed.",
        after_help = "Example:\n    agentpilot canonicalize workflow.json"
    )]
    Canonicalize(CanonicalizeArgs),
    #[command(
        about = "Run pre-flight checks on a workflow",
        long_about = "Validate reports every structural problem at once and exits non-zero when any error is found.",
        after_help = "Example:\n    agentpilot validate workflow.yaml --canonicalize"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Map provider payloads to unified records",
        long_about = "Normalize detects the data domain from the payload's shape and emits the unified record with provenance.",
        after_help = "Example:\n    agentpilot normalize message.json --plugin google-mail"
    )]
    Normalize(NormalizeArgs),
    #[command(
        about = "Summarize an execution trace",
        long_about = "Summarize reports counts, key names and messages per step without copying any output values.",
        after_help = "Example:\n    agentpilot summarize trace.json --final-output result.json"
    )]
    Summarize(SummarizeArgs),
}

pub fn run(args: Args) -> crate::Result<()> {
    let workspace = commands::workspace_root(args.workspace.as_deref())?;
    match args.command {
        Command::Compile(compile_args) => commands::compile(&workspace, compile_args),
        Command::Canonicalize(canonicalize_args) => commands::canonicalize(canonicalize_args),
        Command::Validate(validate_args) => commands::validate(validate_args),
        Command::Normalize(normalize_args) => commands::normalize(normalize_args),
        Command::Summarize(summarize_args) => commands::summarize(&workspace, summarize_args),
    }
}
