use agentpilot::cli::{self, Args};
use agentpilot::core::{AppError, DefaultErrorReporter, ErrorReporter};
use agentpilot::logging;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = match logging::init(&args) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("[WARNING] logging disabled: {:#}", err);
            None
        }
    };

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AppError>() {
                Some(app_error) => DefaultErrorReporter::new().report_error(app_error),
                None => eprintln!("[ERROR] {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
