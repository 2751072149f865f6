pub mod config;
pub mod document;
pub mod error;
pub mod execution_summary;
pub mod normalizers;
pub mod workflow_graph;

pub use config::{AgentPilotConfig, ConfigLoader, ConfigValidator};
pub use document::DocumentError;
pub use error::{AppError, DefaultErrorReporter, ErrorCategory, ErrorReporter, ErrorSeverity};
pub use execution_summary::{build_execution_summary, ExecutionSummaryBuilder, ExecutionTrace, StructuredExecutionResults};
pub use normalizers::{detect_domain, is_normalized, DataNormalizer, Domain, NormalizedRecord};
