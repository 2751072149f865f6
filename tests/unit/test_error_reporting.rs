use agentpilot::core::document::load_value;
use agentpilot::core::{AppError, DefaultErrorReporter, ErrorCategory, ErrorReporter, ErrorSeverity};
use tempfile::TempDir;

#[test]
fn builder_methods_accumulate() {
    let error = AppError::new(ErrorCategory::CompilationError, "no rule accepted the IR")
        .with_code("CLI-COMPILE-001")
        .with_field("rule", "none")
        .with_suggestion("Reduce the IR to a single loop");

    assert_eq!(error.severity(), ErrorSeverity::Error);
    assert_eq!(error.context.get("rule").map(String::as_str), Some("none"));
    assert_eq!(error.recovery_suggestions.len(), 1);
    let rendered = error.to_string();
    assert!(rendered.starts_with("[CLI-COMPILE-001] CompilationError: no rule accepted the IR"));
    assert!(rendered.contains("rule"));
}

#[test]
fn document_errors_convert_with_codes_and_paths() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.yaml");
    std::fs::write(&path, "steps: [unclosed").unwrap();

    let error: AppError = load_value(&path).unwrap_err().into();

    assert_eq!(error.code, "DOC-YAML-001");
    assert_eq!(error.category, ErrorCategory::SerializationError);
    assert!(error.context["path"].ends_with("trace.yaml"));
}

#[test]
fn anyhow_errors_downcast_back_to_app_errors() {
    let result: anyhow::Result<()> =
        Err(AppError::new(ErrorCategory::ValidationError, "workflow is invalid").with_code("CLI-VAL-001").into());

    let error = result.unwrap_err();
    let app_error = error.downcast_ref::<AppError>().expect("AppError inside anyhow");
    assert_eq!(app_error.code, "CLI-VAL-001");

    // reporting writes to stderr and must not panic
    DefaultErrorReporter::new().report_error(app_error);
    DefaultErrorReporter::default().report_warning("retrying", Some("attempt 2".to_string()));
}
