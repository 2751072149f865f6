//! JSON and YAML input documents for the command line.

use crate::core::error::AppError;
use crate::core::error::ErrorCategory;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path} does not match the expected shape: {reason}")]
    Shape { path: PathBuf, reason: String },
}

impl DocumentError {
    pub fn code(&self) -> &'static str {
        match self {
            DocumentError::Read { .. } => "DOC-READ-001",
            DocumentError::Json { .. } => "DOC-JSON-001",
            DocumentError::Yaml { .. } => "DOC-YAML-001",
            DocumentError::Shape { .. } => "DOC-SHAPE-001",
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            DocumentError::Read { path, .. }
            | DocumentError::Json { path, .. }
            | DocumentError::Yaml { path, .. }
            | DocumentError::Shape { path, .. } => path,
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(error: DocumentError) -> Self {
        let category = match error {
            DocumentError::Read { .. } => ErrorCategory::IoError,
            _ => ErrorCategory::SerializationError,
        };
        AppError::new(category, error.to_string())
            .with_code(error.code())
            .with_field("path", error.path().display().to_string())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

/// Read `path` as YAML when the extension says so, JSON otherwise.
pub fn load_value(path: &Path) -> Result<Value, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if is_yaml(path) {
        serde_yaml::from_str(&content).map_err(|source| DocumentError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str(&content).map_err(|source| DocumentError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load and deserialize a typed document.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let value = load_value(path)?;
    serde_json::from_value(value).map_err(|err| DocumentError::Shape {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
