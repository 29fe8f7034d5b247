use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrudkitError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Password hashing error: {0}")]
    Password(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CrudkitError {
    /// Validation failure attributed to a single field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CrudkitError::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Validation failure for the document as a whole.
    pub fn validation_document(message: impl Into<String>) -> Self {
        CrudkitError::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// The field name attached to a validation error, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            CrudkitError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrudkitError>;
