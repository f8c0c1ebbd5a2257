use thiserror::Error;

/// Errors that can occur while loading or exporting a log bundle.
///
/// Reconstruction itself never fails: missing or malformed fields become
/// neutral defaults. Only the outer surfaces (reading a document, emitting
/// YAML/JSON) can produce a `FlowError`.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The document parsed, but its shape is not a log bundle
    #[error("Invalid log bundle: {0}")]
    InvalidBundle(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FlowError {
    /// Create a new invalid bundle error
    pub fn invalid_bundle(msg: impl Into<String>) -> Self {
        Self::InvalidBundle(msg.into())
    }
}

/// Result type for flow operations
pub type FlowResult<T> = std::result::Result<T, FlowError>;
