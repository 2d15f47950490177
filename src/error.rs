use thiserror::Error;

use crate::models::PipelineStage;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or incomplete incident, rejected before the pipeline starts
    #[error("Validation error: {0}")]
    Validation(String),

    /// A pipeline stage could not produce a result
    #[error("Stage failure ({stage}): {message}")]
    StageFailure { stage: PipelineStage, message: String },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// External system errors (PMS, access control, notification)
    #[error("Integration error ({system}): {message}")]
    Integration { system: String, message: String },

    /// Invalid state transition
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a stage failure
    pub fn stage(stage: PipelineStage, message: impl Into<String>) -> Self {
        AppError::StageFailure {
            stage,
            message: message.into(),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::StageFailure { .. } => "STAGE_FAILURE",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Integration { .. } => "INTEGRATION_ERROR",
            AppError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a stage boundary retry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::StageFailure { .. } | AppError::Integration { .. } | AppError::Io(_)
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from serde_yaml::Error
impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
