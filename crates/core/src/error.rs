use thiserror::Error;

pub type AcademyResult<T> = Result<T, AcademyError>;

#[derive(Error, Debug)]
pub enum AcademyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Messaging provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AcademyError {
    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AcademyError::Config(_) => "config_error",
            AcademyError::Validation(_) => "invalid_request",
            AcademyError::NotFound(_) => "not_found",
            AcademyError::Provider(_) => "provider_error",
            AcademyError::Serialization(_) => "serialization_error",
            AcademyError::Io(_) => "io_error",
            AcademyError::Internal(_) => "internal_error",
        }
    }
}
