use thiserror::Error;

/// Main error type for healthdash
#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed export: {0}")]
    Malformed(String),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Import already in progress")]
    Conflict,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, HealthError>;

impl From<quick_xml::Error> for HealthError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl HealthError {
    /// Create a structural error from a message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create a validation error from a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether the caller can fix this by changing its request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Conflict | Self::NotFound(_)
        )
    }
}
