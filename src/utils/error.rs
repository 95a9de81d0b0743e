use crate::config::ConfigError;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The request never got a response
    #[error("Failed to send webhook: {reason}")]
    NotifyTransport { retryable: bool, reason: String },
    /// The endpoint answered with a non-success status
    #[error("webhook returned status {status}: {body}")]
    NotifyStatus { status: u16, body: String },
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Result alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn internal_error(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }

    /// Whether a retry may succeed: retryable transport failures, 429, 5xx, I/O
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::NotifyTransport { retryable, .. } => *retryable,
            AppError::NotifyStatus { status, .. } => *status == 429 || (500..=599).contains(status),
            AppError::Io(_) => true,
            _ => false,
        }
    }
}
