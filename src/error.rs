use thiserror::Error;

pub type Result<T> = std::result::Result<T, NgajiError>;

/// Failure taxonomy shared by the store, ledger and review workflow.
///
/// Validation, State and Forbidden are permanent: resending the same input
/// will fail the same way. Transport covers everything the store itself can
/// throw (lock timeouts, I/O) and is safe to retry.
#[derive(Debug, Error)]
pub enum NgajiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    State(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Transport(String),
}

impl NgajiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Wire code used in the sidecar error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_params",
            Self::NotFound(_) => "not_found",
            Self::State(_) => "bad_state",
            Self::Forbidden(_) => "forbidden",
            Self::Transport(_) => "transport_failed",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<rusqlite::Error> for NgajiError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<std::io::Error> for NgajiError {
    fn from(e: std::io::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_is_retryable() {
        assert!(NgajiError::Transport("busy".into()).is_retryable());
        assert!(!NgajiError::state("decided").is_retryable());
        assert!(!NgajiError::validation("juz").is_retryable());
        assert!(!NgajiError::not_found("x").is_retryable());
        assert!(!NgajiError::forbidden("x").is_retryable());
    }

    #[test]
    fn sqlite_errors_map_to_transport() {
        let e: NgajiError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(e.code(), "transport_failed");
    }
}
