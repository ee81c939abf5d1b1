use thiserror::Error;

/// Terminal failures of a classification attempt.
///
/// Per-column problems never surface here; they are recovered by the
/// response parser and attached to results as
/// [`ValidationFlag`](crate::models::ValidationFlag)s.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Malformed CSV/JSON or an empty column set. Never retried.
    #[error("invalid input: {0}")]
    Input(String),

    /// Retries exhausted, or the service rejected the call outright.
    #[error("classification service unavailable after {attempts} attempt(s): {cause}")]
    ServiceUnavailable { attempts: u32, cause: String },

    /// The response cannot be aligned 1:1 with the requested columns.
    #[error("model response does not match the request: {0}")]
    StructuralParse(String),

    #[error("classification cancelled")]
    Cancelled,
}

impl ClassifyError {
    pub fn input(msg: impl Into<String>) -> Self {
        ClassifyError::Input(msg.into())
    }

    pub fn structural(msg: impl Into<String>) -> Self {
        ClassifyError::StructuralParse(msg.into())
    }
}

/// Outcome of a single call to a model backend, classified for the retry loop.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// Rate limiting, timeouts, 5xx. Worth another attempt.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Authentication failure, malformed request, blocked prompt.
    #[error("{0}")]
    Terminal(String),
}

impl BackendError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}
