use std::time::Duration;

/// Closed error taxonomy (spec §7). Stages recover from everything except
/// `Fatal`; only `Fatal` is allowed to escape the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("transient failure, retry after {retry_after:?}: {message}")]
    RetryableTransient {
        message: String,
        retry_after: Duration,
    },

    #[error("catalog authentication failed: {0}")]
    CatalogAuth(String),

    #[error("schema violation in {stage}: {message}")]
    SchemaViolation { stage: &'static str, message: String },

    #[error("insufficient supply: got {got}, needed at least {min_count}")]
    InsufficientSupply { got: usize, min_count: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("fatal: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::RetryableTransient {
            message: message.into(),
            retry_after: Duration::from_millis(500),
        }
    }

    pub fn schema_violation(stage: &'static str, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            stage,
            message: message.into(),
        }
    }

    /// Whether this error kind is ever allowed to escape the orchestrator's
    /// top-level `execute` call. Every other kind is handled locally by the
    /// stage that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestratorError::Fatal(_))
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            OrchestratorError::retryable(err.to_string())
        } else if err.status().map(|s| s.as_u16()) == Some(401) {
            OrchestratorError::CatalogAuth(err.to_string())
        } else {
            OrchestratorError::Fatal(anyhow::anyhow!(err))
        }
    }
}

impl From<redis::RedisError> for OrchestratorError {
    fn from(err: redis::RedisError) -> Self {
        OrchestratorError::retryable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
