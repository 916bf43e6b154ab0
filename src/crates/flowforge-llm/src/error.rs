//! Errors a [`crate::traits::PlanningModel`] implementation may raise.

use thiserror::Error;

/// Result type for planner-adapter operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur while asking a model to produce a plan.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The underlying HTTP transport failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The model's response body didn't decode as JSON at all (distinct
    /// from C4 plan-schema validation, which runs afterward in `planner`).
    #[error("response did not decode as JSON: {0}")]
    SerializationError(String),

    /// The configured API key is missing or rejected.
    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    /// The requested model id is not available from this provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The provider is temporarily unreachable or overloaded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The provider throttled this request.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The request was rejected as malformed before the model ran.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request exceeded its configured deadline.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// A `flowforge_tooling::ConfigBuilder` validation failure.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Anything else a provider implementation wants to surface verbatim.
    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a retry of the same request might succeed. Used by
    /// [`crate::planner::generate_plan`] to decide whether a transport
    /// failure should consume one of its retry attempts or abort outright.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::HttpError(_)
                | LlmError::ServiceUnavailable(_)
                | LlmError::Timeout(_)
                | LlmError::RateLimitExceeded(_)
        )
    }

    /// Whether this error stems from bad credentials, as opposed to a
    /// transient or request-shape problem.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, LlmError::AuthenticationError(_))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

impl From<flowforge_tooling::ToolingError> for LlmError {
    fn from(err: flowforge_tooling::ToolingError) -> Self {
        LlmError::ConfigError(err.to_string())
    }
}
