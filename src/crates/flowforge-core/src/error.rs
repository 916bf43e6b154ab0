//! Error types for the graph execution subsystem.
//!
//! All errors that can occur from plan validation through run completion are
//! collected into a single tagged hierarchy. Each layer maps its
//! layer-specific failures into exactly one `FlowError` variant and
//! preserves the original cause via `#[source]`/`#[from]`.
//!
//! # Error Categories
//!
//! - **Planning**: `PlanGeneration`, `PlanValidation`
//! - **Compilation**: `Compilation`, `MissingJoin`
//! - **Invocation**: `InputValidation`, `OutputValidation`, `ToolFailure`, `Timeout`
//! - **Control flow**: `Expression`, `MissingReference`, `LoopBound`, `NoMatch`
//! - **Lifecycle**: `Cancelled`, `Suspended`
//! - **Resumption**: `UnknownSuspension`, `SuspensionExpired`, `SuspensionAlreadyConsumed`
//! - **Resources**: `PoolExhaustion`, `Checkpoint`, `Serialization`
//!
//! # Examples
//!
//! ```rust
//! use flowforge_core::error::FlowError;
//!
//! let err = FlowError::input_validation("fetch_node", "missing required field 'source'");
//! assert!(matches!(err, FlowError::InputValidation { .. }));
//! ```
use thiserror::Error;

/// Convenience result type using [`FlowError`].
pub type Result<T> = std::result::Result<T, FlowError>;

/// Whether a tool failure should be retried by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A failure expected to succeed on retry (network blip, rate limit).
    Transient,
    /// A failure that will not resolve itself with another attempt.
    Permanent,
}

/// Comprehensive error type for plan validation, compilation, and execution.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The planner exhausted its retry budget without producing a valid plan.
    #[error("plan generation failed after {attempts} attempts: {last_errors:?}")]
    PlanGeneration {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Validation or transport errors from the final attempt(s).
        last_errors: Vec<String>,
    },

    /// The decoded plan failed structural or reference-integrity validation.
    #[error("plan validation failed: {0:?}")]
    PlanValidation(Vec<crate::plan::ValidationError>),

    /// The plan→IR compiler could not produce a valid IR.
    #[error("compilation failed: {0}")]
    Compilation(String),

    /// An edge between two tool nodes has no registered join and no
    /// compatible explicit reference.
    #[error("no join registered for {from} -> {to}")]
    MissingJoin {
        /// Producing tool id.
        from: String,
        /// Consuming tool id.
        to: String,
    },

    /// A tool's resolved input failed schema validation.
    #[error("input validation failed for node '{node}': {error}")]
    InputValidation {
        /// Node whose input failed validation.
        node: String,
        /// Description of the failure.
        error: String,
    },

    /// A tool's returned output failed schema validation.
    #[error("output validation failed for node '{node}': {error}")]
    OutputValidation {
        /// Node whose output failed validation.
        node: String,
        /// Description of the failure.
        error: String,
    },

    /// An expression failed to parse or evaluate.
    #[error("expression error in node '{node}': {error}")]
    Expression {
        /// Node the expression belongs to.
        node: String,
        /// Parse or evaluation failure description.
        error: String,
    },

    /// A `Reference` pointed at a node that has not completed.
    #[error("missing reference: node '{node_id}' has not completed")]
    MissingReference {
        /// The referenced node id.
        node_id: String,
    },

    /// A tool call failed; `kind` determines retry eligibility.
    #[error("tool '{tool_id}' failed in node '{node}' ({kind:?}): {error}")]
    ToolFailure {
        /// Node that invoked the tool.
        node: String,
        /// Tool that failed.
        tool_id: String,
        /// Transient vs. permanent classification.
        kind: FailureKind,
        /// Error description from the tool.
        error: String,
    },

    /// A node's configured timeout elapsed before completion.
    #[error("node '{node}' timed out after {duration_ms}ms")]
    Timeout {
        /// Node that timed out.
        node: String,
        /// Configured timeout in milliseconds.
        duration_ms: u64,
    },

    /// A `while` loop exceeded the engine's iteration cap.
    #[error("node '{node}' exceeded loop iteration cap of {cap}")]
    LoopBound {
        /// Loop node id.
        node: String,
        /// Configured cap.
        cap: u64,
    },

    /// A `switch` node's discriminator matched no case and no default exists.
    #[error("node '{node}' discriminator matched no case and has no default")]
    NoMatch {
        /// Switch node id.
        node: String,
    },

    /// The run was cancelled.
    #[error("run cancelled")]
    Cancelled,

    /// The run suspended; not a failure, but a distinct terminal state.
    #[error("run suspended with key '{0}'")]
    Suspended(String),

    /// `resume` was called with a key that does not exist.
    #[error("unknown suspension key '{0}'")]
    UnknownSuspension(String),

    /// `resume` was called after the suspension record's TTL elapsed.
    #[error("suspension '{0}' has expired")]
    SuspensionExpired(String),

    /// `resume` was called twice for the same suspension key.
    #[error("suspension '{0}' was already consumed")]
    SuspensionAlreadyConsumed(String),

    /// The planner or model pool could not admit the request.
    #[error("pool exhausted: {0}")]
    PoolExhaustion(String),

    /// Wraps persistence-backend failures from `flowforge-checkpoint`.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] flowforge_checkpoint::error::CheckpointError),

    /// JSON (de)serialization failure at a boundary (plan decode, schema load).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Application-defined error not covered by other variants.
    #[error("{0}")]
    Custom(String),
}

impl FlowError {
    /// Build an [`FlowError::InputValidation`].
    pub fn input_validation(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::InputValidation {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Build an [`FlowError::OutputValidation`].
    pub fn output_validation(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::OutputValidation {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Build an [`FlowError::Expression`].
    pub fn expression(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Expression {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Build an [`FlowError::ToolFailure`] with explicit retry classification.
    pub fn tool_failure(
        node: impl Into<String>,
        tool_id: impl Into<String>,
        kind: FailureKind,
        error: impl Into<String>,
    ) -> Self {
        Self::ToolFailure {
            node: node.into(),
            tool_id: tool_id.into(),
            kind,
            error: error.into(),
        }
    }

    /// Returns `true` if the scheduler should retry the node that raised this
    /// error, given it still has retry budget remaining.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ToolFailure {
                kind: FailureKind::Transient,
                ..
            } | Self::Timeout { .. }
        )
    }
}
