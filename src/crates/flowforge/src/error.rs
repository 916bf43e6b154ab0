//! The facade's top-level error: aggregates every heterogeneous failure a
//! caller of [`crate::Engine`] can hit. Per-crate typed errors
//! (`FlowError`, `LlmError`, `CheckpointError`, `ToolingError`) stay
//! precise at their own boundary; this enum only exists at the point
//! where callers need one `Result` type to match against.

use thiserror::Error;

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, FacadeError>;

/// Everything that can go wrong running a flow end to end.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// The planner exhausted its retry budget without a valid plan.
    #[error("planning failed: {0}")]
    Planning(#[from] flowforge_llm::PlanGenerationError),

    /// Plan compilation or execution failed.
    #[error(transparent)]
    Flow(#[from] flowforge_core::FlowError),

    /// A suspension backend operation failed.
    #[error(transparent)]
    Checkpoint(#[from] flowforge_checkpoint::CheckpointError),

    /// Engine configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] flowforge_tooling::ToolingError),

    /// Anything else, wrapped with context at the call site that noticed
    /// it — the one place in this workspace that reaches for `anyhow`
    /// rather than a typed variant (§10.1).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
