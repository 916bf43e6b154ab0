//! The tool and join contracts external collaborators implement (§6.4).
//!
//! Tools and joins are supplied by the host application; this crate only
//! defines the traits the scheduler and invocation runtime (C7) call
//! against. Implementations are expected to be cheap to clone behind an
//! `Arc` and safe to call concurrently from multiple branches.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply-cloneable flag a scheduler flips to request cooperative
/// cancellation of everything holding a clone. Deliberately minimal rather
/// than pulling in `tokio-util` for a single primitive.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Flip the token to cancelled. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `cancel` has been called on this token or any clone of it.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A signal a tool returns instead of a normal output to request the run
/// suspend at this node (§4.7, §4.9).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SuspendSignal {
    /// Opaque, tool-defined payload describing what is being awaited
    /// (e.g. an approval prompt).
    pub payload: Value,
    /// A tool-defined tag classifying the kind of suspension, echoed back
    /// in the persisted record.
    pub await_kind: String,
}

/// What a tool call produced: either it ran to completion, or it is asking
/// the run to suspend.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// The tool completed; the value has already passed output validation.
    Success(Value),
    /// The tool is requesting suspension; C9 takes over from here.
    Suspend(SuspendSignal),
}

/// A raw failure from a tool's `execute`, before C11 classifies it.
#[derive(Debug, Clone)]
pub struct ToolCallError {
    /// Human-readable failure description.
    pub message: String,
    /// Whether the tool itself believes this is worth retrying.
    pub transient: bool,
}

impl ToolCallError {
    /// Construct a transient failure (safe to retry).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }

    /// Construct a permanent failure (retrying will not help).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolCallError {}

/// An intermediate token a tool may emit mid-call, surfaced to callers
/// through the event stream (C8) without being part of the tool's final
/// output.
#[derive(Debug, Clone)]
pub struct IntermediateToken(pub Value);

/// A channel handle tools use to emit intermediate tokens while running.
/// Cloned freely; a no-op sink is provided for tests.
#[derive(Clone)]
pub struct TokenEmitter {
    sender: tokio::sync::mpsc::Sender<IntermediateToken>,
}

impl TokenEmitter {
    /// Wrap a raw `mpsc::Sender`.
    pub fn new(sender: tokio::sync::mpsc::Sender<IntermediateToken>) -> Self {
        Self { sender }
    }

    /// Emit a token, dropping it silently if the receiver has gone away
    /// (the run has already terminated).
    pub async fn emit(&self, token: Value) {
        let _ = self.sender.send(IntermediateToken(token)).await;
    }
}

/// The execution context passed to a tool's `execute` (§6.4).
#[derive(Clone)]
pub struct ToolContext {
    /// Identifies the overall run.
    pub flow_id: String,
    /// Identifies the node invoking this tool.
    pub node_id: String,
    /// Identifies the caller-supplied session, if any.
    pub session_id: Option<String>,
    /// A read-only snapshot of the scope active at invocation time.
    pub scope_snapshot: Value,
    /// Cooperative cancellation signal.
    pub cancellation: CancellationToken,
    /// Sink for intermediate tokens.
    pub emitter: TokenEmitter,
}

/// An externally supplied capability with typed input/output schemas.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier used by plan `tool` nodes and join registration.
    fn id(&self) -> &str;
    /// Human-readable name.
    fn name(&self) -> &str;
    /// Human-readable description, surfaced to the planner adapter (C10).
    fn description(&self) -> &str;
    /// Structural schema the resolved input must satisfy.
    fn input_schema(&self) -> &Value;
    /// Structural schema the produced output must satisfy.
    fn output_schema(&self) -> &Value;
    /// Structural schema a resume value must satisfy, if this tool can
    /// suspend. `None` means this tool never suspends.
    fn resume_schema(&self) -> Option<&Value> {
        None
    }
    /// Run the tool against `input`, yielding either a value (still
    /// subject to output validation by the caller) or a suspend signal.
    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolCallError>;
}

/// A registered transform between two tools' schemas, inserted
/// automatically by the compiler when a data-shape mismatch would
/// otherwise occur (§4.3, §6.4).
pub trait Join: Send + Sync {
    /// The producing tool's id.
    fn from_tool_id(&self) -> &str;
    /// The consuming tool's id.
    fn to_tool_id(&self) -> &str;
    /// Transform a `from_tool_id` output into a `to_tool_id` input. The
    /// only direction the scheduler calls.
    fn decode(&self, from: &Value) -> Result<Value, ToolCallError>;
    /// The inverse transform, used only by round-trip tests (§8).
    fn encode(&self, to: &Value) -> Result<Value, ToolCallError>;
}
