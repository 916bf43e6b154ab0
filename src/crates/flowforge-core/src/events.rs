//! The run's event stream (C8, §6.3): a backpressured channel of
//! lifecycle, node, and tool events a caller can subscribe to alongside
//! the run's final result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Every event a run can emit, in the order they occur.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// Emitted once, before the entry point dispatches.
    FlowStart {
        /// The run's id.
        flow_id: String,
        /// Plan metadata carried through from the source plan.
        metadata: Value,
    },
    /// Emitted once, on successful completion.
    FlowComplete {
        /// The run's id.
        flow_id: String,
        /// The entry point's resolved output.
        output: Value,
    },
    /// Emitted once, on unrecoverable failure.
    FlowError {
        /// The run's id.
        flow_id: String,
        /// Human-readable failure description.
        error: String,
    },
    /// Emitted once, when a node requests suspension.
    FlowSuspended {
        /// The run's id.
        flow_id: String,
        /// The opaque key a caller passes to resume.
        suspension_key: String,
    },
    /// Emitted once a suspended run has been resumed and is running again.
    FlowResumed {
        /// The run's id.
        flow_id: String,
        /// The suspension key that was consumed.
        suspension_key: String,
    },
    /// Emitted when a node begins dispatch.
    NodeStart {
        /// The dispatching node's id.
        node_id: String,
        /// The node's IR kind (`tool`, `parallel`, ...).
        node_type: &'static str,
    },
    /// Emitted when a node finishes successfully.
    NodeComplete {
        /// The node's id.
        node_id: String,
        /// The node's resolved output.
        output: Value,
    },
    /// Emitted when a node fails (after retries are exhausted, if any).
    NodeError {
        /// The node's id.
        node_id: String,
        /// Human-readable failure description.
        error: String,
    },
    /// Emitted immediately before a tool's `execute` is called.
    ToolStart {
        /// The invoking node's id.
        node_id: String,
        /// The tool's id.
        tool_id: String,
    },
    /// Emitted for each intermediate token a tool streams mid-call.
    ToolOutput {
        /// The invoking node's id.
        node_id: String,
        /// The tool's id.
        tool_id: String,
        /// The streamed token.
        token: Value,
    },
    /// Emitted when a tool call fails, before retry classification.
    ToolError {
        /// The invoking node's id.
        node_id: String,
        /// The tool's id.
        tool_id: String,
        /// Human-readable failure description.
        error: String,
    },
}

/// The sending half of a run's event stream. Cloned freely across
/// concurrently running branches.
#[derive(Clone)]
pub struct EventSink {
    sender: mpsc::Sender<Event>,
}

impl EventSink {
    /// Wrap a raw `mpsc::Sender`.
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Emit an event, dropping it silently if every receiver has gone
    /// away. A caller who never subscribes to the stream must not be able
    /// to stall or crash the run.
    pub async fn emit(&self, event: Event) {
        let _ = self.sender.send(event).await;
    }
}

/// Create a bounded event channel. `capacity` bounds how far the run may
/// run ahead of a slow subscriber before backpressuring node dispatch.
pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSink::new(tx), rx)
}
