//! The frozen state written to the backend when a run suspends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Opaque key identifying a suspension record. Minted by C9 as a random
/// UUID; callers treat it as an opaque token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuspensionKey(pub String);

impl SuspensionKey {
    /// Mint a fresh, cryptographically random key.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for SuspensionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SuspensionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SuspensionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SuspensionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The frozen execution state captured at the moment a tool signals
/// suspension, per §4.9: the suspending node, every completed node's
/// output, the current scope snapshot, and pending branch state for any
/// enclosing composite nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrozenState {
    /// Hash of the IR this run was executing, so resume can detect a stale
    /// or mismatched engine version.
    pub ir_hash: String,
    /// The node that raised the suspend signal.
    pub node_id: String,
    /// Outputs of every node that had completed before the suspend.
    pub completed_outputs: HashMap<String, Value>,
    /// Serialized snapshot of the scope chain active at the suspend point.
    pub scope_snapshot: Value,
    /// Serialized state needed to resume any enclosing composite nodes
    /// (e.g. which parallel branches had already finished).
    pub pending_branch_state: Value,
    /// The tool-supplied payload describing what is being awaited.
    pub payload: Value,
    /// The tool-declared `awaitKind`, echoed back to callers inspecting the
    /// suspension before resuming.
    pub await_kind: String,
}

/// A stored suspension record: the frozen state plus backend bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspensionRecord {
    /// The frozen execution state.
    pub state: FrozenState,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
    /// When the record becomes unresumable.
    pub expires_at: DateTime<Utc>,
    /// Set by `consume` the first time `resume` succeeds; guards the
    /// single-use contract.
    pub consumed: bool,
}

impl SuspensionRecord {
    /// Build a fresh, unconsumed record.
    pub fn new(state: FrozenState, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            state,
            created_at,
            expires_at,
            consumed: false,
        }
    }

    /// Whether `now` is past this record's expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
