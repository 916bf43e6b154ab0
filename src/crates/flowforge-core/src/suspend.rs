//! Suspension and resumption (C9, §4.7, §4.9).
//!
//! Bridges the scheduler to a [`flowforge_checkpoint::Backend`]: freezing
//! enough state to resume at the exact suspended node, and validating a
//! resume attempt (unknown key, expired, already consumed) before handing
//! control back to the scheduler.

use crate::error::{FlowError, Result};
use crate::scope::Scope;
use crate::tool::SuspendSignal;
use chrono::{Duration as ChronoDuration, Utc};
use flowforge_checkpoint::{Backend, FrozenState, SuspensionKey, SuspensionRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the scheduler needs to freeze a run at a suspended node.
pub struct SuspensionRequest<'a> {
    /// Digest of the IR the run was compiled from, checked on resume.
    pub ir_hash: String,
    /// The node that requested suspension.
    pub node_id: String,
    /// Outputs of every node that had completed before suspension.
    pub completed_outputs: HashMap<String, Value>,
    /// Full scope chain snapshot active at the suspended node.
    pub scope: &'a Scope,
    /// Opaque scheduler-defined state needed to resume a parallel/loop
    /// node mid-flight (e.g. which branches had already finished).
    pub pending_branch_state: Option<Value>,
    /// The tool-supplied suspend signal.
    pub signal: SuspendSignal,
}

/// Coordinates suspension and resumption against a [`Backend`].
pub struct SuspensionManager {
    backend: Arc<dyn Backend>,
    ttl: ChronoDuration,
}

impl SuspensionManager {
    /// Build a manager over `backend`, suspending with the given `ttl`.
    pub fn new(backend: Arc<dyn Backend>, ttl: ChronoDuration) -> Self {
        Self { backend, ttl }
    }

    /// Freeze `request` and return the key a caller must present to
    /// [`SuspensionManager::resume`].
    pub async fn suspend(&self, request: SuspensionRequest<'_>) -> Result<SuspensionKey> {
        let frozen = FrozenState {
            ir_hash: request.ir_hash,
            node_id: request.node_id,
            completed_outputs: request.completed_outputs,
            scope_snapshot: request.scope.snapshot(),
            pending_branch_state: request.pending_branch_state.unwrap_or(Value::Null),
            payload: request.signal.payload,
            await_kind: request.signal.await_kind,
        };
        let key = SuspensionKey::new();
        let now = Utc::now();
        let record = SuspensionRecord::new(frozen, now, now + self.ttl);
        self.backend.store(&key, record).await?;
        Ok(key)
    }

    /// Atomically consume the suspension for `key`, validating that it
    /// exists, has not expired, and has not already been resumed.
    pub async fn resume(&self, key: &SuspensionKey) -> Result<FrozenState> {
        let record = self
            .backend
            .consume(key)
            .await
            .map_err(|e| classify_consume_error(key, e))?;
        if record.is_expired(Utc::now()) {
            return Err(FlowError::SuspensionExpired(key.to_string()));
        }
        Ok(record.state)
    }
}

fn classify_consume_error(key: &SuspensionKey, err: flowforge_checkpoint::error::CheckpointError) -> FlowError {
    use flowforge_checkpoint::error::CheckpointError;
    match err {
        CheckpointError::NotFound(_) => FlowError::UnknownSuspension(key.to_string()),
        CheckpointError::Expired(_) => FlowError::SuspensionExpired(key.to_string()),
        CheckpointError::AlreadyConsumed(_) => FlowError::SuspensionAlreadyConsumed(key.to_string()),
        other => FlowError::Checkpoint(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowforge_checkpoint::InMemoryBackend;
    use serde_json::json;

    fn sample_request(scope: &Scope) -> SuspensionRequest<'_> {
        SuspensionRequest {
            ir_hash: "hash1".into(),
            node_id: "n1".into(),
            completed_outputs: HashMap::new(),
            scope,
            pending_branch_state: None,
            signal: SuspendSignal {
                payload: json!({"prompt": "approve?"}),
                await_kind: "approval".into(),
            },
        }
    }

    #[tokio::test]
    async fn suspend_then_resume_round_trips_the_payload() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = SuspensionManager::new(backend, ChronoDuration::minutes(5));
        let scope = Scope::root();
        scope.set("x", json!(1));

        let key = manager.suspend(sample_request(&scope)).await.unwrap();
        let state = manager.resume(&key).await.unwrap();
        assert_eq!(state.payload, json!({"prompt": "approve?"}));
        assert_eq!(state.await_kind, "approval");
    }

    #[tokio::test]
    async fn resuming_twice_fails_the_second_time() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = SuspensionManager::new(backend, ChronoDuration::minutes(5));
        let scope = Scope::root();

        let key = manager.suspend(sample_request(&scope)).await.unwrap();
        manager.resume(&key).await.unwrap();
        let err = manager.resume(&key).await.unwrap_err();
        assert!(matches!(err, FlowError::SuspensionAlreadyConsumed(_)));
    }

    #[tokio::test]
    async fn resuming_an_unknown_key_fails() {
        let backend = Arc::new(InMemoryBackend::new());
        let manager = SuspensionManager::new(backend, ChronoDuration::minutes(5));
        let err = manager.resume(&SuspensionKey::new()).await.unwrap_err();
        assert!(matches!(err, FlowError::UnknownSuspension(_)));
    }
}
