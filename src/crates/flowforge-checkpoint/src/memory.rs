//! An in-memory [`Backend`] implementation, suitable for tests and single-
//! process deployments that do not need the suspension ledger to survive a
//! restart.

use crate::error::{CheckpointError, Result};
use crate::record::{SuspensionKey, SuspensionRecord};
use crate::traits::Backend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Backend storing suspension records in a process-local map behind an
/// `RwLock`. `consume` takes the write lock so the compare-and-set on
/// `consumed` is atomic with respect to concurrent `resume` calls.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: Arc<RwLock<HashMap<SuspensionKey, SuspensionRecord>>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of records currently held, consumed or not. Test helper.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Whether the backend holds no records. Test helper.
    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn store(&self, key: &SuspensionKey, record: SuspensionRecord) -> Result<()> {
        let mut guard = self.storage.write().await;
        guard.insert(key.clone(), record);
        Ok(())
    }

    async fn fetch(&self, key: &SuspensionKey) -> Result<SuspensionRecord> {
        let guard = self.storage.read().await;
        guard
            .get(key)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(key.to_string()))
    }

    async fn consume(&self, key: &SuspensionKey) -> Result<SuspensionRecord> {
        let mut guard = self.storage.write().await;
        let record = guard
            .get_mut(key)
            .ok_or_else(|| CheckpointError::NotFound(key.to_string()))?;
        if record.consumed {
            return Err(CheckpointError::AlreadyConsumed(key.to_string()));
        }
        record.consumed = true;
        Ok(record.clone())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut guard = self.storage.write().await;
        let before = guard.len();
        guard.retain(|_, record| !record.is_expired(now));
        Ok((before - guard.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FrozenState;
    use std::collections::HashMap as StdHashMap;

    fn sample_record(ttl_secs: i64) -> SuspensionRecord {
        let state = FrozenState {
            ir_hash: "h1".into(),
            node_id: "approve".into(),
            completed_outputs: StdHashMap::new(),
            scope_snapshot: serde_json::json!({}),
            pending_branch_state: serde_json::json!({}),
            payload: serde_json::json!({"prompt": "approve?"}),
            await_kind: "approval".into(),
        };
        let now = Utc::now();
        SuspensionRecord::new(state, now, now + chrono::Duration::seconds(ttl_secs))
    }

    #[tokio::test]
    async fn store_then_fetch_round_trips() {
        let backend = InMemoryBackend::new();
        let key = SuspensionKey::new();
        backend.store(&key, sample_record(60)).await.unwrap();

        let fetched = backend.fetch(&key).await.unwrap();
        assert_eq!(fetched.state.node_id, "approve");
        assert!(!fetched.consumed);
    }

    #[tokio::test]
    async fn fetch_missing_key_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = backend.fetch(&SuspensionKey::new()).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let backend = InMemoryBackend::new();
        let key = SuspensionKey::new();
        backend.store(&key, sample_record(60)).await.unwrap();

        let first = backend.consume(&key).await.unwrap();
        assert!(first.consumed);

        let second = backend.consume(&key).await.unwrap_err();
        assert!(matches!(second, CheckpointError::AlreadyConsumed(_)));
    }

    #[tokio::test]
    async fn delete_expired_removes_only_expired_records() {
        let backend = InMemoryBackend::new();
        let fresh_key = SuspensionKey::new();
        let stale_key = SuspensionKey::new();
        backend.store(&fresh_key, sample_record(3600)).await.unwrap();
        backend.store(&stale_key, sample_record(-1)).await.unwrap();

        let removed = backend.delete_expired(Utc::now()).await.unwrap();
        assert_eq!(removed, 1);
        assert!(backend.fetch(&fresh_key).await.is_ok());
        assert!(backend.fetch(&stale_key).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_consume_yields_exactly_one_winner() {
        let backend = Arc::new(InMemoryBackend::new());
        let key = SuspensionKey::new();
        backend.store(&key, sample_record(60)).await.unwrap();

        let b1 = backend.clone();
        let b2 = backend.clone();
        let k1 = key.clone();
        let k2 = key.clone();

        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { b1.consume(&k1).await }),
            tokio::spawn(async move { b2.consume(&k2).await }),
        );

        let results = [r1.unwrap(), r2.unwrap()];
        let ok_count = results.iter().filter(|r| r.is_ok()).count();
        let err_count = results
            .iter()
            .filter(|r| matches!(r, Err(CheckpointError::AlreadyConsumed(_))))
            .count();
        assert_eq!(ok_count, 1);
        assert_eq!(err_count, 1);
    }
}
