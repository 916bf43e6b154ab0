//! Exercises the full suspend → store → fetch → consume → resume lifecycle
//! against the in-memory backend through the crate's public API only,
//! including the single-use guarantee and TTL expiry (§4.9, §6.5).

use chrono::{Duration, Utc};
use flowforge_checkpoint::{Backend, CheckpointError, FrozenState, InMemoryBackend, SuspensionKey, SuspensionRecord};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn approval_state(ir_hash: &str) -> FrozenState {
    FrozenState {
        ir_hash: ir_hash.into(),
        node_id: "request-approval".into(),
        completed_outputs: HashMap::new(),
        scope_snapshot: json!({"draft": "a report"}),
        pending_branch_state: json!(null),
        payload: json!({"prompt": "approve this draft?"}),
        await_kind: "approval".into(),
    }
}

#[tokio::test]
async fn a_suspended_run_can_be_fetched_then_consumed_exactly_once() {
    let backend = InMemoryBackend::new();
    let key = SuspensionKey::new();
    let now = Utc::now();
    let record = SuspensionRecord::new(approval_state("ir-1"), now, now + Duration::minutes(30));

    backend.store(&key, record).await.expect("store is write-ahead durable");

    // Fetching before resume must not consume the record.
    let peeked = backend.fetch(&key).await.unwrap();
    assert!(!peeked.consumed);
    assert_eq!(peeked.state.await_kind, "approval");
    assert_eq!(peeked.state.ir_hash, "ir-1");

    let consumed = backend.consume(&key).await.unwrap();
    assert!(consumed.consumed);
    assert_eq!(consumed.state.node_id, "request-approval");

    let second_attempt = backend.consume(&key).await.unwrap_err();
    assert!(matches!(second_attempt, CheckpointError::AlreadyConsumed(_)));
}

#[tokio::test]
async fn resuming_an_expired_suspension_is_left_to_the_caller_to_detect() {
    // The backend's `consume` does not itself check expiry (§6.5 doc
    // comment on `Backend::consume`) — the caller compares `expires_at`
    // against "now" itself, the way `SuspensionManager::resume` does.
    let backend = InMemoryBackend::new();
    let key = SuspensionKey::new();
    let now = Utc::now();
    let record = SuspensionRecord::new(approval_state("ir-1"), now - Duration::hours(2), now - Duration::hours(1));
    backend.store(&key, record).await.unwrap();

    let consumed = backend.consume(&key).await.unwrap();
    assert!(consumed.is_expired(Utc::now()));
}

#[tokio::test]
async fn janitor_sweep_only_removes_expired_records() {
    let backend = InMemoryBackend::new();
    let now = Utc::now();

    let live_key = SuspensionKey::new();
    backend
        .store(&live_key, SuspensionRecord::new(approval_state("ir-1"), now, now + Duration::hours(1)))
        .await
        .unwrap();

    let expired_key = SuspensionKey::new();
    backend
        .store(&expired_key, SuspensionRecord::new(approval_state("ir-1"), now - Duration::hours(2), now - Duration::hours(1)))
        .await
        .unwrap();

    assert_eq!(backend.len().await, 2);
    let removed = backend.delete_expired(now).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(backend.len().await, 1);

    assert!(backend.fetch(&live_key).await.is_ok());
    assert!(matches!(backend.fetch(&expired_key).await.unwrap_err(), CheckpointError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_resume_attempts_for_the_same_key_yield_one_winner() {
    let backend = Arc::new(InMemoryBackend::new());
    let key = SuspensionKey::new();
    let now = Utc::now();
    backend
        .store(&key, SuspensionRecord::new(approval_state("ir-1"), now, now + Duration::minutes(5)))
        .await
        .unwrap();

    let attempts = (0..8).map(|_| {
        let backend = backend.clone();
        let key = key.clone();
        tokio::spawn(async move { backend.consume(&key).await })
    });
    let outcomes: Vec<_> = futures::future::join_all(attempts).await.into_iter().map(Result::unwrap).collect();

    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    let losers = outcomes
        .iter()
        .filter(|r| matches!(r, Err(CheckpointError::AlreadyConsumed(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, 7);
}
