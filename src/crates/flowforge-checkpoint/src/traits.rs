//! The persistence backend contract for durable suspension records.
//!
//! A [`Backend`] is a key/value store the engine uses to durably persist a
//! [`SuspensionRecord`] when a run suspends, and to retrieve it exactly once
//! when the run is resumed. Implementors own the storage medium (SQL,
//! Redis, an object store, a file); the engine owns serialization and never
//! inspects the bytes a custom backend chooses to store internally, beyond
//! the `SuspensionRecord` shape this crate defines.
//!
//! # Write-ahead durability
//!
//! `store` must durably commit the record before returning `Ok`. The engine
//! relies on this: it emits `flow-suspended` only after `store` succeeds, so
//! a crash between `store` and the event being observed by a caller never
//! loses the suspension.
//!
//! # Single-use consumption
//!
//! `consume` must be an atomic compare-and-set on the record's `consumed`
//! flag. Two concurrent `resume` calls racing on the same key must result
//! in exactly one `Ok` and one `Err(AlreadyConsumed)`.
//!
//! # Implementing a custom backend
//!
//! ```rust,no_run
//! use flowforge_checkpoint::{Backend, SuspensionKey, SuspensionRecord, Result};
//! use async_trait::async_trait;
//! use chrono::{DateTime, Utc};
//! use std::sync::Arc;
//!
//! struct PostgresBackend {
//!     pool: Arc<PgPool>,
//! }
//!
//! # struct PgPool;
//! #[async_trait]
//! impl Backend for PostgresBackend {
//!     async fn store(&self, key: &SuspensionKey, record: SuspensionRecord) -> Result<()> {
//!         // INSERT ... ON CONFLICT DO NOTHING, committed before returning.
//!         Ok(())
//!     }
//!
//!     async fn fetch(&self, key: &SuspensionKey) -> Result<SuspensionRecord> {
//!         unimplemented!()
//!     }
//!
//!     async fn consume(&self, key: &SuspensionKey) -> Result<SuspensionRecord> {
//!         // UPDATE ... SET consumed = true WHERE key = $1 AND consumed = false
//!         // RETURNING *, mapping zero affected rows to AlreadyConsumed/NotFound.
//!         unimplemented!()
//!     }
//!
//!     async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
//!         Ok(0)
//!     }
//! }
//! ```
use crate::error::Result;
use crate::record::{SuspensionKey, SuspensionRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable persistence contract for suspension records (§6.5).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Durably store `record` under `key`. Must commit before returning
    /// `Ok(())`; the caller treats this as write-ahead with respect to
    /// emitting `flow-suspended`.
    async fn store(&self, key: &SuspensionKey, record: SuspensionRecord) -> Result<()>;

    /// Fetch the record under `key` without marking it consumed.
    ///
    /// Returns `Err(CheckpointError::NotFound)` if no record exists.
    async fn fetch(&self, key: &SuspensionKey) -> Result<SuspensionRecord>;

    /// Atomically mark the record under `key` consumed and return it.
    ///
    /// Returns `Err(CheckpointError::NotFound)` if no record exists, or
    /// `Err(CheckpointError::AlreadyConsumed)` if a prior `consume` already
    /// claimed it. Does not itself check expiry; callers compare
    /// `record.expires_at` against the current time and surface
    /// `SuspensionExpired` themselves so the expiry clock is the caller's,
    /// not the backend's.
    async fn consume(&self, key: &SuspensionKey) -> Result<SuspensionRecord>;

    /// Delete all records whose `expires_at` is at or before `now`.
    /// Returns the number of records removed. Intended to be run
    /// periodically by a janitor task; never called inline by the
    /// suspend/resume path.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
