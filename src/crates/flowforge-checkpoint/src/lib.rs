//! # flowforge-checkpoint — Suspension Persistence
//!
//! Defines the [`Backend`] contract a host application implements to
//! durably persist suspended runs, and ships [`InMemoryBackend`] as a
//! reference implementation for tests and single-process deployments.
//!
//! ## Core concepts
//!
//! - [`SuspensionKey`] — an opaque, cryptographically random token
//!   identifying a suspended run.
//! - [`SuspensionRecord`] — the durable envelope: frozen execution state,
//!   timestamps, and a single-use `consumed` flag.
//! - [`Backend`] — `store` / `fetch` / `consume` / `delete_expired`, with
//!   write-ahead durability and atomic single-use consumption as the two
//!   load-bearing guarantees.
//!
//! ## Example
//!
//! ```rust
//! use flowforge_checkpoint::{Backend, InMemoryBackend, SuspensionKey, SuspensionRecord, FrozenState};
//! use chrono::Utc;
//! use std::collections::HashMap;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = InMemoryBackend::new();
//! let key = SuspensionKey::new();
//! let state = FrozenState {
//!     ir_hash: "abc".into(),
//!     node_id: "approve".into(),
//!     completed_outputs: HashMap::new(),
//!     scope_snapshot: serde_json::json!({}),
//!     pending_branch_state: serde_json::json!({}),
//!     payload: serde_json::json!({"prompt": "approve?"}),
//!     await_kind: "approval".into(),
//! };
//! let now = Utc::now();
//! let record = SuspensionRecord::new(state, now, now + chrono::Duration::minutes(30));
//!
//! backend.store(&key, record).await.unwrap();
//! let resumed = backend.consume(&key).await.unwrap();
//! assert_eq!(resumed.state.node_id, "approve");
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{CheckpointError, Result};
pub use memory::InMemoryBackend;
pub use record::{FrozenState, SuspensionKey, SuspensionRecord};
pub use traits::Backend;
