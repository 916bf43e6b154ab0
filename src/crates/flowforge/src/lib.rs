//! # flowforge — plan, compile, and run an AI flow end to end
//!
//! This crate is the facade over the four lower crates that each own one
//! slice of the graph execution subsystem:
//!
//! - `flowforge-llm` turns a prompt into a validated [`flowforge_core::Plan`]
//!   (C10 — structured-output planning with schema-validated retry).
//! - `flowforge-core` compiles that plan into an [`flowforge_core::IR`] and
//!   schedules it (C1–C9 — the IR data model, compiler, and scheduler).
//! - `flowforge-checkpoint` durably persists a suspended run so a later
//!   process can resume it (C9's storage half).
//! - `flowforge-tooling` supplies the ambient config/error/serialization
//!   plumbing the other three build on.
//!
//! [`Engine`] is the entry point. Build one over a [`flowforge_core::ToolRegistry`],
//! a [`flowforge_core::JoinRegistry`], a [`flowforge_llm::PlanningModel`], and a
//! [`flowforge_checkpoint::Backend`], then drive it with one of three calls:
//!
//! ```rust,no_run
//! # async fn example(engine: flowforge::Engine) -> flowforge::Result<()> {
//! use flowforge::RunOptions;
//! use tokio_stream::StreamExt;
//!
//! // Plan, compile, and run in one call; observe events live.
//! let mut events = engine.execute("summarize the attached report", RunOptions::default()).await?;
//! while let Some(event) = events.next().await {
//!     println!("{event:?}");
//! }
//!
//! // Or split planning from running to inspect the plan first.
//! let instance = engine.generate("summarize the attached report").await?;
//! let output = instance.run_collect(None, RunOptions::default()).await?;
//! # let _ = output;
//!
//! // A run that suspended earlier resumes by its key.
//! // engine.resume(key, resume_input, RunOptions::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! prompt ──▶ flowforge-llm::generate_plan ──▶ Plan
//!                                              │
//!                                   flowforge-core::compile
//!                                              │
//!                                              ▼
//!                                             IR  ──cached by hash──▶ Engine
//!                                              │
//!                            dedicated thread + current-thread runtime
//!                                              │
//!                                   flowforge-core::Scheduler::run
//!                                              │
//!                                              ▼
//!                                    EventStream (flow-start … flow-complete
//!                                                 | flow-error | flow-suspended)
//! ```
//!
//! A suspended run's [`flowforge_checkpoint::SuspensionKey`] is handed back
//! to the caller inside a `flow-suspended` event; passing it to
//! [`Engine::resume`] later reconstructs the same [`flowforge_core::IR`]
//! from the engine's cache and continues the scheduler from the suspended
//! node (§4.9).

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::{Engine, EventStream, Instance, RunOptions};
pub use error::{FacadeError, Result};

pub use flowforge_checkpoint::{Backend, SuspensionKey};
pub use flowforge_core::{Event, JoinRegistry, Plan, ToolRegistry};
pub use flowforge_llm::{LlmConfig, MockPlanningModel, PlanningModel};
