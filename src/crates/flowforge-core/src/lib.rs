//! # flowforge-core — Graph Execution Subsystem
//!
//! The IR data model, plan→IR compiler, and graph scheduler that turn a
//! validated [`plan::Plan`] into a running flow: value resolution (C1),
//! variable scope (C2), the tool/join registries (C3), plan validation
//! (C4), compilation (C5), the scheduler (C6/C7), the event stream (C8),
//! and suspension/resumption (C9).
//!
//! Planning itself (turning a prompt into a `Plan`) lives in
//! `flowforge-llm`; this crate only consumes an already-decoded `Plan`.

pub mod cache;
pub mod compile;
pub mod error;
pub mod events;
pub mod expr;
pub mod ir;
pub mod plan;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod schema;
pub mod scope;
pub mod suspend;
pub mod tool;
pub mod validate;
pub mod value;

pub use compile::compile;
pub use error::{FailureKind, FlowError, Result};
pub use events::{channel as event_channel, Event, EventSink};
pub use ir::IR;
pub use plan::Plan;
pub use registry::{JoinRegistry, ToolRegistry};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use scope::Scope;
pub use suspend::{SuspensionManager, SuspensionRequest};
pub use tool::{CancellationToken, Join, SuspendSignal, Tool, ToolCallError, ToolContext, ToolOutcome};
