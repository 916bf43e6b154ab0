//! # flowforge-llm — Planner Adapter
//!
//! Turns `(prompt, tools, joins)` into a validated [`flowforge_core::Plan`]
//! by calling a structured-output-capable model and retrying with
//! validation feedback when the response fails C4 structural validation
//! (C10, §4.10). This crate defines the [`traits::PlanningModel`] contract
//! a host implements against its own provider; it does not ship a live
//! HTTP client for any specific vendor.
//!
//! Routing and planning both require deterministic JSON decoding: free
//! text from a model is never interpreted as a plan.

pub mod config;
pub mod error;
pub mod mock;
pub mod planner;
pub mod traits;

pub use config::LlmConfig;
pub use error::{LlmError, Result};
pub use mock::MockPlanningModel;
pub use planner::{generate_plan, plan_schema, PlanGenerationError};
pub use traits::{JoinDescriptor, PlanRequest, PlanningModel, ToolDescriptor};
