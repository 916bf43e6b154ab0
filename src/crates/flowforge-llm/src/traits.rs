//! The contract a planner adapter implementation fulfils (C10, §4.10).
//!
//! Deliberately narrower than a general chat-completion client: C10 only
//! ever needs one structured-output call per attempt, never streaming or
//! free-form chat, so [`PlanningModel`] exposes exactly that.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A tool surfaced to the model as something it may reference from a
/// generated plan's `tool_id` fields. Built from the host's
/// `flowforge_core::registry::ToolRegistry` by the caller of
/// [`crate::planner::generate_plan`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolDescriptor {
    /// Stable id the generated plan must reference verbatim.
    pub id: String,
    /// Human-readable name shown to the model.
    pub name: String,
    /// What the tool does and when to use it.
    pub description: String,
    /// The shape of input the tool accepts.
    pub input_schema: Value,
    /// The shape of output the tool produces.
    pub output_schema: Value,
}

/// A join registered between two tools, surfaced so the model knows a
/// schema mismatch between them is already bridged and does not need an
/// extra adapter node of its own.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JoinDescriptor {
    /// The producing tool's id.
    pub from_tool_id: String,
    /// The consuming tool's id.
    pub to_tool_id: String,
}

/// One structured-output request for a `Plan`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanRequest {
    /// The natural-language goal the plan should accomplish.
    pub prompt: String,
    /// Tools the generated plan may reference.
    pub tools: Vec<ToolDescriptor>,
    /// Joins already bridging tool pairs in the registry.
    pub joins: Vec<JoinDescriptor>,
    /// The JSON Schema the model's response must conform to (the `Plan`
    /// schema, §3.1).
    pub plan_schema: Value,
    /// Validation errors from the previous attempt, if any, so the model
    /// can self-correct instead of repeating the same mistake.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_feedback: Vec<String>,
}

/// A model capable of producing a structured-output `Plan` candidate.
///
/// Implementations wrap a specific provider's HTTP API; this crate ships
/// none by default (see [`crate::mock::MockPlanningModel`] for tests) in
/// the same way the orchestration layer below it never bundles a live LLM
/// client — callers bring their own.
#[async_trait]
pub trait PlanningModel: Send + Sync {
    /// Ask the model for one plan candidate. The returned `Value` is
    /// expected (but not guaranteed) to decode as a `Plan`; schema and C4
    /// validation happen in [`crate::planner::generate_plan`], not here.
    async fn generate_plan(&self, request: PlanRequest) -> Result<Value>;
}
