//! The C10 retry loop: turn `(prompt, tools, joins)` into a validated
//! [`Plan`], retrying with validation feedback when the model's JSON
//! fails C4 structural validation.

use flowforge_core::plan::Plan;
use flowforge_core::registry::{JoinRegistry, ToolRegistry};
use flowforge_core::validate;
use std::sync::Arc;

use crate::traits::{JoinDescriptor, PlanRequest, PlanningModel, ToolDescriptor};

/// A plan schema the planner adapter asks the model to conform to.
/// Kept abstract here; callers typically derive this from `schemars` or
/// hand-author it alongside the `Plan` type.
pub fn plan_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "required": ["version", "nodes", "rootIds"],
        "properties": {
            "version": {"type": "string"},
            "nodes": {"type": "array"},
            "edges": {"type": "array"},
            "rootIds": {"type": "array", "items": {"type": "string"}}
        }
    })
}

/// The planner exhausted its retry budget without producing a plan that
/// passes C4 validation.
#[derive(Debug, Clone)]
pub struct PlanGenerationError {
    /// Number of generation attempts made.
    pub attempts: u32,
    /// Validation or decode errors from the final attempt, in order.
    pub last_errors: Vec<String>,
}

impl std::fmt::Display for PlanGenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "plan generation failed after {} attempt(s): {}",
            self.attempts,
            self.last_errors.join("; ")
        )
    }
}

impl std::error::Error for PlanGenerationError {}

fn describe_tools(tools: &ToolRegistry) -> Vec<ToolDescriptor> {
    let mut ids = tools.ids();
    ids.sort();
    ids.into_iter()
        .filter_map(|id| {
            let tool = tools.get(&id)?;
            Some(ToolDescriptor {
                id: tool.id().to_string(),
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema().clone(),
                output_schema: tool.output_schema().clone(),
            })
        })
        .collect()
}

/// Given `(prompt, tools, joins)`, call `model` up to `max_attempts` times,
/// validating each candidate against C4 and retrying with the prior
/// attempt's errors folded into the next prompt (§4.10). Returns either a
/// validated `Plan` or the accumulated failure.
pub async fn generate_plan(
    model: &dyn PlanningModel,
    tools: &Arc<ToolRegistry>,
    joins: &Arc<JoinRegistry>,
    prompt: &str,
    max_attempts: u32,
) -> Result<Plan, PlanGenerationError> {
    let tool_descriptors = describe_tools(tools);
    let join_descriptors: Vec<JoinDescriptor> = tool_descriptors
        .iter()
        .flat_map(|from| {
            tool_descriptors.iter().filter_map(move |to| {
                joins
                    .get(&from.id, &to.id)
                    .map(|_| JoinDescriptor { from_tool_id: from.id.clone(), to_tool_id: to.id.clone() })
            })
        })
        .collect();
    let schema = plan_schema();

    let mut validation_feedback = Vec::new();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let request = PlanRequest {
            prompt: prompt.to_string(),
            tools: tool_descriptors.clone(),
            joins: join_descriptors.clone(),
            plan_schema: schema.clone(),
            validation_feedback: validation_feedback.clone(),
        };

        let candidate = match model.generate_plan(request).await {
            Ok(value) => value,
            Err(err) => {
                validation_feedback = vec![err.to_string()];
                if attempts >= max_attempts || !err.is_retryable() {
                    return Err(PlanGenerationError { attempts, last_errors: validation_feedback });
                }
                tracing::warn!(attempt = attempts, error = %err, "planner call failed, retrying");
                continue;
            }
        };

        let plan: Plan = match serde_json::from_value(candidate) {
            Ok(plan) => plan,
            Err(err) => {
                validation_feedback = vec![format!("response did not decode as a Plan: {err}")];
                if attempts >= max_attempts {
                    return Err(PlanGenerationError { attempts, last_errors: validation_feedback });
                }
                tracing::warn!(attempt = attempts, error = %err, "planner response failed to decode");
                continue;
            }
        };

        let errors = validate::validate(&plan, tools);
        if errors.is_empty() {
            return Ok(plan);
        }

        validation_feedback = errors
            .iter()
            .map(|e| {
                let path = e.path.join(".");
                match &e.suggestion {
                    Some(hint) => format!("{path}: expected {}, found {} ({hint})", e.expected, e.actual),
                    None => format!("{path}: expected {}, found {}", e.expected, e.actual),
                }
            })
            .collect();

        if attempts >= max_attempts {
            return Err(PlanGenerationError { attempts, last_errors: validation_feedback });
        }
        tracing::warn!(attempt = attempts, errors = validation_feedback.len(), "plan failed validation, retrying");
    }
}
