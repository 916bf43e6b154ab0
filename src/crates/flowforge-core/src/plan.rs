//! The `Plan` data model: the LLM's structured output (§3.1, §6.2).
//!
//! A `Plan` uses **flat references** — composite nodes name child node ids
//! rather than embedding them — so the whole document decodes as a list of
//! nodes plus a list of edges, with containment resolved later by the
//! compiler (C5).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A decoded, not-yet-validated plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Plan schema version, for forward compatibility.
    pub version: String,
    /// Free-form metadata surfaced in `flow-start`.
    #[serde(default)]
    pub metadata: Value,
    /// Every node in the plan, keyed by `id` once validated.
    pub nodes: Vec<PlanNode>,
    /// Control-flow edges between top-level nodes.
    #[serde(default)]
    pub edges: Vec<PlanEdge>,
    /// Ids of the nodes with no incoming control-flow dependency.
    pub root_ids: Vec<String>,
}

/// An unlabeled control-flow edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanEdge {
    /// Source node id.
    pub from: String,
    /// Target node id.
    pub to: String,
}

/// A single plan node: an id plus one of the closed operator kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanNode {
    /// Unique, non-empty id.
    pub id: String,
    /// The operator and its operator-specific fields.
    #[serde(flatten)]
    pub kind: PlanNodeKind,
    /// Scope variable the node's result is stored under, if any.
    #[serde(default)]
    pub output_var: Option<String>,
    /// Per-node scheduling overrides (§6.6).
    #[serde(default)]
    pub config: Option<PlanNodeConfig>,
}

/// Per-node configuration overrides, falling back to engine defaults when
/// absent (§4.6, §6.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PlanNodeConfig {
    /// Milliseconds before the node's invocation is aborted.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Number of retry attempts for `Transient` failures.
    #[serde(default)]
    pub retries: Option<u32>,
    /// Milliseconds to wait between retry attempts.
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    /// Whether to memoize this node's output for the duration of the run.
    #[serde(default)]
    pub cache: bool,
    /// Whether a loop/parallel node's children may run concurrently.
    #[serde(default)]
    pub parallel: bool,
    /// Concurrency cap when `parallel` is set.
    #[serde(default)]
    pub concurrency: Option<u32>,
}

/// The closed set of operator kinds a plan node may be (§3.1, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlanNodeKind {
    /// Invoke a single tool.
    Tool {
        /// Tool id, must be registered in C3.
        tool_id: String,
        /// Input expressions, keyed by the tool's input field names.
        #[serde(default)]
        inputs: HashMap<String, Value>,
    },
    /// Run the listed nodes concurrently, joined `all`.
    Parallel {
        /// Child node ids to run concurrently.
        parallel_ids: Vec<String>,
        /// How to combine branch results (§4.6).
        #[serde(default)]
        join_strategy: JoinStrategy,
    },
    /// Branch on a boolean expression.
    #[serde(rename = "if-then")]
    IfThen {
        /// Expression evaluated via C1.
        condition: String,
        /// Child ids to run when `condition` is truthy.
        if_true: Vec<String>,
        /// Child ids to run when `condition` is falsy.
        #[serde(default)]
        if_false: Vec<String>,
    },
    /// Select a branch by literal match on a discriminator value.
    Switch {
        /// Value (or variable reference) to match against `cases`.
        discriminator: Value,
        /// Case value (as a string key) to child node ids.
        cases: HashMap<String, Vec<String>>,
        /// Child ids to run when no case matches.
        #[serde(default)]
        default: Option<Vec<String>>,
    },
    /// Produce a mapped list from a collection.
    Map {
        /// Collection expression to iterate.
        collection: Value,
        /// Iterator variable name bound per element.
        #[serde(rename = "as")]
        iterator_var: String,
        /// Body node ids run once per element.
        body: Vec<String>,
        /// Whether iterations may run concurrently.
        #[serde(default)]
        parallel: bool,
        /// Concurrency cap when `parallel` is set.
        #[serde(default)]
        concurrency: Option<u32>,
    },
    /// Produce a filtered list from a collection.
    Filter {
        /// Collection expression to iterate.
        collection: Value,
        /// Predicate expression evaluated per element, if not using `body`.
        #[serde(default)]
        condition: Option<String>,
        /// Body node ids producing a truthy/falsy result per element, if
        /// not using `condition`.
        #[serde(default)]
        body: Option<Vec<String>>,
        /// Iterator variable name bound per element.
        #[serde(rename = "as")]
        iterator_var: String,
    },
    /// Sequentially fold a collection into a single accumulator.
    Reduce {
        /// Collection expression to iterate.
        collection: Value,
        /// Iterator variable name bound per element.
        #[serde(rename = "as")]
        iterator_var: String,
        /// Scope variable name the running accumulator is bound to.
        accumulator: String,
        /// Initial accumulator value.
        initial: Value,
        /// Body node ids run once per element, producing the next
        /// accumulator value.
        body: Vec<String>,
    },
    /// Iterate over a collection (`for`) or while a condition holds
    /// (`while`).
    Loop {
        /// Body node ids run each iteration.
        body: Vec<String>,
        /// Collection to iterate, for a `for`-style loop.
        #[serde(default)]
        collection: Option<Value>,
        /// Iterator variable name, required with `collection`.
        #[serde(default, rename = "as")]
        iterator_var: Option<String>,
        /// Condition evaluated before each iteration, for a `while`-style
        /// loop.
        #[serde(default)]
        condition: Option<String>,
    },
    /// An ordered block of steps, stopping at the first failure.
    Sequence {
        /// Ordered child node ids.
        steps: Vec<String>,
    },
}

impl PlanNodeKind {
    /// The operator name, matching the plan's `type` discriminant.
    pub fn operator_name(&self) -> &'static str {
        match self {
            PlanNodeKind::Tool { .. } => "tool",
            PlanNodeKind::Parallel { .. } => "parallel",
            PlanNodeKind::IfThen { .. } => "if-then",
            PlanNodeKind::Switch { .. } => "switch",
            PlanNodeKind::Map { .. } => "map",
            PlanNodeKind::Filter { .. } => "filter",
            PlanNodeKind::Reduce { .. } => "reduce",
            PlanNodeKind::Loop { .. } => "loop",
            PlanNodeKind::Sequence { .. } => "sequence",
        }
    }

    /// Ids of this node's children, in declared order, regardless of
    /// operator kind. Used by the validator's reachability and cycle
    /// checks and by the compiler's unflatten step.
    pub fn child_ids(&self) -> Vec<&str> {
        match self {
            PlanNodeKind::Tool { .. } => vec![],
            PlanNodeKind::Parallel { parallel_ids, .. } => {
                parallel_ids.iter().map(String::as_str).collect()
            }
            PlanNodeKind::IfThen { if_true, if_false, .. } => if_true
                .iter()
                .chain(if_false.iter())
                .map(String::as_str)
                .collect(),
            PlanNodeKind::Switch { cases, default, .. } => {
                let mut ids: Vec<&str> = cases.values().flatten().map(String::as_str).collect();
                if let Some(default) = default {
                    ids.extend(default.iter().map(String::as_str));
                }
                ids
            }
            PlanNodeKind::Map { body, .. } => body.iter().map(String::as_str).collect(),
            PlanNodeKind::Filter { body, .. } => body
                .iter()
                .flatten()
                .map(String::as_str)
                .collect(),
            PlanNodeKind::Reduce { body, .. } => body.iter().map(String::as_str).collect(),
            PlanNodeKind::Loop { body, .. } => body.iter().map(String::as_str).collect(),
            PlanNodeKind::Sequence { steps } => steps.iter().map(String::as_str).collect(),
        }
    }
}

/// How a `ParallelNode`'s branches are combined (§4.6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// Wait for all branches; first failure cancels the rest.
    #[default]
    All,
    /// First successful completion wins; losers are cancelled.
    Race,
    /// Wait for all; combine successes and failures without propagating.
    Settled,
}

/// The category of a validation failure, matching §4.4's abort policy:
/// the compiler aborts on any of `Schema`, `Tool`, `Connection`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationKind {
    /// A node is missing a required field or has the wrong shape.
    Schema,
    /// A `tool` node's `toolId` is not registered.
    Tool,
    /// A referenced id does not exist, or a cycle was found.
    Connection,
    /// A node is unreachable from `rootIds`.
    Reachability,
}

/// A single structural validation failure (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    /// The category of failure.
    pub kind: ValidationKind,
    /// Path to the offending field, e.g. `["nodes", "n3", "toolId"]`.
    pub path: Vec<String>,
    /// What was expected.
    pub expected: String,
    /// What was actually found.
    pub actual: String,
    /// An optional corrective hint surfaced to the planner adapter's retry
    /// prompt (C10).
    pub suggestion: Option<String>,
}

impl ValidationError {
    /// Build a validation error without a suggestion.
    pub fn new(
        kind: ValidationKind,
        path: Vec<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path,
            expected: expected.into(),
            actual: actual.into(),
            suggestion: None,
        }
    }

    /// Attach a suggestion, builder-style.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_node_decodes_from_json() {
        let json = serde_json::json!({
            "id": "n1",
            "type": "tool",
            "toolId": "fetch",
            "inputs": {"source": "x"}
        });
        let node: PlanNode = serde_json::from_value(json).unwrap();
        assert_eq!(node.id, "n1");
        assert_eq!(node.kind.operator_name(), "tool");
    }

    #[test]
    fn if_then_child_ids_combine_both_branches() {
        let kind = PlanNodeKind::IfThen {
            condition: "$x".into(),
            if_true: vec!["a".into()],
            if_false: vec!["b".into()],
        };
        let mut ids = kind.child_ids();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn unknown_field_is_rejected_by_deny_unknown_fields() {
        let json = serde_json::json!({
            "id": "n1",
            "type": "tool",
            "toolId": "fetch",
            "bogusField": 1
        });
        let result: Result<PlanNode, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
