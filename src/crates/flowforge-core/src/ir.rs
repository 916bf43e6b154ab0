//! The IR data model (§3.2): the compiler's output and the scheduler's
//! input.

use crate::plan::JoinStrategy;
use crate::registry::{JoinRegistry, ToolRegistry};
use crate::value::IRValue;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A node id within a compiled IR graph. Interned as a plain `String`
/// rather than an integer handle, matching the plan's own id space so
/// error messages can cite the same id a caller wrote in their plan.
pub type NodeId = String;

/// Per-node scheduling configuration, falling back to engine defaults
/// when a field is unset (§4.6, §6.6).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeConfig {
    /// Milliseconds before the node's invocation is aborted.
    pub timeout_ms: Option<u64>,
    /// Number of retry attempts for `Transient` failures.
    pub retries: Option<u32>,
    /// Milliseconds to wait between retry attempts.
    pub retry_delay_ms: Option<u64>,
    /// Whether to memoize this node's output for the duration of the run.
    pub cache: bool,
    /// Whether a loop/parallel node's children may run concurrently.
    pub parallel: bool,
    /// Concurrency cap when `parallel` is set.
    pub concurrency: Option<u32>,
}

impl From<&crate::plan::PlanNodeConfig> for NodeConfig {
    fn from(c: &crate::plan::PlanNodeConfig) -> Self {
        Self {
            timeout_ms: c.timeout_ms,
            retries: c.retries,
            retry_delay_ms: c.retry_delay_ms,
            cache: c.cache,
            parallel: c.parallel,
            concurrency: c.concurrency,
        }
    }
}

/// Invoke a single tool.
#[derive(Debug, Clone)]
pub struct ToolNode {
    /// This node's id.
    pub id: NodeId,
    /// The tool to invoke.
    pub tool_id: String,
    /// Resolved-at-runtime input expressions.
    pub inputs: HashMap<String, IRValue>,
    /// If `Some`, this node is a synthetic join inserted by the compiler
    /// (§4.5 step 3) rather than a plan-authored tool call: `(from, to)`
    /// identify the join to apply via [`JoinRegistry`] instead of looking
    /// `tool_id` up in [`ToolRegistry`].
    pub join_of: Option<(String, String)>,
    /// Scope variable the result is stored under.
    pub output_var: Option<String>,
    /// Scheduling overrides.
    pub config: NodeConfig,
}

/// Branch on a boolean expression.
#[derive(Debug, Clone)]
pub struct ConditionalNode {
    /// This node's id.
    pub id: NodeId,
    /// Expression evaluated via C1.
    pub condition: String,
    /// Children run when `condition` is truthy.
    pub then_branch: Vec<NodeId>,
    /// Children run when `condition` is falsy.
    pub else_branch: Vec<NodeId>,
    /// Scope variable the branch's result is stored under.
    pub output_var: Option<String>,
    /// Scheduling overrides.
    pub config: NodeConfig,
}

/// Run children concurrently.
#[derive(Debug, Clone)]
pub struct ParallelNode {
    /// This node's id.
    pub id: NodeId,
    /// Each branch is a single child node id run to completion.
    pub branches: Vec<NodeId>,
    /// How branch results are combined (§4.6).
    pub join_strategy: JoinStrategy,
    /// Scope variable the combined result is stored under.
    pub output_var: Option<String>,
    /// Scheduling overrides.
    pub config: NodeConfig,
}

/// An ordered block of steps, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct SequenceNode {
    /// This node's id.
    pub id: NodeId,
    /// Ordered child node ids.
    pub steps: Vec<NodeId>,
    /// Scope variable the final step's result is stored under.
    pub output_var: Option<String>,
    /// Scheduling overrides.
    pub config: NodeConfig,
}

/// The four loop-family operator kinds, all lowered into [`LoopNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `for`/`loop`: iterate, discard results.
    For,
    /// `while`: evaluate `condition` before each iteration.
    While,
    /// `map`: iterate, collect body results.
    Map,
    /// `filter`: iterate, keep elements whose body result is truthy.
    Filter,
    /// `reduce`: iterate sequentially, folding into an accumulator.
    Reduce,
}

/// Iterate over a collection or while a condition holds (§4.6).
#[derive(Debug, Clone)]
pub struct LoopNode {
    /// This node's id.
    pub id: NodeId,
    /// Which loop-family semantics to apply.
    pub loop_kind: LoopKind,
    /// Collection expression, for `for`/`map`/`filter`/`reduce`.
    pub collection: Option<IRValue>,
    /// Condition expression, for `while`.
    pub condition: Option<String>,
    /// Iterator variable name bound per iteration.
    pub iterator_var: Option<String>,
    /// Accumulator variable name, for `reduce`.
    pub accumulator: Option<String>,
    /// Initial accumulator value, for `reduce`.
    pub initial: Option<Value>,
    /// Body child node ids run each iteration.
    pub body: Vec<NodeId>,
    /// Scope variable the loop's overall result is stored under.
    pub output_var: Option<String>,
    /// Scheduling overrides.
    pub config: NodeConfig,
}

/// Select a branch by literal match on a discriminator value.
#[derive(Debug, Clone)]
pub struct SwitchNode {
    /// This node's id.
    pub id: NodeId,
    /// Value resolved then matched against `cases`.
    pub discriminator: IRValue,
    /// Case value (rendered as a string) to child node ids.
    pub cases: HashMap<String, Vec<NodeId>>,
    /// Child node ids run when no case matches.
    pub default: Option<Vec<NodeId>>,
    /// Scope variable the selected branch's result is stored under.
    pub output_var: Option<String>,
    /// Scheduling overrides.
    pub config: NodeConfig,
}

/// A single vertex of the IR graph (§3.2).
#[derive(Debug, Clone)]
pub enum IRNode {
    /// Invoke a tool.
    Tool(ToolNode),
    /// Branch on a condition.
    Conditional(ConditionalNode),
    /// Run children concurrently.
    Parallel(ParallelNode),
    /// Run children in order.
    Sequence(SequenceNode),
    /// Iterate.
    Loop(LoopNode),
    /// Dispatch by discriminator.
    Switch(SwitchNode),
}

impl IRNode {
    /// This node's id, regardless of kind.
    pub fn id(&self) -> &str {
        match self {
            IRNode::Tool(n) => &n.id,
            IRNode::Conditional(n) => &n.id,
            IRNode::Parallel(n) => &n.id,
            IRNode::Sequence(n) => &n.id,
            IRNode::Loop(n) => &n.id,
            IRNode::Switch(n) => &n.id,
        }
    }

    /// The scope variable this node's output is stored under, if any.
    pub fn output_var(&self) -> Option<&str> {
        match self {
            IRNode::Tool(n) => n.output_var.as_deref(),
            IRNode::Conditional(n) => n.output_var.as_deref(),
            IRNode::Parallel(n) => n.output_var.as_deref(),
            IRNode::Sequence(n) => n.output_var.as_deref(),
            IRNode::Loop(n) => n.output_var.as_deref(),
            IRNode::Switch(n) => n.output_var.as_deref(),
        }
    }

    /// This node's scheduling configuration.
    pub fn config(&self) -> &NodeConfig {
        match self {
            IRNode::Tool(n) => &n.config,
            IRNode::Conditional(n) => &n.config,
            IRNode::Parallel(n) => &n.config,
            IRNode::Sequence(n) => &n.config,
            IRNode::Loop(n) => &n.config,
            IRNode::Switch(n) => &n.config,
        }
    }

    /// The type tag used in `node-start{nodeType}` events (§6.3).
    pub fn type_name(&self) -> &'static str {
        match self {
            IRNode::Tool(_) => "tool",
            IRNode::Conditional(_) => "conditional",
            IRNode::Parallel(_) => "parallel",
            IRNode::Sequence(_) => "sequence",
            IRNode::Loop(_) => "loop",
            IRNode::Switch(_) => "switch",
        }
    }

    /// Direct children this node dispatches to, in declared order.
    pub fn child_ids(&self) -> Vec<&str> {
        match self {
            IRNode::Tool(_) => vec![],
            IRNode::Conditional(n) => n
                .then_branch
                .iter()
                .chain(n.else_branch.iter())
                .map(String::as_str)
                .collect(),
            IRNode::Parallel(n) => n.branches.iter().map(String::as_str).collect(),
            IRNode::Sequence(n) => n.steps.iter().map(String::as_str).collect(),
            IRNode::Loop(n) => n.body.iter().map(String::as_str).collect(),
            IRNode::Switch(n) => {
                let mut ids: Vec<&str> = n.cases.values().flatten().map(String::as_str).collect();
                if let Some(default) = &n.default {
                    ids.extend(default.iter().map(String::as_str));
                }
                ids
            }
        }
    }
}

/// The IR graph: every node keyed by id, plus the control-flow edges and
/// the single entry point (§3.2).
#[derive(Debug, Clone)]
pub struct Graph {
    /// All nodes in the compiled IR, including synthetic join nodes and
    /// composite nodes' children — the graph is flat; containment is
    /// expressed purely through each node's `child_ids()`.
    pub nodes: HashMap<NodeId, IRNode>,
    /// Control-flow edges between top-level nodes.
    pub edges: Vec<(NodeId, NodeId)>,
    /// The single node execution starts from.
    pub entry_point: NodeId,
}

/// The compiled, executable form of a [`crate::plan::Plan`] (§3.2).
#[derive(Clone)]
pub struct IR {
    /// IR schema version, carried from the source plan.
    pub version: String,
    /// Free-form metadata carried from the source plan.
    pub metadata: Value,
    /// The compiled graph.
    pub graph: Arc<Graph>,
    /// Tools available to this run.
    pub tools: Arc<ToolRegistry>,
    /// Joins available to this run.
    pub joins: Arc<JoinRegistry>,
}

impl IR {
    /// A stable digest of this IR's shape, used to detect a mismatched
    /// engine version on resume (§4.9) and as the first component of a
    /// node cache key (§4.6).
    pub fn hash(&self) -> String {
        let mut ids: Vec<&str> = self.graph.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        let digest_input = format!("{}:{}:{:?}", self.version, self.graph.entry_point, ids);
        format!("{:016x}", flowforge_tooling::serialization::generate_hash(&digest_input))
    }
}
