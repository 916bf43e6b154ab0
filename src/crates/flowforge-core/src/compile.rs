//! The plan → IR compiler (C5, §4.5).
//!
//! Compilation assumes `plan` has already passed [`crate::validate::validate`]
//! with zero errors — reference integrity, tool existence, acyclicity, and
//! reachability are the validator's job, not this one's. What remains here:
//!
//! 1. Lower every plan node into its IR counterpart, turning plan-level
//!    `"$..."` strings into [`IRValue`]s.
//! 2. Inject a synthetic join node on any tool-to-tool edge whose consumer
//!    references the producer's output across an incompatible schema.
//! 3. Statically reject self-references and descendant-references, which
//!    no runtime resolution could ever satisfy.
//! 4. Pick (or synthesize) the single entry point.

use crate::error::{FlowError, Result};
use crate::ir::{
    ConditionalNode, Graph, IRNode, LoopKind, LoopNode, NodeConfig, NodeId, ParallelNode,
    SequenceNode, SwitchNode, ToolNode, IR,
};
use crate::plan::{Plan, PlanNode, PlanNodeConfig, PlanNodeKind};
use crate::registry::{JoinRegistry, ToolRegistry};
use crate::value::IRValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Compile a validated `plan` into an [`IR`] runnable against `tools` and
/// `joins`.
pub fn compile(plan: &Plan, tools: Arc<ToolRegistry>, joins: Arc<JoinRegistry>) -> Result<IR> {
    let node_ids: HashSet<String> = plan.nodes.iter().map(|n| n.id.clone()).collect();
    let mut nodes: HashMap<NodeId, IRNode> = plan
        .nodes
        .iter()
        .map(|n| (n.id.clone(), lower_node(n, &node_ids)))
        .collect();
    let mut edges: Vec<(NodeId, NodeId)> = plan
        .edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();

    inject_joins(&mut nodes, &mut edges, &tools, &joins)?;
    check_static_references(&nodes)?;

    let entry_point = match plan.root_ids.as_slice() {
        [] => return Err(FlowError::Compilation("plan has no root nodes".into())),
        [only] => only.clone(),
        many => {
            let synthetic_id = "__entry__".to_string();
            nodes.insert(
                synthetic_id.clone(),
                IRNode::Sequence(SequenceNode {
                    id: synthetic_id.clone(),
                    steps: many.to_vec(),
                    output_var: None,
                    config: NodeConfig::default(),
                }),
            );
            synthetic_id
        }
    };

    Ok(IR {
        version: plan.version.clone(),
        metadata: plan.metadata.clone(),
        graph: Arc::new(Graph {
            nodes,
            edges,
            entry_point,
        }),
        tools,
        joins,
    })
}

fn lower_node(node: &PlanNode, node_ids: &HashSet<String>) -> IRNode {
    let default_cfg = PlanNodeConfig::default();
    let config = NodeConfig::from(node.config.as_ref().unwrap_or(&default_cfg));
    let id = node.id.clone();
    let output_var = node.output_var.clone();

    match &node.kind {
        PlanNodeKind::Tool { tool_id, inputs } => IRNode::Tool(ToolNode {
            id,
            tool_id: tool_id.clone(),
            inputs: inputs
                .iter()
                .map(|(k, v)| (k.clone(), IRValue::from_plan_value(v, node_ids)))
                .collect(),
            join_of: None,
            output_var,
            config,
        }),
        PlanNodeKind::Parallel {
            parallel_ids,
            join_strategy,
        } => IRNode::Parallel(ParallelNode {
            id,
            branches: parallel_ids.clone(),
            join_strategy: *join_strategy,
            output_var,
            config,
        }),
        PlanNodeKind::IfThen {
            condition,
            if_true,
            if_false,
        } => IRNode::Conditional(ConditionalNode {
            id,
            condition: condition.clone(),
            then_branch: if_true.clone(),
            else_branch: if_false.clone(),
            output_var,
            config,
        }),
        PlanNodeKind::Switch {
            discriminator,
            cases,
            default,
        } => IRNode::Switch(SwitchNode {
            id,
            discriminator: IRValue::from_plan_value(discriminator, node_ids),
            cases: cases.clone(),
            default: default.clone(),
            output_var,
            config,
        }),
        PlanNodeKind::Map {
            collection,
            iterator_var,
            body,
            parallel,
            concurrency,
        } => IRNode::Loop(LoopNode {
            id,
            loop_kind: LoopKind::Map,
            collection: Some(IRValue::from_plan_value(collection, node_ids)),
            condition: None,
            iterator_var: Some(iterator_var.clone()),
            accumulator: None,
            initial: None,
            body: body.clone(),
            output_var,
            config: NodeConfig {
                parallel: *parallel,
                concurrency: *concurrency,
                ..config
            },
        }),
        PlanNodeKind::Filter {
            collection,
            condition,
            body,
            iterator_var,
        } => IRNode::Loop(LoopNode {
            id,
            loop_kind: LoopKind::Filter,
            collection: Some(IRValue::from_plan_value(collection, node_ids)),
            condition: condition.clone(),
            iterator_var: Some(iterator_var.clone()),
            accumulator: None,
            initial: None,
            body: body.clone().unwrap_or_default(),
            output_var,
            config,
        }),
        PlanNodeKind::Reduce {
            collection,
            iterator_var,
            accumulator,
            initial,
            body,
        } => IRNode::Loop(LoopNode {
            id,
            loop_kind: LoopKind::Reduce,
            collection: Some(IRValue::from_plan_value(collection, node_ids)),
            condition: None,
            iterator_var: Some(iterator_var.clone()),
            accumulator: Some(accumulator.clone()),
            initial: Some(initial.clone()),
            body: body.clone(),
            output_var,
            config,
        }),
        PlanNodeKind::Loop {
            body,
            collection,
            iterator_var,
            condition,
        } => IRNode::Loop(LoopNode {
            id,
            loop_kind: if collection.is_some() {
                LoopKind::For
            } else {
                LoopKind::While
            },
            collection: collection
                .as_ref()
                .map(|c| IRValue::from_plan_value(c, node_ids)),
            condition: condition.clone(),
            iterator_var: iterator_var.clone(),
            accumulator: None,
            initial: None,
            body: body.clone(),
            output_var,
            config,
        }),
        PlanNodeKind::Sequence { steps } => IRNode::Sequence(SequenceNode {
            id,
            steps: steps.clone(),
            output_var,
            config,
        }),
    }
}

/// Insert a synthetic join `ToolNode` on any tool→tool edge whose consumer
/// references the producer across incompatible schemas (§4.3, §4.5 step 3).
fn inject_joins(
    nodes: &mut HashMap<NodeId, IRNode>,
    edges: &mut Vec<(NodeId, NodeId)>,
    tools: &ToolRegistry,
    joins: &JoinRegistry,
) -> Result<()> {
    let candidate_edges: Vec<(NodeId, NodeId)> = edges.clone();

    for (from, to) in candidate_edges {
        let (from_tool_id, to_tool_id) = match (nodes.get(&from), nodes.get(&to)) {
            (Some(IRNode::Tool(f)), Some(IRNode::Tool(t))) => (f.tool_id.clone(), t.tool_id.clone()),
            _ => continue,
        };

        let consumes_from = matches!(
            nodes.get(&to),
            Some(IRNode::Tool(t)) if t.inputs.values().any(|v| matches!(
                v,
                IRValue::Reference { node_id, .. } if node_id == &from
            ))
        );
        if !consumes_from {
            continue;
        }

        let (from_tool, to_tool) = match (tools.get(&from_tool_id), tools.get(&to_tool_id)) {
            (Some(f), Some(t)) => (f, t),
            // missing tools are reported by validation, not compilation
            _ => continue,
        };

        if from_tool.output_schema() == to_tool.input_schema() {
            continue;
        }

        joins
            .get(&from_tool_id, &to_tool_id)
            .ok_or_else(|| FlowError::MissingJoin {
                from: from_tool_id.clone(),
                to: to_tool_id.clone(),
            })?;

        let synthetic_id = format!(
            "__join_{from_tool_id}_{to_tool_id}_{:x}",
            flowforge_tooling::serialization::generate_hash(&(from.as_str(), to.as_str()))
        );

        let mut synthetic_inputs = HashMap::new();
        synthetic_inputs.insert(
            "from".to_string(),
            IRValue::Reference {
                node_id: from.clone(),
                output_name: None,
            },
        );
        nodes.insert(
            synthetic_id.clone(),
            IRNode::Tool(ToolNode {
                id: synthetic_id.clone(),
                tool_id: to_tool_id.clone(),
                inputs: synthetic_inputs,
                join_of: Some((from_tool_id.clone(), to_tool_id.clone())),
                output_var: None,
                config: NodeConfig::default(),
            }),
        );

        if let Some(IRNode::Tool(t)) = nodes.get_mut(&to) {
            for value in t.inputs.values_mut() {
                if matches!(value, IRValue::Reference { node_id, .. } if node_id == &from) {
                    *value = IRValue::Reference {
                        node_id: synthetic_id.clone(),
                        output_name: None,
                    };
                }
            }
        }

        edges.retain(|(f, t)| !(f == &from && t == &to));
        edges.push((from.clone(), synthetic_id.clone()));
        edges.push((synthetic_id, to));
    }

    Ok(())
}

/// Reject references no runtime resolution could ever satisfy: a node
/// referencing itself, or referencing one of its own descendants.
fn check_static_references(nodes: &HashMap<NodeId, IRNode>) -> Result<()> {
    for node in nodes.values() {
        for value in collect_ir_values(node) {
            if let IRValue::Reference { node_id, .. } = value {
                if node_id == node.id() {
                    return Err(FlowError::Compilation(format!(
                        "node '{}' references its own output",
                        node.id()
                    )));
                }
                if !nodes.contains_key(node_id) {
                    return Err(FlowError::Compilation(format!(
                        "node '{}' references unknown node '{}'",
                        node.id(),
                        node_id
                    )));
                }
                if is_descendant(nodes, node.id(), node_id) {
                    return Err(FlowError::Compilation(format!(
                        "node '{}' references its own descendant '{}'",
                        node.id(),
                        node_id
                    )));
                }
            }
        }
    }
    Ok(())
}

fn collect_ir_values(node: &IRNode) -> Vec<&IRValue> {
    match node {
        IRNode::Tool(n) => n.inputs.values().collect(),
        IRNode::Switch(n) => vec![&n.discriminator],
        IRNode::Loop(n) => n.collection.iter().collect(),
        IRNode::Conditional(_) | IRNode::Parallel(_) | IRNode::Sequence(_) => vec![],
    }
}

fn is_descendant(nodes: &HashMap<NodeId, IRNode>, ancestor: &str, candidate: &str) -> bool {
    let Some(node) = nodes.get(ancestor) else {
        return false;
    };
    for child in node.child_ids() {
        if child == candidate || is_descendant(nodes, child, candidate) {
            return true;
        }
    }
    false
}
