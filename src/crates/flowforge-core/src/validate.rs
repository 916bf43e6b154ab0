//! Plan structural validation (C4, §4.4).
//!
//! Validation is independent of the target registry only for the first
//! three checks; tool existence additionally needs the [`crate::registry::ToolRegistry`]
//! the run will execute against.

use crate::plan::{Plan, PlanNodeKind, ValidationError, ValidationKind};
use crate::registry::ToolRegistry;
use std::collections::{HashMap, HashSet};

/// Validate `plan` against `tools`, returning every failure found (not just
/// the first). An empty `Vec` means the plan may proceed to compilation.
pub fn validate(plan: &Plan, tools: &ToolRegistry) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let by_id = check_unique_ids(plan, &mut errors);
    check_non_empty_ids(plan, &mut errors);
    check_reference_integrity(plan, &by_id, &mut errors);
    check_tool_existence(plan, tools, &mut errors);

    // Cycle and reachability checks need a consistent id universe; skip
    // them if reference integrity already failed; dangling references
    // would otherwise produce misleading cycle/reachability noise.
    if errors.iter().all(|e| e.kind != ValidationKind::Connection) {
        check_acyclic(plan, &by_id, &mut errors);
        check_reachability(plan, &by_id, &mut errors);
    }

    errors
}

fn check_unique_ids<'a>(
    plan: &'a Plan,
    errors: &mut Vec<ValidationError>,
) -> HashMap<&'a str, &'a crate::plan::PlanNode> {
    let mut by_id = HashMap::new();
    for node in &plan.nodes {
        if by_id.insert(node.id.as_str(), node).is_some() {
            errors.push(
                ValidationError::new(
                    ValidationKind::Schema,
                    vec!["nodes".into(), node.id.clone()],
                    "unique node id",
                    format!("duplicate id '{}'", node.id),
                )
                .with_suggestion("rename one of the duplicate nodes"),
            );
        }
    }
    by_id
}

fn check_non_empty_ids(plan: &Plan, errors: &mut Vec<ValidationError>) {
    for (idx, node) in plan.nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationKind::Schema,
                vec!["nodes".into(), idx.to_string()],
                "non-empty node id",
                "empty string",
            ));
        }
    }
}

fn check_reference_integrity(
    plan: &Plan,
    by_id: &HashMap<&str, &crate::plan::PlanNode>,
    errors: &mut Vec<ValidationError>,
) {
    let mut missing = |path: Vec<String>, referenced: &str| {
        if !by_id.contains_key(referenced) {
            errors.push(
                ValidationError::new(
                    ValidationKind::Connection,
                    path,
                    "an existing node id",
                    format!("'{referenced}' does not exist"),
                )
                .with_suggestion(format!(
                    "add a node with id '{referenced}' or fix the reference"
                )),
            );
        }
    };

    for root in &plan.root_ids {
        missing(vec!["rootIds".into()], root);
    }
    for edge in &plan.edges {
        missing(vec!["edges".into(), "from".into()], &edge.from);
        missing(vec!["edges".into(), "to".into()], &edge.to);
    }
    for node in &plan.nodes {
        for child in node.kind.child_ids() {
            missing(vec!["nodes".into(), node.id.clone()], child);
        }
    }
}

fn check_tool_existence(plan: &Plan, tools: &ToolRegistry, errors: &mut Vec<ValidationError>) {
    for node in &plan.nodes {
        if let PlanNodeKind::Tool { tool_id, .. } = &node.kind {
            if !tools.contains(tool_id) {
                errors.push(
                    ValidationError::new(
                        ValidationKind::Tool,
                        vec!["nodes".into(), node.id.clone(), "toolId".into()],
                        "a registered tool id",
                        format!("'{tool_id}' is not registered"),
                    )
                    .with_suggestion(format!(
                        "register tool '{tool_id}' or fix the plan's toolId"
                    )),
                );
            }
        }
    }
}

/// Build the induced graph's adjacency: edges plus containment (a
/// composite node "contains" its children in execution order).
fn adjacency<'a>(plan: &'a Plan, by_id: &HashMap<&'a str, &'a crate::plan::PlanNode>) -> HashMap<&'a str, Vec<&'a str>> {
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &plan.edges {
        if by_id.contains_key(edge.from.as_str()) && by_id.contains_key(edge.to.as_str()) {
            adj.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }
    }
    for node in &plan.nodes {
        let children: Vec<&str> = node
            .kind
            .child_ids()
            .into_iter()
            .filter(|id| by_id.contains_key(id))
            .collect();
        adj.entry(node.id.as_str()).or_default().extend(children);
    }
    adj
}

fn check_acyclic(
    plan: &Plan,
    by_id: &HashMap<&str, &crate::plan::PlanNode>,
    errors: &mut Vec<ValidationError>,
) {
    let adj = adjacency(plan, by_id);
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }
    let mut marks: HashMap<&str, Mark> = by_id.keys().map(|id| (*id, Mark::Unvisited)).collect();

    fn visit<'a>(
        node: &'a str,
        adj: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> Option<&'a str> {
        match marks.get(node) {
            Some(Mark::InProgress) => return Some(node),
            Some(Mark::Done) => return None,
            _ => {}
        }
        marks.insert(node, Mark::InProgress);
        if let Some(children) = adj.get(node) {
            for child in children {
                if let Some(cycle_at) = visit(child, adj, marks) {
                    return Some(cycle_at);
                }
            }
        }
        marks.insert(node, Mark::Done);
        None
    }

    for id in by_id.keys() {
        if let Some(cycle_at) = visit(id, &adj, &mut marks) {
            errors.push(ValidationError::new(
                ValidationKind::Connection,
                vec!["nodes".into(), cycle_at.to_string()],
                "an acyclic node graph",
                "a cycle was detected",
            ));
            return;
        }
    }
}

fn check_reachability(
    plan: &Plan,
    by_id: &HashMap<&str, &crate::plan::PlanNode>,
    errors: &mut Vec<ValidationError>,
) {
    let adj = adjacency(plan, by_id);
    let mut reached: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = plan
        .root_ids
        .iter()
        .map(String::as_str)
        .filter(|id| by_id.contains_key(id))
        .collect();

    while let Some(id) = stack.pop() {
        if reached.insert(id) {
            if let Some(children) = adj.get(id) {
                stack.extend(children.iter().copied());
            }
        }
    }

    for id in by_id.keys() {
        if !reached.contains(id) {
            errors.push(ValidationError::new(
                ValidationKind::Reachability,
                vec!["nodes".into(), id.to_string()],
                "reachable from rootIds",
                "unreachable",
            ));
        }
    }
}
