//! Tool and join registries (C3, §4.3).
//!
//! Both registries are O(1) by construction: tools index by id, joins
//! index by the `(fromToolId, toToolId)` pair, with at most one join per
//! pair.

use crate::tool::{Join, Tool};
use std::collections::HashMap;
use std::sync::Arc;

/// Indexes [`Tool`]s by id for O(1) lookup at compile and run time.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, keyed by its own `id()`. Replaces any prior tool
    /// registered under the same id.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.id().to_string(), tool);
    }

    /// Look up a tool by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    /// Whether a tool with `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    /// All registered tool ids.
    pub fn ids(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Indexes [`Join`]s by `(fromToolId, toToolId)` for O(1) lookup.
#[derive(Clone, Default)]
pub struct JoinRegistry {
    joins: HashMap<(String, String), Arc<dyn Join>>,
}

impl JoinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a join, keyed by its own `(from_tool_id, to_tool_id)`.
    pub fn register(&mut self, join: Arc<dyn Join>) {
        let key = (join.from_tool_id().to_string(), join.to_tool_id().to_string());
        self.joins.insert(key, join);
    }

    /// Look up the join for the pair, if one is registered.
    pub fn get(&self, from_tool_id: &str, to_tool_id: &str) -> Option<Arc<dyn Join>> {
        self.joins
            .get(&(from_tool_id.to_string(), to_tool_id.to_string()))
            .cloned()
    }

    /// Number of registered joins.
    pub fn len(&self) -> usize {
        self.joins.len()
    }

    /// Whether the registry holds no joins.
    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}
