//! Hierarchical variable scope (§4.2, §9).
//!
//! Scopes form a tree for the lifetime of a run. Rather than a graph of
//! `Rc`/pointer-linked nodes, the tree lives in an arena indexed by integer
//! handles: a child always points at a strictly earlier-created parent, so
//! no cycles are possible by construction, and the whole arena is freed at
//! once when the run ends.
//!
//! Each [`Scope`] handle is cheap to clone (it is just an index plus a
//! shared handle to the arena) and is not `Send`/`Sync` on its own; the
//! scheduler clones handles into each branch rather than sharing mutable
//! state across branches, matching the single-writer-per-scope discipline
//! in §5.

use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
struct ScopeNode {
    parent: Option<usize>,
    values: HashMap<String, Value>,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<ScopeNode>,
}

/// A handle into a scope tree's arena. Cloning a `Scope` is cheap and
/// aliases the same underlying arena; `child()` allocates a new node.
#[derive(Debug, Clone)]
pub struct Scope {
    arena: Rc<RefCell<Arena>>,
    id: usize,
}

impl Scope {
    /// Create a fresh scope tree with a single root node and no parent.
    pub fn root() -> Self {
        let arena = Arena {
            nodes: vec![ScopeNode {
                parent: None,
                values: HashMap::new(),
            }],
        };
        Self {
            arena: Rc::new(RefCell::new(arena)),
            id: 0,
        }
    }

    /// Open a child scope of `self`. Writes to the child are invisible to
    /// the parent; reads on the child fall through to the parent when a
    /// key is absent locally.
    pub fn child(&self) -> Scope {
        let mut arena = self.arena.borrow_mut();
        let id = arena.nodes.len();
        arena.nodes.push(ScopeNode {
            parent: Some(self.id),
            values: HashMap::new(),
        });
        drop(arena);
        Scope {
            arena: self.arena.clone(),
            id,
        }
    }

    /// Write `value` under `name` in this scope only.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        let mut arena = self.arena.borrow_mut();
        arena.nodes[self.id].values.insert(name.into(), value);
    }

    /// Look up `name`, walking from this scope up through parents. A key
    /// present in both a child and an ancestor resolves to the child's
    /// value.
    pub fn get(&self, name: &str) -> Option<Value> {
        let arena = self.arena.borrow();
        let mut current = Some(self.id);
        while let Some(id) = current {
            let node = &arena.nodes[id];
            if let Some(v) = node.values.get(name) {
                return Some(v.clone());
            }
            current = node.parent;
        }
        None
    }

    /// Whether `name` resolves anywhere in the chain from this scope.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove `name` from this scope only; does not affect ancestors, and a
    /// subsequent `get` may still find an ancestor's value for the same
    /// key.
    pub fn delete(&self, name: &str) {
        let mut arena = self.arena.borrow_mut();
        arena.nodes[self.id].values.remove(name);
    }

    /// Keys visible from this scope, this scope's own keys first, then
    /// ancestors', without duplicates.
    pub fn keys(&self) -> Vec<String> {
        let arena = self.arena.borrow();
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        let mut current = Some(self.id);
        while let Some(id) = current {
            let node = &arena.nodes[id];
            for key in node.values.keys() {
                if seen.insert(key.clone()) {
                    out.push(key.clone());
                }
            }
            current = node.parent;
        }
        out
    }

    /// Serialize the full chain from this scope to the root into a single
    /// flattened JSON object, child values shadowing ancestors'. Used when
    /// freezing state for suspension (§4.9).
    pub fn snapshot(&self) -> Value {
        let mut merged = serde_json::Map::new();
        let arena = self.arena.borrow();
        let mut chain = Vec::new();
        let mut current = Some(self.id);
        while let Some(id) = current {
            chain.push(id);
            current = arena.nodes[id].parent;
        }
        for id in chain.into_iter().rev() {
            for (k, v) in &arena.nodes[id].values {
                merged.insert(k.clone(), v.clone());
            }
        }
        Value::Object(merged)
    }
}
