//! The IR value model: resolved JSON values plus the tagged variant that
//! describes how an unresolved value should be computed against a [`crate::scope::Scope`].

use crate::error::{FlowError, Result};
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An unresolved input value as it appears in a compiled [`crate::ir::IRNode`].
///
/// Resolution happens once, at invocation time, against the scope active
/// for that node (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum IRValue {
    /// A value already known at compile time.
    Literal(Value),
    /// A lookup in the scope chain, `name`, followed by a property/index
    /// path into the result.
    Variable {
        /// Scope key to resolve first.
        name: String,
        /// Path segments applied to the looked-up value, in order.
        path: Vec<String>,
    },
    /// A restricted boolean/comparison expression (§4.1).
    Expression(String),
    /// A reference to a previously completed node's recorded output.
    Reference {
        /// The producing node's id.
        node_id: String,
        /// Optional sub-field of that node's output.
        output_name: Option<String>,
    },
}

impl IRValue {
    /// Parse the plan-level reference syntax (`"$name"`, `"$name.path"`,
    /// `"$nodeId.output"`) or fall back to a literal for any value that is
    /// not a `$`-prefixed string, per §6.2.
    pub fn from_plan_value(value: &Value, node_ids: &std::collections::HashSet<String>) -> Self {
        if let Some(s) = value.as_str() {
            if let Some(rest) = s.strip_prefix('$') {
                let mut parts = rest.split('.');
                let head = parts.next().unwrap_or_default();
                let tail: Vec<String> = parts.map(|s| s.to_string()).collect();

                if node_ids.contains(head) {
                    return IRValue::Reference {
                        node_id: head.to_string(),
                        output_name: tail.first().cloned(),
                    };
                }
                return IRValue::Variable {
                    name: head.to_string(),
                    path: tail,
                };
            }
        }
        IRValue::Literal(value.clone())
    }

    /// Resolve this value against `scope`, with `completed` supplying
    /// outputs for `Reference` lookups.
    pub fn resolve(
        &self,
        node: &str,
        scope: &Scope,
        completed: &std::collections::HashMap<String, Value>,
    ) -> Result<Value> {
        match self {
            IRValue::Literal(v) => Ok(v.clone()),
            IRValue::Variable { name, path } => {
                let base = scope
                    .get(name)
                    .ok_or_else(|| FlowError::input_validation(node, format!("unknown variable '{name}'")))?;
                Ok(apply_path(&base, path))
            }
            IRValue::Reference { node_id, output_name } => {
                let output = completed
                    .get(node_id)
                    .ok_or_else(|| FlowError::MissingReference {
                        node_id: node_id.clone(),
                    })?;
                match output_name {
                    Some(field) => Ok(apply_path(output, std::slice::from_ref(field))),
                    None => Ok(output.clone()),
                }
            }
            IRValue::Expression(expr) => {
                crate::expr::evaluate(expr, scope).map_err(|e| FlowError::expression(node, e))
            }
        }
    }
}

/// Walk `path` as a sequence of object-field or array-index accesses,
/// returning `Value::Null` for any step that does not resolve.
pub fn apply_path(base: &Value, path: &[String]) -> Value {
    let mut current = base.clone();
    for segment in path {
        current = match &current {
            Value::Object(map) => map.get(segment).cloned().unwrap_or(Value::Null),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn literal_passes_through() {
        let v = IRValue::Literal(serde_json::json!(42));
        let scope = Scope::root();
        let completed = Default::default();
        assert_eq!(v.resolve("n", &scope, &completed).unwrap(), serde_json::json!(42));
    }

    #[test]
    fn variable_with_path_walks_object() {
        let scope = Scope::root();
        scope.set("user", serde_json::json!({"name": "ada"}));
        let v = IRValue::Variable {
            name: "user".into(),
            path: vec!["name".into()],
        };
        let completed = Default::default();
        assert_eq!(
            v.resolve("n", &scope, &completed).unwrap(),
            serde_json::json!("ada")
        );
    }

    #[test]
    fn reference_to_unfinished_node_fails() {
        let scope = Scope::root();
        let v = IRValue::Reference {
            node_id: "s1".into(),
            output_name: None,
        };
        let completed = Default::default();
        let err = v.resolve("n", &scope, &completed).unwrap_err();
        assert!(matches!(err, FlowError::MissingReference { .. }));
    }

    #[test]
    fn from_plan_value_recognizes_node_reference() {
        let mut ids = HashSet::new();
        ids.insert("s1".to_string());
        let v = IRValue::from_plan_value(&serde_json::json!("$s1.output"), &ids);
        assert!(matches!(
            v,
            IRValue::Reference { ref node_id, ref output_name }
                if node_id == "s1" && output_name.as_deref() == Some("output")
        ));
    }

    #[test]
    fn from_plan_value_recognizes_variable() {
        let ids = HashSet::new();
        let v = IRValue::from_plan_value(&serde_json::json!("$item.value"), &ids);
        assert!(matches!(
            v,
            IRValue::Variable { ref name, ref path }
                if name == "item" && path == &vec!["value".to_string()]
        ));
    }

    #[test]
    fn from_plan_value_non_dollar_string_is_literal() {
        let ids = HashSet::new();
        let v = IRValue::from_plan_value(&serde_json::json!("plain"), &ids);
        assert!(matches!(v, IRValue::Literal(Value::String(s)) if s == "plain"));
    }
}
