//! Optional JSON Schema validation of tool inputs/outputs, gated behind
//! the `json-validation` feature. Without the feature, every value passes;
//! hosts that don't need the extra dependency don't pay for it.

use serde_json::Value;

/// Validate `value` against `schema`, returning a human-readable message
/// on failure. An empty object schema (`{}`) always passes.
#[cfg(feature = "json-validation")]
pub fn validate(value: &Value, schema: &Value) -> Result<(), String> {
    if schema.as_object().map(|o| o.is_empty()).unwrap_or(false) {
        return Ok(());
    }
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|e| format!("invalid schema: {e}"))?;
    compiled.validate(value).map_err(|errors| {
        errors
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })
}

/// No-op when `json-validation` is not enabled.
#[cfg(not(feature = "json-validation"))]
pub fn validate(_value: &Value, _schema: &Value) -> Result<(), String> {
    Ok(())
}
