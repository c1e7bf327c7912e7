//! Binding Module - variables, injection and interpolation
//!
//! Two distinct templating layers:
//! - `inject`: `@name` tokens, substituted structurally into runtime nodes
//!   before execution starts (`inject_variables`)
//! - `template`: `{{name}}` / `{{name.path}}` placeholders, interpolated into
//!   prompts and tool options at call time (`interpolate`)
//!
//! Plus `schema`: input declarations → JSON Schema + `validate_flow_input`.
//!
//! Data flow:
//! ```text
//! flow input ──► validate_flow_input ──► bindings_from_input ──► inject_variables
//!                                                                    ↓
//!                         Variables (run-owned map) ──► interpolate at each call
//! ```

mod inject;
mod schema;
mod template;

pub use inject::{
    bindings_from_input, extract_variable_names, inject_variables, load_file_inputs, substitute,
    transform_inputs, transform_inputs_sync,
};
pub use schema::{
    build_input_schema, parse_input_value, validate_flow_input, InputSchema, InputValidation,
};
pub use template::{extract_refs, interpolate, interpolate_value};

use indexmap::IndexMap;
use serde_json::Value;

/// Run-owned variable map (insertion ordered)
pub type Variables = IndexMap<String, Value>;

/// String bindings for `@name` injection
pub type Bindings = IndexMap<String, String>;

/// Look up `name` or `name.field.0` in a variable map
pub fn lookup<'a>(variables: &'a Variables, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut value = variables.get(parts.next()?)?;
    for segment in parts {
        value = match segment.parse::<usize>() {
            Ok(idx) if value.is_array() => value.get(idx)?,
            _ => value.get(segment)?,
        };
    }
    Some(value)
}

/// Render a value for text insertion: strings raw, everything else compact JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let mut vars = Variables::new();
        vars.insert("user".to_string(), json!({"tags": ["a", "b"], "name": "Ada"}));
        assert_eq!(lookup(&vars, "user.name"), Some(&json!("Ada")));
        assert_eq!(lookup(&vars, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup(&vars, "user.missing"), None);
        assert_eq!(lookup(&vars, "nobody"), None);
    }

    #[test]
    fn value_to_text_keeps_strings_raw() {
        assert_eq!(value_to_text(&json!("hi")), "hi");
        assert_eq!(value_to_text(&json!(3)), "3");
        assert_eq!(value_to_text(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
