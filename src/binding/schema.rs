//! Input schema and flow-input validation
//!
//! `build_input_schema` compiles the declared inputs into a JSON Schema
//! (`jsonschema` crate). `validate_flow_input` produces the human-readable
//! error list used to reject a run before anything executes.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::ast::{InputVariable, VariableType};
use crate::error::{FlowError, Result};

/// Compiled validator for a flow's inputs
pub struct InputSchema {
    document: Value,
    validator: jsonschema::Validator,
}

impl fmt::Debug for InputSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSchema")
            .field("document", &self.document)
            .finish()
    }
}

impl InputSchema {
    /// The JSON Schema document
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Absent input validates as `{}`
    pub fn is_valid(&self, input: &Value) -> bool {
        self.validator.is_valid(normalize(input))
    }

    pub fn errors(&self, input: &Value) -> Vec<String> {
        self.validator
            .iter_errors(normalize(input))
            .map(|e| e.to_string())
            .collect()
    }
}

static EMPTY_OBJECT: std::sync::LazyLock<Value> = std::sync::LazyLock::new(|| json!({}));

fn normalize(input: &Value) -> &Value {
    if input.is_null() {
        &*EMPTY_OBJECT
    } else {
        input
    }
}

fn type_schema(var_type: VariableType) -> Value {
    match var_type {
        VariableType::Number => json!({ "type": "number" }),
        VariableType::Json => json!({}),
        _ => json!({ "type": "string" }),
    }
}

/// Build the input schema for a list of declarations
pub fn build_input_schema(variables: &[InputVariable]) -> Result<InputSchema> {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for var in variables {
        let mut schema = type_schema(var.var_type);
        if let (Some(description), Value::Object(obj)) = (&var.description, &mut schema) {
            obj.insert("description".to_string(), json!(description));
        }
        properties.insert(var.name.clone(), schema);
        if var.required {
            required.push(json!(var.name));
        }
    }

    let document = json!({
        "type": "object",
        "properties": properties,
        "required": required,
    });
    let validator =
        jsonschema::validator_for(&document).map_err(|e| FlowError::ValidationError {
            reason: format!("invalid input schema: {}", e),
        })?;
    Ok(InputSchema {
        document,
        validator,
    })
}

/// Result of [`validate_flow_input`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl InputValidation {
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(FlowError::InvalidInput {
                errors: self.errors,
            })
        }
    }
}

/// Check an input object against declarations
pub fn validate_flow_input(input: &Value, variables: &[InputVariable]) -> InputValidation {
    let mut errors = Vec::new();
    let empty = Map::new();
    let values = match input {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => {
            errors.push("Flow input must be an object".to_string());
            &empty
        }
    };

    for var in variables {
        match values.get(&var.name) {
            None | Some(Value::Null) => {
                if var.required {
                    errors.push(format!("Required input variable '{}' is missing", var.name));
                }
            }
            Some(value) => {
                let expected = match var.var_type {
                    VariableType::Number if !value.is_number() => Some("number"),
                    t if t.is_text() && !value.is_string() => Some("string"),
                    _ => None,
                };
                if let Some(expected) = expected {
                    errors.push(format!(
                        "Input variable '{}' must be a {}",
                        var.name, expected
                    ));
                }
            }
        }
    }

    InputValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Parse a command-line `name=value` value according to its declared type
///
/// Text types stay strings; `number` and `json` are parsed when possible so
/// validation reports the mismatch instead of silently coercing.
pub fn parse_input_value(raw: &str, var_type: Option<VariableType>) -> Value {
    match var_type {
        Some(t) if t.is_text() => Value::String(raw.to_string()),
        Some(VariableType::Number) => serde_json::from_str::<serde_json::Number>(raw.trim())
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        _ => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str, var_type: VariableType, required: bool) -> InputVariable {
        InputVariable::new(name, var_type, required)
    }

    // ═══════════════════════════════════════════════════════════════
    // build_input_schema
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn number_schema_accepts_numbers_only() {
        let schema = build_input_schema(&[var("age", VariableType::Number, true)]).unwrap();
        assert!(schema.is_valid(&json!({"age": 25})));
        assert!(!schema.is_valid(&json!({"age": "twenty-five"})));
        assert!(!schema.errors(&json!({"age": "twenty-five"})).is_empty());
    }

    #[test]
    fn optional_variables_may_be_absent() {
        let schema = build_input_schema(&[
            var("name", VariableType::ShortText, true),
            var("notes", VariableType::LongText, false),
        ])
        .unwrap();
        assert!(schema.is_valid(&json!({"name": "x"})));
        assert!(!schema.is_valid(&json!({"notes": "y"})));
        assert_eq!(schema.document()["required"], json!(["name"]));
    }

    #[test]
    fn empty_declarations_accept_empty_and_absent() {
        let schema = build_input_schema(&[]).unwrap();
        assert!(schema.is_valid(&json!({})));
        assert!(schema.is_valid(&Value::Null));
    }

    #[test]
    fn json_type_accepts_anything() {
        let schema = build_input_schema(&[var("cfg", VariableType::Json, true)]).unwrap();
        assert!(schema.is_valid(&json!({"cfg": [1, {"a": null}]})));
        assert!(schema.is_valid(&json!({"cfg": "text"})));
    }

    // ═══════════════════════════════════════════════════════════════
    // validate_flow_input
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn missing_required_is_reported() {
        let result = validate_flow_input(&json!({}), &[var("email", VariableType::ShortText, true)]);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec!["Required input variable 'email' is missing"]
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let result =
            validate_flow_input(&json!({"email": null}), &[var("email", VariableType::Url, true)]);
        assert!(!result.valid);
    }

    #[test]
    fn type_mismatches_are_reported() {
        let result = validate_flow_input(
            &json!({"age": "old", "name": 42, "cfg": 1}),
            &[
                var("age", VariableType::Number, true),
                var("name", VariableType::ShortText, false),
                var("cfg", VariableType::Json, false),
            ],
        );
        assert_eq!(
            result.errors,
            vec![
                "Input variable 'age' must be a number",
                "Input variable 'name' must be a string",
            ]
        );
        assert!(matches!(
            result.into_result(),
            Err(FlowError::InvalidInput { .. })
        ));
    }

    #[test]
    fn optional_absent_is_valid() {
        let result = validate_flow_input(&Value::Null, &[var("x", VariableType::Number, false)]);
        assert!(result.valid);
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn parse_input_value_by_type() {
        assert_eq!(parse_input_value("42", Some(VariableType::ShortText)), json!("42"));
        assert_eq!(parse_input_value("42", Some(VariableType::Number)), json!(42));
        assert_eq!(parse_input_value("many", Some(VariableType::Number)), json!("many"));
        assert_eq!(parse_input_value(r#"{"a":1}"#, Some(VariableType::Json)), json!({"a": 1}));
        assert_eq!(parse_input_value("plain", None), json!("plain"));
    }
}
