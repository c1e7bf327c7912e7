//! Template Interpolation - `{{name}}` substitution at call time
//!
//! Syntax: `{{name}}` or `{{name.field}}` / `{{name.0}}`.
//! Single pass with `Cow<str>`, so templates without placeholders never allocate.
//! Placeholders naming an unbound variable are left untouched.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use super::{lookup, value_to_text, Variables};

/// Pre-compiled regex for {{name}} or {{name.path}}
static VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}").unwrap()
});

/// Interpolate every bound `{{...}}` placeholder
///
/// Example: `Summarize {{doc.title}}` → `Summarize Rust in Action`
pub fn interpolate<'a>(template: &'a str, variables: &Variables) -> Cow<'a, str> {
    if !template.contains("{{") {
        return Cow::Borrowed(template);
    }
    VAR_RE.replace_all(template, |cap: &Captures| match lookup(variables, &cap[1]) {
        Some(value) => value_to_text(value),
        None => cap[0].to_string(),
    })
}

/// Interpolate every string inside a JSON value
///
/// A string that is exactly one bound placeholder takes the bound value itself,
/// so `"{{count}}"` stays a number.
pub fn interpolate_value(value: &Value, variables: &Variables) -> Value {
    match value {
        Value::String(s) => {
            if let Some(cap) = VAR_RE.captures(s).filter(|c| c[0].len() == s.len()) {
                if let Some(bound) = lookup(variables, &cap[1]) {
                    return bound.clone();
                }
            }
            Value::String(interpolate(s, variables).into_owned())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| interpolate_value(v, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Placeholder paths in order of appearance
pub fn extract_refs(template: &str) -> Vec<String> {
    VAR_RE
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}
