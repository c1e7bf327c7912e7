//! `@name` injection into runtime nodes
//!
//! Injection is structural and happens once, before execution: every `@key`
//! with a binding is replaced in string inputs, conditions and criteria.
//! Replacement is token-exact, so a binding for `name` never rewrites the
//! prefix of `@names`.

use std::borrow::Cow;
use std::future::Future;
use std::path::Path;
use std::sync::LazyLock;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use regex::{Captures, Regex};
use serde_json::Value;

use super::{value_to_text, Bindings};
use crate::ast::{AgentTag, RuntimeInput, RuntimeNode};
use crate::error::{FlowError, Result};

/// `@` followed by one or more word characters
static AT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]+)").unwrap());

/// Names referenced with `@`, in order, duplicates kept
pub fn extract_variable_names(text: &str) -> Vec<String> {
    AT_RE
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Replace every bound `@key`; unbound tokens stay as written
pub fn substitute<'a>(text: &'a str, bindings: &Bindings) -> Cow<'a, str> {
    if !text.contains('@') || bindings.is_empty() {
        return Cow::Borrowed(text);
    }
    AT_RE.replace_all(text, |cap: &Captures| match bindings.get(&cap[1]) {
        Some(value) => value.clone(),
        None => cap[0].to_string(),
    })
}

/// String bindings from a flow input object (null values are skipped)
pub fn bindings_from_input(input: &Value) -> Bindings {
    match input {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), value_to_text(v)))
            .collect(),
        _ => Bindings::new(),
    }
}

/// Substitute bindings through a node and all its descendants
///
/// Tool and UI payloads are substituted inside their JSON string values, so
/// a bound value containing quotes cannot break the payload.
pub fn inject_variables<'a>(node: &'a mut RuntimeNode, bindings: &Bindings) -> &'a mut RuntimeNode {
    if let RuntimeInput::Text(text) = &mut node.input {
        let replaced = match node.agent {
            AgentTag::Tool | AgentTag::UiComponent => substitute_payload(text, bindings),
            _ => substitute(text, bindings).into_owned(),
        };
        *text = replaced;
    }
    if let Some(conditions) = &mut node.conditions {
        for condition in conditions.iter_mut() {
            *condition = substitute(condition, bindings).into_owned();
        }
    }
    if let Some(criteria) = &mut node.criteria {
        *criteria = substitute(criteria, bindings).into_owned();
    }
    for child in node.children_mut() {
        inject_variables(child, bindings);
    }
    node
}

fn substitute_payload(text: &str, bindings: &Bindings) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(mut payload) => {
            substitute_json(&mut payload, bindings);
            payload.to_string()
        }
        Err(_) => substitute(text, bindings).into_owned(),
    }
}

fn substitute_json(value: &mut Value, bindings: &Bindings) {
    match value {
        Value::String(s) => {
            if let Cow::Owned(replaced) = substitute(s, bindings) {
                *s = replaced;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| substitute_json(v, bindings)),
        Value::Object(map) => map.values_mut().for_each(|v| substitute_json(v, bindings)),
        _ => {}
    }
}

/// Async tree walk replacing each node's `input` with `transform(node)`
///
/// Unnamed nodes get their tag as name. The walk descends into the children
/// of the *new* input; array siblings are transformed concurrently.
pub fn transform_inputs<'a, F, Fut>(node: &'a mut RuntimeNode, transform: &'a F) -> BoxFuture<'a, Result<()>>
where
    F: Fn(&RuntimeNode) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RuntimeInput>> + Send + 'a,
{
    async move {
        node.input = transform(node).await?;
        if node.name.is_none() {
            node.name = Some(node.agent.to_string());
        }
        try_join_all(
            node.children_mut()
                .into_iter()
                .map(|child| transform_inputs(child, transform)),
        )
        .await?;
        Ok(())
    }
    .boxed()
}

/// Synchronous counterpart of [`transform_inputs`]
pub fn transform_inputs_sync<F>(node: &mut RuntimeNode, transform: &F) -> Result<()>
where
    F: Fn(&RuntimeNode) -> Result<RuntimeInput>,
{
    node.input = transform(node)?;
    if node.name.is_none() {
        node.name = Some(node.agent.to_string());
    }
    for child in node.children_mut() {
        transform_inputs_sync(child, transform)?;
    }
    Ok(())
}

/// Replace `file:<path>` step inputs with the file contents (relative to `base_dir`)
pub async fn load_file_inputs(node: &mut RuntimeNode, base_dir: &Path) -> Result<()> {
    let load = |n: &RuntimeNode| {
        let input = n.input.clone();
        let is_step = !n.agent.is_reserved();
        let base = base_dir.to_path_buf();
        async move {
            match input {
                RuntimeInput::Text(text) if is_step => match text.strip_prefix("file:") {
                    Some(rel) => tokio::fs::read_to_string(base.join(rel.trim()))
                        .await
                        .map(RuntimeInput::Text)
                        .map_err(FlowError::from),
                    None => Ok(RuntimeInput::Text(text)),
                },
                other => Ok::<_, FlowError>(other),
            }
        }
    };
    transform_inputs(node, &load).await
}
