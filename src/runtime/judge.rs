//! Judging prompts for `optimizeAgent` and `bestOfAllAgent`
//!
//! The model is asked for a small JSON object; the first `{...}` span of the
//! reply is parsed, so surrounding prose or code fences are tolerated.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::binding::value_to_text;
use crate::error::{FlowError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    pub satisfied: bool,
    #[serde(default)]
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Choice {
    pub winner: usize,
    #[serde(default)]
    pub reason: String,
}

pub(crate) fn evaluation_prompt(criteria: &str, result: &Value) -> String {
    format!(
        "Evaluate the result below against the criteria.\n\n\
         Criteria:\n{criteria}\n\n\
         Result:\n{}\n\n\
         Answer with JSON only: {{\"satisfied\": true|false, \"feedback\": \"how to improve\"}}",
        value_to_text(result)
    )
}

pub(crate) fn selection_prompt(criteria: &str, candidates: &[Value]) -> String {
    let listed: String = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{i}]\n{}\n\n", value_to_text(c)))
        .collect();
    format!(
        "Choose the best candidate for the criteria.\n\n\
         Criteria:\n{criteria}\n\n\
         Candidates:\n{listed}\
         Answer with JSON only: {{\"winner\": <index>, \"reason\": \"why\"}}"
    )
}

pub(crate) fn parse_verdict(reply: &str) -> Result<Verdict> {
    parse_json(reply)
}

pub(crate) fn parse_choice(reply: &str, candidates: usize) -> Result<Choice> {
    let choice: Choice = parse_json(reply)?;
    if choice.winner >= candidates {
        return Err(FlowError::JudgeParse {
            reason: format!(
                "winner index {} out of range for {} candidates",
                choice.winner, candidates
            ),
        });
    }
    Ok(choice)
}

fn parse_json<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let span = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(FlowError::JudgeParse {
                reason: format!("no JSON object in reply: {}", truncate(reply)),
            })
        }
    };
    serde_json::from_str(span).map_err(|e| FlowError::JudgeParse {
        reason: format!("{e} in reply: {}", truncate(reply)),
    })
}

fn truncate(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn verdict_tolerates_fences_and_prose() {
        let reply = "Sure!\n```json\n{\"satisfied\": false, \"feedback\": \"shorter\"}\n```";
        assert_eq!(
            parse_verdict(reply).unwrap(),
            Verdict {
                satisfied: false,
                feedback: "shorter".to_string()
            }
        );
        assert!(parse_verdict(r#"{"satisfied": true}"#).unwrap().satisfied);
    }

    #[test]
    fn verdict_without_json_is_judge_parse() {
        assert!(matches!(
            parse_verdict("looks fine to me"),
            Err(FlowError::JudgeParse { .. })
        ));
    }

    #[test]
    fn choice_index_is_bounded() {
        assert_eq!(parse_choice(r#"{"winner": 1}"#, 2).unwrap().winner, 1);
        assert!(parse_choice(r#"{"winner": 2}"#, 2).is_err());
    }

    #[test]
    fn prompts_list_candidates() {
        let prompt = selection_prompt("be brief", &[json!("a"), json!({"b": 1})]);
        assert!(prompt.contains("[0]\na"));
        assert!(prompt.contains(r#"[1]
{"b":1}"#));
        assert!(evaluation_prompt("be brief", &json!("draft")).contains("draft"));
    }
}
