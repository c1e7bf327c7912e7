//! Expression Module - sandboxed conditions over bound variables
//!
//! Grammar (lowest to highest precedence):
//! ```text
//! expr     := or
//! or       := and ( '||' and )*
//! and      := equality ( '&&' equality )*
//! equality := compare ( ('=='|'!='|'==='|'!==') compare )*
//! compare  := additive ( ('<'|'<='|'>'|'>=') additive )*
//! additive := term ( ('+'|'-') term )*
//! term     := unary ( ('*'|'/'|'%') unary )*
//! unary    := ('!'|'-') unary | postfix
//! postfix  := primary ( '.' ident | '[' expr ']' )*
//! primary  := number | string | true | false | null | ident | '@' ident | '$' ident
//!           | ident '(' args ')' | '(' expr ')'
//! ```
//!
//! Identifiers read the run's variable map; an unbound name is an error, never
//! a silent `false`. The only callable functions are `len`, `contains`,
//! `lower` and `upper`. There is no assignment and no access outside the map.

mod eval;
mod lexer;
mod parser;

pub use eval::truthy;
pub use parser::{BinaryOp, Expr};

use serde_json::{Number, Value};

use crate::binding::Variables;
use crate::error::{FlowError, Result};

/// Parse an expression without evaluating it
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = lexer::tokenize(source)?;
    parser::Parser::new(source, tokens).parse()
}

/// Evaluate to a JSON value
pub fn evaluate_expression(source: &str, variables: &Variables) -> Result<Value> {
    let expr = parse(source)?;
    eval::Evaluator::new(source, variables).eval(&expr)
}

/// Evaluate and apply truthiness
pub fn evaluate_condition(source: &str, variables: &Variables) -> Result<bool> {
    evaluate_expression(source, variables).map(|v| truthy(&v))
}

pub(crate) fn expression_error(source: &str, reason: &str) -> FlowError {
    FlowError::Expression {
        expression: source.to_string(),
        reason: reason.to_string(),
    }
}

/// Integral floats become JSON integers so `2 + 1` prints as `3`
pub(crate) fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn cond(src: &str, v: &Variables) -> bool {
        evaluate_condition(src, v).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════
    // Comparison + logic
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn numeric_comparisons() {
        let v = vars(&[("x", json!(7))]);
        assert!(cond("x > 5", &v));
        assert!(!cond("!(x > 5)", &v));
        assert!(cond("x >= 7 && x <= 7", &v));
        assert!(cond("x < 5 || x == 7", &v));
    }

    #[test]
    fn numeric_strings_coerce() {
        let v = vars(&[("score", json!("8.5"))]);
        assert!(cond("score > 8", &v));
        assert!(cond("score == 8.5", &v));
        assert!(!cond("score === 8.5", &v));
    }

    #[test]
    fn string_equality_and_ordering() {
        let v = vars(&[("status", json!("done"))]);
        assert!(cond("status == 'done'", &v));
        assert!(cond("status != \"open\"", &v));
        assert!(cond("'apple' < 'banana'", &v));
    }

    #[test]
    fn short_circuit_skips_unbound_rhs() {
        let v = vars(&[("ok", json!(false))]);
        assert!(!cond("ok && missing > 1", &v));
        assert!(cond("!ok || missing", &v));
    }

    #[test]
    fn truthiness_rules() {
        let v = vars(&[
            ("empty", json!([])),
            ("items", json!([1])),
            ("blank", json!("")),
            ("zero", json!(0)),
            ("obj", json!({})),
        ]);
        assert!(!cond("empty", &v));
        assert!(cond("items", &v));
        assert!(!cond("blank", &v));
        assert!(!cond("zero", &v));
        assert!(cond("obj", &v));
        assert!(!cond("null", &v));
    }

    // ═══════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn arithmetic_values() {
        let v = Variables::new();
        assert_eq!(evaluate_expression("1 + 2 * 3", &v).unwrap(), json!(7));
        assert_eq!(evaluate_expression("(1 + 2) * 3", &v).unwrap(), json!(9));
        assert_eq!(evaluate_expression("7 % 4 - 1", &v).unwrap(), json!(2));
        assert_eq!(evaluate_expression("1 / 4", &v).unwrap(), json!(0.25));
        assert_eq!(evaluate_expression("-3 + 1", &v).unwrap(), json!(-2));
        assert_eq!(evaluate_expression("'a' + 'b'", &v).unwrap(), json!("ab"));
    }

    #[test]
    fn member_and_index_access() {
        let v = vars(&[("user", json!({"name": "Ada", "tags": ["x", "y"]}))]);
        assert_eq!(evaluate_expression("user.name", &v).unwrap(), json!("Ada"));
        assert_eq!(evaluate_expression("user.tags[1]", &v).unwrap(), json!("y"));
        assert_eq!(evaluate_expression("user.tags.0", &v).unwrap(), json!("x"));
        assert_eq!(evaluate_expression("user.tags.length", &v).unwrap(), json!(2));
        assert_eq!(evaluate_expression("user.missing", &v).unwrap(), Value::Null);
    }

    #[test]
    fn builtins() {
        let v = vars(&[("title", json!("Rust Async")), ("tags", json!(["a", "b"]))]);
        assert!(cond("contains(lower(title), 'rust')", &v));
        assert!(cond("contains(tags, 'b')", &v));
        assert!(cond("len(tags) == 2", &v));
        assert_eq!(evaluate_expression("upper('x')", &v).unwrap(), json!("X"));
    }

    #[test]
    fn sigil_variables() {
        let v = vars(&[("limit", json!(3))]);
        assert!(cond("@limit == 3", &v));
        assert!(cond("$limit > 2", &v));
    }

    // ═══════════════════════════════════════════════════════════════
    // Failures
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn unbound_variable_is_an_error() {
        let err = evaluate_condition("missing > 1", &Variables::new()).unwrap_err();
        assert!(matches!(err, FlowError::UnknownVariable { ref name } if name == "missing"));
    }

    #[test]
    fn malformed_expression_is_an_error() {
        let err = evaluate_condition("x >", &vars(&[("x", json!(1))])).unwrap_err();
        assert!(matches!(err, FlowError::Expression { .. }));
    }

    #[test]
    fn only_builtin_functions_are_callable() {
        let err = evaluate_expression("exec('rm -rf /')", &Variables::new()).unwrap_err();
        assert!(err.to_string().contains("unknown function 'exec'"));
        assert!(evaluate_expression("x = 1", &Variables::new()).is_err());
    }

    #[test]
    fn array_index_must_be_a_whole_number() {
        let v = vars(&[("xs", json!(["first", "second"]))]);
        assert_eq!(evaluate_expression("xs[1.0]", &v).unwrap(), json!("second"));
        assert_eq!(evaluate_expression("xs[5]", &v).unwrap(), Value::Null);
        for src in ["xs[-1]", "xs[0.9]", "xs['a']"] {
            let err = evaluate_expression(src, &v).unwrap_err();
            assert!(matches!(err, FlowError::Expression { .. }), "{src}: {err}");
        }
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(evaluate_expression("1 / 0", &Variables::new()).is_err());
    }

    #[test]
    fn mismatched_comparison_is_an_error() {
        let v = vars(&[("o", json!({"a": 1}))]);
        assert!(evaluate_condition("o > 1", &v).is_err());
    }
}
