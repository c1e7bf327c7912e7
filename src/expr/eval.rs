//! Evaluation of [`Expr`] against a variable map

use std::cmp::Ordering;

use serde_json::Value;

use super::parser::{BinaryOp, Expr};
use super::{expression_error, number_value};
use crate::binding::{value_to_text, Variables};
use crate::error::{FlowError, Result};

/// JS-like truthiness (empty array is false)
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

/// Numbers, and strings that hold a number
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub struct Evaluator<'a> {
    source: &'a str,
    variables: &'a Variables,
}

impl<'a> Evaluator<'a> {
    pub fn new(source: &'a str, variables: &'a Variables) -> Self {
        Self { source, variables }
    }

    fn error(&self, reason: &str) -> FlowError {
        expression_error(self.source, reason)
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| FlowError::UnknownVariable { name: name.clone() }),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?))),
            Expr::Neg(inner) => {
                let v = self.eval(inner)?;
                let n = as_number(&v).ok_or_else(|| self.error("cannot negate a non-number"))?;
                Ok(number_value(-n))
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Member(target, field) => {
                let target = self.eval(target)?;
                self.member(&target, field)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                match (&target, &index) {
                    (Value::Array(items), idx) => {
                        let i = as_number(idx)
                            .filter(|i| i.is_finite() && *i >= 0.0 && i.fract() == 0.0)
                            .ok_or_else(|| {
                                self.error("array index must be a non-negative integer")
                            })?;
                        Ok(items.get(i as usize).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Object(map), key) => {
                        Ok(map.get(&value_to_text(key)).cloned().unwrap_or(Value::Null))
                    }
                    (Value::Null, _) => Err(self.error("cannot index null")),
                    _ => Ok(Value::Null),
                }
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<Result<Vec<_>>>()?;
                self.call(name, &args)
            }
        }
    }

    fn member(&self, target: &Value, field: &str) -> Result<Value> {
        match target {
            Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
            Value::Array(items) if field == "length" => Ok(Value::from(items.len())),
            Value::Array(items) => Ok(field
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null)),
            Value::String(s) if field == "length" => Ok(Value::from(s.chars().count())),
            Value::Null => Err(self.error(&format!("cannot read '{}' of null", field))),
            _ => Ok(Value::Null),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        // rhs of && / || is evaluated only when it decides the result
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(
                    truthy(&self.eval(lhs)?) && truthy(&self.eval(rhs)?),
                ))
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(
                    truthy(&self.eval(lhs)?) || truthy(&self.eval(rhs)?),
                ))
            }
            _ => {}
        }

        let l = self.eval(lhs)?;
        let r = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(loose_eq(&l, &r))),
            BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&l, &r))),
            BinaryOp::StrictEq => Ok(Value::Bool(strict_eq(&l, &r))),
            BinaryOp::StrictNe => Ok(Value::Bool(!strict_eq(&l, &r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ord = self.compare(&l, &r)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Le => ord != Ordering::Greater,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }))
            }
            BinaryOp::Add => {
                if let (Value::String(_), _) | (_, Value::String(_)) = (&l, &r) {
                    if let (Some(a), Some(b)) = (as_number(&l), as_number(&r)) {
                        return Ok(number_value(a + b));
                    }
                    return Ok(Value::String(value_to_text(&l) + &value_to_text(&r)));
                }
                let (a, b) = self.numbers(&l, &r, "+")?;
                Ok(number_value(a + b))
            }
            BinaryOp::Sub => self.numbers(&l, &r, "-").map(|(a, b)| number_value(a - b)),
            BinaryOp::Mul => self.numbers(&l, &r, "*").map(|(a, b)| number_value(a * b)),
            BinaryOp::Div | BinaryOp::Rem => {
                let (a, b) = self.numbers(&l, &r, if op == BinaryOp::Div { "/" } else { "%" })?;
                if b == 0.0 {
                    return Err(self.error("division by zero"));
                }
                Ok(number_value(if op == BinaryOp::Div { a / b } else { a % b }))
            }
            BinaryOp::And => Ok(Value::Bool(truthy(&l) && truthy(&r))),
            BinaryOp::Or => Ok(Value::Bool(truthy(&l) || truthy(&r))),
        }
    }

    fn numbers(&self, l: &Value, r: &Value, op: &str) -> Result<(f64, f64)> {
        match (as_number(l), as_number(r)) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(self.error(&format!("'{}' needs numeric operands", op))),
        }
    }

    fn compare(&self, l: &Value, r: &Value) -> Result<Ordering> {
        if let (Some(a), Some(b)) = (as_number(l), as_number(r)) {
            return a
                .partial_cmp(&b)
                .ok_or_else(|| self.error("cannot compare NaN"));
        }
        match (l, r) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => Err(self.error("operands cannot be compared")),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let arity = |n: usize| -> Result<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(self.error(&format!(
                    "{}() takes {} argument(s), got {}",
                    name,
                    n,
                    args.len()
                )))
            }
        };
        match name {
            "len" => {
                arity(1)?;
                match &args[0] {
                    Value::String(s) => Ok(Value::from(s.chars().count())),
                    Value::Array(items) => Ok(Value::from(items.len())),
                    Value::Object(map) => Ok(Value::from(map.len())),
                    Value::Null => Ok(Value::from(0)),
                    _ => Err(self.error("len() needs a string, array or object")),
                }
            }
            "contains" => {
                arity(2)?;
                Ok(Value::Bool(match (&args[0], &args[1]) {
                    (Value::String(hay), needle) => hay.contains(&value_to_text(needle)),
                    (Value::Array(items), needle) => items.iter().any(|i| loose_eq(i, needle)),
                    (Value::Object(map), key) => map.contains_key(&value_to_text(key)),
                    _ => false,
                }))
            }
            "lower" => {
                arity(1)?;
                Ok(Value::String(value_to_text(&args[0]).to_lowercase()))
            }
            "upper" => {
                arity(1)?;
                Ok(Value::String(value_to_text(&args[0]).to_uppercase()))
            }
            other => Err(self.error(&format!("unknown function '{}'", other))),
        }
    }
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        _ => match (as_number(l), as_number(r)) {
            (Some(a), Some(b)) => a == b,
            _ => l == r,
        },
    }
}

fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}
