use std::cmp::Ordering;

use serde_json::Value;

use canvasflow_core::error::{FlowError, Result};
use canvasflow_core::types::value_to_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    fn is_unary(self) -> bool {
        matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

// Longest first so `>=` wins over `>` and `not contains` over `contains`.
const OPERATORS: &[(&str, Operator)] = &[
    ("is not empty", Operator::IsNotEmpty),
    ("is empty", Operator::IsEmpty),
    ("not contains", Operator::NotContains),
    ("contains", Operator::Contains),
    ("startsWith", Operator::StartsWith),
    ("endsWith", Operator::EndsWith),
    (">=", Operator::Ge),
    ("<=", Operator::Le),
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

/// Evaluate a conditional node's expression against its inputs.
///
/// Grammar: `OPERAND [OPERATOR [LITERAL]]`, or the bare literals `true` and
/// `false`.
/// - operands: `input`, `inputN`, `$input`, `$inputN`, optionally followed
///   by a `.field.path`
/// - literals: quoted strings, numbers, `true`, `false`, `null`; an
///   unquoted word is taken as a string
/// - an operand alone tests truthiness
///
/// Numbers (and numeric strings) compare numerically, everything else by
/// text. Expressions that cannot be parsed are an error, never `false`.
pub fn evaluate_condition(expr: &str, inputs: &[Value]) -> Result<bool> {
    let expr = expr.trim();
    match expr {
        "" => return Err(FlowError::Condition("empty expression".into())),
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }

    let operand_end = expr
        .find(|c: char| c.is_whitespace() || "=!<>".contains(c))
        .unwrap_or(expr.len());
    let left = resolve_operand(&expr[..operand_end], inputs)?;
    let rest = expr[operand_end..].trim_start();

    if rest.is_empty() {
        return Ok(is_truthy(&left));
    }

    let (op, tail) = parse_operator(rest)
        .ok_or_else(|| FlowError::Condition(format!("unknown operator in '{}'", expr)))?;
    let tail = tail.trim();

    let right = match (op.is_unary(), tail.is_empty()) {
        (true, true) => Value::Null,
        (true, false) => {
            return Err(FlowError::Condition(format!(
                "unexpected '{}' after operator",
                tail
            )))
        }
        (false, true) => {
            return Err(FlowError::Condition(format!(
                "missing right-hand side in '{}'",
                expr
            )))
        }
        (false, false) => parse_literal(tail),
    };

    Ok(match op {
        Operator::Eq => loosely_equal(&left, &right),
        Operator::Ne => !loosely_equal(&left, &right),
        Operator::Gt => compare(&left, &right) == Ordering::Greater,
        Operator::Ge => compare(&left, &right) != Ordering::Less,
        Operator::Lt => compare(&left, &right) == Ordering::Less,
        Operator::Le => compare(&left, &right) != Ordering::Greater,
        Operator::Contains => contains(&left, &right),
        Operator::NotContains => !contains(&left, &right),
        Operator::StartsWith => value_to_text(&left).starts_with(&value_to_text(&right)),
        Operator::EndsWith => value_to_text(&left).ends_with(&value_to_text(&right)),
        Operator::IsEmpty => is_empty(&left),
        Operator::IsNotEmpty => !is_empty(&left),
    })
}

fn parse_operator(rest: &str) -> Option<(Operator, &str)> {
    OPERATORS.iter().find_map(|(token, op)| {
        let tail = rest.strip_prefix(token)?;
        let word = token.chars().all(|c| c.is_alphabetic() || c == ' ');
        // Word operators must end at a boundary: `containsx` is not `contains`.
        let at_boundary =
            tail.is_empty() || tail.starts_with(|c: char| c.is_whitespace() || c == '"' || c == '\'');
        if word && !at_boundary {
            return None;
        }
        Some((*op, tail))
    })
}

fn resolve_operand(raw: &str, inputs: &[Value]) -> Result<Value> {
    let name = raw.strip_prefix('$').unwrap_or(raw);
    let (head, path) = match name.split_once('.') {
        Some((head, path)) => (head, Some(path)),
        None => (name, None),
    };

    let digits = head
        .strip_prefix("input")
        .ok_or_else(|| FlowError::Condition(format!("unknown operand '{}'", raw)))?;
    let index = if digits.is_empty() {
        0
    } else {
        digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| FlowError::Condition(format!("invalid input index in '{}'", raw)))?
    };

    let mut current = inputs.get(index);
    if let Some(path) = path {
        for segment in path.split('.') {
            current = current.and_then(|value| match value {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            });
        }
    }
    Ok(current.cloned().unwrap_or(Value::Null))
}

fn parse_literal(raw: &str) -> Value {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Value::String(raw[1..raw.len() - 1].to_string());
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => a.is_null() && b.is_null(),
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => value_to_text(a) == value_to_text(b),
        },
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => value_to_text(a).cmp(&value_to_text(b)),
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, needle)),
        Value::Object(map) => map.contains_key(&value_to_text(needle)),
        Value::Null => false,
        other => value_to_text(other).contains(&value_to_text(needle)),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
