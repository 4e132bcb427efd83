//! Expression evaluation against a JSON data context.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("cannot parse expression: {0}")]
    Syntax(String),

    #[error("no property '{0}' in context")]
    MissingProperty(String),

    #[error("'{path}' is a {type_name} and cannot be navigated")]
    NotNavigable { path: String, type_name: &'static str },
}

/// Evaluates directive arguments and placeholder bodies.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, EvaluationError>;
}

/// JSON type name used in diagnostics.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Loose truthiness used by `!`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// Property-path evaluator.
///
/// Understands `a.b[0].c`, `this` / `#this`, quoted strings, numbers,
/// `true`, `false`, `null`, prefix `!` and the `==` / `!=` comparisons.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathEvaluator;

impl ExpressionEvaluator for PathEvaluator {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, EvaluationError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(EvaluationError::Syntax("empty expression".to_string()));
        }

        if let Some((left, op, right)) = split_comparison(expression) {
            let left = self.evaluate(left, context)?;
            let right = self.evaluate(right, context)?;
            let equal = loosely_equal(&left, &right);
            return Ok(Value::Bool(if op == "==" { equal } else { !equal }));
        }

        if let Some(rest) = expression.strip_prefix('!') {
            return Ok(Value::Bool(!is_truthy(&self.evaluate(rest, context)?)));
        }

        if let Some(literal) = parse_literal(expression)? {
            return Ok(literal);
        }

        resolve_path(expression, context).cloned()
    }
}

/// Numbers compare by value so `1 == 1.0` holds.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => left == right,
    }
}

/// Splits on the first `==` or `!=` outside quotes.
fn split_comparison(expression: &str) -> Option<(&str, &'static str, &str)> {
    let bytes = expression.as_bytes();
    let mut quote: Option<u8> = None;
    for i in 0..bytes.len().saturating_sub(1) {
        let c = bytes[i];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == b'\'' || c == b'"' => quote = Some(c),
            None if bytes[i + 1] == b'=' && (c == b'=' || c == b'!') => {
                let op = if c == b'=' { "==" } else { "!=" };
                return Some((&expression[..i], op, &expression[i + 2..]));
            }
            None => {}
        }
    }
    None
}

fn parse_literal(expression: &str) -> Result<Option<Value>, EvaluationError> {
    match expression {
        "true" => return Ok(Some(Value::Bool(true))),
        "false" => return Ok(Some(Value::Bool(false))),
        "null" => return Ok(Some(Value::Null)),
        _ => {}
    }

    for quote in ['\'', '"'] {
        if let Some(rest) = expression.strip_prefix(quote) {
            let inner = rest.strip_suffix(quote).ok_or_else(|| {
                EvaluationError::Syntax(format!("unterminated string literal {expression}"))
            })?;
            return Ok(Some(Value::String(inner.to_string())));
        }
    }

    if expression.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        return serde_json::from_str::<serde_json::Number>(expression)
            .map(|n| Some(Value::Number(n)))
            .map_err(|_| EvaluationError::Syntax(format!("invalid number {expression}")));
    }
    Ok(None)
}

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, EvaluationError> {
    let syntax = || EvaluationError::Syntax(format!("invalid property path {path}"));
    let mut segments = Vec::new();
    let mut rest = path;

    for root in ["#this", "this"] {
        if let Some(after) = rest.strip_prefix(root) {
            if after.is_empty() || after.starts_with(['.', '[']) {
                rest = after.strip_prefix('.').unwrap_or(after);
                break;
            }
        }
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(syntax)?;
            let inner = after[..close].trim();
            let quoted = inner
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
            match quoted {
                Some(key) => segments.push(Segment::Key(key)),
                None => segments.push(Segment::Index(inner.parse().map_err(|_| syntax())?)),
            }
            rest = &after[close + 1..];
        } else {
            let end = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
                .unwrap_or(rest.len());
            if end == 0 {
                return Err(syntax());
            }
            segments.push(Segment::Key(&rest[..end]));
            rest = &rest[end..];
        }
        if let Some(after) = rest.strip_prefix('.') {
            if after.is_empty() {
                return Err(syntax());
            }
            rest = after;
        } else if !rest.is_empty() && !rest.starts_with('[') {
            return Err(syntax());
        }
    }
    Ok(segments)
}

fn resolve_path<'v>(path: &str, context: &'v Value) -> Result<&'v Value, EvaluationError> {
    let mut current = context;
    let mut walked = String::new();
    for segment in parse_path(path)? {
        let next = match (&segment, current) {
            (Segment::Key(key), Value::Object(map)) => map.get(*key),
            (Segment::Index(index), Value::Array(items)) => items.get(*index),
            _ => {
                return Err(EvaluationError::NotNavigable {
                    path: if walked.is_empty() { "this".to_string() } else { walked },
                    type_name: json_type_name(current),
                })
            }
        };
        match segment {
            Segment::Key(key) if walked.is_empty() => walked.push_str(key),
            Segment::Key(key) => {
                walked.push('.');
                walked.push_str(key);
            }
            Segment::Index(index) => walked.push_str(&format!("[{index}]")),
        }
        current = next.ok_or_else(|| EvaluationError::MissingProperty(walked.clone()))?;
    }
    Ok(current)
}
