//! Literal-value patterns.
use crate::error::ContractError;
use crate::result::{FailureKind, MatchResult};
use crate::value::{self, Value};

use super::{parse_json_text, Pattern};

pub fn matches(expected: &Value, value: &Value) -> MatchResult {
    if expected == value {
        MatchResult::Success
    } else {
        MatchResult::mismatch(&format!("{} {}", expected.type_name(), quoted(expected)), value)
    }
}

/// Read `text` as a value of the same kind as `expected`.
pub fn parse(expected: &Value, text: &str) -> Result<Value, ContractError> {
    let bad = || ContractError::format(
        expected.type_name(),
        format!("Expected {}, actual was \"{text}\"", quoted(expected)),
    );
    match expected {
        Value::String(_) => Ok(Value::string(text)),
        Value::Number(_) => value::parse_number(text).map(Value::number).ok_or_else(bad),
        Value::Boolean(_) => match text.trim() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(bad()),
        },
        Value::Null => match text.trim() {
            "" | "null" => Ok(Value::Null),
            _ => Err(bad()),
        },
        Value::Object(_) | Value::List(_) => parse_json_text(text, expected.type_name()),
        Value::Node(_) => Err(ContractError::format(
            expected.type_name(),
            "xml examples must bind the text of a node, not the node itself",
        )),
    }
}

pub fn encompasses(expected: &Value, other: &Pattern) -> MatchResult {
    match other {
        Pattern::Exact(v) => matches(expected, v),
        other => MatchResult::failure(
            FailureKind::Mismatch,
            format!("Expected exactly {}, got {}", quoted(expected), other.type_name()),
        ),
    }
}

fn quoted(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}
