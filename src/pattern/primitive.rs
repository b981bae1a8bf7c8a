use chrono::{DateTime, TimeZone, Utc};

use crate::error::ContractError;
use crate::result::MatchResult;
use crate::value::{self, Value};

use super::Pattern;

/// Scalar types named by the builtin tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Number,
    String,
    Boolean,
    Null,
    /// RFC 3339 timestamp carried as a string.
    DateTime,
    /// A number carried as a string.
    NumberInString,
    /// Absent content: null, or blank text inside XML.
    Empty,
}

impl Primitive {
    pub fn from_token_name(name: &str) -> Option<Self> {
        match name {
            "number" => Some(Primitive::Number),
            "string" => Some(Primitive::String),
            "boolean" => Some(Primitive::Boolean),
            "null" => Some(Primitive::Null),
            "datetime" => Some(Primitive::DateTime),
            "number in string" => Some(Primitive::NumberInString),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Null => "null",
            Primitive::DateTime => "datetime",
            Primitive::NumberInString => "number in string",
            Primitive::Empty => "empty",
        }
    }

    pub fn matches(&self, value: &Value) -> MatchResult {
        let ok = match (self, value) {
            (Primitive::Number, Value::Number(_)) => true,
            (Primitive::String, Value::String(_)) => true,
            (Primitive::Boolean, Value::Boolean(_)) => true,
            (Primitive::Null, Value::Null) => true,
            (Primitive::DateTime, Value::String(s)) => is_datetime(s),
            (Primitive::NumberInString, Value::String(s)) => value::is_numeric_looking(s),
            (Primitive::Empty, v) => v.is_null_marker() || v.is_blank_text(),
            _ => false,
        };
        if ok { MatchResult::Success } else { MatchResult::mismatch(self.type_name(), value) }
    }

    pub fn generate(&self) -> Value {
        match self {
            Primitive::Number => Value::number(1.0),
            Primitive::String => Value::string("example"),
            Primitive::Boolean => Value::Boolean(true),
            Primitive::Null | Primitive::Empty => Value::Null,
            Primitive::DateTime => Value::String(sample_datetime()),
            Primitive::NumberInString => Value::string("1"),
        }
    }

    pub fn parse(&self, text: &str) -> Result<Value, ContractError> {
        let trimmed = text.trim();
        let bad = || ContractError::format(
            self.type_name(),
            format!("Expected {}, actual was \"{text}\"", self.type_name()),
        );
        match self {
            Primitive::Number => value::parse_number(trimmed).map(Value::number).ok_or_else(bad),
            Primitive::String => Ok(Value::string(text)),
            Primitive::Boolean => match trimmed {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(bad()),
            },
            Primitive::Null => match trimmed {
                "" | "null" => Ok(Value::Null),
                _ => Err(bad()),
            },
            Primitive::Empty => if trimmed.is_empty() { Ok(Value::Null) } else { Err(bad()) },
            Primitive::DateTime => {
                if is_datetime(trimmed) { Ok(Value::string(trimmed)) } else { Err(bad()) }
            }
            Primitive::NumberInString => {
                if value::is_numeric_looking(trimmed) { Ok(Value::string(trimmed)) } else { Err(bad()) }
            }
        }
    }

    /// `self` accepts every value `other` accepts.
    pub fn covers(&self, other: &Primitive) -> bool {
        self == other
            || matches!(
                (self, other),
                (Primitive::String, Primitive::DateTime)
                    | (Primitive::String, Primitive::NumberInString)
                    | (Primitive::Empty, Primitive::Null)
            )
    }

    pub fn encompasses(&self, other: &Pattern) -> MatchResult {
        match other {
            Pattern::Primitive(p) if self.covers(p) => MatchResult::Success,
            Pattern::Exact(v) => self.matches(v),
            other => MatchResult::failure(
                crate::result::FailureKind::Mismatch,
                format!("Expected {}, got {}", self.type_name(), other.type_name()),
            ),
        }
    }
}

fn is_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s.trim()).is_ok()
}

fn sample_datetime() -> String {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "2020-01-01T00:00:00+00:00".to_string())
}
