//! Outcome of matching and compatibility checks.
use std::fmt;

use serde::Serialize;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Mismatch,
    MissingKey,
    UnexpectedKey,
    PatternNotFound,
    RecursionLimitExceeded,
    Format,
    StructuralAlignment,
}

/// One step of a breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Crumb {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    /// Root-to-leaf path of the mismatch.
    pub breadcrumb: Vec<Crumb>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Success,
    Failure(Failure),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Crumb {
    /// Render this crumb in front of an already rendered path.
    pub fn join(&self, rest: &str) -> String {
        let head = match self {
            Crumb::Key(k) => k.clone(),
            Crumb::Index(i) => format!("[{i}]"),
        };
        if rest.is_empty() {
            head
        } else if rest.starts_with('[') {
            format!("{head}{rest}")
        } else {
            format!("{head}.{rest}")
        }
    }
}

impl From<&str> for Crumb {
    fn from(s: &str) -> Self { Crumb::Key(s.to_string()) }
}

impl From<String> for Crumb {
    fn from(s: String) -> Self { Crumb::Key(s) }
}

impl From<&String> for Crumb {
    fn from(s: &String) -> Self { Crumb::Key(s.clone()) }
}

impl From<usize> for Crumb {
    fn from(i: usize) -> Self { Crumb::Index(i) }
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Failure { kind, message: message.into(), breadcrumb: Vec::new() }
    }

    pub fn path(&self) -> String {
        self.breadcrumb
            .iter()
            .rev()
            .fold(String::new(), |rest, crumb| crumb.join(&rest))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self.path();
        if path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, ">> {path}\n\n{}", self.message)
        }
    }
}

impl MatchResult {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        MatchResult::Failure(Failure::new(kind, message))
    }

    pub fn mismatch(expected: &str, actual: &Value) -> Self {
        let shown = match actual {
            Value::String(s) => format!("\"{s}\""),
            other => other.to_string(),
        };
        Self::failure(
            FailureKind::Mismatch,
            format!("Expected {expected}, actual was {} {shown}", actual.type_name()),
        )
    }

    pub fn is_success(&self) -> bool { matches!(self, MatchResult::Success) }

    /// Prepend `crumb` to a failure's path; success passes through.
    pub fn bread_crumb(self, crumb: impl Into<Crumb>) -> Self {
        match self {
            MatchResult::Success => MatchResult::Success,
            MatchResult::Failure(mut failure) => {
                failure.breadcrumb.insert(0, crumb.into());
                MatchResult::Failure(failure)
            }
        }
    }

    pub fn failure_ref(&self) -> Option<&Failure> {
        match self {
            MatchResult::Success => None,
            MatchResult::Failure(failure) => Some(failure),
        }
    }

    /// Human-readable report; empty for success.
    pub fn report(&self) -> String {
        self.failure_ref().map(|f| f.to_string()).unwrap_or_default()
    }
}

impl From<Failure> for MatchResult {
    fn from(failure: Failure) -> Self { MatchResult::Failure(failure) }
}
