//! Hard failures: the contract itself (or an example bound to it) is invalid.
//!
//! A value that merely fails to match is reported through
//! [`crate::result::MatchResult`] instead.
use thiserror::Error;

use crate::result::{Crumb, Failure, FailureKind};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("pattern {0} was not found")]
    PatternNotFound(String),

    #[error("named pattern {name} nests deeper than {limit} levels")]
    RecursionLimitExceeded { name: String, limit: usize },

    #[error("format error in example of \"{field}\": {message}")]
    Format { field: String, message: String },

    /// An example or token does not satisfy the pattern it was bound to.
    #[error("{0}")]
    Contract(String),

    #[error("enumeration would produce more than {limit} combinations")]
    TooManyCombinations { limit: usize },

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("example row has {columns} columns but {values} values")]
    RowShape { columns: usize, values: usize },

    #[error("contract document: {0}")]
    Document(String),

    #[error(">> {path}\n{source}")]
    At { path: String, source: Box<ContractError> },
}

impl ContractError {
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::Format { field: field.into(), message: message.into() }
    }

    /// Prefix the error with the field it was raised under.
    pub fn at(self, crumb: impl Into<Crumb>) -> Self {
        let crumb = crumb.into();
        match self {
            ContractError::At { path, source } => ContractError::At {
                path: crumb.join(&path),
                source,
            },
            other => ContractError::At {
                path: crumb.join(""),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with field prefixes removed.
    pub fn root(&self) -> &ContractError {
        match self {
            ContractError::At { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ContractError> for Failure {
    fn from(error: ContractError) -> Self {
        let kind = match error.root() {
            ContractError::PatternNotFound(_) => FailureKind::PatternNotFound,
            ContractError::RecursionLimitExceeded { .. } => FailureKind::RecursionLimitExceeded,
            ContractError::Format { .. } => FailureKind::Format,
            _ => FailureKind::Mismatch,
        };
        Failure::new(kind, error.root().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_field_prefixes_build_a_path() {
        let err = ContractError::format("age", "expected number, got \"abc\"")
            .at("age")
            .at("person");
        match &err {
            ContractError::At { path, .. } => assert_eq!(path, "person.age"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(err.root(), ContractError::Format { .. }));
        assert!(err.to_string().starts_with(">> person.age"));
    }

    #[test]
    fn converts_into_failure_kind() {
        let failure = Failure::from(ContractError::PatternNotFound("(Missing)".into()).at("x"));
        assert_eq!(failure.kind, FailureKind::PatternNotFound);
        assert!(failure.message.contains("(Missing)"));
    }
}
