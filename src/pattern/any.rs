//! Unions: a value matches when any alternative matches.
use crate::error::ContractError;
use crate::resolver::Resolver;
use crate::result::{FailureKind, MatchResult};
use crate::row::Row;
use crate::value::Value;

use super::{Pattern, EMPTY_TOKEN};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnyPattern {
    pub alternatives: Vec<Pattern>,
}

impl AnyPattern {
    pub fn new(alternatives: Vec<Pattern>) -> Self { AnyPattern { alternatives } }

    /// `pattern` or nothing at all.
    pub fn nullable(pattern: Pattern) -> Self {
        AnyPattern::new(vec![Pattern::Named(EMPTY_TOKEN.to_string()), pattern])
    }

    pub fn type_name(&self) -> String {
        let names: Vec<String> = self.alternatives.iter().map(Pattern::type_name).collect();
        format!("({})", names.join(" or "))
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let resolver = resolver.with_empty_pattern();
        let mut last = None;
        for alternative in &self.alternatives {
            let result = alternative.matches(value, &resolver);
            if result.is_success() {
                return result;
            }
            last = Some(result);
        }
        last.unwrap_or_else(|| MatchResult::mismatch(&self.type_name(), value))
    }

    /// Generate from the first alternative that is not the empty marker and
    /// does not re-enter a pattern being expanded; fall back to empty.
    pub fn generate(&self, resolver: &Resolver) -> Result<Value, ContractError> {
        let resolver = resolver.with_empty_pattern();
        let chosen = self
            .alternatives
            .iter()
            .find(|p| !p.is_empty_marker() && !p.recurses_into_expanding(&resolver))
            .or_else(|| self.alternatives.iter().find(|p| p.is_empty_marker()))
            .or_else(|| self.alternatives.first())
            .ok_or_else(|| ContractError::InvalidPattern("a union needs at least one alternative".into()))?;
        chosen.generate(&resolver)
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let resolver = resolver.with_empty_pattern();
        let mut out = Vec::new();
        for alternative in &self.alternatives {
            out.extend(alternative.new_based_on(row, &resolver)?);
        }
        Ok(out)
    }

    pub fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        let resolver = resolver.with_empty_pattern();
        self.alternatives
            .iter()
            .find_map(|alternative| {
                alternative
                    .parse(text, &resolver)
                    .ok()
                    .filter(|value| alternative.matches(value, &resolver).is_success())
            })
            .ok_or_else(|| ContractError::format(
                self.type_name(),
                format!("Expected {}, actual was \"{text}\"", self.type_name()),
            ))
    }

    /// Bigger side: some alternative must take each of `other`'s alternatives.
    pub fn encompasses(&self, other: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        let this_resolver = this_resolver.with_empty_pattern();
        let other_resolver = other_resolver.with_empty_pattern();
        let smaller: Vec<&Pattern> = match other {
            Pattern::Any(any) => any.alternatives.iter().collect(),
            single => vec![single],
        };
        for candidate in smaller {
            let taken = self
                .alternatives
                .iter()
                .any(|alternative| alternative.encompasses(candidate, &this_resolver, &other_resolver).is_success());
            if !taken {
                return MatchResult::failure(
                    FailureKind::Mismatch,
                    format!("None of {} accepts {}", self.type_name(), candidate.type_name()),
                );
            }
        }
        MatchResult::Success
    }

    /// Smaller side against a non-union bigger pattern: every alternative
    /// has to fit.
    pub(crate) fn each_encompassed_by(&self, bigger: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        for alternative in &self.alternatives {
            let result = bigger.encompasses(alternative, this_resolver, other_resolver);
            if !result.is_success() {
                return result;
            }
        }
        MatchResult::Success
    }
}
