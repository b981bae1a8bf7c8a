//! Evaluation context for named patterns.
//!
//! A `Resolver` is cheap to clone: the named-pattern table sits behind an
//! `Arc` and only the small guard state is copied when a derived resolver is
//! made. Nothing here is ever mutated in place.
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::config::{EngineConfig, UnexpectedKeyPolicy};
use crate::error::ContractError;
use crate::pattern::{self, Pattern, Primitive, EMPTY_TOKEN};
use crate::result::MatchResult;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Resolver {
    patterns: Arc<IndexMap<String, Pattern>>,
    policy: UnexpectedKeyPolicy,
    max_named_depth: usize,
    max_combinations: usize,
    /// Named patterns entered along the current path.
    expanding: Vec<String>,
    /// `(bigger, smaller)` name pairs whose compatibility is being decided.
    assumed: Vec<(String, String)>,
}

/// Outcome of reconciling a pattern's keys with a value's keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMismatch {
    Missing(String),
    Unexpected(String),
}

impl Default for Resolver {
    fn default() -> Self { Resolver::new(IndexMap::new()) }
}

impl Resolver {
    pub fn new(patterns: IndexMap<String, Pattern>) -> Self {
        Resolver::with_config(patterns, &EngineConfig::default())
    }

    pub fn with_config(patterns: IndexMap<String, Pattern>, config: &EngineConfig) -> Self {
        Resolver {
            patterns: Arc::new(patterns),
            policy: config.unexpected_keys,
            max_named_depth: config.max_named_depth,
            max_combinations: config.max_combinations,
            expanding: Vec::new(),
            assumed: Vec::new(),
        }
    }

    pub fn with_policy(&self, policy: UnexpectedKeyPolicy) -> Self {
        Resolver { policy, ..self.clone() }
    }

    pub fn policy(&self) -> UnexpectedKeyPolicy { self.policy }
    pub fn max_combinations(&self) -> usize { self.max_combinations }
    pub fn named_patterns(&self) -> &IndexMap<String, Pattern> { &self.patterns }

    /// A resolver in which `(empty)` is bound, so unions can encode "nullable".
    pub fn with_empty_pattern(&self) -> Self {
        if self.patterns.contains_key(EMPTY_TOKEN) {
            return self.clone();
        }
        let mut patterns = (*self.patterns).clone();
        patterns.insert(EMPTY_TOKEN.to_string(), Pattern::Primitive(Primitive::Empty));
        Resolver { patterns: Arc::new(patterns), ..self.clone() }
    }

    pub fn get_pattern(&self, token: &str) -> Result<Pattern, ContractError> {
        if let Some(found) = self.patterns.get(token) {
            return Ok(found.clone());
        }
        match pattern::parse_token(token) {
            Some(Pattern::Named(name)) if name == token => {
                Err(ContractError::PatternNotFound(token.to_string()))
            }
            Some(inline) => Ok(inline),
            None => Err(ContractError::PatternNotFound(token.to_string())),
        }
    }

    /// Derive the resolver used below the named pattern `name`.
    pub fn enter(&self, name: &str) -> Result<Self, ContractError> {
        if self.expanding.len() >= self.max_named_depth {
            warn!(name, limit = self.max_named_depth, "named pattern recursion limit reached");
            return Err(ContractError::RecursionLimitExceeded {
                name: name.to_string(),
                limit: self.max_named_depth,
            });
        }
        trace!(name, depth = self.expanding.len(), "resolving named pattern");
        let mut next = self.clone();
        next.expanding.push(name.to_string());
        Ok(next)
    }

    pub fn is_expanding(&self, name: &str) -> bool {
        self.expanding.iter().any(|n| n == name)
    }

    /// Follow named references until a concrete pattern is reached.
    ///
    /// Returns the pattern together with the resolver entered for it. An alias
    /// cycle with no structure in between fails straight away.
    pub fn resolved_hop(&self, pattern: &Pattern) -> Result<(Pattern, Resolver), ContractError> {
        let mut current = pattern.clone();
        let mut resolver = self.clone();
        let mut seen: Vec<String> = Vec::new();
        while let Pattern::Named(name) = &current {
            if seen.contains(name) {
                warn!(name = name.as_str(), "named patterns refer to each other in a cycle");
                return Err(ContractError::RecursionLimitExceeded {
                    name: name.clone(),
                    limit: seen.len(),
                });
            }
            seen.push(name.clone());
            let next = resolver.get_pattern(name)?;
            resolver = resolver.enter(name)?;
            current = next;
        }
        Ok((current, resolver))
    }

    pub fn matches_pattern(&self, key: Option<&str>, pattern: &Pattern, value: &Value) -> MatchResult {
        let result = pattern.matches(value, self);
        match key {
            Some(key) => result.bread_crumb(key),
            None => result,
        }
    }

    pub fn generate(&self, key: &str, pattern: &Pattern) -> Result<Value, ContractError> {
        pattern.generate(self).map_err(|e| e.at(key))
    }

    pub fn is_assumed(&self, bigger: &str, smaller: &str) -> bool {
        self.assumed.iter().any(|(b, s)| b == bigger && s == smaller)
    }

    pub fn assuming(&self, bigger: &str, smaller: &str) -> Self {
        let mut next = self.clone();
        next.assumed.push((bigger.to_string(), smaller.to_string()));
        next
    }
}

/// First key that keeps `values` from lining up with `pattern`.
///
/// Required pattern keys (no `optional_suffix`) must be present; under the
/// strict policy every value key must be declared, with or without the suffix.
pub fn find_missing_key<V>(
    pattern: &IndexMap<String, Pattern>,
    values: &IndexMap<String, V>,
    policy: UnexpectedKeyPolicy,
    optional_suffix: &str,
) -> Option<KeyMismatch> {
    let missing = pattern
        .keys()
        .filter(|k| !k.ends_with(optional_suffix))
        .find(|k| !values.contains_key(k.as_str()));
    if let Some(key) = missing {
        return Some(KeyMismatch::Missing(key.clone()));
    }
    if policy == UnexpectedKeyPolicy::Permissive {
        return None;
    }
    values
        .keys()
        .find(|k| {
            !pattern.contains_key(k.as_str())
                && !pattern.contains_key(&format!("{k}{optional_suffix}"))
        })
        .map(|k| KeyMismatch::Unexpected(k.clone()))
}
