//! The closed set of pattern variants and the operations every variant
//! answers: `matches`, `generate`, `new_based_on`, `encompasses`, `parse`.
//!
//! Variant-specific behaviour lives in the submodules; this module holds the
//! dispatch, the token mini-language and row binding.
pub mod any;
pub mod exact;
pub mod list;
pub mod primitive;
pub mod structural;
pub mod tabular;

pub use any::AnyPattern;
pub use primitive::Primitive;
pub use structural::{Occurs, StructuralPattern};
pub use tabular::TabularPattern;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ContractError;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::row::Row;
use crate::value::{Node, Value};

/// Token bound to [`Primitive::Empty`] in derived resolvers.
pub const EMPTY_TOKEN: &str = "(empty)";
pub const JSON_OPTIONAL_SUFFIX: &str = "?";
pub const XML_ATTR_OPTIONAL_SUFFIX: &str = ".opt";
pub const IGNORE_UNKNOWN_KEYS: &str = "...";
pub const OCCURS_ATTRIBUTE: &str = "contract_occurs";
pub const TYPE_ATTRIBUTE: &str = "contract_type";

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\s*[^()\s][^()]*\)$").expect("token regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Exact(Value),
    Primitive(Primitive),
    Tabular(TabularPattern),
    Structural(StructuralPattern),
    Any(AnyPattern),
    /// Reference into the resolver, kept in token form, e.g. `(Person)`.
    Named(String),
    ListOf(Box<Pattern>),
}

// ————————————————————————————————————————————————————————————————————————————
// MINI-LANGUAGE
// ————————————————————————————————————————————————————————————————————————————

pub fn is_optional(key: &str, suffix: &str) -> bool { key.ends_with(suffix) }

/// `key` with one trailing optional marker removed.
pub fn without_optionality<'a>(key: &'a str, suffix: &str) -> &'a str {
    key.strip_suffix(suffix).unwrap_or(key)
}

pub fn is_pattern_token(text: &str) -> bool { TOKEN.is_match(text.trim()) }

/// Read a `(…)` token. `(x*)` is a list of `x`, `(x?)` is `x` or empty;
/// builtin names become primitives and anything else a named reference.
pub fn parse_token(text: &str) -> Option<Pattern> {
    let text = text.trim();
    if !is_pattern_token(text) {
        return None;
    }
    let inner = text[1..text.len() - 1].trim();
    if let Some(item) = inner.strip_suffix('*') {
        return parse_token(&format!("({item})")).map(|p| Pattern::ListOf(Box::new(p)));
    }
    if let Some(base) = inner.strip_suffix('?') {
        return parse_token(&format!("({base})")).map(AnyPattern::nullable).map(Pattern::Any);
    }
    match Primitive::from_token_name(inner) {
        Some(primitive) => Some(Pattern::Primitive(primitive)),
        None => Some(Pattern::Named(format!("({inner})"))),
    }
}

/// Token pattern, or the literal string when `text` is not a token.
pub fn parsed_pattern(text: &str) -> Pattern {
    parse_token(text).unwrap_or_else(|| Pattern::Exact(Value::string(text)))
}

pub fn parse_json_text(text: &str, field: &str) -> Result<Value, ContractError> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .map_err(|e| ContractError::format(field, format!("Expected {field}, could not read \"{text}\": {e}")))
}

/// Specialise the pattern at `key` for one example row.
///
/// A token in the row narrows the pattern to the token's pattern, which has
/// to fit inside it; literal text pins the value exactly.
pub(crate) fn bind_row_value(row: &Row, key: &str, pattern: &Pattern, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
    let Some(text) = row.get_field(key) else {
        return pattern.new_based_on(row, resolver);
    };
    if is_pattern_token(text) {
        let row_pattern = resolver.get_pattern(text.trim())?;
        return match pattern.encompasses(&row_pattern, resolver, resolver) {
            MatchResult::Success => row_pattern.new_based_on(row, resolver),
            MatchResult::Failure(failure) => Err(ContractError::Contract(format!(
                "Example {text} for \"{key}\" does not fit {}: {}",
                pattern.type_name(),
                failure.message
            ))),
        };
    }
    let parsed = pattern.parse(text, resolver).map_err(|e| {
        let message = match e.root() {
            ContractError::Format { message, .. } => message.clone(),
            other => other.to_string(),
        };
        ContractError::format(key, message)
    })?;
    match pattern.matches(&parsed, resolver) {
        MatchResult::Success => Ok(vec![Pattern::Exact(parsed)]),
        MatchResult::Failure(failure) => Err(ContractError::Contract(format!(
            "Example \"{text}\" for \"{key}\" does not match: {}",
            failure.message
        ))),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DISPATCH
// ————————————————————————————————————————————————————————————————————————————

impl Pattern {
    /// Read a pattern from a JSON document: token strings, literal scalars,
    /// objects as keyed patterns and a single-element array as a list.
    pub fn from_json(source: &serde_json::Value) -> Result<Pattern, ContractError> {
        use serde_json::Value as Json;
        match source {
            Json::String(text) => Ok(parsed_pattern(text)),
            Json::Array(items) => match items.as_slice() {
                [item] => Ok(Pattern::ListOf(Box::new(Pattern::from_json(item).map_err(|e| e.at(0usize))?))),
                _ => Err(ContractError::InvalidPattern(format!(
                    "a list pattern holds exactly one item pattern, found {}",
                    items.len()
                ))),
            },
            Json::Object(map) => {
                let mut fields = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    fields.insert(key.clone(), Pattern::from_json(value).map_err(|e| e.at(key))?);
                }
                Ok(Pattern::Tabular(TabularPattern::new(fields)))
            }
            scalar => Ok(Pattern::Exact(Value::from(scalar))),
        }
    }

    pub fn from_node(node: &Node) -> Result<Pattern, ContractError> {
        StructuralPattern::from_node(node).map(Pattern::Structural)
    }

    pub fn type_name(&self) -> String {
        match self {
            Pattern::Exact(value) => format!("exact {} {value}", value.type_name()),
            Pattern::Primitive(p) => p.type_name().to_string(),
            Pattern::Tabular(_) => "json object".to_string(),
            Pattern::Structural(s) => s.type_name(),
            Pattern::Any(any) => any.type_name(),
            Pattern::Named(name) => name.clone(),
            Pattern::ListOf(item) => format!("list of {}", item.type_name()),
        }
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        match self {
            Pattern::Exact(expected) => exact::matches(expected, value),
            Pattern::Primitive(p) => p.matches(value),
            Pattern::Tabular(t) => t.matches(value, resolver),
            Pattern::Structural(s) => s.matches(value, resolver),
            Pattern::Any(any) => any.matches(value, resolver),
            Pattern::ListOf(item) => list::matches(item, value, resolver),
            Pattern::Named(_) => match resolver.resolved_hop(self) {
                Ok((pattern, inner)) => pattern.matches(value, &inner),
                Err(error) => MatchResult::Failure(error.into()),
            },
        }
    }

    /// Parse `text` with this pattern, then match the result.
    pub fn matches_text(&self, text: &str, resolver: &Resolver) -> MatchResult {
        match self.parse(text, resolver) {
            Ok(value) => self.matches(&value, resolver),
            Err(_) => MatchResult::mismatch(&self.type_name(), &Value::string(text)),
        }
    }

    pub fn generate(&self, resolver: &Resolver) -> Result<Value, ContractError> {
        match self {
            Pattern::Exact(value) => Ok(value.clone()),
            Pattern::Primitive(p) => Ok(p.generate()),
            Pattern::Tabular(t) => t.generate(resolver),
            Pattern::Structural(s) => s.generate(resolver),
            Pattern::Any(any) => any.generate(resolver),
            Pattern::ListOf(item) => list::generate(item, resolver),
            Pattern::Named(_) => {
                let (pattern, inner) = resolver.resolved_hop(self)?;
                pattern.generate(&inner)
            }
        }
    }

    /// Every specialisation of this pattern the example row allows.
    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        match self {
            Pattern::Exact(_) | Pattern::Primitive(_) => Ok(vec![self.clone()]),
            Pattern::Tabular(t) => t.new_based_on(row, resolver),
            Pattern::Structural(s) => s.new_based_on(row, resolver),
            Pattern::Any(any) => any.new_based_on(row, resolver),
            Pattern::ListOf(item) => list::new_based_on(item, row, resolver),
            Pattern::Named(name) => {
                if resolver.is_expanding(name) {
                    return Ok(vec![self.clone()]);
                }
                let (pattern, inner) = resolver.resolved_hop(self)?;
                pattern.new_based_on(row, &inner)
            }
        }
    }

    /// `self` accepts every value `other` accepts. Each side resolves its
    /// named references in its own resolver.
    pub fn encompasses(&self, other: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        if let (Pattern::Named(bigger), Pattern::Named(smaller)) = (self, other) {
            if this_resolver.is_assumed(bigger, smaller) {
                return MatchResult::Success;
            }
            let assumed = this_resolver.assuming(bigger, smaller);
            return match (assumed.resolved_hop(self), other_resolver.resolved_hop(other)) {
                (Ok((b, this_inner)), Ok((s, other_inner))) => b.encompasses(&s, &this_inner, &other_inner),
                (Err(error), _) | (_, Err(error)) => MatchResult::Failure(error.into()),
            };
        }
        if let Pattern::Named(_) = self {
            return match this_resolver.resolved_hop(self) {
                Ok((b, inner)) => b.encompasses(other, &inner, other_resolver),
                Err(error) => MatchResult::Failure(error.into()),
            };
        }
        if let Pattern::Named(_) = other {
            return match other_resolver.resolved_hop(other) {
                Ok((s, inner)) => self.encompasses(&s, this_resolver, &inner),
                Err(error) => MatchResult::Failure(error.into()),
            };
        }
        if let (Pattern::Any(smaller), false) = (other, matches!(self, Pattern::Any(_))) {
            return smaller.each_encompassed_by(self, this_resolver, &other_resolver.with_empty_pattern());
        }
        match self {
            Pattern::Exact(expected) => exact::encompasses(expected, other),
            Pattern::Primitive(p) => p.encompasses(other),
            Pattern::Tabular(t) => t.encompasses(other, this_resolver, other_resolver),
            Pattern::Structural(s) => s.encompasses(other, this_resolver, other_resolver),
            Pattern::Any(any) => any.encompasses(other, this_resolver, other_resolver),
            Pattern::ListOf(item) => list::encompasses(item, other, this_resolver, other_resolver),
            Pattern::Named(_) => unreachable!("named patterns are resolved above"),
        }
    }

    /// Read example text into a value this pattern can match.
    pub fn parse(&self, text: &str, resolver: &Resolver) -> Result<Value, ContractError> {
        match self {
            Pattern::Exact(expected) => exact::parse(expected, text),
            Pattern::Primitive(p) => p.parse(text),
            Pattern::Tabular(t) => t.parse(text),
            Pattern::Structural(s) => Err(ContractError::format(
                s.type_name(),
                "xml examples must bind the text of a node, not the node itself",
            )),
            Pattern::Any(any) => any.parse(text, resolver),
            Pattern::ListOf(item) => list::parse(item, text),
            Pattern::Named(_) => {
                let (pattern, inner) = resolver.resolved_hop(self)?;
                pattern.parse(text, &inner)
            }
        }
    }

    pub(crate) fn is_empty_marker(&self) -> bool {
        match self {
            Pattern::Named(name) => name == EMPTY_TOKEN,
            Pattern::Primitive(p) => *p == Primitive::Empty,
            _ => false,
        }
    }

    /// Generating this pattern would re-enter a named pattern already being
    /// expanded on the current path.
    pub(crate) fn recurses_into_expanding(&self, resolver: &Resolver) -> bool {
        match self {
            Pattern::Named(name) => resolver.is_expanding(name),
            Pattern::ListOf(item) => item.recurses_into_expanding(resolver),
            Pattern::Any(any) => {
                let live: Vec<&Pattern> = any.alternatives.iter().filter(|p| !p.is_empty_marker()).collect();
                !live.is_empty() && live.iter().all(|p| p.recurses_into_expanding(resolver))
            }
            Pattern::Structural(s) => s
                .type_ref
                .as_ref()
                .is_some_and(|t| resolver.is_expanding(&format!("({t})"))),
            _ => false,
        }
    }

    pub(crate) fn with_occurs(self, occurs: Occurs) -> Pattern {
        match self {
            Pattern::Structural(mut s) => {
                s.occurs = occurs;
                Pattern::Structural(s)
            }
            other => other,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
