//! JSON-object patterns keyed by field name.
use indexmap::IndexMap;

use crate::combinations;
use crate::config::UnexpectedKeyPolicy;
use crate::error::ContractError;
use crate::resolver::{find_missing_key, KeyMismatch, Resolver};
use crate::result::{FailureKind, MatchResult};
use crate::row::Row;
use crate::value::Value;

use super::{
    bind_row_value, is_optional, parse_json_text, without_optionality, Pattern,
    IGNORE_UNKNOWN_KEYS, JSON_OPTIONAL_SUFFIX,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularPattern {
    /// Keys keep their `?` marker; field order is declaration order.
    pub fields: IndexMap<String, Pattern>,
    pub ignore_unknown: bool,
}

impl TabularPattern {
    /// Build from declared fields; a `...` key switches off the unknown-key check.
    pub fn new(mut fields: IndexMap<String, Pattern>) -> Self {
        let ignore_unknown = fields.shift_remove(IGNORE_UNKNOWN_KEYS).is_some();
        TabularPattern { fields, ignore_unknown }
    }

    fn policy(&self, resolver: &Resolver) -> UnexpectedKeyPolicy {
        if self.ignore_unknown { UnexpectedKeyPolicy::Permissive } else { resolver.policy() }
    }

    /// Pattern for `key`, looked up by exact or canonical name.
    fn field(&self, key: &str) -> Option<&Pattern> {
        self.fields
            .get(key)
            .or_else(|| self.fields.get(&format!("{key}{JSON_OPTIONAL_SUFFIX}")))
            .or_else(|| self.fields.get(without_optionality(key, JSON_OPTIONAL_SUFFIX)))
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Object(object) = value else {
            return MatchResult::mismatch("json object", value);
        };
        let resolver = resolver.with_empty_pattern();
        match find_missing_key(&self.fields, object, self.policy(&resolver), JSON_OPTIONAL_SUFFIX) {
            Some(KeyMismatch::Missing(key)) => {
                let canonical = without_optionality(&key, JSON_OPTIONAL_SUFFIX).to_string();
                return MatchResult::failure(FailureKind::MissingKey, format!("Expected key named \"{canonical}\" was missing"))
                    .bread_crumb(canonical);
            }
            Some(KeyMismatch::Unexpected(key)) => {
                return MatchResult::failure(FailureKind::UnexpectedKey, format!("Key named \"{key}\" was unexpected"))
                    .bread_crumb(key);
            }
            None => {}
        }
        for (key, pattern) in &self.fields {
            let canonical = without_optionality(key, JSON_OPTIONAL_SUFFIX);
            let Some(sample) = object.get(canonical) else { continue };
            let result = resolver.matches_pattern(Some(canonical), pattern, sample);
            if !result.is_success() {
                return result;
            }
        }
        MatchResult::Success
    }

    pub fn generate(&self, resolver: &Resolver) -> Result<Value, ContractError> {
        let resolver = resolver.with_empty_pattern();
        let mut object = IndexMap::new();
        for (key, pattern) in &self.fields {
            if is_optional(key, JSON_OPTIONAL_SUFFIX) && pattern.recurses_into_expanding(&resolver) {
                continue;
            }
            let canonical = without_optionality(key, JSON_OPTIONAL_SUFFIX);
            object.insert(canonical.to_string(), resolver.generate(canonical, pattern)?);
        }
        Ok(Value::Object(object))
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        let resolver = resolver.with_empty_pattern();
        let combos = combinations::key_combinations(
            &self.fields,
            row,
            JSON_OPTIONAL_SUFFIX,
            resolver.max_combinations(),
            |key, pattern| bind_row_value(row, without_optionality(key, JSON_OPTIONAL_SUFFIX), pattern, &resolver),
        )?;
        Ok(combos
            .into_iter()
            .map(|fields| Pattern::Tabular(TabularPattern { fields, ignore_unknown: self.ignore_unknown }))
            .collect())
    }

    pub fn parse(&self, text: &str) -> Result<Value, ContractError> {
        match parse_json_text(text, "json object")? {
            object @ Value::Object(_) => Ok(object),
            other => Err(ContractError::format(
                "json object",
                format!("Expected json object, actual was {}", other.type_name()),
            )),
        }
    }

    /// `self` (the bigger pattern) accepts everything `other` accepts.
    pub fn encompasses(&self, other: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        let this_resolver = this_resolver.with_empty_pattern();
        let other_resolver = other_resolver.with_empty_pattern();
        let smaller = match other {
            Pattern::Exact(value @ Value::Object(_)) => return self.matches(value, &this_resolver),
            Pattern::Tabular(smaller) => smaller,
            other => {
                return MatchResult::failure(
                    FailureKind::Mismatch,
                    format!("Expected json object, got {}", other.type_name()),
                );
            }
        };

        for key in self.fields.keys().filter(|k| !is_optional(k, JSON_OPTIONAL_SUFFIX)) {
            if smaller.fields.contains_key(key) {
                continue;
            }
            let message = if smaller.fields.contains_key(&format!("{key}{JSON_OPTIONAL_SUFFIX}")) {
                format!("Key {key} is required here but optional in the other pattern")
            } else {
                format!("Key {key} was missing")
            };
            return MatchResult::failure(FailureKind::MissingKey, message).bread_crumb(key);
        }

        if self.policy(&this_resolver) == UnexpectedKeyPolicy::Strict {
            if smaller.ignore_unknown {
                return MatchResult::failure(
                    FailureKind::UnexpectedKey,
                    "The other pattern accepts unknown keys but this one does not",
                );
            }
            let unexpected = smaller
                .fields
                .keys()
                .filter(|k| !is_optional(k, JSON_OPTIONAL_SUFFIX))
                .find(|k| self.field(k).is_none());
            if let Some(key) = unexpected {
                return MatchResult::failure(FailureKind::UnexpectedKey, format!("Key {key} was unexpected"))
                    .bread_crumb(key);
            }
        }

        for (key, bigger) in &self.fields {
            let Some(smaller_field) = smaller.field(key) else { continue };
            let result = bigger.encompasses(smaller_field, &this_resolver, &other_resolver);
            if !result.is_success() {
                return result.bread_crumb(without_optionality(key, JSON_OPTIONAL_SUFFIX));
            }
        }
        MatchResult::Success
    }
}
