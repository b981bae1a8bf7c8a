//! Homogeneous lists: every element matches the item pattern.
use crate::error::ContractError;
use crate::resolver::Resolver;
use crate::result::{FailureKind, MatchResult};
use crate::row::Row;
use crate::value::Value;

use super::{parse_json_text, Pattern};

pub fn matches(item: &Pattern, value: &Value, resolver: &Resolver) -> MatchResult {
    let Value::List(elements) = value else {
        return MatchResult::mismatch("json array", value);
    };
    for (index, element) in elements.iter().enumerate() {
        let result = item.matches(element, resolver);
        if !result.is_success() {
            return result.bread_crumb(index);
        }
    }
    MatchResult::Success
}

/// One sample element, or none when the item would recurse forever.
pub fn generate(item: &Pattern, resolver: &Resolver) -> Result<Value, ContractError> {
    if item.recurses_into_expanding(resolver) {
        return Ok(Value::List(Vec::new()));
    }
    let element = item.generate(resolver).map_err(|e| e.at(0usize))?;
    Ok(Value::List(vec![element]))
}

pub fn new_based_on(item: &Pattern, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
    Ok(item
        .new_based_on(row, resolver)?
        .into_iter()
        .map(|specialised| Pattern::ListOf(Box::new(specialised)))
        .collect())
}

pub fn parse(item: &Pattern, text: &str) -> Result<Value, ContractError> {
    let field = format!("list of {}", item.type_name());
    match parse_json_text(text, &field)? {
        list @ Value::List(_) => Ok(list),
        other => Err(ContractError::format(
            field,
            format!("Expected json array, actual was {}", other.type_name()),
        )),
    }
}

pub fn encompasses(item: &Pattern, other: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
    match other {
        Pattern::ListOf(other_item) => item.encompasses(other_item, this_resolver, other_resolver),
        Pattern::Exact(list @ Value::List(_)) => matches(item, list, this_resolver),
        other => MatchResult::failure(
            FailureKind::Mismatch,
            format!("Expected list of {}, got {}", item.type_name(), other.type_name()),
        ),
    }
}
