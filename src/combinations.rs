//! Combination builders behind `new_based_on`.
//!
//! Both stages keep declaration order, so the same inputs always enumerate
//! the same specialisations in the same order.
use indexmap::IndexMap;
use tracing::debug;

use crate::error::ContractError;
use crate::pattern::{without_optionality, Pattern};
use crate::row::Row;

/// Every subset of `keys` a test case can carry.
///
/// Required keys and keys bound by the row are always present; each other
/// optional key yields a subset without it followed by one with it. The
/// subset count is checked against `limit` before each doubling.
pub fn key_sets(keys: &[String], row: &Row, optional_suffix: &str, limit: usize) -> Result<Vec<Vec<String>>, ContractError> {
    let mut sets: Vec<Vec<String>> = vec![Vec::new()];
    for key in keys {
        let canonical = without_optionality(key, optional_suffix);
        let free = key.ends_with(optional_suffix) && !row.contains_field(canonical);
        if free {
            sets.len()
                .checked_mul(2)
                .filter(|total| *total <= limit)
                .ok_or(ContractError::TooManyCombinations { limit })?;
        }
        sets = sets
            .into_iter()
            .flat_map(|set| {
                let mut with = set.clone();
                with.push(key.clone());
                if free { vec![set, with] } else { vec![with] }
            })
            .collect();
    }
    Ok(sets)
}

/// Checked size of the cartesian product of `lens`.
pub fn product_len(lens: impl IntoIterator<Item = usize>, limit: usize) -> Result<usize, ContractError> {
    lens.into_iter().try_fold(1usize, |acc, n| {
        acc.checked_mul(n)
            .filter(|total| *total <= limit)
            .ok_or(ContractError::TooManyCombinations { limit })
    })
}

/// Cartesian product over the option lists, first entry varying slowest.
pub fn cartesian<T: Clone>(
    options: &[(String, Vec<T>)],
    limit: usize,
) -> Result<Vec<IndexMap<String, T>>, ContractError> {
    product_len(options.iter().map(|(_, xs)| xs.len()), limit)?;
    let mut acc: Vec<IndexMap<String, T>> = vec![IndexMap::new()];
    for (key, choices) in options {
        acc = acc
            .into_iter()
            .flat_map(|partial| {
                choices.iter().map(move |choice| {
                    let mut next = partial.clone();
                    next.insert(key.clone(), choice.clone());
                    next
                })
            })
            .collect();
    }
    Ok(acc)
}

/// Both stages together for a keyed container.
///
/// `specialise` is called once per declared key; its results are reused by
/// every key subset that includes the key.
pub fn key_combinations<F>(
    patterns: &IndexMap<String, Pattern>,
    row: &Row,
    optional_suffix: &str,
    limit: usize,
    mut specialise: F,
) -> Result<Vec<IndexMap<String, Pattern>>, ContractError>
where
    F: FnMut(&str, &Pattern) -> Result<Vec<Pattern>, ContractError>,
{
    let keys: Vec<String> = patterns.keys().cloned().collect();
    let sets = key_sets(&keys, row, optional_suffix, limit)?;

    let mut options: IndexMap<String, Vec<Pattern>> = IndexMap::new();
    for (key, pattern) in patterns {
        let choices = specialise(key, pattern).map_err(|e| e.at(key))?;
        if choices.is_empty() {
            return Err(ContractError::Contract(format!("key {key} has no specialisations")));
        }
        options.insert(key.clone(), choices);
    }

    let mut out = Vec::new();
    for set in &sets {
        let selected: Vec<(String, Vec<Pattern>)> = set
            .iter()
            .map(|k| (k.clone(), options[k.as_str()].clone()))
            .collect();
        let combos = cartesian(&selected, limit)?;
        if out.len() + combos.len() > limit {
            return Err(ContractError::TooManyCombinations { limit });
        }
        out.extend(combos);
    }
    debug!(keys = keys.len(), key_sets = sets.len(), combinations = out.len(), "enumerated key combinations");
    Ok(out)
}
