//! XML-shaped patterns: element name, attributes, ordered children.
//!
//! Children are matched left to right. Each child position is one of
//! required, optional (zero or one occurrence) or multiple (zero or more),
//! and a child consumes value nodes only when their element name lines up.
use std::borrow::Cow;

use indexmap::IndexMap;
use tracing::debug;

use crate::combinations;
use crate::config::UnexpectedKeyPolicy;
use crate::error::ContractError;
use crate::resolver::{find_missing_key, KeyMismatch, Resolver};
use crate::result::{Crumb, FailureKind, MatchResult};
use crate::row::Row;
use crate::value::{Node, Value};

use super::{
    bind_row_value, is_optional, parsed_pattern, without_optionality, Pattern,
    OCCURS_ATTRIBUTE, TYPE_ATTRIBUTE, XML_ATTR_OPTIONAL_SUFFIX,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurs {
    #[default]
    Required,
    Optional,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuralPattern {
    pub name: String,
    pub qualifier: Option<String>,
    /// Attribute patterns; optional ones keep the `.opt` suffix.
    pub attributes: IndexMap<String, Pattern>,
    pub children: Vec<Pattern>,
    pub occurs: Occurs,
    /// Named pattern supplying attributes and children in place of our own.
    pub type_ref: Option<String>,
}

/// One child position of a sequence, seen through named references.
struct Slot<'a> {
    occurs: Occurs,
    /// Pattern for a single occurrence.
    pattern: &'a Pattern,
    /// Element name; `None` for text.
    name: Option<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// OCCURS
// ————————————————————————————————————————————————————————————————————————————

impl Occurs {
    pub fn from_attribute(value: &str) -> Result<Self, ContractError> {
        match value.trim() {
            "required" => Ok(Occurs::Required),
            "optional" => Ok(Occurs::Optional),
            "multiple" => Ok(Occurs::Multiple),
            other => Err(ContractError::InvalidPattern(format!(
                "{OCCURS_ATTRIBUTE} must be required, optional or multiple, found \"{other}\""
            ))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Occurs::Required => "required",
            Occurs::Optional => "optional",
            Occurs::Multiple => "multiple",
        }
    }

    /// A position marked `self` accepts every occurrence count `smaller` allows.
    pub fn admits(self, smaller: Occurs) -> bool {
        match self {
            Occurs::Required => smaller == Occurs::Required,
            Occurs::Optional => smaller != Occurs::Multiple,
            Occurs::Multiple => true,
        }
    }
}

fn is_namespace_attribute(key: &str) -> bool {
    key == "xmlns" || key.starts_with("xmlns:")
}

fn type_token(name: &str) -> String { format!("({name})") }

// Whitespace between elements carries no content.
fn is_layout(value: &Value) -> bool { value.is_blank_text() }

// ————————————————————————————————————————————————————————————————————————————
// SLOTS
// ————————————————————————————————————————————————————————————————————————————

fn slot<'a>(child: &'a Pattern, resolver: &Resolver) -> Result<Slot<'a>, ContractError> {
    match child {
        Pattern::Structural(node) => Ok(Slot { occurs: node.occurs, pattern: child, name: Some(node.name.clone()) }),
        Pattern::ListOf(item) => {
            let inner = slot(item, resolver)?;
            Ok(Slot { occurs: Occurs::Multiple, pattern: item.as_ref(), name: inner.name })
        }
        Pattern::Named(_) => {
            let (resolved, inner_resolver) = resolver.resolved_hop(child)?;
            let inner = slot(&resolved, &inner_resolver)?;
            Ok(Slot { occurs: inner.occurs, pattern: child, name: inner.name })
        }
        text => Ok(Slot { occurs: Occurs::Required, pattern: text, name: None }),
    }
}

impl Slot<'_> {
    fn is_text(&self) -> bool { self.name.is_none() }

    fn accepts(&self, value: &Value) -> bool {
        match (&self.name, value) {
            (Some(name), Value::Node(node)) => &node.name == name,
            (Some(_), _) => false,
            (None, Value::Node(_)) => false,
            (None, _) => true,
        }
    }

    fn lines_up_with(&self, other: &Slot<'_>) -> bool { self.name == other.name }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("node {name}"),
            None => "text".to_string(),
        }
    }

    fn match_value(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let result = match (self.is_text(), value) {
            (true, Value::String(text)) => self.pattern.matches_text(text, resolver),
            (true, Value::Node(_)) => MatchResult::mismatch(&self.pattern.type_name(), value),
            _ => self.pattern.matches(value, resolver),
        };
        self.crumb(result)
    }

    fn crumb(&self, result: MatchResult) -> MatchResult {
        match &self.name {
            Some(name) => result.bread_crumb(Crumb::Key(name.clone())),
            None => result,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl StructuralPattern {
    pub fn new(name: impl Into<String>) -> Self {
        let Node { name, qualifier, .. } = Node::new(name);
        StructuralPattern { name, qualifier, ..StructuralPattern::default() }
    }

    /// Read a pattern from an XML-shaped value whose text and attribute
    /// values may be pattern tokens.
    pub fn from_node(node: &Node) -> Result<Self, ContractError> {
        let mut pattern = StructuralPattern {
            name: node.name.clone(),
            qualifier: node.qualifier.clone(),
            ..StructuralPattern::default()
        };
        for (key, value) in &node.attributes {
            match key.as_str() {
                OCCURS_ATTRIBUTE => pattern.occurs = Occurs::from_attribute(value)?,
                TYPE_ATTRIBUTE => pattern.type_ref = Some(value.trim().to_string()),
                _ => {
                    pattern.attributes.insert(key.clone(), parsed_pattern(value.trim()));
                }
            }
        }
        for child in &node.children {
            match child {
                Value::Node(inner) => {
                    let inner = StructuralPattern::from_node(inner).map_err(|e| e.at(&inner.name))?;
                    pattern.children.push(Pattern::Structural(inner));
                }
                text if is_layout(text) => {}
                Value::String(text) => pattern.children.push(parsed_pattern(text.trim())),
                other => pattern.children.push(Pattern::Exact(other.clone())),
            }
        }
        Ok(pattern)
    }

    pub fn type_name(&self) -> String { format!("xml node {}", self.name) }

    /// This node with `type_ref` replaced by the shape it names.
    fn effective(&self, resolver: &Resolver) -> Result<(Cow<'_, StructuralPattern>, Resolver), ContractError> {
        if self.type_ref.is_none() {
            return Ok((Cow::Borrowed(self), resolver.clone()));
        }
        let mut current = self.clone();
        let mut resolver = resolver.clone();
        while let Some(type_name) = current.type_ref.take() {
            let (shape, inner) = resolver.resolved_hop(&Pattern::Named(type_token(&type_name)))?;
            resolver = inner;
            match shape {
                Pattern::Structural(shape) => {
                    let mut attributes = current.attributes;
                    attributes.extend(shape.attributes);
                    current = StructuralPattern {
                        attributes,
                        children: shape.children,
                        type_ref: shape.type_ref,
                        ..current
                    };
                }
                content => current.children = vec![content],
            }
        }
        Ok((Cow::Owned(current), resolver))
    }

    fn single_text_child(&self) -> Option<&Pattern> {
        match self.children.as_slice() {
            [child] if !matches!(child, Pattern::Structural(_) | Pattern::ListOf(_) | Pattern::Named(_)) => Some(child),
            _ => None,
        }
    }

    fn declared_attributes(&self) -> IndexMap<String, Pattern> {
        self.attributes
            .iter()
            .filter(|(k, _)| !is_namespace_attribute(k))
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect()
    }

    // ------------------------------- match -------------------------------- //

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let Value::Node(node) = value else {
            return MatchResult::mismatch(&self.type_name(), value);
        };
        if node.name != self.name {
            return MatchResult::failure(
                FailureKind::Mismatch,
                format!("Expected node named {}, actual was {}", self.name, node.name),
            );
        }
        let (shape, resolver) = match self.effective(resolver) {
            Ok(found) => found,
            Err(error) => return MatchResult::Failure(error.into()),
        };
        let resolver = resolver.with_empty_pattern();
        let result = shape.match_attributes(node, &resolver);
        if !result.is_success() {
            return result;
        }
        shape.match_children(&node.children, &resolver)
    }

    fn match_attributes(&self, node: &Node, resolver: &Resolver) -> MatchResult {
        let declared = self.declared_attributes();
        let actual: IndexMap<String, &String> = node
            .attributes
            .iter()
            .filter(|(k, _)| !is_namespace_attribute(k))
            .map(|(k, v)| (k.clone(), v))
            .collect();
        match find_missing_key(&declared, &actual, resolver.policy(), XML_ATTR_OPTIONAL_SUFFIX) {
            Some(KeyMismatch::Missing(key)) => {
                let canonical = without_optionality(&key, XML_ATTR_OPTIONAL_SUFFIX).to_string();
                return MatchResult::failure(FailureKind::MissingKey, format!("Expected attribute named \"{canonical}\" was missing"))
                    .bread_crumb(canonical);
            }
            Some(KeyMismatch::Unexpected(key)) => {
                return MatchResult::failure(FailureKind::UnexpectedKey, format!("Attribute named \"{key}\" was unexpected"))
                    .bread_crumb(key);
            }
            None => {}
        }
        for (key, pattern) in &declared {
            let canonical = without_optionality(key, XML_ATTR_OPTIONAL_SUFFIX);
            let Some(text) = actual.get(canonical) else { continue };
            let result = pattern.matches_text(text, resolver);
            if !result.is_success() {
                return result.bread_crumb(canonical);
            }
        }
        MatchResult::Success
    }

    /// Align value children against the child positions, left to right.
    ///
    /// An optional or repeated position leaves enough same-name nodes for the
    /// required positions directly after it.
    fn match_children(&self, children: &[Value], resolver: &Resolver) -> MatchResult {
        let values: Vec<&Value> = children.iter().filter(|v| !is_layout(v)).collect();
        let slots = match self.children.iter().map(|c| slot(c, resolver)).collect::<Result<Vec<_>, _>>() {
            Ok(slots) => slots,
            Err(error) => return MatchResult::Failure(error.into()),
        };
        let mut cursor = 0;
        for (index, slot) in slots.iter().enumerate() {
            if slot.occurs == Occurs::Required {
                match values.get(cursor) {
                    None if slot.is_text() => {
                        let result = slot.pattern.matches_text("", resolver);
                        if !result.is_success() {
                            return result;
                        }
                    }
                    None => {
                        return slot.crumb(MatchResult::failure(
                            FailureKind::StructuralAlignment,
                            format!("Expected {} but there were no more nodes", slot.describe()),
                        ));
                    }
                    Some(value) => {
                        let result = slot.match_value(value, resolver);
                        if !result.is_success() {
                            return result;
                        }
                        cursor += 1;
                    }
                }
                continue;
            }
            let run = values[cursor..].iter().take_while(|v| slot.accepts(v)).count();
            let available = run.saturating_sub(reserved_after(&slots, index));
            let take = match slot.occurs {
                Occurs::Optional => available.min(1),
                _ => available,
            };
            for value in &values[cursor..cursor + take] {
                let result = slot.match_value(value, resolver);
                if !result.is_success() {
                    return result;
                }
            }
            cursor += take;
        }
        match values.get(cursor) {
            None => MatchResult::Success,
            Some(Value::Node(extra)) => MatchResult::failure(
                FailureKind::StructuralAlignment,
                format!("Unexpected trailing node {}", extra.name),
            )
            .bread_crumb(extra.name.clone()),
            Some(extra) => MatchResult::failure(
                FailureKind::StructuralAlignment,
                format!("Unexpected trailing text \"{}\"", extra.to_text()),
            ),
        }
    }

    // ------------------------------ generate ------------------------------ //

    pub fn generate(&self, resolver: &Resolver) -> Result<Value, ContractError> {
        let (shape, resolver) = self.effective(resolver)?;
        let resolver = resolver.with_empty_pattern();
        let mut node = Node {
            name: self.name.clone(),
            qualifier: self.qualifier.clone(),
            ..Node::default()
        };
        for (key, pattern) in &shape.attributes {
            let canonical = without_optionality(key, XML_ATTR_OPTIONAL_SUFFIX);
            let value = resolver.generate(canonical, pattern)?;
            node.attributes.insert(canonical.to_string(), value.to_text());
        }
        for child in &shape.children {
            let slot = slot(child, &resolver)?;
            if slot.occurs != Occurs::Required && slot.pattern.recurses_into_expanding(&resolver) {
                continue;
            }
            let value = match &slot.name {
                Some(name) => resolver.generate(name, slot.pattern)?,
                None => slot.pattern.generate(&resolver)?,
            };
            node.children.push(match value {
                Value::Node(inner) => Value::Node(inner),
                text => Value::String(text.to_text()),
            });
        }
        Ok(Value::Node(node))
    }

    // ---------------------------- new_based_on ---------------------------- //

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Pattern>, ContractError> {
        if let Some(type_name) = &self.type_ref {
            if resolver.is_expanding(&type_token(type_name)) {
                return Ok(vec![Pattern::Structural(self.clone())]);
            }
        }
        let (shape, resolver) = self.effective(resolver)?;
        let resolver = resolver.with_empty_pattern();
        let limit = resolver.max_combinations();

        let attribute_sets = combinations::key_combinations(
            &shape.attributes,
            row,
            XML_ATTR_OPTIONAL_SUFFIX,
            limit,
            |key, pattern| {
                if is_namespace_attribute(key) {
                    return Ok(vec![pattern.clone()]);
                }
                bind_row_value(row, without_optionality(key, XML_ATTR_OPTIONAL_SUFFIX), pattern, &resolver)
            },
        )?;

        let bound_text = shape.single_text_child().filter(|_| row.contains_field(&self.name));
        let positions: Vec<(String, Vec<Option<Pattern>>)> = match bound_text {
            Some(text) => vec![(
                "0".to_string(),
                bind_row_value(row, &self.name, text, &resolver)?.into_iter().map(Some).collect(),
            )],
            None => shape
                .children
                .iter()
                .enumerate()
                .map(|(position, child)| {
                    child_options(child, row, &resolver)
                        .map(|options| (position.to_string(), options))
                        .map_err(|e| e.at(position))
                })
                .collect::<Result<_, _>>()?,
        };
        let child_sets = combinations::cartesian(&positions, limit)?;
        combinations::product_len([attribute_sets.len(), child_sets.len()], limit)?;
        debug!(
            node = self.name.as_str(),
            attribute_sets = attribute_sets.len(),
            child_sets = child_sets.len(),
            "specialised structural pattern"
        );

        let mut out = Vec::with_capacity(attribute_sets.len() * child_sets.len());
        for attributes in &attribute_sets {
            for children in &child_sets {
                out.push(Pattern::Structural(StructuralPattern {
                    name: self.name.clone(),
                    qualifier: self.qualifier.clone(),
                    attributes: attributes.clone(),
                    children: children.values().flatten().cloned().collect(),
                    occurs: self.occurs,
                    type_ref: None,
                }));
            }
        }
        Ok(out)
    }

    // ----------------------------- encompass ------------------------------ //

    pub fn encompasses(&self, other: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        let smaller = match other {
            Pattern::Exact(value @ Value::Node(_)) => return self.matches(value, this_resolver),
            Pattern::Structural(smaller) => smaller,
            other => {
                return MatchResult::failure(
                    FailureKind::Mismatch,
                    format!("Expected {}, got {}", self.type_name(), other.type_name()),
                );
            }
        };
        if !self.occurs.admits(smaller.occurs) {
            return MatchResult::failure(
                FailureKind::StructuralAlignment,
                format!(
                    "A {} node {} does not accept a {} node",
                    self.occurs.label(),
                    self.name,
                    smaller.occurs.label()
                ),
            );
        }
        if self.name != smaller.name {
            return MatchResult::failure(
                FailureKind::Mismatch,
                format!("Expected node named {}, got {}", self.name, smaller.name),
            );
        }

        let mut this_resolver = this_resolver.clone();
        if let (Some(b), Some(s)) = (&self.type_ref, &smaller.type_ref) {
            if this_resolver.is_assumed(b, s) {
                return MatchResult::Success;
            }
            this_resolver = this_resolver.assuming(b, s);
        }
        let (bigger, this_resolver) = match self.effective(&this_resolver) {
            Ok(found) => found,
            Err(error) => return MatchResult::Failure(error.into()),
        };
        let (smaller, other_resolver) = match smaller.effective(other_resolver) {
            Ok(found) => found,
            Err(error) => return MatchResult::Failure(error.into()),
        };
        let this_resolver = this_resolver.with_empty_pattern();
        let other_resolver = other_resolver.with_empty_pattern();

        let result = bigger.encompass_attributes(&smaller, &this_resolver, &other_resolver);
        if !result.is_success() {
            return result;
        }
        bigger.encompass_children(&smaller, &this_resolver, &other_resolver)
    }

    fn encompass_attributes(&self, smaller: &StructuralPattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        let bigger_attrs = self.declared_attributes();
        let smaller_attrs = smaller.declared_attributes();
        let optional_form = |k: &str| format!("{k}{XML_ATTR_OPTIONAL_SUFFIX}");

        for key in bigger_attrs.keys().filter(|k| !is_optional(k, XML_ATTR_OPTIONAL_SUFFIX)) {
            if smaller_attrs.contains_key(key) {
                continue;
            }
            let message = if smaller_attrs.contains_key(&optional_form(key)) {
                format!("Attribute {key} is required here but optional in the other pattern")
            } else {
                format!("Attribute {key} was missing")
            };
            return MatchResult::failure(FailureKind::MissingKey, message).bread_crumb(key);
        }

        let lookup = |attrs: &IndexMap<String, Pattern>, key: &str| -> Option<Pattern> {
            attrs
                .get(key)
                .or_else(|| attrs.get(&optional_form(key)))
                .or_else(|| attrs.get(without_optionality(key, XML_ATTR_OPTIONAL_SUFFIX)))
                .cloned()
        };

        if this_resolver.policy() == UnexpectedKeyPolicy::Strict {
            let unexpected = smaller_attrs
                .keys()
                .filter(|k| !is_optional(k, XML_ATTR_OPTIONAL_SUFFIX))
                .find(|k| lookup(&bigger_attrs, k.as_str()).is_none());
            if let Some(key) = unexpected {
                return MatchResult::failure(FailureKind::UnexpectedKey, format!("Attribute {key} was unexpected"))
                    .bread_crumb(key);
            }
        }

        for (key, bigger) in &bigger_attrs {
            let Some(smaller) = lookup(&smaller_attrs, key.as_str()) else { continue };
            let result = encompass_text(bigger, &smaller, this_resolver, other_resolver);
            if !result.is_success() {
                return result.bread_crumb(without_optionality(key, XML_ATTR_OPTIONAL_SUFFIX));
            }
        }
        MatchResult::Success
    }

    /// Position-by-position comparison of two child sequences.
    fn encompass_children(&self, smaller: &StructuralPattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
        let bigger_slots = match self.children.iter().map(|c| slot(c, this_resolver)).collect::<Result<Vec<_>, _>>() {
            Ok(slots) => slots,
            Err(error) => return MatchResult::Failure(error.into()),
        };
        let smaller_slots = match smaller.children.iter().map(|c| slot(c, other_resolver)).collect::<Result<Vec<_>, _>>() {
            Ok(slots) => slots,
            Err(error) => return MatchResult::Failure(error.into()),
        };

        let mut cursor = 0;
        for (index, b) in bigger_slots.iter().enumerate() {
            match smaller_slots.get(cursor) {
                None => {
                    if b.occurs != Occurs::Required {
                        continue;
                    }
                    if b.is_text() && b.pattern.matches_text("", this_resolver).is_success() {
                        continue;
                    }
                    return b.crumb(MatchResult::failure(
                        FailureKind::StructuralAlignment,
                        format!("Expected {} but the other pattern has no more nodes", b.describe()),
                    ));
                }
                Some(s) if !b.lines_up_with(s) => {
                    if b.occurs != Occurs::Required {
                        continue;
                    }
                    return b.crumb(MatchResult::failure(
                        FailureKind::StructuralAlignment,
                        format!("Expected {}, the other pattern has {} here", b.describe(), s.describe()),
                    ));
                }
                Some(_) => {}
            }

            let run = smaller_slots[cursor..].iter().take_while(|s| b.lines_up_with(s)).count();
            let take = match b.occurs {
                Occurs::Required => run.min(1),
                Occurs::Optional => run.saturating_sub(reserved_after(&bigger_slots, index)).min(1),
                Occurs::Multiple => run.saturating_sub(reserved_after(&bigger_slots, index)),
            };
            for s in &smaller_slots[cursor..cursor + take] {
                if !b.occurs.admits(s.occurs) {
                    return b.crumb(MatchResult::failure(
                        FailureKind::StructuralAlignment,
                        format!(
                            "A {} {} does not accept a {} {}",
                            b.occurs.label(),
                            b.describe(),
                            s.occurs.label(),
                            s.describe()
                        ),
                    ));
                }
                let result = if b.is_text() {
                    encompass_text(b.pattern, s.pattern, this_resolver, other_resolver)
                } else {
                    element_encompasses(b.pattern, s.pattern, this_resolver, other_resolver)
                };
                if !result.is_success() {
                    return b.crumb(result);
                }
            }
            cursor += take;
        }

        match smaller_slots.get(cursor) {
            None => MatchResult::Success,
            Some(extra) => extra.crumb(MatchResult::failure(
                FailureKind::StructuralAlignment,
                format!("The other pattern has an extra {} that this one does not declare", extra.describe()),
            )),
        }
    }
}

/// Required positions directly after `index` that take the same element.
fn reserved_after(slots: &[Slot<'_>], index: usize) -> usize {
    let name = &slots[index].name;
    slots[index + 1..]
        .iter()
        .take_while(|s| &s.name == name)
        .filter(|s| s.occurs == Occurs::Required)
        .count()
}

/// One occurrence of an element against one occurrence of another.
///
/// Occurrence counts were already compared for the positions, so both sides
/// are read as a single required node here.
fn element_encompasses(bigger: &Pattern, smaller: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
    let mut this_resolver = this_resolver.clone();
    if let (Pattern::Named(b), Pattern::Named(s)) = (bigger, smaller) {
        if this_resolver.is_assumed(b, s) {
            return MatchResult::Success;
        }
        this_resolver = this_resolver.assuming(b, s);
    }
    match (this_resolver.resolved_hop(bigger), other_resolver.resolved_hop(smaller)) {
        (Ok((b, this_inner)), Ok((s, other_inner))) => b
            .with_occurs(Occurs::Required)
            .encompasses(&s.with_occurs(Occurs::Required), &this_inner, &other_inner),
        (Err(error), _) | (_, Err(error)) => MatchResult::Failure(error.into()),
    }
}

/// Literal text on the smaller side is read with the bigger side's pattern.
fn encompass_text(bigger: &Pattern, smaller: &Pattern, this_resolver: &Resolver, other_resolver: &Resolver) -> MatchResult {
    match smaller {
        Pattern::Exact(Value::String(text)) => bigger.matches_text(text, this_resolver),
        smaller => bigger.encompasses(smaller, this_resolver, other_resolver),
    }
}

/// Specialisations of one child position; `None` means "left out".
fn child_options(child: &Pattern, row: &Row, resolver: &Resolver) -> Result<Vec<Option<Pattern>>, ContractError> {
    let slot = slot(child, resolver)?;
    let bound = match &slot.name {
        Some(name) if row.contains_field(name) => binds_text(child, resolver)?,
        _ => false,
    };
    let specialised = child.new_based_on(row, resolver)?;
    let optional = slot.occurs == Occurs::Optional;
    let present = specialised
        .into_iter()
        .map(|p| Some(if optional { p.with_occurs(Occurs::Required) } else { p }));
    if optional && !bound {
        Ok(std::iter::once(None).chain(present).collect())
    } else {
        Ok(present.collect())
    }
}

/// Whether a row field named after this element pins the element's text.
fn binds_text(child: &Pattern, resolver: &Resolver) -> Result<bool, ContractError> {
    let (resolved, resolver) = resolver.resolved_hop(child)?;
    match resolved {
        Pattern::Structural(node) => Ok(node.effective(&resolver)?.0.single_text_child().is_some()),
        _ => Ok(false),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const OPTIONAL: (&str, &str) = (OCCURS_ATTRIBUTE, "optional");
    const MULTIPLE: (&str, &str) = (OCCURS_ATTRIBUTE, "multiple");

    fn el(name: &str) -> Node { Node::new(name) }

    fn with(node: Node, (k, v): (&str, &str)) -> Node { node.attr(k, v) }

    fn pattern(node: Node) -> Pattern {
        Pattern::Structural(StructuralPattern::from_node(&node).unwrap())
    }

    fn resolver(entries: Vec<(&str, Node)>) -> Resolver {
        Resolver::new(entries.into_iter().map(|(k, n)| (k.to_string(), pattern(n))).collect())
    }

    fn account(children: Vec<Node>) -> Value {
        children.into_iter().fold(el("account"), Node::child).into()
    }

    #[test]
    fn matches_a_number_within_a_structure() {
        let p = pattern(el("outer").child(el("inner").text("(number)")));
        let ok = el("outer").child(el("inner").text("1")).into();
        assert!(p.matches(&ok, &Resolver::default()).is_success());

        let bad = el("outer").child(el("inner").text("abc")).into();
        let result = p.matches(&bad, &Resolver::default());
        let failure = result.failure_ref().expect("abc is not a number");
        assert_eq!(failure.breadcrumb.first(), Some(&Crumb::Key("inner".into())));
    }

    #[test]
    fn layout_whitespace_is_ignored() {
        let p = pattern(el("outer").text("\n    ").child(el("inner").text("\n  (number)\n")).text("\n"));
        let value = el("outer").child(el("inner").text("1")).into();
        assert!(p.matches(&value, &Resolver::default()).is_success());
    }

    #[test]
    fn empty_nodes_match_string_and_nullable_text() {
        let r = Resolver::default();
        assert!(pattern(el("name").text("(string)")).matches(&el("name").into(), &r).is_success());
        assert!(pattern(el("data").text("(number?)")).matches(&el("data").into(), &r).is_success());
        assert!(pattern(el("data").text("(number?)")).matches(&el("data").text("1").into(), &r).is_success());
        assert!(!pattern(el("data").text("(number)")).matches(&el("data").into(), &r).is_success());
    }

    #[test]
    fn non_nodes_fail_gracefully() {
        assert!(!pattern(el("data")).matches(&Value::Null, &Resolver::default()).is_success());
    }

    #[test]
    fn missing_required_node_fails() {
        let p = pattern(el("person").child(el("name").text("(string)")).child(el("address").text("(string)")));
        let value = el("person").child(el("name").text("Jane")).into();
        let result = p.matches(&value, &Resolver::default());
        assert_eq!(result.failure_ref().unwrap().kind, FailureKind::StructuralAlignment);
        assert_eq!(result.failure_ref().unwrap().path(), "address");
    }

    #[test]
    fn literal_text_must_match_exactly() {
        let p = pattern(el("account").child(el("name").text("John Doe")).child(el("address").text("(string)")));
        let r = Resolver::default();
        assert!(p.matches(&account(vec![el("name").text("John Doe"), el("address").text("Baker street")]), &r).is_success());
        assert!(!p.matches(&account(vec![el("name").text("Jane Doe"), el("address").text("Baker street")]), &r).is_success());
    }

    #[test]
    fn optional_nodes_may_be_skipped_anywhere() {
        let r = Resolver::default();
        let p = pattern(
            el("account")
                .child(with(el("name"), OPTIONAL).text("(string)"))
                .child(with(el("address"), OPTIONAL).text("(string)"))
                .child(el("phone").text("(number)")),
        );
        assert!(p.matches(&account(vec![el("phone").text("10")]), &r).is_success());
        assert!(p.matches(&account(vec![el("address").text("Baker"), el("phone").text("10")]), &r).is_success());
        assert!(p.matches(&account(vec![
            el("name").text("Jane"),
            el("address").text("Baker"),
            el("phone").text("10"),
        ]), &r).is_success());
    }

    #[test]
    fn present_optional_node_must_still_match() {
        let p = pattern(el("name").child(with(el("nameid"), OPTIONAL).text("(number)")).child(el("fullname").text("(string)")));
        let value = el("name").child(el("nameid").text("hello")).child(el("fullname").text("Jane")).into();
        let result = p.matches(&value, &Resolver::default());
        assert!(result.report().contains("nameid"));
    }

    #[test]
    fn trailing_content_is_rejected() {
        let p = pattern(el("account").child(with(el("name"), OPTIONAL).text("(string)")));
        let result = p.matches(&el("account").text("test").into(), &Resolver::default());
        assert_eq!(result.failure_ref().unwrap().kind, FailureKind::StructuralAlignment);
    }

    #[test]
    fn repeated_nodes_at_start_middle_and_end() {
        let r = Resolver::default();
        let middle = pattern(
            el("account")
                .child(el("name").text("(string)"))
                .child(with(el("address"), MULTIPLE).text("(string)"))
                .child(el("phone").text("(number)")),
        );
        assert!(middle.matches(&account(vec![
            el("name").text("John"),
            el("address").text("Baker"),
            el("address").text("Downing"),
            el("phone").text("10"),
        ]), &r).is_success());
        assert!(middle.matches(&account(vec![el("name").text("John"), el("phone").text("10")]), &r).is_success());

        let start = pattern(
            el("account")
                .child(with(el("address"), MULTIPLE).text("(string)"))
                .child(el("name").text("(string)")),
        );
        assert!(start.matches(&account(vec![
            el("address").text("Baker"),
            el("address").text("Downing"),
            el("name").text("John"),
        ]), &r).is_success());

        let end_then_optional = pattern(
            el("account")
                .child(el("name").text("(string)"))
                .child(with(el("address"), MULTIPLE).text("(string)"))
                .child(with(el("phone"), OPTIONAL).text("(number)")),
        );
        assert!(end_then_optional.matches(&account(vec![el("name").text("John")]), &r).is_success());
    }

    #[test]
    fn repeated_occurrence_must_match_each_time() {
        let p = pattern(el("name").child(with(el("nameid"), MULTIPLE).text("(number)")).child(el("fullname").text("(string)")));
        let value = el("name").child(el("nameid").text("hello")).child(el("fullname").text("Jane")).into();
        assert!(p.matches(&value, &Resolver::default()).report().contains("nameid"));
    }

    #[test]
    fn named_list_of_nodes() {
        let r = resolver(vec![("(NumberInfo)", el("number").text("(number)"))]);
        let answer = pattern(el("answer").text("(NumberInfo*)"));
        let value = el("answer").child(el("number").text("10")).child(el("number").text("20")).into();
        assert!(r.matches_pattern(None, &answer, &value).is_success());
    }

    #[test]
    fn typed_nodes_take_their_shape_from_the_resolver() {
        let r = resolver(vec![
            ("(Name)", el("contract_type").text("(string)")),
            ("(Address)", el("contract_type").text("(string)")),
        ]);
        let person = pattern(el("person").child(el("name").attr(TYPE_ATTRIBUTE, "Name")));
        assert!(person.matches(&el("person").child(el("name").text("Jill")).into(), &r).is_success());

        let account_type = pattern(
            el("account")
                .child(el("name").text("(string)"))
                .child(with(el("address").attr(TYPE_ATTRIBUTE, "Address"), OPTIONAL)),
        );
        assert!(account_type.matches(&account(vec![el("name").text("John")]), &r).is_success());

        let repeated = pattern(
            el("account")
                .child(el("name").text("(string)"))
                .child(with(el("address").attr(TYPE_ATTRIBUTE, "Address"), MULTIPLE)),
        );
        assert!(repeated.matches(&account(vec![
            el("name").text("John"),
            el("address").text("Baker"),
            el("address").text("Downing"),
        ]), &r).is_success());
    }

    #[test]
    fn typed_optional_node_with_wrong_shape_fails() {
        let r = resolver(vec![
            ("(Name)", el("contract_type").child(el("fullname").text("(string)")).child(el("salutation").text("(string)"))),
            ("(Address)", el("contract_type").text("(string)")),
        ]);
        let account_type = pattern(
            el("account")
                .child(el("id").text("(number)"))
                .child(with(el("name").attr(TYPE_ATTRIBUTE, "Name"), OPTIONAL))
                .child(with(el("address").attr(TYPE_ATTRIBUTE, "Address"), OPTIONAL)),
        );
        let value = account(vec![
            el("id").text("10"),
            el("name").child(el("firstname").text("Jane")),
            el("address").text("Baker street"),
        ]);
        assert!(!account_type.matches(&value, &r).is_success());
    }

    #[test]
    fn attributes_are_typed_and_namespaces_ignored() {
        let r = Resolver::default();
        let p = pattern(el("number").attr("val", "(number)").attr("unit.opt", "(string)").text("(number)"));
        assert!(p.matches(&el("number").attr("val", "10").text("5").into(), &r).is_success());
        assert!(p.matches(&el("number").attr("val", "10").attr("unit", "kg").attr("xmlns:x", "urn:x").text("5").into(), &r).is_success());

        let bad = p.matches(&el("number").attr("val", "ten").text("5").into(), &r);
        assert_eq!(bad.failure_ref().unwrap().path(), "val");
        let missing = p.matches(&el("number").text("5").into(), &r);
        assert_eq!(missing.failure_ref().unwrap().kind, FailureKind::MissingKey);
        let extra = p.matches(&el("number").attr("val", "1").attr("zzz", "1").text("5").into(), &r);
        assert_eq!(extra.failure_ref().unwrap().kind, FailureKind::UnexpectedKey);
    }

    #[test]
    fn generate_keeps_namespace_and_drops_reserved_attributes() {
        let items = pattern(el("ns1:items").attr("xmlns:ns1", "http://example.com/items").text("(string)"));
        let Value::Node(node) = items.generate(&Resolver::default()).unwrap() else { panic!() };
        assert_eq!(node.name, "items");
        assert_eq!(node.real_name(), "ns1:items");
        assert_eq!(node.attributes.get("xmlns:ns1").map(String::as_str), Some("http://example.com/items"));
        assert!(matches!(node.children.as_slice(), [Value::String(_)]));

        let repeated = pattern(el("name").child(with(el("title"), MULTIPLE).text("(number)")));
        let Value::Node(node) = repeated.generate(&Resolver::default()).unwrap() else { panic!() };
        let Value::Node(title) = &node.children[0] else { panic!() };
        assert!(!title.attributes.contains_key(OCCURS_ATTRIBUTE));
    }

    #[test]
    fn generate_renders_empty_nodes_and_literals() {
        let p = pattern(el("data").child(el("empty")).child(el("value").text("10")));
        let value = p.generate(&Resolver::default()).unwrap();
        assert_eq!(value.to_string(), "<data><empty/><value>10</value></data>");
    }

    #[test]
    fn generate_a_list_of_named_nodes() {
        let r = resolver(vec![("(Item)", el("item").text("(string)"))]);
        let items = pattern(el("items").text("(Item*)"));
        let Value::Node(node) = items.generate(&r).unwrap() else { panic!() };
        assert!(!node.children.is_empty());
        for child in &node.children {
            let Value::Node(item) = child else { panic!("expected item node") };
            assert!(matches!(item.children.as_slice(), [Value::String(_)]));
        }
    }

    #[test]
    fn examples_fill_node_text_and_attributes() {
        let row = Row::new(["name", "age"], ["John Doe", "10"]).unwrap();
        let r = Resolver::default();

        let nodes = pattern(el("data").child(el("name").text("(string)")).child(el("age").text("(number)")));
        let specialised = nodes.new_based_on(&row, &r).unwrap();
        assert_eq!(specialised[0].generate(&r).unwrap().to_string(), "<data><name>John Doe</name><age>10</age></data>");

        let nullable = pattern(el("data").child(el("name").text("(string?)")).child(el("age").text("(number?)")));
        let specialised = nullable.new_based_on(&row, &r).unwrap();
        assert_eq!(specialised[0].generate(&r).unwrap().to_string(), "<data><name>John Doe</name><age>10</age></data>");

        let attrs = pattern(el("data").attr("name", "(string?)").attr("age", "(number?)"));
        let specialised = attrs.new_based_on(&row, &r).unwrap();
        assert_eq!(specialised.len(), 1);
        assert_eq!(specialised[0].generate(&r).unwrap().to_string(), r#"<data name="John Doe" age="10"/>"#);

        let blank = Row::new(["name", "age"], ["", ""]).unwrap();
        let specialised = attrs.new_based_on(&blank, &r).unwrap();
        assert_eq!(specialised.len(), 1);
        assert_eq!(specialised[0].generate(&r).unwrap().to_string(), r#"<data name="" age=""/>"#);
    }

    #[test]
    fn invalid_examples_are_contract_errors() {
        let p = pattern(el("data").child(el("name").text("(string?)")).child(el("age").text("(number?)")));
        let row = Row::new(["name", "age"], ["John Doe", "ABC"]).unwrap();
        assert!(p.new_based_on(&row, &Resolver::default()).is_err());
    }

    #[test]
    fn optional_attribute_enumeration() {
        let r = Resolver::default();
        let p = pattern(el("number").attr("val.opt", "(number)"));
        let specialised = p.new_based_on(&Row::default(), &r).unwrap();
        assert_eq!(specialised.len(), 2);
        let has_val: Vec<bool> = specialised
            .iter()
            .map(|s| match s {
                Pattern::Structural(s) => s.attributes.contains_key("val.opt"),
                _ => panic!(),
            })
            .collect();
        assert_eq!(has_val, vec![false, true]);

        let picked = p.new_based_on(&Row::new(["val"], ["10"]).unwrap(), &r).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].generate(&r).unwrap().to_string(), r#"<number val="10"/>"#);

        // only one marker is stripped
        let doubled = pattern(el("number").attr("val.opt.opt", "(number)"));
        let specialised = doubled.new_based_on(&Row::default(), &r).unwrap();
        assert_eq!(specialised.len(), 2);
        let Pattern::Structural(with_val) = &specialised[1] else { panic!() };
        assert!(with_val.attributes.contains_key("val.opt.opt"));
        let Value::Node(generated) = specialised[1].generate(&r).unwrap() else { panic!() };
        assert!(generated.attributes.contains_key("val.opt"));
    }

    #[test]
    fn optional_nodes_enumerate_with_and_without() {
        let r = resolver(vec![("(Nameid)", el("nameid").text("(number)"))]);
        let plain = pattern(el("name").child(with(el("nameid"), OPTIONAL).text("(number)")));
        let typed = pattern(el("name").child(with(el("nameid").attr(TYPE_ATTRIBUTE, "Nameid"), OPTIONAL)));

        for p in [plain, typed] {
            let values: Vec<Node> = p
                .new_based_on(&Row::default(), &r)
                .unwrap()
                .iter()
                .map(|s| match s.generate(&r).unwrap() {
                    Value::Node(n) => n,
                    other => panic!("expected node, got {other}"),
                })
                .collect();
            assert_eq!(values.len(), 2);
            assert!(values.iter().any(|n| n.children.is_empty()));
            assert!(values.iter().any(|n| matches!(
                n.children.first(),
                Some(Value::Node(first)) if first.name == "nameid" && !first.attributes.contains_key(OCCURS_ATTRIBUTE)
            )));
        }
    }

    #[test]
    fn typed_nodes_load_example_values() {
        let r = resolver(vec![("(Nameid)", el("nameid").text("(number)"))]);
        let row = Row::new(["nameid"], ["10"]).unwrap();
        for occurs in [OPTIONAL, MULTIPLE] {
            let p = pattern(el("name").child(with(el("nameid").attr(TYPE_ATTRIBUTE, "Nameid"), occurs)));
            let specialised = p.new_based_on(&row, &r).unwrap();
            let Value::Node(name) = specialised[0].generate(&r).unwrap() else { panic!() };
            let Some(Value::Node(nameid)) = name.children.first() else { panic!() };
            assert_eq!(nameid.children.first().map(Value::to_text).as_deref(), Some("10"));
        }
    }

    #[test]
    fn repeated_nodes_generate_a_single_sample() {
        let p = pattern(el("name").child(with(el("title"), MULTIPLE).text("(number)")));
        assert_eq!(p.new_based_on(&Row::default(), &Resolver::default()).unwrap().len(), 1);
    }

    #[test]
    fn occurrence_compatibility_table() {
        let r = Resolver::default();
        let node = |occurs: Option<(&str, &str)>| {
            let base = el("number").text("(number)");
            pattern(match occurs { Some(o) => with(base, o), None => base })
        };
        let required = node(None);
        let optional = node(Some(OPTIONAL));
        let multiple = node(Some(MULTIPLE));
        let ok = |b: &Pattern, s: &Pattern| b.encompasses(s, &r, &r).is_success();

        assert!(ok(&required, &required));
        assert!(!ok(&required, &optional));
        assert!(!ok(&required, &multiple));
        assert!(ok(&optional, &required));
        assert!(ok(&optional, &optional));
        assert!(!ok(&optional, &multiple));
        assert!(ok(&multiple, &required));
        assert!(ok(&multiple, &optional));
        assert!(ok(&multiple, &multiple));
    }

    #[test]
    fn text_compatibility() {
        let r = Resolver::default();
        let ok = |b: Node, s: Node| pattern(b).encompasses(&pattern(s), &r, &r).is_success();
        assert!(ok(el("data").text("(number?)"), el("data").text("(number)")));
        assert!(ok(el("data").text("(number?)"), el("data")));
        assert!(ok(el("number").text("(number)"), el("number").text("100")));
        assert!(ok(el("number").text("100"), el("number").text("100")));
        assert!(!ok(el("number").text("(number)"), el("number").text("(string)")));
    }

    #[test]
    fn sequence_order_and_shape_must_agree() {
        let r = Resolver::default();
        let a = pattern(el("answer").child(el("number").text("(number)")).child(el("name").text("(string)")));
        let b = pattern(el("answer").child(el("name").text("(string)")).child(el("number").text("(number)")));
        assert!(a.encompasses(&a, &r, &r).is_success());
        assert!(!a.encompasses(&b, &r, &r).is_success());

        let addresses = pattern(el("contact_info").child(with(el("address"), MULTIPLE).text("(string)")));
        let with_phone = pattern(
            el("contact_info")
                .child(with(el("address"), MULTIPLE).text("(string)"))
                .child(el("phone").text("(number)")),
        );
        let result = addresses.encompasses(&with_phone, &r, &r);
        assert_eq!(result.failure_ref().unwrap().path(), "phone");
    }

    #[test]
    fn repeated_named_types_are_compared_by_their_shape() {
        let numbers = resolver(vec![("(Number)", el("number").text("(number)"))]);
        let strings = resolver(vec![("(Number)", el("number").text("(string)"))]);
        let answers = pattern(el("answers").text("(Number*)"));
        assert!(answers.encompasses(&answers, &numbers, &numbers).is_success());
        assert!(!answers.encompasses(&answers, &numbers, &strings).is_success());

        let fixed = pattern(el("answers").child(el("number").text("(number)")).child(el("number").text("(number)")));
        assert!(!fixed.encompasses(&answers, &numbers, &numbers).is_success());
    }

    #[test]
    fn attribute_compatibility() {
        let r = Resolver::default();
        let ok = |b: Node, s: Node| pattern(b).encompasses(&pattern(s), &r, &r).is_success();
        assert!(ok(el("number").attr("val", "(number)"), el("number").attr("val", "(number)")));
        assert!(ok(el("number").attr("val", "10"), el("number").attr("val", "10")));
        assert!(!ok(el("number").attr("val", "10"), el("number").attr("val", "20")));
        assert!(ok(el("number").attr("val.opt", "(number)"), el("number").attr("val", "(number)")));
        assert!(!ok(el("number").attr("val", "(number)"), el("number").attr("val.opt", "(number)")));
    }

    #[test]
    fn repeated_node_leaves_room_for_a_required_one() {
        let r = Resolver::default();
        let p = pattern(el("a").child(with(el("b"), MULTIPLE).text("(number)")).child(el("b").text("(number)")));

        let generated = p.generate(&r).unwrap();
        assert!(p.matches(&generated, &r).is_success());
        assert!(p.matches(&el("a").child(el("b").text("1")).into(), &r).is_success());
        assert!(p.matches(&el("a").child(el("b").text("1")).child(el("b").text("2")).child(el("b").text("3")).into(), &r).is_success());
        assert!(!p.matches(&el("a").into(), &r).is_success());
        assert!(p.encompasses(&p, &r, &r).is_success());

        let optional_first = pattern(el("a").child(with(el("b"), OPTIONAL).text("(number)")).child(el("b").text("(string)")));
        assert!(optional_first.matches(&el("a").child(el("b").text("x")).into(), &r).is_success());
        assert!(optional_first.matches(&el("a").child(el("b").text("1")).child(el("b").text("x")).into(), &r).is_success());
        assert!(optional_first.encompasses(&optional_first, &r, &r).is_success());
    }

    #[test]
    fn named_list_and_repeated_inline_node_are_interchangeable() {
        let r = resolver(vec![("(Item)", el("item").text("(string)"))]);
        let named = pattern(el("items").text("(Item*)"));
        let inline = pattern(el("items").child(with(el("item"), MULTIPLE).text("(string)")));
        assert!(named.encompasses(&inline, &r, &r).is_success());
        assert!(inline.encompasses(&named, &r, &r).is_success());

        let single = pattern(el("items").child(el("item").text("(string)")));
        assert!(named.encompasses(&single, &r, &r).is_success());
        assert!(!single.encompasses(&named, &r, &r).is_success());
    }

    #[test]
    fn row_field_only_pins_optional_text_nodes() {
        let r = Resolver::default();
        let p = pattern(
            el("person").child(with(el("address"), OPTIONAL).child(el("street").text("(string)"))),
        );
        let row = Row::new(["address"], ["x"]).unwrap();
        assert_eq!(p.new_based_on(&row, &r).unwrap().len(), 2);

        let text = pattern(el("person").child(with(el("address"), OPTIONAL).text("(string)")));
        let pinned = text.new_based_on(&row, &r).unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].generate(&r).unwrap().to_string(), "<person><address>x</address></person>");
    }

    #[test]
    fn named_shape_encompasses_inline_shape() {
        let r = resolver(vec![("(Number)", el("number").text("(number)"))]);
        let inline = pattern(el("number").text("(number)"));
        let named = r.get_pattern("(Number)").unwrap();
        assert!(named.encompasses(&inline, &r, &r).is_success());
    }

    fn text_token() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("(number)".to_string()),
            Just("(string)".to_string()),
            Just("(boolean)".to_string()),
            Just("(number?)".to_string()),
            "[a-z]{1,6}",
        ]
    }

    fn shape_source() -> impl Strategy<Value = Node> {
        let attribute = prop_oneof![Just(None), Just(Some("val")), Just(Some("val.opt"))];
        let leaf = (text_token(), attribute, text_token()).prop_map(|(text, attribute, attribute_text)| {
            let node = el("leaf").text(text);
            match attribute {
                Some(key) => node.attr(key, attribute_text),
                None => node,
            }
        });
        // child names stay distinct: equal neighbours are not backtracked
        leaf.prop_recursive(3, 16, 3, |inner| {
            let occurs = prop_oneof![Just(None), Just(Some("optional")), Just(Some("multiple"))];
            (proptest::collection::vec((inner, occurs), 1..4), proptest::bool::ANY).prop_map(|(children, with_items)| {
                let count = children.len();
                let node = children.into_iter().enumerate().fold(el("node"), |parent, (i, (mut child, occurs))| {
                    child.name = format!("c{i}");
                    match occurs {
                        Some(occurs) => parent.child(child.attr(OCCURS_ATTRIBUTE, occurs)),
                        None => parent.child(child),
                    }
                });
                if with_items { node.child(el(&format!("c{count}")).text("(Item*)")) } else { node }
            })
        })
    }

    fn items() -> Resolver { resolver(vec![("(Item)", el("item").text("(string)"))]) }

    proptest! {
        #[test]
        fn generated_nodes_match_their_shape(source in shape_source()) {
            let shape = pattern(source);
            let r = items();
            let value = shape.generate(&r).unwrap();
            prop_assert!(shape.matches(&value, &r).is_success(), "{}", value);
        }

        #[test]
        fn every_shape_encompasses_itself(source in shape_source()) {
            let shape = pattern(source);
            let r = items();
            prop_assert!(shape.encompasses(&shape, &r, &r).is_success());
        }

        #[test]
        fn specialised_shapes_generate_matching_nodes(source in shape_source()) {
            let shape = pattern(source);
            let r = items();
            for specialised in shape.new_based_on(&Row::default(), &r).unwrap() {
                let value = specialised.generate(&r).unwrap();
                prop_assert!(shape.matches(&value, &r).is_success(), "{}", value);
            }
        }

        #[test]
        fn named_shapes_behave_like_inline_ones(source in shape_source()) {
            let r = resolver(vec![("(Item)", el("item").text("(string)")), ("(Shape)", source)]);
            let shape = Pattern::Named("(Shape)".into());
            let value = shape.generate(&r).unwrap();
            prop_assert!(shape.matches(&value, &r).is_success(), "{}", value);
            prop_assert!(shape.encompasses(&shape, &r, &r).is_success());
            for specialised in shape.new_based_on(&Row::default(), &r).unwrap() {
                let value = specialised.generate(&r).unwrap();
                prop_assert!(shape.matches(&value, &r).is_success(), "{}", value);
            }
        }
    }
}
