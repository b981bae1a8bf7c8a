//! JSON contract documents.
//!
//! ```json
//! {
//!   "config": {"unexpected_keys": "permissive"},
//!   "patterns": {"(Address)": {"street": "(string)", "zip?": "(number)"}},
//!   "body": {"name": "(string)", "address": "(Address)"},
//!   "examples": [{"name": "Jane"}]
//! }
//! ```
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::ContractError;
use crate::pattern::{is_pattern_token, Pattern};
use crate::resolver::Resolver;
use crate::row::Row;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractDocument {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub patterns: IndexMap<String, serde_json::Value>,
    pub body: serde_json::Value,
    #[serde(default)]
    pub examples: Vec<IndexMap<String, ExampleText>>,
}

/// Example cell; scalars are taken as the text they print as.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExampleText {
    Text(String),
    Scalar(serde_json::Value),
}

/// A loaded contract: named patterns, the body pattern and example rows.
#[derive(Debug, Clone)]
pub struct Contract {
    pub resolver: Resolver,
    pub body: Pattern,
    pub rows: Vec<Row>,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, ContractError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        ContractError::Document(format!("at JSON path {path} → {}", err.into_inner()))
    })
}

impl ExampleText {
    fn into_text(self) -> String {
        match self {
            ExampleText::Text(text) => text,
            ExampleText::Scalar(serde_json::Value::Null) => String::new(),
            ExampleText::Scalar(other) => other.to_string(),
        }
    }
}

impl ContractDocument {
    pub fn from_json_str(src: &str) -> Result<Self, ContractError> { from_str_with_path(src) }

    pub fn into_contract(self) -> Result<Contract, ContractError> {
        let mut patterns = IndexMap::with_capacity(self.patterns.len());
        for (name, source) in &self.patterns {
            if !is_pattern_token(name) {
                return Err(ContractError::InvalidPattern(format!(
                    "named pattern keys look like (Name), found \"{name}\""
                )));
            }
            let pattern = Pattern::from_json(source).map_err(|e| e.at(name))?;
            patterns.insert(name.trim().to_string(), pattern);
        }
        let body = Pattern::from_json(&self.body).map_err(|e| e.at("body"))?;
        let rows = self
            .examples
            .into_iter()
            .map(|fields| {
                fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_text()))
                    .collect::<IndexMap<_, _>>()
                    .into()
            })
            .collect::<Vec<Row>>();
        debug!(patterns = patterns.len(), examples = rows.len(), "loaded contract");
        Ok(Contract {
            resolver: Resolver::with_config(patterns, &self.config),
            body,
            rows,
        })
    }
}

impl Contract {
    pub fn from_json_str(src: &str) -> Result<Self, ContractError> {
        ContractDocument::from_json_str(src)?.into_contract()
    }

    /// The body, or a named pattern given as `Name` or `(Name)`.
    pub fn pattern(&self, name: Option<&str>) -> Result<Pattern, ContractError> {
        let Some(name) = name else { return Ok(self.body.clone()) };
        let token = if is_pattern_token(name) { name.trim().to_string() } else { format!("({})", name.trim()) };
        self.resolver.get_pattern(&token)
    }

    /// Specialisations of `pattern` for every example row, or for the empty
    /// row when there are none.
    pub fn specialisations(&self, pattern: &Pattern) -> Result<Vec<Pattern>, ContractError> {
        if self.rows.is_empty() {
            return pattern.new_based_on(&Row::default(), &self.resolver);
        }
        let mut out = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            let specialised = pattern
                .new_based_on(row, &self.resolver)
                .map_err(|e| e.at(format!("examples[{index}]")))?;
            out.extend(specialised);
        }
        Ok(out)
    }
}
