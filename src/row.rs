use indexmap::IndexMap;

use crate::error::ContractError;

/// One contract example: field name to example text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: IndexMap<String, String>,
}

impl Row {
    pub fn new<C, V>(columns: C, values: V) -> Result<Self, ContractError>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if columns.len() != values.len() {
            return Err(ContractError::RowShape { columns: columns.len(), values: values.len() });
        }
        Ok(Row { fields: columns.into_iter().zip(values).collect() })
    }

    pub fn contains_field(&self, name: &str) -> bool { self.fields.contains_key(name) }

    pub fn get_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl From<IndexMap<String, String>> for Row {
    fn from(fields: IndexMap<String, String>) -> Self { Row { fields } }
}
