//! Concrete data the engine matches against and generates.
//!
//! JSON-shaped values and XML-shaped nodes live in one tagged union so a
//! single pattern tree can describe either kind of payload.
use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
    Object(IndexMap<String, Value>),
    List(Vec<Value>),
    Node(Node),
}

/// XML-shaped value: element name, optional namespace prefix, ordered
/// attributes, ordered children (nodes or text).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Node {
    pub name: String,
    pub qualifier: Option<String>,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Value>,
}

// ————————————————————————————————————————————————————————————————————————————
// HELPERS
// ————————————————————————————————————————————————————————————————————————————

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("static regex")
});

/// True for text such as `10`, `-3.5` or `1e9` (surrounding whitespace ignored).
pub fn is_numeric_looking(s: &str) -> bool {
    NUMERIC.is_match(s.trim())
}

pub fn parse_number(s: &str) -> Option<f64> {
    if !is_numeric_looking(s) { return None; }
    s.trim().parse::<f64>().ok()
}

// Prefer integral rendering when exact.
fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl Value {
    pub fn number(n: f64) -> Self { Value::Number(OrderedFloat(n)) }
    pub fn string(s: impl Into<String>) -> Self { Value::String(s.into()) }

    /// Exactly the null marker; blank text is not null.
    pub fn is_null_marker(&self) -> bool { matches!(self, Value::Null) }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, Value::String(s) if s.trim().is_empty())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "json object",
            Value::List(_) => "json array",
            Value::Node(_) => "xml node",
        }
    }

    /// Rendering used for XML text and attribute content.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Boolean(b) => J::Bool(*b),
            Value::Number(n) => json_number(n.0),
            Value::String(s) => J::String(s.clone()),
            Value::Object(map) => J::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
            ),
            Value::List(xs) => J::Array(xs.iter().map(Value::to_json).collect()),
            Value::Node(node) => J::String(node.to_string()),
        }
    }
}

fn json_number(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Boolean(*b),
            J::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
            J::String(s) => Value::String(s.clone()),
            J::Array(xs) => Value::List(xs.iter().map(Value::from).collect()),
            J::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect()
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self { Value::from(&v) }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self { Value::Node(node) }
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        match name.split_once(':') {
            Some((prefix, local)) => Node {
                name: local.to_string(),
                qualifier: Some(prefix.to_string()),
                ..Node::default()
            },
            None => Node { name, ..Node::default() },
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Value>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.child(Value::String(text.into()))
    }

    /// Name including the namespace prefix, as written in markup.
    pub fn real_name(&self) -> String {
        match &self.qualifier {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DISPLAY
// ————————————————————————————————————————————————————————————————————————————

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(n.0, f),
            Value::String(s) => write!(f, "{s}"),
            Value::Object(_) | Value::List(_) => write!(f, "{}", self.to_json()),
            Value::Node(node) => write!(f, "{node}"),
        }
    }
}

fn escape_markup(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.real_name();
        write!(f, "<{name}")?;
        for (k, v) in &self.attributes {
            write!(f, " {k}=\"{}\"", escape_markup(v))?;
        }
        if self.children.is_empty() {
            return write!(f, "/>");
        }
        write!(f, ">")?;
        for child in &self.children {
            match child {
                Value::Node(node) => write!(f, "{node}")?,
                text => write!(f, "{}", escape_markup(&text.to_text()))?,
            }
        }
        write!(f, "</{name}>")
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
