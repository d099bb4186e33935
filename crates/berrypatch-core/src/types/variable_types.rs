//! Variable declarations and typed values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed set of variable kinds an app may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Boolean,
    Number,
}

impl VariableType {
    /// Parse the `type` field of a variable spec
    ///
    /// Returns `None` for anything outside the three recognized kinds.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed variable value
///
/// Serialized untagged so `berry-meta.json` stores plain JSON scalars.
/// Variant order matters for deserialization: `true` is a boolean, `8080` a
/// number and `"8080"` a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
}

impl VariableValue {
    /// Empty/zero value of the given type
    pub fn zero(var_type: VariableType) -> Self {
        match var_type {
            VariableType::String => Self::String(String::new()),
            VariableType::Boolean => Self::Boolean(false),
            VariableType::Number => Self::Number(serde_json::Number::from(0)),
        }
    }

    pub fn variable_type(&self) -> VariableType {
        match self {
            Self::Boolean(_) => VariableType::Boolean,
            Self::Number(_) => VariableType::Number,
            Self::String(_) => VariableType::String,
        }
    }

    /// Textual form, as a user would type it on the command line
    ///
    /// Numbers are always plain decimals (`100000000000000000000`, never
    /// `1e+20`), so the text coerces back to the same value.
    pub fn to_raw(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() => f.to_string(),
                _ => n.to_string(),
            },
            Self::String(s) => s.clone(),
        }
    }

    /// True for the empty string; booleans and numbers are never empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::String(s) if s.is_empty())
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

/// Variable entry as written by app authors in `berry.json`
///
/// Loosely typed; validated into a [`VariableDeclaration`]
/// once, when the app is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub var_type: Option<String>,
}

/// Validated variable declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub default: Option<VariableValue>,
    #[serde(rename = "type")]
    pub var_type: VariableType,
}

/// Final, fully typed variable set for one instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedConfiguration {
    values: BTreeMap<String, VariableValue>,
}

impl ResolvedConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: VariableValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VariableValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, VariableValue)> for ResolvedConfiguration {
    fn from_iter<I: IntoIterator<Item = (String, VariableValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
