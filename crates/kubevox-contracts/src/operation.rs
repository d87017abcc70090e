//! Operation descriptor types.
//!
//! An `OperationDescriptor` is one entry in the closed catalog of cluster
//! actions the language model may propose. Descriptors are pure data: they
//! are registered once at start-up and never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The semantic type of a single operation parameter.
///
/// Raw values proposed by the model are coerced into one of these types by
/// the dispatcher before any adapter runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    /// A string restricted to one of the listed values (matched verbatim).
    Enum(Vec<String>),
}

impl ParamType {
    /// Build an enum type from any list of string-like values.
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamType::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Short human-readable name, used in type-mismatch messages.
    pub fn describe(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Integer => "integer".to_string(),
            ParamType::Boolean => "boolean".to_string(),
            ParamType::Enum(values) => format!("one of [{}]", values.join(", ")),
        }
    }

    /// Return true if `value` is an acceptable value of this type.
    pub fn accepts(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamType::String, ParamValue::String(_)) => true,
            (ParamType::Integer, ParamValue::Integer(_)) => true,
            (ParamType::Boolean, ParamValue::Boolean(_)) => true,
            (ParamType::Enum(values), ParamValue::String(s)) => values.iter().any(|v| v == s),
            _ => false,
        }
    }
}

/// A typed, validated parameter value.
///
/// Enum parameters are carried as `String` once validated against their
/// allowed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert into a JSON value (used by the catalog exporter and renderer).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::String(s) => serde_json::Value::String(s.clone()),
            ParamValue::Integer(n) => serde_json::Value::from(*n),
            ParamValue::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::String(s) => f.write_str(s),
            ParamValue::Integer(n) => write!(f, "{n}"),
            ParamValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Integer(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Boolean(b)
    }
}

/// Declaration of one parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Exact key the model must use. Matching is case-sensitive.
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    /// Bound by the dispatcher when an optional parameter is absent.
    pub default: Option<ParamValue>,
    /// Surfaced to the model in the exported catalog.
    pub description: String,
}

impl ParamSpec {
    /// A required parameter with no default.
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: true,
            default: None,
            description: description.into(),
        }
    }

    /// An optional parameter. With `default = None` an absent value stays
    /// absent in the bound argument set.
    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
        default: Option<ParamValue>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            required: false,
            default,
            description: description.into(),
        }
    }

    /// True when the dispatcher guarantees a bound value for this parameter.
    pub fn always_bound(&self) -> bool {
        self.required || self.default.is_some()
    }
}

/// One permitted cluster action in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Unique catalog key, also the function name the model calls.
    pub name: String,
    pub description: String,
    /// Declaration order defines the documented call signature. Dispatch
    /// binds by name, never by position.
    pub parameters: Vec<ParamSpec>,
    /// Text with `{placeholder}` markers; `{{` and `}}` are literal braces.
    pub response_template: String,
    /// True if running the operation changes cluster state.
    pub mutating: bool,
}

impl OperationDescriptor {
    /// Start a read-only descriptor with no parameters.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        response_template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            response_template: response_template.into(),
            mutating: false,
        }
    }

    /// Append a parameter declaration.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    /// Flag the operation as changing cluster state.
    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
