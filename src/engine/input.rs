//! Resource property values and cross-resource references.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Property map of a declared resource, ordered for stable plan output.
pub type Properties = BTreeMap<String, Input>;

/// Build a [`Properties`] map from `(key, value)` pairs.
pub fn props<const N: usize>(pairs: [(&str, Input); N]) -> Properties {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// An attribute of another resource that only the engine can resolve,
/// e.g. the id it assigns to a VPC. Rendered as `${name.attr}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ref {
    pub resource: String,
    pub attr: String,
}

impl Ref {
    pub fn new(resource: &str, attr: &str) -> Ref {
        Ref {
            resource: resource.to_string(),
            attr: attr.to_string(),
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.attr)
    }
}

/// A property value: known now, or known once the engine has created the
/// referenced resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Value(Value),
    Ref(Ref),
    List(Vec<Input>),
}

impl Input {
    /// All references reachable from this input.
    pub fn refs(&self) -> Vec<&Ref> {
        match self {
            Input::Value(_) => vec![],
            Input::Ref(r) => vec![r],
            Input::List(items) => items.iter().flat_map(|i| i.refs()).collect(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Input::Value(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// JSON form used in the plan, references rendered as `${name.attr}`.
    pub fn to_json(&self) -> Value {
        match self {
            Input::Value(v) => v.clone(),
            Input::Ref(r) => Value::String(r.to_string()),
            Input::List(items) => Value::Array(items.iter().map(Input::to_json).collect()),
        }
    }
}

impl Serialize for Input {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl From<Ref> for Input {
    fn from(r: Ref) -> Self {
        Input::Ref(r)
    }
}

impl From<&Ref> for Input {
    fn from(r: &Ref) -> Self {
        Input::Ref(r.clone())
    }
}

impl From<Vec<Ref>> for Input {
    fn from(refs: Vec<Ref>) -> Self {
        Input::List(refs.into_iter().map(Input::Ref).collect())
    }
}

impl From<Value> for Input {
    fn from(v: Value) -> Self {
        Input::Value(v)
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Value(Value::String(s))
    }
}

impl From<&String> for Input {
    fn from(s: &String) -> Self {
        Input::Value(Value::String(s.clone()))
    }
}

impl From<bool> for Input {
    fn from(b: bool) -> Self {
        Input::Value(Value::Bool(b))
    }
}

impl From<u16> for Input {
    fn from(n: u16) -> Self {
        Input::Value(Value::from(n))
    }
}

impl From<u32> for Input {
    fn from(n: u32) -> Self {
        Input::Value(Value::from(n))
    }
}
