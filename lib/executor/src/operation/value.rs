use std::fmt;

use indexmap::IndexMap;
use serde::{ser::SerializeMap, ser::SerializeSeq, Serialize, Serializer};
use sonic_rs::{JsonNumberTrait, Value, ValueRef};

/// A GraphQL input value, as bound to a variable of a subgraph request.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueLiteral {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum(String),
    List(Vec<ValueLiteral>),
    Object(IndexMap<String, ValueLiteral>),
}

impl ValueLiteral {
    /// Converts a raw subgraph value. Integral numbers stay integers, so `42`
    /// is bound as `Int(42)` and never as `"42"` or `42.0`.
    pub fn from_json(value: &Value) -> ValueLiteral {
        match value.as_ref() {
            ValueRef::Null => ValueLiteral::Null,
            ValueRef::Bool(b) => ValueLiteral::Boolean(b),
            ValueRef::String(s) => ValueLiteral::String(s.to_string()),
            ValueRef::Number(number) => {
                if let Some(int) = number.as_i64() {
                    ValueLiteral::Int(int)
                } else if let Some(float) = number.as_f64() {
                    ValueLiteral::Float(float)
                } else {
                    ValueLiteral::Null
                }
            }
            ValueRef::Array(items) => {
                ValueLiteral::List(items.iter().map(ValueLiteral::from_json).collect())
            }
            ValueRef::Object(fields) => ValueLiteral::Object(
                fields
                    .iter()
                    .map(|(key, field)| (key.to_string(), ValueLiteral::from_json(field)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ValueLiteral::Null)
    }
}

impl From<&Value> for ValueLiteral {
    fn from(value: &Value) -> Self {
        ValueLiteral::from_json(value)
    }
}

impl Serialize for ValueLiteral {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ValueLiteral::Null => serializer.serialize_unit(),
            ValueLiteral::Boolean(b) => serializer.serialize_bool(*b),
            ValueLiteral::Int(i) => serializer.serialize_i64(*i),
            ValueLiteral::Float(f) => serializer.serialize_f64(*f),
            ValueLiteral::String(s) | ValueLiteral::Enum(s) => serializer.serialize_str(s),
            ValueLiteral::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ValueLiteral::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl fmt::Display for ValueLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueLiteral::Null => write!(f, "null"),
            ValueLiteral::Boolean(b) => write!(f, "{}", b),
            ValueLiteral::Int(i) => write!(f, "{}", i),
            ValueLiteral::Float(float) => write!(f, "{:?}", float),
            ValueLiteral::String(s) => write!(f, "{:?}", s),
            ValueLiteral::Enum(e) => write!(f, "{}", e),
            ValueLiteral::List(items) => {
                write!(f, "[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ValueLiteral::Object(fields) => {
                write!(f, "{{")?;
                for (index, (key, value)) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
