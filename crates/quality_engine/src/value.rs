//! Value representation for streamed records.

use std::collections::BTreeMap;
use std::fmt;

/// A single field of a streamed record.
///
/// Delimited text only ever produces `String` and `Null`; the typed
/// accessors coerce strings so rules behave the same across formats.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Null/missing value
    Null,
    /// String value
    String(String),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Timestamp value (ISO 8601 string)
    Timestamp(String),
    /// Map/struct value
    Map(BTreeMap<String, DataValue>),
    /// List/array value
    List(Vec<DataValue>),
}

impl DataValue {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Returns true for null and for strings that are empty or whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            DataValue::Null => true,
            DataValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Label used when reporting what kind of value a field held.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "NULL",
            DataValue::String(_) => "STRING",
            DataValue::Int(_) => "INTEGER",
            DataValue::Float(_) => "DECIMAL",
            DataValue::Bool(_) => "BOOLEAN",
            DataValue::Timestamp(_) => "DATETIME",
            DataValue::Map(_) => "OBJECT",
            DataValue::List(_) => "ARRAY",
        }
    }

    /// Attempts to get this value as a string slice.
    ///
    /// Timestamps are exposed as their ISO 8601 text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) | DataValue::Timestamp(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get this value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            DataValue::Int(i) => Some(*i),
            DataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Attempts to get this value as a float, parsing numeric strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) => Some(*f),
            DataValue::Int(i) => Some(*i as f64),
            DataValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Attempts to get this value as a boolean, parsing common spellings.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            DataValue::Int(0) => Some(false),
            DataValue::Int(1) => Some(true),
            DataValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Some(true),
                "false" | "f" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Renders the value as text; `None` for null.
    pub fn render(&self) -> Option<String> {
        match self {
            DataValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => f.write_str("NULL"),
            DataValue::String(s) | DataValue::Timestamp(s) => f.write_str(s),
            DataValue::Int(i) => write!(f, "{}", i),
            DataValue::Float(x) => write!(f, "{}", x),
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            DataValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for DataValue {
            fn from(v: $ty) -> Self {
                DataValue::$variant(v)
            }
        })*
    };
}

scalar_from!(String => String, i64 => Int, f64 => Float, bool => Bool);

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_owned())
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DataValue::Null, Into::into)
    }
}

impl From<&serde_json::Value> for DataValue {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Int(i),
                None => n.as_f64().map_or(DataValue::Null, DataValue::Float),
            },
            Value::String(s) => DataValue::String(s.clone()),
            Value::Array(items) => DataValue::List(items.iter().map(DataValue::from).collect()),
            Value::Object(map) => DataValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), DataValue::from(v)))
                    .collect(),
            ),
        }
    }
}
