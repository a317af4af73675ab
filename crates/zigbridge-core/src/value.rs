//! Dynamically typed values flowing between the radio and the host.
//!
//! Raw attribute reads, decoded DataPoints and normalized capability values
//! all travel as [`Value`]. The declared shape of a capability is described
//! by [`ValueType`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// Binary payloads are serialized as base64 strings
mod binary_serde {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// A wire or capability value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    /// Opaque bytes, serialized as base64
    #[serde(with = "binary_serde")]
    Binary(Vec<u8>),
    Null,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Booleans, plus the integer encodings `0`/`1` radios commonly use.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            Self::Integer(0) => Some(false),
            Self::Integer(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Null => "null",
        }
    }

    pub fn integer(v: i64) -> Self {
        Self::Integer(v)
    }

    pub fn float(v: f64) -> Self {
        Self::Float(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::String(v) => write!(f, "{:?}", v),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

/// Declared type of a normalized capability value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    /// Symbolic or numeric enumeration member
    Enum,
    /// Free-form text such as identification strings
    Text,
}

impl ValueType {
    /// Whether `value` is acceptable for this declared type.
    ///
    /// `Float` accepts integers; `Int` accepts floats without a fractional part.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Bool => matches!(value, Value::Boolean(_)),
            Self::Int => value.as_i64().is_some(),
            Self::Float => value.as_f64().is_some(),
            Self::Enum => matches!(value, Value::Integer(_) | Value::String(_)),
            Self::Text => matches!(value, Value::String(_)),
        }
    }

    /// Convert an accepted value to this type's canonical representation,
    /// so `Integer(100)` and `Float(100.0)` compare equal once stored.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (Self::Float, Value::Integer(v)) => Value::Float(v as f64),
            (Self::Int, Value::Float(v)) if v.fract() == 0.0 => Value::Integer(v as i64),
            (_, other) => other,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Enum => "enum",
            Self::Text => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Value::Integer(42).as_f64(), Some(42.0));
        assert_eq!(Value::Float(3.0).as_i64(), Some(3));
        assert_eq!(Value::Float(3.5).as_i64(), None);
        assert_eq!(Value::String("x".into()).as_f64(), None);
    }

    #[test]
    fn test_bool_from_integer_encoding() {
        assert_eq!(Value::Integer(1).as_bool(), Some(true));
        assert_eq!(Value::Integer(0).as_bool(), Some(false));
        assert_eq!(Value::Integer(2).as_bool(), None);
    }

    #[test]
    fn test_value_type_acceptance() {
        assert!(ValueType::Float.accepts(&Value::Integer(5)));
        assert!(ValueType::Int.accepts(&Value::Float(5.0)));
        assert!(!ValueType::Int.accepts(&Value::Float(5.5)));
        assert!(!ValueType::Bool.accepts(&Value::Integer(1)));
        assert!(ValueType::Enum.accepts(&Value::String("up".into())));
    }

    #[test]
    fn test_value_type_coercion() {
        assert_eq!(ValueType::Float.coerce(Value::Integer(100)), Value::Float(100.0));
        assert_eq!(ValueType::Int.coerce(Value::Float(7.0)), Value::Integer(7));
        assert_eq!(ValueType::Int.coerce(Value::Float(7.5)), Value::Float(7.5));
        assert_eq!(ValueType::Enum.coerce(Value::Integer(2)), Value::Integer(2));
    }

    #[test]
    fn test_binary_serializes_as_base64() {
        let json = serde_json::to_string(&Value::Binary(vec![1, 2, 3])).unwrap();
        assert_eq!(json, r#"{"Binary":"AQID"}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Binary(vec![1, 2, 3]));
    }
}
