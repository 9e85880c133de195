//! Record keys - hashable primary key and correlation values
//!
//! Rows carry their values as JSON. Keys used by the identity map and by
//! relationship correlation have to be hashable, so they are normalised into
//! [`RecordKey`] first.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Primary key or foreign key value of a row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKey {
    /// Integer key
    Integer(i64),
    /// UUID key
    Uuid(Uuid),
    /// Any other textual key
    Text(String),
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Integer(id) => write!(f, "{}", id),
            RecordKey::Uuid(id) => write!(f, "{}", id),
            RecordKey::Text(id) => write!(f, "{}", id),
        }
    }
}

impl RecordKey {
    /// Normalise a JSON column value into a key.
    ///
    /// Returns `None` for nulls and for values that cannot identify a row
    /// (booleans, arrays, objects, fractional numbers). Integral floats are
    /// treated as integers so `1` and `1.0` correlate.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(RecordKey::Integer(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| RecordKey::Integer(f as i64))
                }
            }
            JsonValue::String(s) => match Uuid::parse_str(s) {
                Ok(uuid) => Some(RecordKey::Uuid(uuid)),
                Err(_) => Some(RecordKey::Text(s.clone())),
            },
            _ => None,
        }
    }

    /// Convert back to a JSON value for use in query filters
    pub fn to_json(&self) -> JsonValue {
        match self {
            RecordKey::Integer(id) => JsonValue::from(*id),
            RecordKey::Uuid(id) => JsonValue::String(id.to_string()),
            RecordKey::Text(id) => JsonValue::String(id.clone()),
        }
    }

    /// Extract as i64 if this is an Integer key
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordKey::Integer(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        RecordKey::Integer(value)
    }
}

impl From<i32> for RecordKey {
    fn from(value: i32) -> Self {
        RecordKey::Integer(value as i64)
    }
}

impl From<Uuid> for RecordKey {
    fn from(value: Uuid) -> Self {
        RecordKey::Uuid(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey::from_json(&JsonValue::String(value.to_string()))
            .unwrap_or_else(|| RecordKey::Text(value.to_string()))
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        RecordKey::from(value.as_str())
    }
}
