//! Secret values and their canonical JSON form
//!
//! Text secrets are stored verbatim. Anything structured is first reduced to a
//! JSON-safe tree and serialized; the reduction is deterministic so the same input
//! always yields the same plaintext.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// A secret handed to the vault
#[derive(Clone, PartialEq)]
pub enum SecretValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    List(Vec<SecretValue>),
    Map(BTreeMap<String, SecretValue>),
}

impl SecretValue {
    /// Whether the value carries something worth storing
    ///
    /// Blank text, null and empty collections are not usable.
    pub fn is_usable(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Text(s) => !s.trim().is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
            Self::Bool(_) | Self::Integer(_) | Self::Float(_) | Self::Timestamp(_) => true,
        }
    }

    /// Reduce to a JSON-safe tree
    ///
    /// Timestamps become RFC 3339 strings with millisecond precision, non-finite
    /// floats become null, collections are converted recursively.
    pub fn canonicalize(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::List(items) => Value::Array(items.iter().map(Self::canonicalize).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.canonicalize()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// The string that gets encrypted
    pub fn to_plaintext(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Text(s) => Ok(s.clone()),
            other => serde_json::to_string(&other.canonicalize()),
        }
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<DateTime<Utc>> for SecretValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<Value> for SecretValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// Interpret decrypted plaintext: structured JSON if it parses, raw text otherwise
pub fn parse_plaintext(plaintext: String) -> Value {
    serde_json::from_str(&plaintext).unwrap_or(Value::String(plaintext))
}
