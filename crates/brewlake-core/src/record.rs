//! Schema-on-read record model.
//!
//! Records are untyped field mappings: the set of fields varies by source and
//! is validated at each stage boundary instead of being fixed up front.
//!
//! ```rust
//! use brewlake_core::record::{FieldValue, Record};
//!
//! let mut record = Record::new();
//! record.insert("state", FieldValue::Text("california".into()));
//! record.insert("employees", FieldValue::Int64(12));
//!
//! assert!(record.contains("state"));
//! assert_eq!(record.get("employees"), Some(&FieldValue::Int64(12)));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar value held by a record field.
///
/// Serialized untagged so JSON files stay plain row objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Explicit null (only present before cleaning).
    Null,
    /// Boolean value.
    Boolean(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 text.
    Text(String),
}

impl FieldValue {
    /// Converts a JSON value into a field value.
    ///
    /// Integers that fit `i64` stay integral, other numbers become floats.
    /// Arrays and objects are kept as their compact JSON text.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int64)
                .or_else(|| n.as_f64().map(Self::Float64))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// Returns true for [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value as text, or `None` for null.
    ///
    /// Used wherever a value has to become a grouping key or a path segment.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Boolean(b) => Some(b.to_string()),
            Self::Int64(n) => Some(n.to_string()),
            Self::Float64(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Some(s) => f.write_str(&s),
            None => f.write_str("null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// A single record: field name to value, ordered by field name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(name.into(), value.into());
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Returns true if the field is present (even if null).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Iterates field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_keeps_integers_integral() {
        assert_eq!(FieldValue::from_json(&json!(42)), FieldValue::Int64(42));
        assert_eq!(FieldValue::from_json(&json!(-97.5)), FieldValue::Float64(-97.5));
        assert_eq!(
            FieldValue::from_json(&json!(u64::MAX)),
            FieldValue::Float64(u64::MAX as f64)
        );
    }

    #[test]
    fn from_json_stringifies_arrays() {
        let value = FieldValue::from_json(&json!(["a", 1]));
        assert_eq!(value, FieldValue::Text(r#"["a",1]"#.into()));
    }

    #[test]
    fn records_round_trip_through_plain_json() {
        let raw = r#"[{"name":"x_brew","employees":4,"lat":35.25,"open":true,"city":null}]"#;
        let records: Vec<Record> = serde_json::from_str(raw).expect("decode");

        let record = &records[0];
        assert_eq!(record.get("name"), Some(&FieldValue::Text("x_brew".into())));
        assert_eq!(record.get("employees"), Some(&FieldValue::Int64(4)));
        assert_eq!(record.get("lat"), Some(&FieldValue::Float64(35.25)));
        assert_eq!(record.get("open"), Some(&FieldValue::Boolean(true)));
        assert_eq!(record.get("city"), Some(&FieldValue::Null));

        let encoded = serde_json::to_string(&records).expect("encode");
        let again: Vec<Record> = serde_json::from_str(&encoded).expect("decode again");
        assert_eq!(records, again);
    }

    #[test]
    fn render_skips_null() {
        assert_eq!(FieldValue::Null.render(), None);
        assert_eq!(FieldValue::Boolean(false).render().as_deref(), Some("false"));
        assert_eq!(FieldValue::from("ca").to_string(), "ca");
    }
}
