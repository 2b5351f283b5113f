//! Row-oriented JSON codec for the raw and cleaned layers.
//!
//! Files are a JSON array of flat objects, one object per record. The schema
//! travels with the data: every object names its own fields.

use bytes::Bytes;
use serde_json::{Map, Value};

use brewlake_core::record::{FieldValue, Record};

use crate::error::{PipelineError, Result};

/// A record as fetched from the source API.
pub type RawRecord = Map<String, Value>;

/// Decodes a raw-layer file.
///
/// Malformed JSON is a codec error; well-formed JSON that is not an array of
/// objects is a schema error.
///
/// # Errors
///
/// Returns `PipelineError::Codec` or `PipelineError::Schema`.
pub fn decode_raw(path: &str, bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| PipelineError::codec(path, format!("invalid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(PipelineError::schema(
            path,
            "expected a JSON array of records",
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(PipelineError::schema(
                path,
                format!("record {i} is not an object (found {})", json_kind(&other)),
            )),
        })
        .collect()
}

/// Decodes a cleaned-layer file into records.
///
/// # Errors
///
/// Same as [`decode_raw`].
pub fn decode_records(path: &str, bytes: &[u8]) -> Result<Vec<Record>> {
    Ok(decode_raw(path, bytes)?
        .into_iter()
        .map(|map| {
            map.into_iter()
                .map(|(name, value)| (name, FieldValue::from_json(&value)))
                .collect::<Record>()
        })
        .collect())
}

/// Encodes records as a JSON array.
///
/// # Errors
///
/// Returns `PipelineError::Codec` if serialization fails.
pub fn encode_records(path: &str, records: &[Record]) -> Result<Bytes> {
    serde_json::to_vec(records)
        .map(Bytes::from)
        .map_err(|e| PipelineError::codec(path, format!("JSON encode failed: {e}")))
}

/// Encodes raw records as a JSON array.
///
/// # Errors
///
/// Returns `PipelineError::Codec` if serialization fails.
pub fn encode_raw(path: &str, records: &[RawRecord]) -> Result<Bytes> {
    serde_json::to_vec(records)
        .map(Bytes::from)
        .map_err(|e| PipelineError::codec(path, format!("JSON encode failed: {e}")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_raw_accepts_array_of_objects() {
        let rows = decode_raw("raw/a.json", br#"[{"id":"1"},{"id":"2","n":3}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["n"], Value::from(3));
    }

    #[test]
    fn decode_raw_distinguishes_codec_and_schema_errors() {
        let err = decode_raw("raw/a.json", b"{not json").unwrap_err();
        assert!(matches!(err, PipelineError::Codec { .. }));

        let err = decode_raw("raw/a.json", br#"{"id":"1"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));

        let err = decode_raw("raw/a.json", br#"[{"id":"1"}, 7]"#).unwrap_err();
        match err {
            PipelineError::Schema { path, message } => {
                assert_eq!(path, "raw/a.json");
                assert!(message.contains("record 1"));
                assert!(message.contains("number"));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn records_encode_and_decode() {
        let mut record = Record::new();
        record.insert("name", "x_brew");
        record.insert("state", "ohio");
        record.insert("employees", 3_i64);

        let bytes = encode_records("cleaned/a.json", &[record.clone()]).unwrap();
        let decoded = decode_records("cleaned/a.json", &bytes).unwrap();
        assert_eq!(decoded, vec![record]);
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(decode_records("cleaned/empty.json", b"[]").unwrap().is_empty());
    }
}
