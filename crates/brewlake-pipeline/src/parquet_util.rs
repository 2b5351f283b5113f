//! Parquet encoding/decoding for the silver and gold layers.
//!
//! Cleaned records carry no fixed schema, so the Arrow schema of a silver
//! file is inferred from the records themselves:
//!
//! | values seen in a column        | Arrow type |
//! |--------------------------------|------------|
//! | only integers                  | `Int64`    |
//! | integers and floats            | `Float64`  |
//! | only booleans                  | `Boolean`  |
//! | only text, or any other mix    | `Utf8`     |
//!
//! Every column is nullable. A record that lacks a column stores null, and
//! decoding omits null cells, so the original record comes back unchanged.

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeStringArray, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use brewlake_core::record::{FieldValue, Record};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int64,
    Float64,
    Boolean,
    Utf8,
}

impl ColumnKind {
    const fn of(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Null => None,
            FieldValue::Int64(_) => Some(Self::Int64),
            FieldValue::Float64(_) => Some(Self::Float64),
            FieldValue::Boolean(_) => Some(Self::Boolean),
            FieldValue::Text(_) => Some(Self::Utf8),
        }
    }

    const fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int64, Self::Int64) => Self::Int64,
            (Self::Int64 | Self::Float64, Self::Int64 | Self::Float64) => Self::Float64,
            (Self::Boolean, Self::Boolean) => Self::Boolean,
            _ => Self::Utf8,
        }
    }

    const fn data_type(self) -> DataType {
        match self {
            Self::Int64 => DataType::Int64,
            Self::Float64 => DataType::Float64,
            Self::Boolean => DataType::Boolean,
            Self::Utf8 => DataType::Utf8,
        }
    }
}

/// Infers a nullable Arrow schema covering every field of `records`.
///
/// Columns are ordered by name. A column that only ever holds null is typed
/// `Utf8`.
#[must_use]
pub fn infer_schema<'a>(records: impl IntoIterator<Item = &'a Record>) -> SchemaRef {
    let mut kinds: BTreeMap<&str, Option<ColumnKind>> = BTreeMap::new();
    for record in records {
        for (name, value) in record.iter() {
            let seen = kinds.entry(name.as_str()).or_insert(None);
            if let Some(kind) = ColumnKind::of(value) {
                *seen = Some(seen.map_or(kind, |prev| prev.merge(kind)));
            }
        }
    }

    Arc::new(Schema::new(
        kinds
            .into_iter()
            .map(|(name, kind)| {
                Field::new(name, kind.unwrap_or(ColumnKind::Utf8).data_type(), true)
            })
            .collect::<Vec<_>>(),
    ))
}

/// Builds a record batch with `schema` from `records`.
///
/// # Errors
///
/// Returns `PipelineError::Codec` if the schema holds a type this module
/// does not write, or if Arrow rejects the batch.
pub fn records_to_batch(path: &str, schema: &SchemaRef, records: &[Record]) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| build_column(path, field, records))
        .collect::<Result<Vec<ArrayRef>>>()?;

    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| PipelineError::codec(path, format!("record batch build failed: {e}")))
}

#[allow(clippy::cast_precision_loss)]
fn build_column(path: &str, field: &Field, records: &[Record]) -> Result<ArrayRef> {
    let name = field.name().as_str();
    let cells = records.iter().map(|r| r.get(name));

    let array: ArrayRef = match field.data_type() {
        DataType::Int64 => Arc::new(Int64Array::from(
            cells
                .map(|v| match v {
                    Some(FieldValue::Int64(n)) => Some(*n),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            cells
                .map(|v| match v {
                    Some(FieldValue::Int64(n)) => Some(*n as f64),
                    Some(FieldValue::Float64(f)) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            cells
                .map(|v| match v {
                    Some(FieldValue::Boolean(b)) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Utf8 => Arc::new(StringArray::from(
            cells
                .map(|v| v.and_then(FieldValue::render))
                .collect::<Vec<_>>(),
        )),
        other => {
            return Err(PipelineError::codec(
                path,
                format!("column '{name}' has unsupported type {other}"),
            ));
        }
    };
    Ok(array)
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("brewlake".to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Writes one batch as a complete Parquet file to `writer`.
///
/// # Errors
///
/// Returns `PipelineError::Codec` if any Parquet step fails.
pub fn write_batch<W: Write + Send>(path: &str, writer: W, batch: &RecordBatch) -> Result<()> {
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), Some(writer_properties()))
        .map_err(|e| PipelineError::codec(path, format!("parquet writer init failed: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| PipelineError::codec(path, format!("parquet write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| PipelineError::codec(path, format!("parquet close failed: {e}")))?;
    Ok(())
}

/// Encodes one batch as an in-memory Parquet file.
///
/// # Errors
///
/// Returns `PipelineError::Codec` if any Parquet step fails.
pub fn encode_batch(path: &str, batch: &RecordBatch) -> Result<Bytes> {
    let mut cursor = Cursor::new(Vec::<u8>::new());
    write_batch(path, &mut cursor, batch)?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Reads the schema and every record batch of a Parquet file.
///
/// # Errors
///
/// Returns `PipelineError::Codec` if the payload is not valid Parquet.
pub fn read_batches(path: &str, bytes: Bytes) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .map_err(|e| PipelineError::codec(path, format!("parquet reader init failed: {e}")))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| PipelineError::codec(path, format!("parquet reader build failed: {e}")))?;

    let batches = reader
        .map(|batch| {
            batch.map_err(|e| PipelineError::codec(path, format!("parquet read batch failed: {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((schema, batches))
}

/// Converts a record batch back into records, omitting null cells.
///
/// # Errors
///
/// Returns `PipelineError::Codec` for column types outside the set this
/// crate writes (plus `Int32`, `Float32` and `LargeUtf8`).
pub fn batch_to_records(path: &str, batch: &RecordBatch) -> Result<Vec<Record>> {
    let mut records = vec![Record::new(); batch.num_rows()];
    let schema = batch.schema();

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        for (row, record) in records.iter_mut().enumerate() {
            if column.is_null(row) {
                continue;
            }
            let value = cell_value(path, name, column, row)?;
            record.insert(name.clone(), value);
        }
    }
    Ok(records)
}

fn cell_value(path: &str, name: &str, column: &ArrayRef, row: usize) -> Result<FieldValue> {
    let any = column.as_any();
    let value = match column.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|a| FieldValue::Text(a.value(row).to_string())),
        DataType::LargeUtf8 => any
            .downcast_ref::<LargeStringArray>()
            .map(|a| FieldValue::Text(a.value(row).to_string())),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| FieldValue::Int64(a.value(row))),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| FieldValue::Int64(i64::from(a.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| FieldValue::Float64(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| FieldValue::Float64(f64::from(a.value(row)))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| FieldValue::Boolean(a.value(row))),
        other => {
            return Err(PipelineError::codec(
                path,
                format!("column '{name}' has unsupported type {other}"),
            ));
        }
    };
    value.ok_or_else(|| {
        PipelineError::codec(path, format!("column '{name}' does not match its declared type"))
    })
}

/// Decodes a whole Parquet file into records.
///
/// # Errors
///
/// See [`read_batches`] and [`batch_to_records`].
pub fn decode_records(path: &str, bytes: Bytes) -> Result<Vec<Record>> {
    let mut out = Vec::new();
    let (_, batches) = read_batches(path, bytes)?;
    for batch in &batches {
        out.extend(batch_to_records(path, batch)?);
    }
    Ok(out)
}
