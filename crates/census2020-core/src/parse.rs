//! Fragment parser: raw delimited bytes plus a [`FragmentSchema`] in, typed
//! Arrow [`RecordBatch`] out.
//!
//! The extract files are not CSV in any general sense. There is no header,
//! no quoting and no escaping; a record is one line and a field is whatever
//! sits between two delimiter bytes. Parsing therefore works directly on
//! bytes:
//!
//! - records are split on `\n` (a preceding `\r` is stripped), and a single
//!   trailing terminator does not produce an extra record, so input that is
//!   empty or a lone terminator holds zero records;
//! - fields are split on the schema's delimiter and must match the schema's
//!   field count exactly;
//! - each field is decoded with the schema's single-byte encoding and then
//!   coerced: `Text` passes through verbatim, `Int64` parses as a signed
//!   integer with the empty string mapping to null.
//!
//! Parsing is a pure function of its inputs.

use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Int64Builder, StringBuilder},
    error::ArrowError,
    record_batch::RecordBatch,
};
use snafu::prelude::*;
use tracing::debug;

use crate::schema::{FieldType, FragmentKind, FragmentSchema, TextEncoding, schema_for};

/// Errors raised while parsing a fragment.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
    /// A record did not have exactly one value per schema field.
    #[snafu(display(
        "Malformed {fragment} record at line {line}: expected {expected} fields, found {actual}"
    ))]
    MalformedRecord {
        /// Fragment being parsed.
        fragment: FragmentKind,
        /// 1-based line number of the offending record.
        line: usize,
        /// Number of fields declared by the schema.
        expected: usize,
        /// Number of fields found on the line.
        actual: usize,
    },

    /// A non-empty value in an integer field was not a valid `i64`.
    #[snafu(display(
        "Type mismatch in {fragment} field {field} at line {line}: {value:?} is not an integer"
    ))]
    TypeMismatch {
        /// Fragment being parsed.
        fragment: FragmentKind,
        /// Name of the integer field.
        field: String,
        /// 1-based line number of the offending record.
        line: usize,
        /// The decoded field text.
        value: String,
    },

    /// Assembling the Arrow batch failed.
    #[snafu(display("Arrow error while building {fragment} table: {source}"))]
    BuildBatch {
        /// Fragment being parsed.
        fragment: FragmentKind,
        /// Underlying Arrow error.
        source: ArrowError,
    },
}

/// Result alias for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

enum ColumnBuilder {
    Text(StringBuilder),
    Int64(Int64Builder),
}

impl ColumnBuilder {
    fn new(field_type: FieldType, capacity: usize) -> Self {
        match field_type {
            FieldType::Text => ColumnBuilder::Text(StringBuilder::with_capacity(capacity, capacity * 8)),
            FieldType::Int64 => ColumnBuilder::Int64(Int64Builder::with_capacity(capacity)),
        }
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Text(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(mut b) => Arc::new(b.finish()),
        }
    }
}

/// Iterate `(line_number, record_bytes)` pairs.
///
/// Only the final empty segment after a trailing terminator is dropped; an
/// empty line elsewhere is still a record (and will fail the field count).
fn records(raw: &[u8]) -> impl Iterator<Item = (usize, &[u8])> {
    let body = raw.strip_suffix(b"\n").unwrap_or(raw);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    let empty = body.is_empty();

    body.split(|&b| b == b'\n')
        .filter(move |_| !empty)
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.strip_suffix(b"\r").unwrap_or(line)))
}

fn parse_int(
    fragment: FragmentKind,
    field: &str,
    line: usize,
    text: &str,
) -> ParseResult<Option<i64>> {
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i64>().map(Some).map_err(|_| ParseError::TypeMismatch {
        fragment,
        field: field.to_string(),
        line,
        value: text.to_string(),
    })
}

fn decode_field(encoding: TextEncoding, raw: &[u8]) -> String {
    encoding.decode(raw)
}

/// Parse raw fragment bytes against `schema`.
///
/// The returned batch has exactly the schema's columns in schema order and
/// one row per record.
pub fn parse(raw: &[u8], schema: &FragmentSchema) -> ParseResult<RecordBatch> {
    let fragment = schema.kind();
    let delimiter = schema.delimiter();
    let encoding = schema.encoding();
    let expected = schema.len();

    let estimated_rows = raw.iter().filter(|&&b| b == b'\n').count() + 1;
    let mut builders: Vec<ColumnBuilder> = schema
        .fields()
        .iter()
        .map(|f| ColumnBuilder::new(f.field_type, estimated_rows))
        .collect();

    let mut row_count = 0usize;
    for (line, record) in records(raw) {
        let actual = record.iter().filter(|&&b| b == delimiter).count() + 1;
        ensure!(
            actual == expected,
            MalformedRecordSnafu {
                fragment,
                line,
                expected,
                actual,
            }
        );

        let values = record.split(|&b| b == delimiter);
        for ((builder, field), value) in builders.iter_mut().zip(schema.fields()).zip(values) {
            let text = decode_field(encoding, value);
            match builder {
                ColumnBuilder::Text(b) => b.append_value(text),
                ColumnBuilder::Int64(b) => {
                    b.append_option(parse_int(fragment, field.name(), line, &text)?)
                }
            }
        }
        row_count += 1;
    }

    let columns: Vec<ArrayRef> = builders.into_iter().map(ColumnBuilder::finish).collect();
    let batch = RecordBatch::try_new(schema.arrow_schema(), columns)
        .context(BuildBatchSnafu { fragment })?;

    debug!(%fragment, rows = row_count, "parsed fragment");
    Ok(batch)
}

/// Parse raw bytes as the given fragment kind using the registry schema.
pub fn parse_fragment(kind: FragmentKind, raw: &[u8]) -> ParseResult<RecordBatch> {
    parse(raw, schema_for(kind))
}
