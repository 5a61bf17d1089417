//! Comma-separated encoding shared by every export kind.

use std::borrow::Cow;
use std::collections::HashSet;

use ::csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, TrackerError};

pub type Record = Map<String, Value>;

/// Encode serializable rows. `None` when there are no rows, in which case
/// nothing should be written.
pub fn encode<T: Serialize>(rows: &[T]) -> Result<Option<String>> {
    let records = rows
        .iter()
        .map(to_record)
        .collect::<Result<Vec<Record>>>()?;
    encode_records(&records)
}

/// Header is the union of keys in first-seen order; missing keys render
/// as empty fields. Rows are `\n`-joined with no trailing terminator.
pub fn encode_records(records: &[Record]) -> Result<Option<String>> {
    if records.is_empty() {
        return Ok(None);
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut header: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                header.push(key.as_str());
            }
        }
    }

    let mut writer = writer();
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(
            header
                .iter()
                .map(|key| record.get(*key).map(render).unwrap_or(Cow::Borrowed("")))
                .map(|field| field.into_owned()),
        )?;
    }
    finish(writer).map(Some)
}

/// Quote a field containing a comma, quote, CR or LF, doubling inner quotes.
pub fn escape_field(value: &str) -> Result<String> {
    if value.is_empty() {
        return Ok(String::new());
    }
    let mut writer = writer();
    writer.write_field(value)?;
    writer.write_record(None::<&[u8]>)?;
    finish(writer)
}

fn writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    let mut bytes = writer
        .into_inner()
        .map_err(|err| TrackerError::Encode(err.to_string()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|err| TrackerError::Encode(err.to_string()))
}

fn render(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Number(n) => Cow::Owned(n.to_string()),
        nested => Cow::Owned(nested.to_string()),
    }
}

fn to_record<T: Serialize>(row: &T) -> Result<Record> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        other => Err(TrackerError::Encode(format!(
            "export row must be a record, got {other}"
        ))),
    }
}
