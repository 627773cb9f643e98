//! JSON document and JSON-lines backends

use crate::buffer::Entry;
use crate::codec;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::types::{CellValue, Record};
use serde_json::{Map, Number, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

pub(crate) fn value_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Empty => Value::Null,
        CellValue::String(s) => Value::String(s.clone()),
        CellValue::Int(i) => Value::Number((*i).into()),
        CellValue::Float(f) | CellValue::DateTime(f) => {
            Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
        }
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Error(e) => Value::String(format!("ERROR: {}", e)),
        CellValue::Formula(f) => Value::String(f.clone()),
    }
}

pub(crate) fn json_to_value(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(CellValue::Int)
            .or_else(|| n.as_f64().map(CellValue::Float))
            .unwrap_or(CellValue::Empty),
        Value::String(s) => CellValue::String(s.clone()),
        other => CellValue::String(other.to_string()),
    }
}

pub(crate) fn record_to_json(record: &Record) -> Value {
    match record {
        Record::Value(v) => value_to_json(v),
        Record::Row(values) => Value::Array(values.iter().map(value_to_json).collect()),
        Record::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// One JSON value per line, appended
pub fn flush_lines<I>(config: &RecorderConfig, path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = Entry>,
{
    let mut out = String::new();
    for entry in entries {
        for record in super::entry_records(entry) {
            out.push_str(&serde_json::to_string(&record_to_json(&record))?);
            out.push('\n');
        }
    }
    if out.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&codec::encode(config.encoding, &out))?;
    Ok(())
}

/// Records appended to the top-level array of a JSON document
pub fn flush_document<I>(config: &RecorderConfig, path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = Entry>,
{
    let new_items: Vec<Value> = entries
        .into_iter()
        .flat_map(super::entry_records)
        .map(|r| record_to_json(&r))
        .collect();
    if new_items.is_empty() {
        return Ok(());
    }

    let mut items = load_document(config, path)?;
    items.extend(new_items);
    let text = serde_json::to_string(&Value::Array(items))?;
    fs::write(path, codec::encode(config.encoding, &text))?;
    Ok(())
}

/// Items of an existing document; a missing or empty file has none
pub(crate) fn load_document(config: &RecorderConfig, path: &Path) -> Result<Vec<Value>> {
    let text = codec::read_to_string(path, config.encoding)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str(&text)? {
        Value::Array(items) => Ok(items),
        _ => Err(RecorderError::InvalidFormat(format!(
            "{} does not hold a JSON array",
            path.display()
        ))),
    }
}
