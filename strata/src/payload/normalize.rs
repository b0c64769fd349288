//! Normalizers that build row payloads from JSON and serializable records

use super::{Payload, Row, Table};
use crate::error::{NormalizeError, NormalizeResult};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

impl Payload {
    /// Parses `bytes` as JSON and normalizes the document into rows.
    ///
    /// An array whose first element is an object takes its columns from the
    /// sorted keys of that element; every element becomes one row aligned to
    /// those columns. Keys missing from the first element are dropped,
    /// columns missing from an element are null, and an element that is not
    /// an object becomes an all-null row. A single object yields one row. Any
    /// other document yields a table with no rows.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Parse`] when `bytes` is not valid JSON.
    pub fn from_json(bytes: &[u8]) -> NormalizeResult<Self> {
        let document: Value = serde_json::from_slice(bytes)?;
        Ok(match &document {
            Value::Array(items) => match items.first() {
                Some(Value::Object(first)) => table_from_items(first, items),
                _ => Table::default(),
            },
            Value::Object(map) => single_row(map),
            _ => Table::default(),
        }
        .into())
    }

    /// Normalizes one serializable record into a single-row table.
    ///
    /// Columns are the record's serialized field names, so
    /// `#[serde(rename = "...")]` acts as the column alias. Columns are sorted
    /// lexicographically regardless of declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Type`] when the record fails to serialize or
    /// does not serialize to an object.
    pub fn from_struct<T>(record: &T) -> NormalizeResult<Self>
    where
        T: Serialize + ?Sized,
    {
        match to_value(record)? {
            Value::Object(map) => Ok(single_row(&map).into()),
            other => Err(NormalizeError::Type(format!(
                "expected a structured record, got {}",
                describe(&other)
            ))),
        }
    }

    /// Normalizes a sequence of serializable records.
    ///
    /// Columns come from the first record only; later records are mapped onto
    /// that fixed set, and a later element that is not an object becomes an
    /// all-null row. An empty sequence yields a table with no rows.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Type`] when `records` fails to serialize, is
    /// not a sequence, or its first element is not a structured record.
    pub fn from_struct_slice<T>(records: &T) -> NormalizeResult<Self>
    where
        T: Serialize + ?Sized,
    {
        let items = match to_value(records)? {
            Value::Array(items) => items,
            other => {
                return Err(NormalizeError::Type(format!(
                    "expected a sequence of records, got {}",
                    describe(&other)
                )))
            }
        };

        let Some(first) = items.first() else {
            return Ok(Self::empty());
        };
        let Value::Object(first) = first else {
            return Err(NormalizeError::Type(format!(
                "expected a structured record, got {}",
                describe(first)
            )));
        };

        Ok(table_from_items(first, &items).into())
    }
}

// Serialization failures are a shape problem of the record, not malformed JSON.
fn to_value<T>(value: &T) -> NormalizeResult<Value>
where
    T: Serialize + ?Sized,
{
    serde_json::to_value(value).map_err(|e| NormalizeError::Type(e.to_string()))
}

fn single_row(map: &Map<String, Value>) -> Table {
    let columns = sorted_keys(map);
    let row = row_from_object(&columns, map);
    Table::new(columns, vec![row])
}

// Columns come from `first`; every item becomes one row.
fn table_from_items(first: &Map<String, Value>, items: &[Value]) -> Table {
    let columns = sorted_keys(first);
    let rows = items
        .iter()
        .map(|item| match item {
            Value::Object(map) => row_from_object(&columns, map),
            _ => vec![Value::Null; columns.len()],
        })
        .collect();
    Table::new(columns, rows)
}

fn sorted_keys(map: &Map<String, Value>) -> Vec<String> {
    let mut keys: Vec<String> = map.keys().cloned().collect();
    keys.sort();
    keys
}

fn row_from_object(columns: &[String], map: &Map<String, Value>) -> Row {
    if map.len() > columns.len() || map.keys().any(|k| !columns.contains(k)) {
        trace!(columns = ?columns, "dropping keys outside the column set");
    }
    columns
        .iter()
        .map(|c| map.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

const fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    }
}
