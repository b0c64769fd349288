//! Payloads flowing between stages.
//!
//! A [`Payload`] is either an opaque byte blob or a normalized [`Table`]. Tables
//! always carry one cell per column in every row, with missing values stored as
//! [`Value::Null`], and their column order is deterministic: normalizers sort
//! column names lexicographically.

mod normalize;
mod schema;

pub use self::schema::{Schema, SchemaBuilder};

use crate::error::{NormalizeError, NormalizeResult};
use serde_json::{Map, Value};
use std::collections::HashSet;

static NULL: Value = Value::Null;

/// A single row of cells, aligned with [`Table::columns`].
pub type Row = Vec<Value>;

/// Discriminates the two payload shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Raw,
    Rows,
}

/// Column names plus the rows aligned to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub(crate) fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Position of `name` in the column list.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterates the cells of one column, top to bottom.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row.get(idx).unwrap_or(&NULL)))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Row>) {
        (self.columns, self.rows)
    }
}

/// An immutable unit of data flowing through a pipeline.
///
/// Stages never mutate a payload in place; they build and emit a new one.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Vec<u8>),
    Rows(Table),
}

impl Payload {
    /// Wraps bytes without inspecting them.
    #[must_use]
    pub fn from_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Raw(bytes.into())
    }

    /// A table with no columns and no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self::Rows(Table::default())
    }

    /// Builds a table from a header and rows as given.
    ///
    /// No shape checks are made; see [`Payload::try_from_header_rows`] for the
    /// validating variant.
    #[must_use]
    pub fn from_header_rows(header: Vec<String>, rows: Vec<Row>) -> Self {
        Self::Rows(Table::new(header, rows))
    }

    /// Like [`Payload::from_header_rows`], but rejects duplicate column names
    /// and rows whose width differs from the header.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Shape`] describing the first inconsistency.
    pub fn try_from_header_rows(header: Vec<String>, rows: Vec<Row>) -> NormalizeResult<Self> {
        let mut seen = HashSet::with_capacity(header.len());
        if let Some(dup) = header.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(NormalizeError::Shape(format!("duplicate column '{dup}'")));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != header.len())
        {
            return Err(NormalizeError::Shape(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                header.len()
            )));
        }
        Ok(Self::from_header_rows(header, rows))
    }

    #[must_use]
    pub const fn kind(&self) -> PayloadKind {
        match self {
            Self::Raw(_) => PayloadKind::Raw,
            Self::Rows(_) => PayloadKind::Rows,
        }
    }

    #[must_use]
    pub fn as_raw(&self) -> Option<&[u8]> {
        match self {
            Self::Raw(bytes) => Some(bytes),
            Self::Rows(_) => None,
        }
    }

    #[must_use]
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Rows(table) => Some(table),
            Self::Raw(_) => None,
        }
    }

    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.as_table().map(Table::columns)
    }

    #[must_use]
    pub fn rows(&self) -> Option<&[Row]> {
        self.as_table().map(Table::rows)
    }

    /// Renders each row as a JSON object keyed by column name.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Type`] for raw payloads.
    pub fn to_records(&self) -> NormalizeResult<Vec<Map<String, Value>>> {
        let table = self
            .as_table()
            .ok_or_else(|| NormalizeError::Type("raw payload has no records".to_string()))?;
        Ok(table
            .rows
            .iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().chain(std::iter::repeat(Value::Null)))
                    .collect()
            })
            .collect())
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Self::Rows(table)
    }
}
