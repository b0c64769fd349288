//! Typed record schemas.
//!
//! A [`Schema`] declares, once, how a record type maps onto table columns: each
//! field has a name, an optional column alias and an extraction function. The
//! sorted column order is resolved when the schema is built, so mapping a
//! record is a straight walk over the extractors.

use super::{Payload, Row, Table};
use crate::error::{NormalizeError, NormalizeResult};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

type Extractor<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;

struct FieldSpec<T> {
    name: String,
    alias: Option<String>,
    extract: Extractor<T>,
}

impl<T> FieldSpec<T> {
    fn column(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Collects field declarations for a [`Schema`].
pub struct SchemaBuilder<T> {
    fields: Vec<FieldSpec<T>>,
}

impl<T> SchemaBuilder<T> {
    /// Declares a field whose column name is the field name.
    #[must_use]
    pub fn field<F, V>(self, name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.push(name.into(), None, extract)
    }

    /// Declares a field stored under the column `alias`.
    #[must_use]
    pub fn aliased<F, V>(self, name: impl Into<String>, alias: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.push(name.into(), Some(alias.into()), extract)
    }

    fn push<F, V>(mut self, name: String, alias: Option<String>, extract: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.fields.push(FieldSpec {
            name,
            alias,
            extract: Box::new(move |record| extract(record).into()),
        });
        self
    }

    /// Resolves the column order.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Type`] when two fields map to the same column.
    pub fn build(mut self) -> NormalizeResult<Schema<T>> {
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.insert(field.column()) {
                return Err(NormalizeError::Type(format!(
                    "field '{}' maps to duplicate column '{}'",
                    field.name,
                    field.column()
                )));
            }
        }

        self.fields.sort_by(|a, b| a.column().cmp(b.column()));
        let columns = self.fields.iter().map(|f| f.column().to_string()).collect();
        Ok(Schema {
            columns,
            extractors: self.fields.into_iter().map(|f| f.extract).collect(),
        })
    }
}

/// A resolved mapping from records of type `T` to table rows.
pub struct Schema<T> {
    columns: Vec<String>,
    extractors: Vec<Extractor<T>>,
}

impl<T> Schema<T> {
    #[must_use]
    pub fn builder() -> SchemaBuilder<T> {
        SchemaBuilder { fields: Vec::new() }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Extracts one row, cells in column order.
    pub fn row(&self, record: &T) -> Row {
        self.extractors.iter().map(|extract| extract(record)).collect()
    }

    /// A single-row payload for `record`.
    pub fn to_payload(&self, record: &T) -> Payload {
        Table::new(self.columns.clone(), vec![self.row(record)]).into()
    }

    /// One row per record; an empty slice yields no rows.
    pub fn to_payload_slice(&self, records: &[T]) -> Payload {
        let rows = records.iter().map(|record| self.row(record)).collect();
        Table::new(self.columns.clone(), rows).into()
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}
