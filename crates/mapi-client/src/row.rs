//! Row representation for query results.
//!
//! MAPI sends every field as text. A [`Row`] keeps those strings as they
//! arrived and converts on access; all rows of a result set share one
//! column list.

use std::str::FromStr;
use std::sync::Arc;

use mapi_protocol::{ColumnInfo, ColumnType};

use crate::error::Error;

/// Column metadata describing a result set column.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking semver compatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared SQL type name (e.g. `int`, `varchar`).
    pub type_name: String,
    /// Table the column belongs to.
    pub table_name: String,
    /// Declared length.
    pub length: i32,
    /// Client-side type of the column.
    pub column_type: ColumnType,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            name: name.into(),
            column_type: ColumnType::from_type_name(&type_name),
            type_name,
            table_name: String::new(),
            length: 0,
        }
    }

    /// Set the owning table.
    #[must_use]
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the declared length.
    #[must_use]
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }
}

impl From<ColumnInfo> for Column {
    fn from(info: ColumnInfo) -> Self {
        Self {
            column_type: info.column_type(),
            name: info.name,
            type_name: info.type_name,
            table_name: info.table_name,
            length: info.length,
        }
    }
}

/// A row from a query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<[Column]>,
    values: Vec<Option<String>>,
}

impl Row {
    /// Create a row from shared column metadata and its field values.
    pub fn new(columns: Arc<[Column]>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Get a field as text. `None` for a null field or a bad index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(Option::as_deref)
    }

    /// Get a field by column name (case-insensitive).
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        self.find_column(name).and_then(|index| self.get(index))
    }

    /// Convert a field with [`FromStr`].
    ///
    /// A null field yields `Ok(None)`.
    pub fn try_get<T>(&self, index: usize) -> Result<Option<T>, Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if index >= self.values.len() {
            return Err(Error::Type(format!(
                "column index {index} out of range ({} columns)",
                self.values.len()
            )));
        }

        self.get(index)
            .map(|value| {
                value.parse::<T>().map_err(|e| {
                    Error::Type(format!(
                        "cannot convert {value:?} in column {index} to {}: {e}",
                        std::any::type_name::<T>()
                    ))
                })
            })
            .transpose()
    }

    /// Convert a field, looked up by column name, with [`FromStr`].
    pub fn try_get_by_name<T>(&self, name: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let index = self
            .find_column(name)
            .ok_or_else(|| Error::Type(format!("no column named {name}")))?;
        self.try_get(index)
    }

    /// Whether the field is null (or missing).
    #[must_use]
    pub fn is_null(&self, index: usize) -> bool {
        self.get(index).is_none()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the fields.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.values.iter().map(Option::as_deref)
    }

    /// Column metadata of the result set this row belongs to.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Consume the row, returning its fields.
    #[must_use]
    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    fn find_column(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}
