//! Parsers for the lines that make up a query response.
//!
//! A response is a sequence of result sets. Each one starts with an optional
//! `&` header line, continues with `%` column metadata lines and ends with
//! zero or more `[` tuple lines:
//!
//! ```text
//! &1 0 2 2 2
//! % sys.t,	sys.t # table_name
//! % id,	name # name
//! % int,	varchar # type
//! % 1,	5 # length
//! [ 1,	"alice"	]
//! [ 2,	NULL	]
//! ```

use crate::error::ProtocolError;
use crate::types::ColumnType;

/// The literal the server sends for a null field.
pub const NULL_LITERAL: &str = "NULL";

/// Kind of response announced by a `&` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryKind {
    /// `&1` a table (SELECT) result.
    Table,
    /// `&2` an update count.
    Update,
    /// `&3` a schema change.
    Schema,
    /// `&4` a transaction state change.
    Transaction,
    /// `&5` a prepared statement description.
    Prepare,
    /// `&6` a continuation block of a previous table.
    Block,
    /// No header was seen, or the kind is not known.
    #[default]
    Unknown,
}

impl QueryKind {
    fn from_token(token: &str) -> Self {
        match token {
            "1" => Self::Table,
            "2" => Self::Update,
            "3" => Self::Schema,
            "4" => Self::Transaction,
            "5" => Self::Prepare,
            "6" => Self::Block,
            _ => Self::Unknown,
        }
    }
}

/// Descriptor parsed from a `&` result header line.
///
/// Only table (`&1`) and prepare (`&5`) headers carry counts; every other
/// kind leaves the numeric fields at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultHeader {
    /// Header kind.
    pub kind: QueryKind,
    /// Server-side result set identifier.
    pub id: i64,
    /// Total number of tuples in the result.
    pub tuple_count: i64,
    /// Number of columns.
    pub column_count: i64,
    /// Number of rows contained in this response.
    pub row_count: i64,
    /// Number of records affected by the statement.
    pub records_affected: i64,
}

impl ResultHeader {
    /// Parse `&<kind> <id> <tupleCount> <columnCount> <rowCount> ...`.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let body = line.strip_prefix('&').unwrap_or(line);
        let parts: Vec<&str> = body.split(' ').collect();
        let kind = QueryKind::from_token(parts[0]);

        match kind {
            QueryKind::Table | QueryKind::Prepare => {
                let field = |index: usize| -> Result<i64, ProtocolError> {
                    parts
                        .get(index)
                        .and_then(|v| v.trim().parse::<i64>().ok())
                        .ok_or_else(|| ProtocolError::InvalidResultHeader(line.to_owned()))
                };

                Ok(Self {
                    kind,
                    id: field(1)?,
                    tuple_count: field(2)?,
                    column_count: field(3)?,
                    row_count: field(4)?,
                    records_affected: 0,
                })
            }
            _ => Ok(Self {
                kind,
                ..Self::default()
            }),
        }
    }
}

/// Split a comma separated list and trim spaces and tabs from every value.
fn split_values(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(|v| v.trim_matches(|c| c == ' ' || c == '\t'))
}

/// Parse a `%v1,v2,...#key` column metadata line into its key and values.
pub fn parse_metadata_line(line: &str) -> Result<(String, Vec<String>), ProtocolError> {
    let body = line.strip_prefix('%').unwrap_or(line);
    let hash = body
        .rfind('#')
        .ok_or_else(|| ProtocolError::InvalidMetadata(line.to_owned()))?;

    let key = body[hash + 1..].trim().to_owned();
    let values = split_values(&body[..hash]).map(str::to_owned).collect();
    Ok((key, values))
}

/// Parse a `[f1, f2, ...]` tuple line into its fields.
///
/// The literal `NULL` becomes `None`. Fields are split on raw commas, so a
/// quoted value containing a comma is split as well.
#[must_use]
pub fn parse_tuple_line(line: &str) -> Vec<Option<String>> {
    let body = line.strip_prefix('[').unwrap_or(line);
    let body = match body.rfind(']') {
        Some(end) => &body[..end],
        None => body,
    };

    split_values(body)
        .map(|v| {
            if v == NULL_LITERAL {
                None
            } else {
                Some(v.to_owned())
            }
        })
        .collect()
}

/// Column description assembled from the `%` metadata lines of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared SQL type name.
    pub type_name: String,
    /// Name of the table the column belongs to.
    pub table_name: String,
    /// Declared length.
    pub length: i32,
}

impl ColumnInfo {
    /// Build column descriptions from metadata lines.
    ///
    /// The first line decides how many columns there are. Later lines fill
    /// the attribute named by their key, position by position.
    pub fn from_metadata<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Self>, ProtocolError> {
        let mut columns: Vec<Self> = Vec::new();

        for line in lines {
            let (key, values) = parse_metadata_line(line.as_ref())?;

            if columns.is_empty() {
                columns = vec![Self::default(); values.len()];
            }

            for (column, value) in columns.iter_mut().zip(values) {
                match key.as_str() {
                    "table_name" => column.table_name = value,
                    "name" => column.name = value,
                    "type" => column.type_name = value,
                    "length" => column.length = value.parse().unwrap_or_default(),
                    _ => {}
                }
            }
        }

        Ok(columns)
    }

    /// The client-side type this column maps to.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        ColumnType::from_type_name(&self.type_name)
    }
}
