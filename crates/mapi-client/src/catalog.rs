//! Catalog introspection.
//!
//! These queries are best effort: a failing query is logged and reported as
//! an empty result, so callers such as schema browsers never have to handle
//! errors for metadata that is merely unavailable.

use crate::client::Client;
use crate::row::Row;
use crate::state::ConnectionState;

/// Environment variable holding the database name, used as catalog name.
const DBNAME_VARIABLE: &str = "gdk_dbname";

/// Table types reported by [`Catalog::tables`], in sorted order.
pub const TABLE_TYPES: [&str; 8] = [
    "SESSION TABLE",
    "SESSION VIEW",
    "SYSTEM SESSION TABLE",
    "SYSTEM SESSION VIEW",
    "SYSTEM TABLE",
    "SYSTEM VIEW",
    "TABLE",
    "VIEW",
];

/// Category of built-in functions, by the type of their first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Functions over numbers.
    Numeric,
    /// Functions over character strings.
    String,
    /// Functions that take no arguments.
    System,
    /// Functions over dates, times and intervals.
    DateTime,
}

impl FunctionKind {
    /// `WHERE` clause selecting this category from `sys.functions`.
    fn filter(self) -> String {
        const FIRST_ARG: &str = "WHERE \"id\" IN (SELECT \"func_id\" FROM \"sys\".\"args\" \
                                 WHERE \"number\" = 1 AND \"name\" = 'arg_1' AND \"type\" IN ";
        match self {
            Self::Numeric => format!(
                "{FIRST_ARG}('tinyint', 'smallint', 'int', 'bigint', 'decimal', 'real', \
                 'double')) AND \"name\" NOT IN ('code', 'space')"
            ),
            // `code` and `space` take an int but produce text.
            Self::String => format!(
                "{FIRST_ARG}('char', 'varchar', 'clob')) OR \"name\" IN ('code', 'space')"
            ),
            Self::System => String::from(
                "WHERE \"id\" NOT IN (SELECT \"func_id\" FROM \"sys\".\"args\" \
                 WHERE \"number\" = 1) \
                 AND \"func\" NOT LIKE '%function%(% %)%' \
                 AND \"func\" NOT LIKE '%procedure%(% %)%' \
                 AND \"func\" NOT LIKE '%CREATE FUNCTION%RETURNS TABLE(% %)%' \
                 AND \"name\" NOT LIKE 'querylog_%' \
                 AND \"name\" NOT IN ('analyze', 'count', 'count_no_nil', \
                 'initializedictionary', 'times')",
            ),
            Self::DateTime => format!(
                "{FIRST_ARG}('date', 'time', 'timestamp', 'timetz', 'timestamptz', \
                 'sec_interval', 'month_interval'))"
            ),
        }
    }
}

/// A schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    /// Catalog (database) name.
    pub catalog: String,
    /// Schema name.
    pub name: String,
}

/// A table or view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// Catalog (database) name.
    pub catalog: String,
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub name: String,
    /// `TABLE`, `VIEW`, `SYSTEM TABLE`, ...
    pub table_type: String,
}

/// A column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDetail {
    /// Catalog (database) name.
    pub catalog: String,
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Declared type name.
    pub data_type: String,
    /// Declared digits or length.
    pub size: i32,
    /// Declared scale.
    pub scale: i32,
    /// Whether the column accepts nulls.
    pub nullable: bool,
    /// Default value expression.
    pub default_value: Option<String>,
    /// 1-based position within the table.
    pub ordinal: i32,
}

/// Catalog queries borrowing a client.
pub struct Catalog<'a, S: ConnectionState> {
    client: &'a mut Client<S>,
}

impl<'a, S: ConnectionState> Catalog<'a, S> {
    pub(crate) fn new(client: &'a mut Client<S>) -> Self {
        Self { client }
    }

    /// All server environment variables as `(name, value)` pairs.
    pub async fn environment(&mut self) -> Vec<(String, String)> {
        self.rows("SELECT env.name, env.value FROM sys.env() as env")
            .await
            .into_iter()
            .filter_map(|row| {
                let name = row.get(0)?.to_string();
                let value = row.get(1).unwrap_or_default().to_string();
                Some((name, value))
            })
            .collect()
    }

    /// The value of one server environment variable.
    pub async fn environment_variable(&mut self, name: &str) -> Option<String> {
        self.environment()
            .await
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    /// Schemas whose name matches the `LIKE` pattern.
    pub async fn schemas(&mut self, pattern: Option<&str>) -> Vec<SchemaInfo> {
        let catalog = self.catalog_name().await;
        let mut sql = String::from("SELECT \"name\" FROM \"sys\".\"schemas\" WHERE 1 = 1 ");
        push_like(&mut sql, "\"name\"", pattern);
        sql.push_str("ORDER BY \"name\"");

        self.rows(&sql)
            .await
            .iter()
            .map(|row| SchemaInfo {
                catalog: catalog.clone(),
                name: text(row, 0),
            })
            .collect()
    }

    /// Tables whose schema and name match the `LIKE` patterns.
    pub async fn tables(
        &mut self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Vec<TableInfo> {
        let catalog = self.catalog_name().await;
        let mut sql = String::from(
            "SELECT \"schemas\".\"name\", \"tables\".\"name\", \
             CASE WHEN \"tables\".\"system\" = true AND \"tables\".\"type\" IN (0, 10) \
                  AND \"tables\".\"temporary\" = 0 THEN 'SYSTEM TABLE' \
             WHEN \"tables\".\"system\" = true AND \"tables\".\"type\" IN (1, 11) \
                  AND \"tables\".\"temporary\" = 0 THEN 'SYSTEM VIEW' \
             WHEN \"tables\".\"system\" = false AND \"tables\".\"type\" = 0 \
                  AND \"tables\".\"temporary\" = 0 THEN 'TABLE' \
             WHEN \"tables\".\"system\" = false AND \"tables\".\"type\" = 1 \
                  AND \"tables\".\"temporary\" = 0 THEN 'VIEW' \
             WHEN \"tables\".\"temporary\" = 1 THEN 'SESSION TABLE' \
             ELSE 'INTERNAL TABLE TYPE' END \
             FROM \"sys\".\"tables\" AS \"tables\", \"sys\".\"schemas\" AS \"schemas\" \
             WHERE \"tables\".\"schema_id\" = \"schemas\".\"id\" ",
        );
        push_like(&mut sql, "\"schemas\".\"name\"", schema_pattern);
        push_like(&mut sql, "\"tables\".\"name\"", table_pattern);
        sql.push_str("ORDER BY 3, 1, 2");

        self.rows(&sql)
            .await
            .iter()
            .map(|row| TableInfo {
                catalog: catalog.clone(),
                schema: text(row, 0),
                name: text(row, 1),
                table_type: text(row, 2),
            })
            .collect()
    }

    /// Columns whose schema, table and name match the `LIKE` patterns.
    pub async fn columns(
        &mut self,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
        column_pattern: Option<&str>,
    ) -> Vec<ColumnDetail> {
        let catalog = self.catalog_name().await;
        let mut sql = String::from(
            "SELECT \"schemas\".\"name\", \"tables\".\"name\", \"columns\".\"name\", \
             \"columns\".\"type\", \"columns\".\"type_digits\", \"columns\".\"type_scale\", \
             \"columns\".\"null\", \"columns\".\"default\", \"columns\".\"number\" + 1 \
             FROM \"sys\".\"columns\" AS \"columns\", \"sys\".\"tables\" AS \"tables\", \
             \"sys\".\"schemas\" AS \"schemas\" \
             WHERE \"columns\".\"table_id\" = \"tables\".\"id\" \
             AND \"tables\".\"schema_id\" = \"schemas\".\"id\" ",
        );
        push_like(&mut sql, "\"schemas\".\"name\"", schema_pattern);
        push_like(&mut sql, "\"tables\".\"name\"", table_pattern);
        push_like(&mut sql, "\"columns\".\"name\"", column_pattern);
        sql.push_str("ORDER BY 1, 2, 9");

        self.rows(&sql)
            .await
            .iter()
            .map(|row| ColumnDetail {
                catalog: catalog.clone(),
                schema: text(row, 0),
                table: text(row, 1),
                name: text(row, 2),
                data_type: text(row, 3),
                size: number(row, 4),
                scale: number(row, 5),
                nullable: row.get(6) == Some("true"),
                default_value: row.get(7).map(str::to_string),
                ordinal: number(row, 8),
            })
            .collect()
    }

    /// Names of the table types [`tables`](Self::tables) can report.
    #[must_use]
    pub fn table_types(&self) -> &'static [&'static str] {
        &TABLE_TYPES
    }

    /// Distinct names of the built-in functions of one category.
    pub async fn functions(&mut self, kind: FunctionKind) -> Vec<String> {
        let sql = format!(
            "SELECT DISTINCT \"name\" FROM \"sys\".\"functions\" {} ORDER BY 1",
            kind.filter()
        );

        self.rows(&sql).await.iter().map(|row| text(row, 0)).collect()
    }

    async fn catalog_name(&mut self) -> String {
        self.environment_variable(DBNAME_VARIABLE)
            .await
            .unwrap_or_default()
    }

    async fn rows(&mut self, sql: &str) -> Vec<Row> {
        match self.client.query(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "catalog query failed");
                Vec::new()
            }
        }
    }
}

/// Lowercase a pattern and double its single quotes.
fn escape_pattern(pattern: &str) -> String {
    pattern.to_lowercase().replace('\'', "''")
}

fn push_like(sql: &mut String, column: &str, pattern: Option<&str>) {
    if let Some(pattern) = pattern.filter(|p| !p.is_empty()) {
        sql.push_str(&format!(
            "AND LOWER({column}) LIKE '{}' ",
            escape_pattern(pattern)
        ));
    }
}

fn text(row: &Row, index: usize) -> String {
    row.get(index).unwrap_or_default().to_string()
}

fn number(row: &Row, index: usize) -> i32 {
    row.try_get(index).ok().flatten().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_pattern() {
        assert_eq!(escape_pattern("Sys"), "sys");
        assert_eq!(escape_pattern("o'Brien%"), "o''brien%");
    }

    #[test]
    fn test_table_types_are_sorted() {
        let mut sorted = TABLE_TYPES;
        sorted.sort_unstable();
        assert_eq!(sorted, TABLE_TYPES);
    }

    #[test]
    fn test_function_filters() {
        let numeric = FunctionKind::Numeric.filter();
        assert!(numeric.contains("'bigint'"));
        assert!(numeric.ends_with("NOT IN ('code', 'space')"));

        let string = FunctionKind::String.filter();
        assert!(string.contains("('char', 'varchar', 'clob'))"));
        assert!(string.ends_with("OR \"name\" IN ('code', 'space')"));

        assert!(FunctionKind::System.filter().starts_with("WHERE \"id\" NOT IN"));
        assert!(FunctionKind::DateTime.filter().contains("'month_interval'))"));
    }

    #[test]
    fn test_push_like() {
        let mut sql = String::new();
        push_like(&mut sql, "\"name\"", Some("T%"));
        push_like(&mut sql, "\"other\"", None);
        push_like(&mut sql, "\"other\"", Some(""));
        assert_eq!(sql, "AND LOWER(\"name\") LIKE 't%' ");
    }
}
