//! Mapping from MonetDB type names to client-side column types.

use std::fmt;

/// Client-side classification of a MonetDB column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// `tinyint`
    TinyInt,
    /// `smallint`
    SmallInt,
    /// `int`
    Int,
    /// `bigint`, `oid`, `wrd`
    BigInt,
    /// `boolean`
    Boolean,
    /// `char`
    Char,
    /// `varchar`, `text`, `clob`, `string`, `uuid`
    VarChar,
    /// `decimal`, `numeric`, `hugeint`
    Decimal,
    /// `double`, `float`, `real`
    Double,
    /// `time`
    Time,
    /// `date`
    Date,
    /// `timestamp`
    Timestamp,
    /// Any type without a dedicated mapping.
    Other(String),
}

impl ColumnType {
    /// Classify a declared type name (case-insensitive).
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "int" => Self::Int,
            "bigint" | "oid" | "wrd" => Self::BigInt,
            "boolean" => Self::Boolean,
            "char" => Self::Char,
            "varchar" | "text" | "clob" | "string" | "uuid" => Self::VarChar,
            "decimal" | "numeric" | "hugeint" => Self::Decimal,
            "double" | "float" | "real" => Self::Double,
            "time" => Self::Time,
            "date" => Self::Date,
            "timestamp" => Self::Timestamp,
            _ => Self::Other(name.to_owned()),
        }
    }

    /// Whether values of this type are numbers.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::TinyInt
                | Self::SmallInt
                | Self::Int
                | Self::BigInt
                | Self::Decimal
                | Self::Double
        )
    }

    /// Whether values of this type arrive quoted.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Char | Self::VarChar)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::VarChar => "varchar",
            Self::Decimal => "decimal",
            Self::Double => "double",
            Self::Time => "time",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(ColumnType::from_type_name("oid"), ColumnType::BigInt);
        assert_eq!(ColumnType::from_type_name("wrd"), ColumnType::BigInt);
        assert_eq!(ColumnType::from_type_name("clob"), ColumnType::VarChar);
        assert_eq!(ColumnType::from_type_name("uuid"), ColumnType::VarChar);
        assert_eq!(ColumnType::from_type_name("hugeint"), ColumnType::Decimal);
        assert_eq!(ColumnType::from_type_name("REAL"), ColumnType::Double);
    }

    #[test]
    fn test_unknown_type() {
        let ty = ColumnType::from_type_name("blob");
        assert_eq!(ty, ColumnType::Other("blob".into()));
        assert_eq!(ty.to_string(), "blob");
        assert!(!ty.is_numeric());
    }
}
