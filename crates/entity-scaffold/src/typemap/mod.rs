//! Canonical data-type tokens for cross-engine type normalization.
//!
//! Every dialect reader maps its raw catalog types into this small canonical
//! set, so semantically identical columns carry the same token regardless of
//! engine. The raw vendor token is preserved separately on the column.

use serde::{Deserialize, Serialize};

/// Canonical type token for a column's value domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalType {
    String,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Guid,
    ByteArray,
    /// No canonical mapping; carries the raw vendor type.
    Vendor(String),
}

impl CanonicalType {
    /// The token stored in the schema model and consumed by the emitter.
    pub fn token(&self) -> &str {
        match self {
            CanonicalType::String => "string",
            CanonicalType::Bool => "bool",
            CanonicalType::Byte => "byte",
            CanonicalType::Short => "short",
            CanonicalType::Int => "int",
            CanonicalType::Long => "long",
            CanonicalType::Float => "float",
            CanonicalType::Double => "double",
            CanonicalType::Decimal => "decimal",
            CanonicalType::DateTime => "DateTime",
            CanonicalType::DateTimeOffset => "DateTimeOffset",
            CanonicalType::TimeSpan => "TimeSpan",
            CanonicalType::Guid => "Guid",
            CanonicalType::ByteArray => "byte[]",
            CanonicalType::Vendor(raw) => raw,
        }
    }
}

impl std::fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Map a SQL Server catalog type to its canonical token.
pub fn from_sql_server(vendor: &str) -> CanonicalType {
    match vendor.to_lowercase().as_str() {
        "bit" => CanonicalType::Bool,
        "tinyint" => CanonicalType::Byte,
        "smallint" => CanonicalType::Short,
        "int" => CanonicalType::Int,
        "bigint" => CanonicalType::Long,
        "real" => CanonicalType::Float,
        "float" => CanonicalType::Double,
        "decimal" | "numeric" | "money" | "smallmoney" => CanonicalType::Decimal,
        "date" | "datetime" | "datetime2" | "smalldatetime" => CanonicalType::DateTime,
        "datetimeoffset" => CanonicalType::DateTimeOffset,
        "time" => CanonicalType::TimeSpan,
        "uniqueidentifier" => CanonicalType::Guid,
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => CanonicalType::ByteArray,
        "char" | "nchar" | "varchar" | "nvarchar" | "text" | "ntext" | "xml" | "sysname" => {
            CanonicalType::String
        }
        _ => CanonicalType::Vendor(vendor.to_string()),
    }
}

/// Map a MySQL catalog type to its canonical token.
pub fn from_mysql(vendor: &str) -> CanonicalType {
    match vendor.to_lowercase().as_str() {
        "bit" | "bool" | "boolean" => CanonicalType::Bool,
        "tinyint" => CanonicalType::Byte,
        "smallint" | "year" => CanonicalType::Short,
        "mediumint" | "int" | "integer" => CanonicalType::Int,
        "bigint" => CanonicalType::Long,
        "float" => CanonicalType::Float,
        "double" | "real" => CanonicalType::Double,
        "decimal" | "numeric" => CanonicalType::Decimal,
        "date" | "datetime" | "timestamp" => CanonicalType::DateTime,
        "time" => CanonicalType::TimeSpan,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set"
        | "json" => CanonicalType::String,
        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
            CanonicalType::ByteArray
        }
        _ => CanonicalType::Vendor(vendor.to_string()),
    }
}

/// Map a PostgreSQL type (size modifiers already stripped) to its canonical token.
pub fn from_postgres(vendor: &str) -> CanonicalType {
    match vendor.to_lowercase().as_str() {
        "bool" | "boolean" => CanonicalType::Bool,
        "smallint" | "int2" | "smallserial" => CanonicalType::Short,
        "integer" | "int" | "int4" | "serial" => CanonicalType::Int,
        "bigint" | "int8" | "bigserial" => CanonicalType::Long,
        "real" | "float4" => CanonicalType::Float,
        "double precision" | "float8" => CanonicalType::Double,
        "numeric" | "decimal" | "money" => CanonicalType::Decimal,
        "date" | "timestamp" | "timestamp without time zone" => CanonicalType::DateTime,
        "timestamptz" | "timestamp with time zone" => CanonicalType::DateTimeOffset,
        "time" | "time without time zone" | "time with time zone" | "interval" => {
            CanonicalType::TimeSpan
        }
        "uuid" => CanonicalType::Guid,
        "bytea" => CanonicalType::ByteArray,
        "text" | "varchar" | "character varying" | "character" | "char" | "bpchar" | "citext"
        | "name" | "json" | "jsonb" | "xml" => CanonicalType::String,
        _ => CanonicalType::Vendor(vendor.to_string()),
    }
}

/// Whether a vendor type belongs to the decimal/numeric family, which must
/// always carry a precision.
pub fn is_decimal_family(vendor: &str) -> bool {
    matches!(
        vendor.to_lowercase().as_str(),
        "decimal" | "numeric" | "money" | "smallmoney"
    )
}

/// Whether a vendor type belongs to the varying-length character family,
/// which must always carry a max length (-1 for unbounded).
pub fn is_character_varying_family(vendor: &str) -> bool {
    matches!(
        vendor.to_lowercase().as_str(),
        "varchar" | "nvarchar" | "character varying"
    )
}

/// A PostgreSQL `format_type` string broken into base type and modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTypeParts {
    /// Base type with modifiers stripped (e.g. "character varying").
    pub base: String,
    /// `(n)` length modifier, when present.
    pub length: Option<i32>,
    /// `(p,s)` precision, when present.
    pub precision: Option<i32>,
    /// `(p,s)` scale, when present.
    pub scale: Option<i32>,
}

/// Split a `format_type` rendering like `character varying(40)` or
/// `numeric(10,2)` into its base type and modifiers.
///
/// A trailing qualifier after the modifier (`timestamp(3) with time zone`)
/// is folded back onto the base type.
pub fn parse_pg_type(raw: &str) -> PgTypeParts {
    let raw = raw.trim();
    let (open, close) = match (raw.find('('), raw.find(')')) {
        (Some(o), Some(c)) if o < c => (o, c),
        _ => {
            return PgTypeParts {
                base: raw.to_string(),
                length: None,
                precision: None,
                scale: None,
            }
        }
    };

    let mut base = raw[..open].trim_end().to_string();
    let suffix = raw[close + 1..].trim();
    if !suffix.is_empty() {
        base.push(' ');
        base.push_str(suffix);
    }

    let inner = &raw[open + 1..close];
    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [p, s] => PgTypeParts {
            base,
            length: None,
            precision: p.parse().ok(),
            scale: s.parse().ok(),
        },
        [n] => PgTypeParts {
            base,
            length: n.parse().ok(),
            precision: None,
            scale: None,
        },
        _ => PgTypeParts {
            base,
            length: None,
            precision: None,
            scale: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_tokens() {
        assert_eq!(CanonicalType::String.token(), "string");
        assert_eq!(CanonicalType::ByteArray.token(), "byte[]");
        assert_eq!(CanonicalType::DateTimeOffset.token(), "DateTimeOffset");
        assert_eq!(CanonicalType::Vendor("hierarchyid".into()).token(), "hierarchyid");
    }

    #[test]
    fn test_semantically_identical_columns_share_tokens() {
        // The same logical type must normalize identically across engines.
        assert_eq!(from_sql_server("int"), from_mysql("int"));
        assert_eq!(from_sql_server("int"), from_postgres("integer"));
        assert_eq!(from_sql_server("bigint"), from_postgres("int8"));
        assert_eq!(from_sql_server("nvarchar"), from_mysql("varchar"));
        assert_eq!(from_sql_server("nvarchar"), from_postgres("character varying"));
        assert_eq!(from_sql_server("bit"), from_mysql("boolean"));
        assert_eq!(from_sql_server("bit"), from_postgres("bool"));
        assert_eq!(from_sql_server("datetime2"), from_mysql("datetime"));
        assert_eq!(from_sql_server("varbinary"), from_postgres("bytea"));
        assert_eq!(from_sql_server("decimal"), from_mysql("numeric"));
    }

    #[test]
    fn test_unmapped_types_keep_vendor_token() {
        assert_eq!(
            from_sql_server("geography"),
            CanonicalType::Vendor("geography".into())
        );
        assert_eq!(from_postgres("tsvector"), CanonicalType::Vendor("tsvector".into()));
    }

    #[test]
    fn test_parse_pg_type_plain() {
        let parts = parse_pg_type("integer");
        assert_eq!(parts.base, "integer");
        assert_eq!(parts.length, None);
        assert_eq!(parts.precision, None);
    }

    #[test]
    fn test_parse_pg_type_length() {
        let parts = parse_pg_type("character varying(40)");
        assert_eq!(parts.base, "character varying");
        assert_eq!(parts.length, Some(40));
        assert_eq!(parts.scale, None);
    }

    #[test]
    fn test_parse_pg_type_precision_scale() {
        let parts = parse_pg_type("numeric(10,2)");
        assert_eq!(parts.base, "numeric");
        assert_eq!(parts.length, None);
        assert_eq!(parts.precision, Some(10));
        assert_eq!(parts.scale, Some(2));
    }

    #[test]
    fn test_parse_pg_type_modifier_with_qualifier() {
        let parts = parse_pg_type("timestamp(3) with time zone");
        assert_eq!(parts.base, "timestamp with time zone");
        assert_eq!(parts.length, Some(3));
    }

    #[test]
    fn test_family_predicates() {
        assert!(is_decimal_family("numeric"));
        assert!(is_decimal_family("DECIMAL"));
        assert!(!is_decimal_family("int"));
        assert!(is_character_varying_family("nvarchar"));
        assert!(is_character_varying_family("character varying"));
        assert!(!is_character_varying_family("text"));
    }
}
