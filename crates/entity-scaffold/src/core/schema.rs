//! Schema metadata types for database tables, columns, indexes, and foreign keys.
//!
//! These types provide a database-agnostic representation of catalog metadata.
//! Dialect readers populate them; the relationship analyzer and the emitter
//! consume them read-only.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScaffoldError};

/// Referential action attached to a foreign key.
///
/// Every dialect reader normalizes its vendor tokens into this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialRule {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialRule {
    /// Parse a vendor rule token.
    ///
    /// Accepts both the space-separated form (`NO ACTION`, MySQL and
    /// PostgreSQL) and the underscore form (`NO_ACTION`, SQL Server's
    /// `*_referential_action_desc`). Unknown tokens fall back to `NoAction`.
    pub fn parse(token: &str) -> Self {
        match token.trim().to_uppercase().replace('_', " ").as_str() {
            "RESTRICT" => ReferentialRule::Restrict,
            "CASCADE" => ReferentialRule::Cascade,
            "SET NULL" => ReferentialRule::SetNull,
            "SET DEFAULT" => ReferentialRule::SetDefault,
            _ => ReferentialRule::NoAction,
        }
    }

    /// The canonical token for this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferentialRule::NoAction => "NO ACTION",
            ReferentialRule::Restrict => "RESTRICT",
            ReferentialRule::Cascade => "CASCADE",
            ReferentialRule::SetNull => "SET NULL",
            ReferentialRule::SetDefault => "SET DEFAULT",
        }
    }
}

impl std::fmt::Display for ReferentialRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a generated column's value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedKind {
    /// PostgreSQL `GENERATED ALWAYS AS IDENTITY`.
    Always,
    /// Stored generated column (MySQL `STORED GENERATED`, PostgreSQL `attgenerated = 's'`).
    Stored,
    /// Virtual generated column (MySQL `VIRTUAL GENERATED`).
    Virtual,
    /// SQL Server computed column.
    Computed,
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Normalized data-type token (e.g. "int", "string", "DateTime").
    pub data_type: String,

    /// Raw vendor type token (e.g. "nvarchar", "int8").
    pub vendor_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the column participates in the primary key.
    pub is_primary_key: bool,

    /// Whether the column is identity/auto-increment.
    pub is_identity: bool,

    /// Whether the column is computed/generated.
    pub is_computed: bool,

    /// Generation expression when the dialect exposes it.
    pub computed_expression: Option<String>,

    /// Whether the column is a row-version/concurrency token.
    pub is_row_version: bool,

    /// Maximum length for string/binary types (-1 for unbounded).
    pub max_length: Option<i32>,

    /// Numeric precision for decimal types.
    pub precision: Option<i32>,

    /// Numeric scale for decimal types.
    pub scale: Option<i32>,

    /// Default-value expression.
    pub default_value: Option<String>,

    /// Collation name, when non-default.
    pub collation: Option<String>,

    /// How the column is generated, if at all.
    pub generated_kind: Option<GeneratedKind>,

    /// Column comment.
    pub comment: Option<String>,

    /// Ordinal position (1-based, matches catalog order).
    pub ordinal: i32,

    /// Names of indexes this column participates in. Back-reference only;
    /// the `Table::indexes` list stays authoritative.
    pub participating_indexes: Vec<String>,
}

impl Column {
    /// Create a column with only the identifying fields set.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: i32) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            vendor_type: data_type.clone(),
            data_type,
            is_nullable: false,
            is_primary_key: false,
            is_identity: false,
            is_computed: false,
            computed_expression: None,
            is_row_version: false,
            max_length: None,
            precision: None,
            scale: None,
            default_value: None,
            collation: None,
            generated_kind: None,
            comment: None,
            ordinal,
            participating_indexes: Vec::new(),
        }
    }
}

/// One column of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub column_name: String,

    /// 1-based position within the key (or within the included set).
    pub key_ordinal: i32,

    /// Whether the key column is sorted descending.
    pub is_descending: bool,

    /// Whether the column is an included (non-key) column.
    pub is_included: bool,
}

/// Index metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Whether the index enforces uniqueness.
    pub is_unique: bool,

    /// Whether the index backs the primary key.
    pub is_primary_key: bool,

    /// Whether the index is disabled/invalid.
    pub is_disabled: bool,

    /// Vendor index type tag (e.g. "CLUSTERED", "BTREE", "gin").
    pub index_type: String,

    /// Key columns first (ordinal order), then included columns.
    pub columns: Vec<IndexColumn>,
}

impl Index {
    /// Create an index, validating structural invariants.
    ///
    /// Key ordinals of non-included columns must be contiguous from 1, and a
    /// primary-key index must be unique.
    pub fn new(
        name: impl Into<String>,
        is_unique: bool,
        is_primary_key: bool,
        is_disabled: bool,
        index_type: impl Into<String>,
        columns: Vec<IndexColumn>,
    ) -> Result<Self> {
        let name = name.into();

        if is_primary_key && !is_unique {
            return Err(ScaffoldError::schema(
                &name,
                "primary-key index must be unique",
            ));
        }

        let mut expected = 1;
        for col in columns.iter().filter(|c| !c.is_included) {
            if col.key_ordinal != expected {
                return Err(ScaffoldError::schema(
                    &name,
                    format!(
                        "key ordinals not contiguous: expected {}, found {} at '{}'",
                        expected, col.key_ordinal, col.column_name
                    ),
                ));
            }
            expected += 1;
        }

        Ok(Self {
            name,
            is_unique,
            is_primary_key,
            is_disabled,
            index_type: index_type.into(),
            columns,
        })
    }

    /// Names of the key (non-included) columns, in ordinal order.
    pub fn key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| !c.is_included)
            .map(|c| c.column_name.as_str())
            .collect()
    }

    /// Number of key columns.
    pub fn key_width(&self) -> usize {
        self.columns.iter().filter(|c| !c.is_included).count()
    }
}

/// One (referencing, referenced) column pair of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPair {
    /// Column on the referencing (dependent) table.
    pub fk_column: String,

    /// Column on the referenced (principal) table.
    pub pk_column: String,
}

/// Foreign key metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Referenced (principal) table name.
    pub primary_table: String,

    /// Column pairs in constraint order.
    pub column_pairs: Vec<ColumnPair>,

    /// ON DELETE action.
    pub delete_rule: ReferentialRule,

    /// ON UPDATE action.
    pub update_rule: ReferentialRule,

    /// Whether the constraint is enabled/validated.
    pub is_enabled: bool,

    /// Constraint comment. The one-to-one post-processing pass appends its
    /// hint marker here.
    pub comment: Option<String>,
}

impl ForeignKey {
    /// Create a foreign key, validating structural invariants.
    ///
    /// At least one pair is required, every pair must carry non-empty names,
    /// and within a composite key both the fk columns and the pk columns must
    /// be unique.
    pub fn new(
        name: impl Into<String>,
        primary_table: impl Into<String>,
        column_pairs: Vec<ColumnPair>,
        delete_rule: ReferentialRule,
        update_rule: ReferentialRule,
        is_enabled: bool,
    ) -> Result<Self> {
        let name = name.into();

        if column_pairs.is_empty() {
            return Err(ScaffoldError::schema(&name, "foreign key has no column pairs"));
        }
        for pair in &column_pairs {
            if pair.fk_column.trim().is_empty() || pair.pk_column.trim().is_empty() {
                return Err(ScaffoldError::schema(
                    &name,
                    "foreign key column pair with empty column name",
                ));
            }
        }
        if column_pairs.len() > 1 {
            for side in [true, false] {
                let mut seen = std::collections::HashSet::new();
                for pair in &column_pairs {
                    let col = if side { &pair.fk_column } else { &pair.pk_column };
                    if !seen.insert(col.as_str()) {
                        return Err(ScaffoldError::schema(
                            &name,
                            format!("duplicate column '{}' in composite foreign key", col),
                        ));
                    }
                }
            }
        }

        Ok(Self {
            name,
            primary_table: primary_table.into(),
            column_pairs,
            delete_rule,
            update_rule,
            is_enabled,
            comment: None,
        })
    }

    /// Whether the key spans more than one column pair.
    pub fn is_composite_key(&self) -> bool {
        self.column_pairs.len() > 1
    }

    /// Convenience accessor mirroring the first pair's referencing column.
    pub fn foreign_key_column(&self) -> &str {
        &self.column_pairs[0].fk_column
    }

    /// Convenience accessor mirroring the first pair's referenced column.
    pub fn primary_key_column(&self) -> &str {
        &self.column_pairs[0].pk_column
    }
}

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Table comment.
    pub comment: Option<String>,

    /// Column definitions, in catalog ordinal order.
    pub columns: Vec<Column>,

    /// Index definitions.
    pub indexes: Vec<Index>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Create an empty table shell for the introspection phase to fill.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            comment: None,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Columns flagged as part of the primary key, in ordinal order.
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    /// Whether the primary key spans more than one column.
    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key_columns().len() > 1
    }

    /// The index backing the primary key, if any.
    pub fn primary_key_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary_key)
    }

    /// Look up a column by name (case-insensitive, matching catalog behavior).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Validate cross-entity invariants after introspection.
    ///
    /// Checks ordinal contiguity, the single-primary-key-index rule, the
    /// consistency of primary-key flags with the primary-key index, and the
    /// length/precision requirements of sized types.
    pub fn validate(&self) -> Result<()> {
        let full_name = self.full_name();

        for (i, col) in self.columns.iter().enumerate() {
            let expected = i as i32 + 1;
            if col.ordinal != expected {
                return Err(ScaffoldError::schema(
                    &full_name,
                    format!(
                        "column ordinals not contiguous: expected {}, found {} at '{}'",
                        expected, col.ordinal, col.name
                    ),
                ));
            }
            if crate::typemap::is_decimal_family(&col.vendor_type) && col.precision.is_none() {
                return Err(ScaffoldError::schema(
                    &full_name,
                    format!("decimal column '{}' is missing precision", col.name),
                ));
            }
            if crate::typemap::is_character_varying_family(&col.vendor_type)
                && col.max_length.is_none()
            {
                return Err(ScaffoldError::schema(
                    &full_name,
                    format!("varying-length column '{}' is missing max length", col.name),
                ));
            }
        }

        let pk_indexes = self.indexes.iter().filter(|i| i.is_primary_key).count();
        if pk_indexes > 1 {
            return Err(ScaffoldError::schema(
                &full_name,
                format!("{} primary-key indexes, expected at most one", pk_indexes),
            ));
        }

        let has_pk_columns = self.columns.iter().any(|c| c.is_primary_key);
        if has_pk_columns != (pk_indexes == 1) {
            return Err(ScaffoldError::schema(
                &full_name,
                "primary-key column flags inconsistent with primary-key index",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(fk: &str, pk: &str) -> ColumnPair {
        ColumnPair {
            fk_column: fk.to_string(),
            pk_column: pk.to_string(),
        }
    }

    fn key_col(name: &str, ordinal: i32) -> IndexColumn {
        IndexColumn {
            column_name: name.to_string(),
            key_ordinal: ordinal,
            is_descending: false,
            is_included: false,
        }
    }

    #[test]
    fn test_rule_parse_closed_set() {
        // Both vendor spellings land in the same closed set.
        for (token, expected) in [
            ("NO ACTION", ReferentialRule::NoAction),
            ("NO_ACTION", ReferentialRule::NoAction),
            ("restrict", ReferentialRule::Restrict),
            ("CASCADE", ReferentialRule::Cascade),
            ("SET_NULL", ReferentialRule::SetNull),
            ("set null", ReferentialRule::SetNull),
            ("SET_DEFAULT", ReferentialRule::SetDefault),
            ("something else", ReferentialRule::NoAction),
        ] {
            assert_eq!(ReferentialRule::parse(token), expected, "token {token:?}");
        }
    }

    #[test]
    fn test_rule_display_tokens() {
        let all = [
            ReferentialRule::NoAction,
            ReferentialRule::Restrict,
            ReferentialRule::Cascade,
            ReferentialRule::SetNull,
            ReferentialRule::SetDefault,
        ];
        let tokens: Vec<String> = all.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            tokens,
            ["NO ACTION", "RESTRICT", "CASCADE", "SET NULL", "SET DEFAULT"]
        );
    }

    #[test]
    fn test_index_rejects_gapped_ordinals() {
        let result = Index::new(
            "IX_Orders_Customer",
            false,
            false,
            false,
            "NONCLUSTERED",
            vec![key_col("CustomerId", 1), key_col("OrderDate", 3)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_index_rejects_non_unique_primary_key() {
        let result = Index::new(
            "PK_Orders",
            false,
            true,
            false,
            "CLUSTERED",
            vec![key_col("Id", 1)],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_index_included_columns_do_not_break_contiguity() {
        let mut cols = vec![key_col("A", 1), key_col("B", 2)];
        cols.push(IndexColumn {
            column_name: "C".to_string(),
            key_ordinal: 1,
            is_descending: false,
            is_included: true,
        });
        let index = Index::new("IX_T", false, false, false, "NONCLUSTERED", cols).unwrap();
        assert_eq!(index.key_columns(), ["A", "B"]);
        assert_eq!(index.key_width(), 2);
    }

    #[test]
    fn test_foreign_key_composite_flag_matches_pairs() {
        let single = ForeignKey::new(
            "FK_single",
            "Customer",
            vec![pair("CustomerId", "Id")],
            ReferentialRule::NoAction,
            ReferentialRule::NoAction,
            true,
        )
        .unwrap();
        assert!(!single.is_composite_key());
        assert_eq!(single.foreign_key_column(), "CustomerId");
        assert_eq!(single.primary_key_column(), "Id");

        let composite = ForeignKey::new(
            "FK_composite",
            "OrderDetail",
            vec![pair("OrderId", "OrderId"), pair("ProductId", "ProductId")],
            ReferentialRule::Cascade,
            ReferentialRule::NoAction,
            true,
        )
        .unwrap();
        assert!(composite.is_composite_key());
        assert_eq!(composite.foreign_key_column(), "OrderId");
    }

    #[test]
    fn test_foreign_key_rejects_empty_and_duplicate_pairs() {
        assert!(ForeignKey::new(
            "FK_empty",
            "T",
            vec![],
            ReferentialRule::NoAction,
            ReferentialRule::NoAction,
            true,
        )
        .is_err());

        assert!(ForeignKey::new(
            "FK_blank",
            "T",
            vec![pair("", "Id")],
            ReferentialRule::NoAction,
            ReferentialRule::NoAction,
            true,
        )
        .is_err());

        assert!(ForeignKey::new(
            "FK_dup",
            "T",
            vec![pair("A", "X"), pair("A", "Y")],
            ReferentialRule::NoAction,
            ReferentialRule::NoAction,
            true,
        )
        .is_err());
    }

    #[test]
    fn test_table_validate_ordinals() {
        let mut table = Table::new("dbo", "Orders");
        table.columns.push(Column::new("Id", "int", 1));
        table.columns.push(Column::new("Total", "decimal", 3));
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("not contiguous"));
    }

    #[test]
    fn test_table_validate_pk_consistency() {
        let mut table = Table::new("dbo", "Orders");
        let mut id = Column::new("Id", "int", 1);
        id.is_primary_key = true;
        table.columns.push(id);
        // PK column flagged but no PK index recorded.
        assert!(table.validate().is_err());

        table.indexes.push(
            Index::new("PK_Orders", true, true, false, "CLUSTERED", vec![key_col("Id", 1)])
                .unwrap(),
        );
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_table_validate_decimal_requires_precision() {
        let mut table = Table::new("public", "invoice");
        let mut amount = Column::new("amount", "decimal", 1);
        amount.vendor_type = "numeric".to_string();
        table.columns.push(amount);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_table_column_lookup_is_case_insensitive() {
        let mut table = Table::new("dbo", "Users");
        table.columns.push(Column::new("Email", "string", 1));
        assert!(table.column("email").is_some());
        assert!(table.column("missing").is_none());
    }
}
