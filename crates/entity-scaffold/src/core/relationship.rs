//! Relationship records produced by the analyzer.

use serde::{Deserialize, Serialize};

use super::schema::ReferentialRule;

/// How two tables relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipKind {
    /// No usable foreign key between the pair, or analysis failed.
    Unknown,
    OneToOne,
    OneToMany,
    ManyToMany,
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelationshipKind::Unknown => "Unknown",
            RelationshipKind::OneToOne => "OneToOne",
            RelationshipKind::OneToMany => "OneToMany",
            RelationshipKind::ManyToMany => "ManyToMany",
        };
        f.write_str(s)
    }
}

/// One foreign-key column mapping carried on a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Column on the dependent table.
    pub foreign_key_column: String,

    /// Column on the principal table.
    pub primary_key_column: String,

    /// ON DELETE action, carried through unchanged.
    pub delete_rule: ReferentialRule,

    /// ON UPDATE action, carried through unchanged.
    pub update_rule: ReferentialRule,
}

/// Description of the junction table of a many-to-many relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionTableInfo {
    /// Junction table name.
    pub table_name: String,

    /// All foreign-key columns of the junction, in declaration order.
    pub source_key_columns: Vec<String>,

    /// Payload columns not participating in any foreign key.
    pub additional_columns: Vec<String>,
}

/// A classified, directed relationship between two tables.
///
/// Built once by the analyzer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship kind.
    pub kind: RelationshipKind,

    /// Source end. For `OneToMany` this is the principal ("one") side.
    pub source_table: String,

    /// Target end.
    pub target_table: String,

    /// Foreign-key column mappings, one per pair for composite keys.
    pub foreign_keys: Vec<ForeignKeyInfo>,

    /// Junction description, present only for `ManyToMany`.
    pub junction: Option<JunctionTableInfo>,
}

impl Relationship {
    /// An `Unknown` relationship between the given pair.
    pub fn unknown(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            kind: RelationshipKind::Unknown,
            source_table: source_table.into(),
            target_table: target_table.into(),
            foreign_keys: Vec::new(),
            junction: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(RelationshipKind::ManyToMany.to_string(), "ManyToMany");
        assert_eq!(RelationshipKind::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_unknown_has_no_details() {
        let rel = Relationship::unknown("Orders", "Customers");
        assert_eq!(rel.kind, RelationshipKind::Unknown);
        assert!(rel.foreign_keys.is_empty());
        assert!(rel.junction.is_none());
    }
}
