//! Relationship classification over the schema graph.
//!
//! Classifies ordered table pairs as one of Unknown, OneToOne, OneToMany or
//! ManyToMany, identifies junction tables, and assigns the principal and
//! dependent ends. The analyzer is stateless and a pure function of its
//! inputs; repeated invocations return equal relationships.

use std::collections::HashSet;

use tracing::warn;

use crate::core::relationship::{
    ForeignKeyInfo, JunctionTableInfo, Relationship, RelationshipKind,
};
use crate::core::schema::{ForeignKey, Table};
use crate::error::{Result, ScaffoldError};

/// A junction table may carry at most this many payload columns beyond its
/// key columns.
pub const JUNCTION_EXTRA_COLUMN_LIMIT: usize = 3;

/// Stateless classifier for table pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationshipAnalyzer;

impl RelationshipAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Classify the relationship from `source` (the FK-bearing candidate) to
    /// `target`.
    ///
    /// Unnamed tables are an invalid-argument error. Any internal fault
    /// downgrades the result to `Unknown` with a logged warning; the caller
    /// never fails because of analysis.
    pub fn analyze(&self, source: &Table, target: &Table) -> Result<Relationship> {
        if source.name.trim().is_empty() || target.name.trim().is_empty() {
            return Err(ScaffoldError::Relationship(
                "both tables must be named".to_string(),
            ));
        }
        if source.columns.is_empty() {
            warn!("Table {} has no columns", source.full_name());
        }

        match self.classify(source, target) {
            Ok(relationship) => Ok(relationship),
            Err(e) => {
                warn!(
                    "Analysis of ({}, {}) downgraded to Unknown: {}",
                    source.name, target.name, e
                );
                Ok(Relationship::unknown(&source.name, &target.name))
            }
        }
    }

    fn classify(&self, source: &Table, target: &Table) -> Result<Relationship> {
        let candidates = matching_foreign_keys(source, target);
        let Some(fk) = candidates.into_iter().next() else {
            return Ok(Relationship::unknown(&source.name, &target.name));
        };

        let foreign_keys: Vec<ForeignKeyInfo> = fk
            .column_pairs
            .iter()
            .map(|pair| ForeignKeyInfo {
                foreign_key_column: pair.fk_column.clone(),
                primary_key_column: pair.pk_column.clone(),
                delete_rule: fk.delete_rule,
                update_rule: fk.update_rule,
            })
            .collect();

        if is_junction_table(source) {
            return Ok(Relationship {
                kind: RelationshipKind::ManyToMany,
                source_table: fk.primary_table.clone(),
                target_table: source.name.clone(),
                foreign_keys,
                junction: Some(junction_info(source)),
            });
        }

        if has_unique_index_matching(source, fk) {
            return Ok(Relationship {
                kind: RelationshipKind::OneToOne,
                source_table: source.name.clone(),
                target_table: target.name.clone(),
                foreign_keys,
                junction: None,
            });
        }

        // One-to-many is deliberately inverted: downstream consumers read
        // the source end as the "one" side.
        Ok(Relationship {
            kind: RelationshipKind::OneToMany,
            source_table: target.name.clone(),
            target_table: source.name.clone(),
            foreign_keys,
            junction: None,
        })
    }

    /// Classify every ordered pair and keep the usable results.
    pub fn analyze_all(&self, tables: &[Table]) -> Vec<Relationship> {
        let mut relationships = Vec::new();
        for source in tables {
            for target in tables {
                match self.analyze(source, target) {
                    Ok(rel) if rel.kind != RelationshipKind::Unknown => relationships.push(rel),
                    Ok(_) => {}
                    Err(e) => warn!(
                        "Skipping pair ({}, {}): {}",
                        source.name, target.name, e
                    ),
                }
            }
        }
        relationships
    }
}

fn structurally_valid(fk: &ForeignKey) -> bool {
    !fk.column_pairs.is_empty()
        && fk
            .column_pairs
            .iter()
            .all(|p| !p.fk_column.trim().is_empty() && !p.pk_column.trim().is_empty())
}

/// Enabled, structurally valid foreign keys on `source` that reference
/// `target`.
fn matching_foreign_keys<'a>(source: &'a Table, target: &Table) -> Vec<&'a ForeignKey> {
    source
        .foreign_keys
        .iter()
        .filter(|fk| fk.is_enabled && fk.primary_table == target.name && structurally_valid(fk))
        .collect()
}

/// A junction table references at least two distinct tables, has a composite
/// primary key made entirely of foreign-key columns, and carries at most
/// [`JUNCTION_EXTRA_COLUMN_LIMIT`] payload columns.
fn is_junction_table(table: &Table) -> bool {
    let enabled: Vec<&ForeignKey> = table.foreign_keys.iter().filter(|f| f.is_enabled).collect();

    let referenced: HashSet<&str> = enabled.iter().map(|f| f.primary_table.as_str()).collect();
    if referenced.len() < 2 {
        return false;
    }

    let pk_columns = table.primary_key_columns();
    if pk_columns.len() < 2 {
        return false;
    }

    let fk_columns: HashSet<&str> = enabled
        .iter()
        .flat_map(|f| f.column_pairs.iter().map(|p| p.fk_column.as_str()))
        .collect();
    if !pk_columns
        .iter()
        .all(|c| fk_columns.contains(c.name.as_str()))
    {
        return false;
    }

    table.columns.len() - pk_columns.len() <= JUNCTION_EXTRA_COLUMN_LIMIT
}

fn junction_info(table: &Table) -> JunctionTableInfo {
    let mut source_key_columns: Vec<String> = Vec::new();
    for fk in table.foreign_keys.iter().filter(|f| f.is_enabled) {
        for pair in &fk.column_pairs {
            if !source_key_columns.contains(&pair.fk_column) {
                source_key_columns.push(pair.fk_column.clone());
            }
        }
    }

    let additional_columns = table
        .columns
        .iter()
        .filter(|c| !source_key_columns.contains(&c.name))
        .map(|c| c.name.clone())
        .collect();

    JunctionTableInfo {
        table_name: table.name.clone(),
        source_key_columns,
        additional_columns,
    }
}

/// Whether a non-primary unique index on `table` covers exactly the foreign
/// key's column set.
pub(crate) fn has_unique_index_matching(table: &Table, fk: &ForeignKey) -> bool {
    let fk_set: HashSet<&str> = fk
        .column_pairs
        .iter()
        .map(|p| p.fk_column.as_str())
        .collect();

    table.indexes.iter().any(|ix| {
        if ix.is_primary_key || !ix.is_unique {
            return false;
        }
        let key_set: HashSet<&str> = ix.key_columns().into_iter().collect();
        key_set == fk_set
    })
}
