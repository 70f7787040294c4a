//! Utilities shared by the dialect readers: catalog-row grouping, the
//! foreign-key cache, batching, and the one-to-one hint pass.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::schema::{ColumnPair, ForeignKey, Index, IndexColumn, ReferentialRule, Table};
use crate::error::Result;

/// Tables per detail batch; each batch gets a dedicated pooled connection.
pub(crate) const DETAIL_BATCH_SIZE: usize = 10;

/// Marker appended to a foreign key's comment when its single column is
/// covered by a width-1 non-primary unique index.
pub(crate) const ONE_TO_ONE_HINT: &str = " [One-to-One Relationship]";

/// One catalog row of an index listing, before grouping.
#[derive(Debug, Clone)]
pub(crate) struct IndexRow {
    pub index_name: String,
    pub is_unique: bool,
    pub is_primary_key: bool,
    pub is_disabled: bool,
    pub index_type: String,
    pub column_name: String,
    pub key_ordinal: i32,
    pub is_descending: bool,
    pub is_included: bool,
}

/// One catalog row of a foreign-key listing, before grouping.
#[derive(Debug, Clone)]
pub(crate) struct ForeignKeyRow {
    pub constraint_name: String,
    pub primary_table: String,
    pub fk_column: String,
    pub pk_column: String,
    pub delete_rule: String,
    pub update_rule: String,
    pub is_enabled: bool,
}

/// Group index rows by index name, preserving first-seen order.
///
/// Rows must arrive sorted by key ordinal within each index (the catalog
/// queries order them). Included columns are renumbered 1..m in arrival
/// order, since engines report them with a zero ordinal.
pub(crate) fn group_index_rows(rows: Vec<IndexRow>) -> Result<Vec<Index>> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<IndexRow>> = HashMap::new();

    for row in rows {
        if !grouped.contains_key(&row.index_name) {
            order.push(row.index_name.clone());
        }
        grouped.entry(row.index_name.clone()).or_default().push(row);
    }

    let mut indexes = Vec::with_capacity(order.len());
    for name in order {
        let mut rows = grouped.remove(&name).unwrap_or_default();
        rows.sort_by_key(|r| (r.is_included, r.key_ordinal));

        let first = rows.first().cloned();
        let mut included_ordinal = 0;
        let columns: Vec<IndexColumn> = rows
            .into_iter()
            .map(|r| {
                let key_ordinal = if r.is_included {
                    included_ordinal += 1;
                    included_ordinal
                } else {
                    r.key_ordinal
                };
                IndexColumn {
                    column_name: r.column_name,
                    key_ordinal,
                    is_descending: r.is_descending,
                    is_included: r.is_included,
                }
            })
            .collect();

        let first = first.expect("grouped index has at least one row");
        indexes.push(Index::new(
            name,
            first.is_unique,
            first.is_primary_key,
            first.is_disabled,
            first.index_type,
            columns,
        )?);
    }

    Ok(indexes)
}

/// Group foreign-key rows by constraint name, preserving constraint-column
/// order, and normalize the referential rules.
pub(crate) fn group_foreign_key_rows(rows: Vec<ForeignKeyRow>) -> Result<Vec<ForeignKey>> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<ForeignKeyRow>> = HashMap::new();

    for row in rows {
        if !grouped.contains_key(&row.constraint_name) {
            order.push(row.constraint_name.clone());
        }
        grouped
            .entry(row.constraint_name.clone())
            .or_default()
            .push(row);
    }

    let mut foreign_keys = Vec::with_capacity(order.len());
    for name in order {
        let rows = grouped.remove(&name).unwrap_or_default();
        let first = rows.first().expect("grouped constraint has at least one row");

        let primary_table = first.primary_table.clone();
        let delete_rule = ReferentialRule::parse(&first.delete_rule);
        let update_rule = ReferentialRule::parse(&first.update_rule);
        let is_enabled = first.is_enabled;

        let pairs: Vec<ColumnPair> = rows
            .into_iter()
            .map(|r| ColumnPair {
                fk_column: r.fk_column,
                pk_column: r.pk_column,
            })
            .collect();

        foreign_keys.push(ForeignKey::new(
            name,
            primary_table,
            pairs,
            delete_rule,
            update_rule,
            is_enabled,
        )?);
    }

    Ok(foreign_keys)
}

/// Memoizes per-table foreign-key results across repeated `read_tables`
/// invocations. Keyed by connection string and table full name so two
/// readers against different databases never alias.
pub(crate) struct ForeignKeyCache {
    inner: Mutex<HashMap<(String, String), Vec<ForeignKey>>>,
}

impl ForeignKeyCache {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, connection_string: &str, table: &str) -> Option<Vec<ForeignKey>> {
        self.inner
            .lock()
            .expect("foreign-key cache poisoned")
            .get(&(connection_string.to_string(), table.to_string()))
            .cloned()
    }

    pub(crate) fn insert(&self, connection_string: &str, table: &str, keys: Vec<ForeignKey>) {
        self.inner
            .lock()
            .expect("foreign-key cache poisoned")
            .insert((connection_string.to_string(), table.to_string()), keys);
    }

    pub(crate) fn clear(&self) {
        self.inner
            .lock()
            .expect("foreign-key cache poisoned")
            .clear();
    }
}

/// Split the enumerated tables into fixed-size detail batches.
pub(crate) fn into_batches(tables: Vec<Table>, size: usize) -> Vec<Vec<Table>> {
    let mut batches = Vec::new();
    let mut iter = tables.into_iter();
    loop {
        let batch: Vec<Table> = iter.by_ref().take(size).collect();
        if batch.is_empty() {
            break;
        }
        batches.push(batch);
    }
    batches
}

/// Record on each column the names of the indexes it participates in.
pub(crate) fn link_participating_indexes(table: &mut Table) {
    let memberships: Vec<(String, String)> = table
        .indexes
        .iter()
        .flat_map(|ix| {
            ix.columns
                .iter()
                .map(|c| (c.column_name.clone(), ix.name.clone()))
        })
        .collect();

    for (column_name, index_name) in memberships {
        if let Some(col) = table
            .columns
            .iter_mut()
            .find(|c| c.name == column_name)
        {
            if !col.participating_indexes.contains(&index_name) {
                col.participating_indexes.push(index_name);
            }
        }
    }
}

/// Append the one-to-one hint to every foreign key whose single column is
/// covered by a non-primary unique index of width 1.
pub(crate) fn apply_one_to_one_hints(tables: &mut [Table]) {
    for table in tables {
        let unique_single: Vec<String> = table
            .indexes
            .iter()
            .filter(|ix| !ix.is_primary_key && ix.is_unique && ix.key_width() == 1)
            .map(|ix| ix.key_columns()[0].to_string())
            .collect();

        for fk in &mut table.foreign_keys {
            if fk.column_pairs.len() != 1 {
                continue;
            }
            if unique_single.contains(&fk.column_pairs[0].fk_column) {
                let comment = fk.comment.get_or_insert_with(String::new);
                if !comment.ends_with(ONE_TO_ONE_HINT) {
                    comment.push_str(ONE_TO_ONE_HINT);
                }
            }
        }
    }
}
