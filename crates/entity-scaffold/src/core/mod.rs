//! Core schema model, relationship records, naming helpers and traits.

pub mod naming;
pub mod relationship;
pub mod schema;
pub mod traits;

pub use relationship::{ForeignKeyInfo, JunctionTableInfo, Relationship, RelationshipKind};
pub use schema::{
    Column, ColumnPair, ForeignKey, GeneratedKind, Index, IndexColumn, ReferentialRule, Table,
};
pub use traits::SchemaReader;
