//! # entity-scaffold
//!
//! Reverse-engineers a relational database schema into a tree of ORM source
//! artifacts: entity classes, per-entity persistence configurations, and a
//! context/registry file.
//!
//! The library concentrates on two coupled subsystems:
//!
//! - **Schema introspection**: per-engine catalog readers (SQL Server, MySQL,
//!   PostgreSQL) over a bounded connection pool, normalizing vendor metadata
//!   into one schema model with batched, parallel per-table reads.
//! - **Relationship analysis**: classification of every ordered table pair
//!   as one-to-one, one-to-many or many-to-many, with junction detection and
//!   principal/dependent assignment.
//!
//! ## Example
//!
//! ```rust,no_run
//! use entity_scaffold::{AppSettings, Generator, GeneratorConfig, Overrides};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> entity_scaffold::Result<()> {
//!     let settings = AppSettings::load("appsettings.json")?;
//!     let config = GeneratorConfig::resolve(&settings.code_generator, Overrides::default())?;
//!     let generator = Generator::new(config)?;
//!     let result = generator.run(&CancellationToken::new()).await?;
//!     println!("Wrote {} files", result.files_written);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod codegen;
pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod generator;
pub mod pool;
pub mod typemap;

// Re-exports for convenient access
pub use analyzer::RelationshipAnalyzer;
pub use codegen::Emitter;
pub use config::{
    AppSettings, CodeGeneratorConfig, DatabaseProvider, GeneratorConfig, Overrides,
};
pub use crate::core::relationship::{
    ForeignKeyInfo, JunctionTableInfo, Relationship, RelationshipKind,
};
pub use crate::core::schema::{
    Column, ColumnPair, ForeignKey, GeneratedKind, Index, IndexColumn, ReferentialRule, Table,
};
pub use crate::core::traits::SchemaReader;
pub use drivers::{
    MssqlSchemaReader, MySqlSchemaReader, PostgresSchemaReader, SchemaReaderImpl,
};
pub use error::{Result, ScaffoldError};
pub use generator::{GenerationResult, Generator};
pub use pool::{ConnectionPool, ManagedConnection, PoolStatistics};
