//! Core traits for database-agnostic schema introspection.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::DatabaseProvider;
use crate::error::Result;

use super::schema::Table;

/// Reads schema metadata from a live database.
///
/// Implementations issue dialect-specific catalog queries and normalize the
/// results into the uniform schema model. One implementation exists per
/// supported engine; `SchemaReaderImpl` provides enum-based dispatch over
/// them.
#[async_trait]
pub trait SchemaReader: Send + Sync {
    /// Read every user table of the configured schema, with columns, indexes
    /// and foreign keys populated and one-to-one hints applied.
    ///
    /// Tables are returned in the enumeration query's order. A catalog query
    /// failure aborts the call; tables whose metadata violates model
    /// invariants are logged and skipped instead.
    async fn read_tables(&self, cancel: &CancellationToken) -> Result<Vec<Table>>;

    /// The provider this reader talks to.
    fn provider(&self) -> DatabaseProvider;

    /// Drain the connection pool and drop cached metadata.
    async fn close(&self);
}
