//! Dialect reader implementations.
//!
//! One module per supported engine plus shared utilities:
//!
//! - [`mssql`]: SQL Server reader (Tiberius)
//! - [`mysql`]: MySQL/MariaDB reader (SQLx)
//! - [`postgres`]: PostgreSQL reader (tokio-postgres)
//! - [`common`]: row grouping, foreign-key cache, batching
//!
//! [`SchemaReaderImpl`] provides enum-based static dispatch over the three
//! readers; [`SchemaReaderImpl::from_provider_name`] is the factory that
//! discriminates on the ADO provider-name token.

pub(crate) mod common;
pub mod mssql;
pub mod mysql;
pub mod postgres;

pub use mssql::MssqlSchemaReader;
pub use mysql::MySqlSchemaReader;
pub use postgres::PostgresSchemaReader;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::{DatabaseProvider, GeneratorConfig};
use crate::core::schema::Table;
use crate::core::traits::SchemaReader;
use crate::error::Result;

/// Enum-based static dispatch over the dialect readers.
#[derive(Debug)]
pub enum SchemaReaderImpl {
    SqlServer(MssqlSchemaReader),
    MySql(MySqlSchemaReader),
    Postgres(PostgresSchemaReader),
}

impl SchemaReaderImpl {
    /// Select a reader from a provider-name discriminator (case-insensitive).
    ///
    /// Recognized tokens: `microsoft.data.sqlclient`, `mysql.data.mysqlclient`,
    /// `npgsql`. Any other token fails with an unsupported-provider error.
    pub fn from_provider_name(
        provider_name: &str,
        connection_string: &str,
        schema: Option<&str>,
        max_connections: usize,
    ) -> Result<Self> {
        match DatabaseProvider::from_provider_name(provider_name)? {
            DatabaseProvider::SqlServer => Ok(Self::SqlServer(MssqlSchemaReader::new(
                connection_string,
                schema,
                max_connections,
            )?)),
            DatabaseProvider::MySql => Ok(Self::MySql(MySqlSchemaReader::new(
                connection_string,
                schema,
                max_connections,
            )?)),
            DatabaseProvider::PostgreSql => Ok(Self::Postgres(PostgresSchemaReader::new(
                connection_string,
                schema,
                max_connections,
            )?)),
        }
    }

    /// Build the reader configured by a resolved [`GeneratorConfig`].
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Self::from_provider_name(
            config.provider.provider_name(),
            &config.connection_string,
            config.schema.as_deref(),
            config.max_connections,
        )
    }
}

#[async_trait]
impl SchemaReader for SchemaReaderImpl {
    async fn read_tables(&self, cancel: &CancellationToken) -> Result<Vec<Table>> {
        match self {
            Self::SqlServer(r) => r.read_tables(cancel).await,
            Self::MySql(r) => r.read_tables(cancel).await,
            Self::Postgres(r) => r.read_tables(cancel).await,
        }
    }

    fn provider(&self) -> DatabaseProvider {
        match self {
            Self::SqlServer(r) => r.provider(),
            Self::MySql(r) => r.provider(),
            Self::Postgres(r) => r.provider(),
        }
    }

    async fn close(&self) {
        match self {
            Self::SqlServer(r) => r.close().await,
            Self::MySql(r) => r.close().await,
            Self::Postgres(r) => r.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_recognizes_provider_tokens() {
        let reader = SchemaReaderImpl::from_provider_name(
            "Microsoft.Data.SqlClient",
            "Server=tcp:localhost,1433;Database=d;User Id=sa;Password=p",
            None,
            4,
        )
        .unwrap();
        assert_eq!(reader.provider(), DatabaseProvider::SqlServer);

        let reader = SchemaReaderImpl::from_provider_name(
            "mysql.data.mysqlclient",
            "mysql://root:p@localhost/d",
            None,
            4,
        )
        .unwrap();
        assert_eq!(reader.provider(), DatabaseProvider::MySql);

        let reader = SchemaReaderImpl::from_provider_name(
            "Npgsql",
            "host=localhost user=pg dbname=d",
            None,
            4,
        )
        .unwrap();
        assert_eq!(reader.provider(), DatabaseProvider::PostgreSql);
    }

    #[test]
    fn test_factory_rejects_unsupported_provider() {
        let err = SchemaReaderImpl::from_provider_name("UnsupportedProvider", "x", None, 4)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unsupported provider"));
        assert!(msg.contains("UnsupportedProvider"));
    }
}
