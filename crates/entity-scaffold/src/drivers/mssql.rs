//! SQL Server schema reader.
//!
//! Reads catalog metadata through Tiberius from `sys.tables`, `sys.columns`,
//! `sys.indexes`/`sys.index_columns` and `sys.foreign_keys`/
//! `sys.foreign_key_columns`, with comments taken from extended properties.

use std::sync::Arc;

use async_trait::async_trait;
use tiberius::{Client, Config, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DatabaseProvider;
use crate::core::schema::{Column, GeneratedKind, Table};
use crate::core::traits::SchemaReader;
use crate::error::{Result, ScaffoldError};
use crate::pool::{ConnectionPool, ManagedConnection};
use crate::typemap;

use super::common::{self, ForeignKeyCache, ForeignKeyRow, IndexRow, DETAIL_BATCH_SIZE};

/// Connection-string key that enables interleaved result sets.
const MARS_KEY: &str = "MultipleActiveResultSets";

/// Ensure the connection string enables multiple active result sets.
///
/// Per-table introspection issues overlapping result iterations on one
/// logical connection, which SQL Server rejects without this flag. Returns
/// the (possibly rewritten) string and whether the flag was injected.
pub(crate) fn ensure_multiple_active_result_sets(connection_string: &str) -> (String, bool) {
    let enabled = connection_string.split(';').any(|part| {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some(key), Some(value)) => {
                key.trim().eq_ignore_ascii_case(MARS_KEY)
                    && value.trim().eq_ignore_ascii_case("true")
            }
            _ => false,
        }
    });

    if enabled {
        return (connection_string.to_string(), false);
    }

    let mut rewritten = connection_string.trim_end().trim_end_matches(';').to_string();
    if !rewritten.is_empty() {
        rewritten.push(';');
    }
    rewritten.push_str(MARS_KEY);
    rewritten.push_str("=True");
    (rewritten, true)
}

/// A pooled Tiberius connection.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    connection_string: String,
}

#[async_trait]
impl ManagedConnection for MssqlConnection {
    async fn open(connection_string: &str) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)?;
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true).ok();
        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(Self {
            client,
            connection_string: connection_string.to_string(),
        })
    }

    async fn ping(&mut self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

struct Inner {
    connection_string: String,
    schema: String,
    pool: ConnectionPool<MssqlConnection>,
    fk_cache: ForeignKeyCache,
    worker_permits: Semaphore,
}

/// SQL Server implementation of [`SchemaReader`].
#[derive(Clone)]
pub struct MssqlSchemaReader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MssqlSchemaReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlSchemaReader").finish_non_exhaustive()
    }
}

impl MssqlSchemaReader {
    /// Create a reader. The connection string is rewritten to enable MARS
    /// when the flag is missing.
    pub fn new(
        connection_string: &str,
        schema: Option<&str>,
        max_connections: usize,
    ) -> Result<Self> {
        let (connection_string, injected) =
            ensure_multiple_active_result_sets(connection_string);
        if injected {
            warn!(
                "Connection string does not enable {}; enabling it \
                 (required for interleaved catalog reads)",
                MARS_KEY
            );
        }

        Ok(Self {
            inner: Arc::new(Inner {
                pool: ConnectionPool::new(max_connections)?,
                connection_string,
                schema: schema.unwrap_or("dbo").to_string(),
                fk_cache: ForeignKeyCache::new(),
                worker_permits: Semaphore::new(max_connections),
            }),
        })
    }

    /// The effective connection string, after MARS enforcement.
    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    async fn enumerate_tables(&self, conn: &mut MssqlConnection) -> Result<Vec<Table>> {
        let sql = r#"
            SELECT s.name, t.name, CAST(ep.value AS NVARCHAR(4000)) AS comment
            FROM sys.tables t
            JOIN sys.schemas s ON t.schema_id = s.schema_id
            LEFT JOIN sys.extended_properties ep
                ON ep.class = 1 AND ep.major_id = t.object_id AND ep.minor_id = 0
                AND ep.name = 'MS_Description'
            WHERE s.name = @P1 AND t.is_ms_shipped = 0
            ORDER BY t.name
        "#;

        let mut query = Query::new(sql);
        query.bind(self.inner.schema.as_str());

        let stream = query.query(&mut conn.client).await?;
        let rows = stream.into_first_result().await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let mut table = Table::new(
                row.get::<&str, _>(0).unwrap_or_default(),
                row.get::<&str, _>(1).unwrap_or_default(),
            );
            table.comment = row.get::<&str, _>(2).map(str::to_string);
            tables.push(table);
        }
        Ok(tables)
    }

    async fn read_columns(&self, conn: &mut MssqlConnection, table: &mut Table) -> Result<()> {
        let sql = r#"
            SELECT
                c.name,
                t.name AS type_name,
                CAST(c.max_length AS INT) AS max_length,
                CAST(c.[precision] AS INT) AS [precision],
                CAST(c.[scale] AS INT) AS [scale],
                c.is_nullable,
                c.is_identity,
                c.is_computed,
                cc.definition AS computed_definition,
                c.collation_name,
                dc.definition AS default_definition,
                CASE WHEN pk.column_id IS NULL THEN 0 ELSE 1 END AS is_primary_key,
                CAST(ROW_NUMBER() OVER (ORDER BY c.column_id) AS INT) AS ordinal,
                CAST(ep.value AS NVARCHAR(4000)) AS comment
            FROM sys.columns c
            JOIN sys.tables tb ON c.object_id = tb.object_id
            JOIN sys.schemas s ON tb.schema_id = s.schema_id
            JOIN sys.types t ON c.user_type_id = t.user_type_id
            LEFT JOIN sys.computed_columns cc
                ON cc.object_id = c.object_id AND cc.column_id = c.column_id
            LEFT JOIN sys.default_constraints dc
                ON dc.parent_object_id = c.object_id AND dc.parent_column_id = c.column_id
            LEFT JOIN (
                SELECT ic.object_id, ic.column_id
                FROM sys.indexes i
                JOIN sys.index_columns ic
                    ON ic.object_id = i.object_id AND ic.index_id = i.index_id
                WHERE i.is_primary_key = 1
            ) pk ON pk.object_id = c.object_id AND pk.column_id = c.column_id
            LEFT JOIN sys.extended_properties ep
                ON ep.class = 1 AND ep.major_id = c.object_id AND ep.minor_id = c.column_id
                AND ep.name = 'MS_Description'
            WHERE s.name = @P1 AND tb.name = @P2
            ORDER BY c.column_id
        "#;

        let mut query = Query::new(sql);
        query.bind(table.schema.as_str());
        query.bind(table.name.as_str());

        let stream = query.query(&mut conn.client).await?;
        let rows = stream.into_first_result().await?;

        for row in rows {
            let vendor = row.get::<&str, _>(1).unwrap_or_default().to_string();
            let is_computed = row.get::<bool, _>(7).unwrap_or(false);
            let decimal = typemap::is_decimal_family(&vendor);

            let column = Column {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                data_type: typemap::from_sql_server(&vendor).token().to_string(),
                is_nullable: row.get::<bool, _>(5).unwrap_or(false),
                is_primary_key: row.get::<i32, _>(11).unwrap_or(0) == 1,
                is_identity: row.get::<bool, _>(6).unwrap_or(false),
                is_computed,
                computed_expression: row.get::<&str, _>(8).map(str::to_string),
                is_row_version: matches!(
                    vendor.to_lowercase().as_str(),
                    "timestamp" | "rowversion"
                ),
                max_length: mssql_max_length(&vendor, row.get::<i32, _>(2).unwrap_or(0)),
                precision: decimal.then(|| row.get::<i32, _>(3).unwrap_or(0)),
                scale: decimal.then(|| row.get::<i32, _>(4).unwrap_or(0)),
                default_value: row.get::<&str, _>(10).map(str::to_string),
                collation: row.get::<&str, _>(9).map(str::to_string),
                generated_kind: is_computed.then_some(GeneratedKind::Computed),
                comment: row.get::<&str, _>(13).map(str::to_string),
                ordinal: row.get::<i32, _>(12).unwrap_or(0),
                participating_indexes: Vec::new(),
                vendor_type: vendor,
            };
            table.columns.push(column);
        }

        debug!("Loaded {} columns for {}", table.columns.len(), table.full_name());
        Ok(())
    }

    async fn read_indexes(&self, conn: &mut MssqlConnection, table: &mut Table) -> Result<()> {
        let sql = r#"
            SELECT
                i.name,
                i.is_unique,
                i.is_primary_key,
                i.is_disabled,
                i.type_desc,
                col.name AS column_name,
                CAST(ic.key_ordinal AS INT) AS key_ordinal,
                ic.is_descending_key,
                ic.is_included_column
            FROM sys.indexes i
            JOIN sys.index_columns ic
                ON ic.object_id = i.object_id AND ic.index_id = i.index_id
            JOIN sys.columns col
                ON col.object_id = ic.object_id AND col.column_id = ic.column_id
            JOIN sys.tables tb ON i.object_id = tb.object_id
            JOIN sys.schemas s ON tb.schema_id = s.schema_id
            WHERE s.name = @P1 AND tb.name = @P2 AND i.type > 0 AND i.name IS NOT NULL
            ORDER BY i.name, ic.is_included_column, ic.key_ordinal
        "#;

        let mut query = Query::new(sql);
        query.bind(table.schema.as_str());
        query.bind(table.name.as_str());

        let stream = query.query(&mut conn.client).await?;
        let rows = stream.into_first_result().await?;

        let mut index_rows = Vec::with_capacity(rows.len());
        for row in rows {
            index_rows.push(IndexRow {
                index_name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                is_unique: row.get::<bool, _>(1).unwrap_or(false),
                is_primary_key: row.get::<bool, _>(2).unwrap_or(false),
                is_disabled: row.get::<bool, _>(3).unwrap_or(false),
                index_type: row.get::<&str, _>(4).unwrap_or_default().to_string(),
                column_name: row.get::<&str, _>(5).unwrap_or_default().to_string(),
                key_ordinal: row.get::<i32, _>(6).unwrap_or(0),
                is_descending: row.get::<bool, _>(7).unwrap_or(false),
                is_included: row.get::<bool, _>(8).unwrap_or(false),
            });
        }

        table.indexes = common::group_index_rows(index_rows)?;
        debug!("Loaded {} indexes for {}", table.indexes.len(), table.full_name());
        Ok(())
    }

    async fn read_foreign_keys(&self, conn: &mut MssqlConnection, table: &mut Table) -> Result<()> {
        let full_name = table.full_name();
        if let Some(cached) = self
            .inner
            .fk_cache
            .get(&self.inner.connection_string, &full_name)
        {
            debug!("Foreign keys for {} served from cache", full_name);
            table.foreign_keys = cached;
            return Ok(());
        }

        let sql = r#"
            SELECT
                fk.name,
                rt.name AS ref_table,
                pc.name AS fk_column,
                rc.name AS pk_column,
                fk.delete_referential_action_desc,
                fk.update_referential_action_desc,
                fk.is_disabled
            FROM sys.foreign_keys fk
            JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
            JOIN sys.columns pc
                ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
            JOIN sys.columns rc
                ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
            JOIN sys.tables pt ON fk.parent_object_id = pt.object_id
            JOIN sys.schemas ps ON pt.schema_id = ps.schema_id
            JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
            WHERE ps.name = @P1 AND pt.name = @P2
            ORDER BY fk.name, fkc.constraint_column_id
        "#;

        let mut query = Query::new(sql);
        query.bind(table.schema.as_str());
        query.bind(table.name.as_str());

        let stream = query.query(&mut conn.client).await?;
        let rows = stream.into_first_result().await?;

        let mut fk_rows = Vec::with_capacity(rows.len());
        for row in rows {
            fk_rows.push(ForeignKeyRow {
                constraint_name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                primary_table: row.get::<&str, _>(1).unwrap_or_default().to_string(),
                fk_column: row.get::<&str, _>(2).unwrap_or_default().to_string(),
                pk_column: row.get::<&str, _>(3).unwrap_or_default().to_string(),
                delete_rule: row.get::<&str, _>(4).unwrap_or_default().to_string(),
                update_rule: row.get::<&str, _>(5).unwrap_or_default().to_string(),
                is_enabled: !row.get::<bool, _>(6).unwrap_or(false),
            });
        }

        let foreign_keys = common::group_foreign_key_rows(fk_rows)?;
        self.inner
            .fk_cache
            .insert(&self.inner.connection_string, &full_name, foreign_keys.clone());
        table.foreign_keys = foreign_keys;

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            full_name
        );
        Ok(())
    }

    async fn read_table_detail(
        &self,
        conn: &mut MssqlConnection,
        table: &mut Table,
    ) -> Result<()> {
        self.read_columns(conn, table).await?;
        self.read_indexes(conn, table).await?;
        self.read_foreign_keys(conn, table).await?;
        table.validate()?;
        common::link_participating_indexes(table);
        Ok(())
    }

    async fn read_batch(
        &self,
        batch: Vec<Table>,
        cancel: CancellationToken,
    ) -> Result<Vec<Table>> {
        // Cap concurrent workers at the pool ceiling so parallel batches
        // queue for a slot instead of exhausting the pool.
        let _permit = self
            .inner
            .worker_permits
            .acquire()
            .await
            .map_err(|e| ScaffoldError::pool(e.to_string(), "waiting for a batch worker slot"))?;
        let mut conn = self
            .inner
            .pool
            .acquire(&self.inner.connection_string)
            .await?;

        let mut done = Vec::with_capacity(batch.len());
        for mut table in batch {
            if cancel.is_cancelled() {
                self.inner.pool.release(conn).await;
                return Err(ScaffoldError::Cancelled);
            }
            match self.read_table_detail(&mut conn, &mut table).await {
                Ok(()) => done.push(table),
                Err(e @ ScaffoldError::Schema { .. }) => {
                    warn!("Skipping table {}: {}", table.full_name(), e);
                }
                Err(e) => {
                    self.inner.pool.release(conn).await;
                    return Err(e);
                }
            }
        }

        self.inner.pool.release(conn).await;
        Ok(done)
    }
}

#[async_trait]
impl SchemaReader for MssqlSchemaReader {
    async fn read_tables(&self, cancel: &CancellationToken) -> Result<Vec<Table>> {
        let mut conn = self
            .inner
            .pool
            .acquire(&self.inner.connection_string)
            .await?;
        let entries = match self.enumerate_tables(&mut conn).await {
            Ok(entries) => {
                self.inner.pool.release(conn).await;
                entries
            }
            Err(e) => {
                self.inner.pool.release(conn).await;
                self.inner.pool.clear().await;
                return Err(e);
            }
        };
        info!(
            "Enumerated {} tables in schema '{}'",
            entries.len(),
            self.inner.schema
        );

        let mut futs = Vec::new();
        for batch in common::into_batches(entries, DETAIL_BATCH_SIZE) {
            let reader = self.clone();
            let cancel = cancel.clone();
            let handle = tokio::spawn(async move { reader.read_batch(batch, cancel).await });
            futs.push(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) if e.is_cancelled() => Err(ScaffoldError::Cancelled),
                    Err(e) => Err(ScaffoldError::pool(e.to_string(), "joining schema batch worker")),
                }
            });
        }

        match futures::future::try_join_all(futs).await {
            Ok(batches) => {
                let mut tables: Vec<Table> = batches.into_iter().flatten().collect();
                common::apply_one_to_one_hints(&mut tables);
                info!("Read {} tables from SQL Server", tables.len());
                Ok(tables)
            }
            Err(e) => {
                self.inner.pool.clear().await;
                Err(e)
            }
        }
    }

    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::SqlServer
    }

    async fn close(&self) {
        self.inner.pool.clear().await;
        self.inner.fk_cache.clear();
    }
}

/// Normalize `sys.columns.max_length` for sized types.
///
/// `n(var)char` report bytes; halve them to characters. Unbounded columns
/// keep the catalog's -1.
fn mssql_max_length(vendor: &str, raw: i32) -> Option<i32> {
    match vendor.to_lowercase().as_str() {
        "nchar" | "nvarchar" => Some(if raw > 0 { raw / 2 } else { raw }),
        "char" | "varchar" | "binary" | "varbinary" => Some(raw),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_CS: &str = "Server=tcp:localhost,1433;Database=Northwind;User Id=sa;Password=p";

    #[test]
    fn test_mars_injected_when_missing() {
        let (rewritten, injected) = ensure_multiple_active_result_sets(BASE_CS);
        assert!(injected);
        assert!(rewritten.ends_with("MultipleActiveResultSets=True"));
        assert!(rewritten.starts_with(BASE_CS));
    }

    #[test]
    fn test_mars_preserved_when_present() {
        let cs = format!("{};MultipleActiveResultSets=true", BASE_CS);
        let (rewritten, injected) = ensure_multiple_active_result_sets(&cs);
        assert!(!injected);
        assert_eq!(rewritten, cs);
    }

    #[test]
    fn test_mars_false_is_rewritten() {
        let cs = format!("{};MultipleActiveResultSets=False", BASE_CS);
        let (_, injected) = ensure_multiple_active_result_sets(&cs);
        assert!(injected);
    }

    #[test]
    fn test_mars_handles_trailing_semicolon() {
        let cs = format!("{};", BASE_CS);
        let (rewritten, injected) = ensure_multiple_active_result_sets(&cs);
        assert!(injected);
        assert!(!rewritten.contains(";;"));
    }

    #[test]
    fn test_reader_construction_injects_mars() {
        let reader = MssqlSchemaReader::new(BASE_CS, None, 4).unwrap();
        assert!(reader
            .connection_string()
            .contains("MultipleActiveResultSets=True"));
        assert_eq!(reader.provider(), DatabaseProvider::SqlServer);
    }

    #[test]
    fn test_max_length_halved_for_unicode_types() {
        assert_eq!(mssql_max_length("nvarchar", 100), Some(50));
        assert_eq!(mssql_max_length("nvarchar", -1), Some(-1));
        assert_eq!(mssql_max_length("varchar", 100), Some(100));
        assert_eq!(mssql_max_length("varbinary", -1), Some(-1));
        assert_eq!(mssql_max_length("int", 4), None);
    }
}
