//! PostgreSQL schema reader.
//!
//! Reads catalog metadata through tokio-postgres from `pg_class`,
//! `pg_namespace`, `pg_attribute`, `pg_index` and `pg_constraint`, with
//! comments via `obj_description`/`col_description`. Type modifiers rendered
//! by `format_type` are parsed into the column's length and precision/scale.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_postgres::NoTls;
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

/// A pooled tokio-postgres connection. The driver task is owned alongside
/// the client and winds down when the client is dropped.
pub struct PgPooledConnection {
    client: tokio_postgres::Client,
    driver: tokio::task::JoinHandle<()>,
    connection_string: String,
}

#[async_trait]
impl ManagedConnection for PgPooledConnection {
    async fn open(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("PostgreSQL connection task ended: {}", e);
            }
        });
        Ok(Self {
            client,
            driver,
            connection_string: connection_string.to_string(),
        })
    }

    async fn ping(&mut self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        drop(self.client);
        let _ = self.driver.await;
        Ok(())
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }
}

struct Inner {
    connection_string: String,
    schema: String,
    pool: ConnectionPool<PgPooledConnection>,
    fk_cache: ForeignKeyCache,
    worker_permits: Semaphore,
}

/// PostgreSQL implementation of [`SchemaReader`].
#[derive(Clone)]
pub struct PostgresSchemaReader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PostgresSchemaReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSchemaReader").finish_non_exhaustive()
    }
}

impl PostgresSchemaReader {
    pub fn new(
        connection_string: &str,
        schema: Option<&str>,
        max_connections: usize,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Inner {
                pool: ConnectionPool::new(max_connections)?,
                connection_string: connection_string.to_string(),
                schema: schema.unwrap_or("public").to_string(),
                fk_cache: ForeignKeyCache::new(),
                worker_permits: Semaphore::new(max_connections),
            }),
        })
    }

    async fn enumerate_tables(&self, conn: &mut PgPooledConnection) -> Result<Vec<Table>> {
        let sql = r#"
            SELECT n.nspname, c.relname, obj_description(c.oid, 'pg_class')
            FROM pg_catalog.pg_class c
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind = 'r' AND n.nspname = $1
            ORDER BY c.relname
        "#;

        let rows = conn.client.query(sql, &[&self.inner.schema]).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let mut table = Table::new(row.get::<_, String>(0), row.get::<_, String>(1));
            table.comment = row.get::<_, Option<String>>(2);
            tables.push(table);
        }
        Ok(tables)
    }

    async fn read_columns(&self, conn: &mut PgPooledConnection, table: &mut Table) -> Result<()> {
        let sql = r#"
            SELECT
                a.attname,
                format_type(a.atttypid, a.atttypmod) AS formatted_type,
                NOT a.attnotnull AS is_nullable,
                a.attidentity != '' AS is_identity,
                a.attgenerated != '' AS is_generated,
                CASE WHEN a.atthasdef THEN pg_get_expr(ad.adbin, ad.adrelid) END AS expr,
                co.collname AS collation_name,
                EXISTS (
                    SELECT 1 FROM pg_catalog.pg_index i
                    WHERE i.indrelid = a.attrelid AND i.indisprimary
                      AND a.attnum = ANY(i.indkey)
                ) AS is_primary_key,
                CAST(ROW_NUMBER() OVER (ORDER BY a.attnum) AS INT4) AS ordinal,
                col_description(a.attrelid, a.attnum) AS comment
            FROM pg_catalog.pg_attribute a
            JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
            LEFT JOIN pg_catalog.pg_attrdef ad
                ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum
            LEFT JOIN pg_catalog.pg_collation co
                ON co.oid = a.attcollation AND co.collname <> 'default'
            WHERE n.nspname = $1 AND c.relname = $2
              AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum
        "#;

        let rows = conn
            .client
            .query(sql, &[&table.schema, &table.name])
            .await?;

        for row in rows {
            let formatted: String = row.get(1);
            let parts = typemap::parse_pg_type(&formatted);
            let decimal = typemap::is_decimal_family(&parts.base);
            let is_generated: bool = row.get(4);
            let expr: Option<String> = row.get(5);

            let max_length = if typemap::is_character_varying_family(&parts.base) {
                // Unbounded varchar renders without a modifier.
                Some(parts.length.unwrap_or(-1))
            } else {
                parts.length
            };

            let column = Column {
                name: row.get(0),
                data_type: typemap::from_postgres(&parts.base).token().to_string(),
                is_nullable: row.get(2),
                is_primary_key: row.get(7),
                is_identity: row.get(3),
                is_computed: is_generated,
                computed_expression: if is_generated { expr.clone() } else { None },
                is_row_version: false,
                max_length,
                // Unconstrained numeric renders without a modifier; report
                // zero like the information schema does.
                precision: decimal.then(|| parts.precision.unwrap_or(0)),
                scale: decimal.then(|| parts.scale.unwrap_or(0)),
                default_value: if is_generated { None } else { expr },
                collation: row.get(6),
                generated_kind: pg_generated_kind(row.get(3), is_generated),
                comment: row.get(9),
                ordinal: row.get::<_, i32>(8),
                participating_indexes: Vec::new(),
                vendor_type: parts.base,
            };
            table.columns.push(column);
        }

        debug!("Loaded {} columns for {}", table.columns.len(), table.full_name());
        Ok(())
    }

    async fn read_indexes(&self, conn: &mut PgPooledConnection, table: &mut Table) -> Result<()> {
        let sql = r#"
            SELECT
                ic.relname AS index_name,
                ix.indisunique,
                ix.indisprimary,
                NOT ix.indisvalid AS is_disabled,
                am.amname AS index_type,
                a.attname AS column_name,
                CAST(k.ord AS INT4) AS key_ordinal,
                (ix.indoption[(k.ord - 1)::int4] & 1) = 1 AS is_descending,
                k.ord > ix.indnkeyatts AS is_included
            FROM pg_catalog.pg_index ix
            JOIN pg_catalog.pg_class ic ON ic.oid = ix.indexrelid
            JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_am am ON am.oid = ic.relam
            JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
            JOIN pg_catalog.pg_attribute a
                ON a.attrelid = t.oid AND a.attnum = k.attnum
            WHERE n.nspname = $1 AND t.relname = $2
            ORDER BY ic.relname, k.ord
        "#;

        let rows = conn
            .client
            .query(sql, &[&table.schema, &table.name])
            .await?;

        let mut index_rows = Vec::with_capacity(rows.len());
        for row in rows {
            index_rows.push(IndexRow {
                index_name: row.get(0),
                is_unique: row.get(1),
                is_primary_key: row.get(2),
                is_disabled: row.get(3),
                index_type: row.get(4),
                column_name: row.get(5),
                key_ordinal: row.get::<_, i32>(6),
                is_descending: row.get(7),
                is_included: row.get(8),
            });
        }

        table.indexes = common::group_index_rows(index_rows)?;
        debug!("Loaded {} indexes for {}", table.indexes.len(), table.full_name());
        Ok(())
    }

    async fn read_foreign_keys(
        &self,
        conn: &mut PgPooledConnection,
        table: &mut Table,
    ) -> Result<()> {
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
                con.conname,
                rt.relname AS ref_table,
                src.attname AS fk_column,
                rc.attname AS pk_column,
                CASE con.confdeltype
                    WHEN 'a' THEN 'NO ACTION'
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET NULL'
                    WHEN 'd' THEN 'SET DEFAULT'
                    ELSE 'NO ACTION'
                END AS delete_rule,
                CASE con.confupdtype
                    WHEN 'a' THEN 'NO ACTION'
                    WHEN 'r' THEN 'RESTRICT'
                    WHEN 'c' THEN 'CASCADE'
                    WHEN 'n' THEN 'SET NULL'
                    WHEN 'd' THEN 'SET DEFAULT'
                    ELSE 'NO ACTION'
                END AS update_rule,
                con.convalidated
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = con.confrelid
            JOIN LATERAL unnest(con.conkey, con.confkey)
                WITH ORDINALITY AS pairs(src_attnum, ref_attnum, ord) ON true
            JOIN pg_catalog.pg_attribute src
                ON src.attrelid = con.conrelid AND src.attnum = pairs.src_attnum
            JOIN pg_catalog.pg_attribute rc
                ON rc.attrelid = con.confrelid AND rc.attnum = pairs.ref_attnum
            WHERE n.nspname = $1 AND t.relname = $2 AND con.contype = 'f'
            ORDER BY con.conname, pairs.ord
        "#;

        let rows = conn
            .client
            .query(sql, &[&table.schema, &table.name])
            .await?;

        let mut fk_rows = Vec::with_capacity(rows.len());
        for row in rows {
            fk_rows.push(ForeignKeyRow {
                constraint_name: row.get(0),
                primary_table: row.get(1),
                fk_column: row.get(2),
                pk_column: row.get(3),
                delete_rule: row.get(4),
                update_rule: row.get(5),
                is_enabled: row.get(6),
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
        conn: &mut PgPooledConnection,
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
impl SchemaReader for PostgresSchemaReader {
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
                info!("Read {} tables from PostgreSQL", tables.len());
                Ok(tables)
            }
            Err(e) => {
                self.inner.pool.clear().await;
                Err(e)
            }
        }
    }

    fn provider(&self) -> DatabaseProvider {
        DatabaseProvider::PostgreSql
    }

    async fn close(&self) {
        self.inner.pool.clear().await;
        self.inner.fk_cache.clear();
    }
}

/// Identity columns report `attidentity`, generated ones `attgenerated`;
/// PostgreSQL stored generation is the only kind it supports.
fn pg_generated_kind(is_identity: bool, is_generated: bool) -> Option<GeneratedKind> {
    if is_generated {
        Some(GeneratedKind::Stored)
    } else if is_identity {
        Some(GeneratedKind::Always)
    } else {
        None
    }
}
