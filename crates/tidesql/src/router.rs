//! Connection router: primary/replica selection, transactions and the query log.
//!
//! Writes and locking reads always go to the primary. Plain reads go to a
//! replica picked at random on first use; if every replica fails to connect the
//! primary is used instead and that choice sticks for the router's lifetime.
//! While a transaction is open all reads are pinned to the primary.

use crate::client::{Connection, Connector};
use crate::config::{ConnectTarget, ConnectionConfig, ReplicaConfig};
use crate::error::{DbError, DbResult};
use crate::ident::{quote_sql, table_marker};
use crate::log::{self, QueryLog, QueryLogEntry};
use crate::params::Params;
use crate::row::{FromRow, Row};
use crate::schema::{ColumnInfo, SchemaCache, TableSchema};
use crate::value::Value;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::OnceCell;

/// A shared handle to one live connection.
pub type Handle<C> = Arc<C>;

/// Routes statements to the primary or a replica connection.
///
/// Handles are opened lazily and reused. A router is meant for one logical
/// unit of work; its state is synchronized, but an open transaction belongs to
/// whoever opened it.
pub struct Router<D: Connector> {
    connector: D,
    config: ConnectionConfig,
    primary: OnceCell<Handle<D::Conn>>,
    read: OnceCell<Handle<D::Conn>>,
    depth: AtomicUsize,
    log: Mutex<QueryLog>,
    schema: SchemaCache,
}

impl<D: Connector> Router<D> {
    /// Create a router. No connection is opened until first use.
    pub fn new(connector: D, config: ConnectionConfig) -> Self {
        let log = QueryLog::new(config.verbose_log);
        Self {
            connector,
            config,
            primary: OnceCell::new(),
            read: OnceCell::new(),
            depth: AtomicUsize::new(0),
            log: Mutex::new(log),
            schema: SchemaCache::new(),
        }
    }

    /// The configuration this router was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The configured table prefix.
    pub fn table_prefix(&self) -> &str {
        &self.config.table_prefix
    }

    /// The underlying connector.
    pub fn connector(&self) -> &D {
        &self.connector
    }

    // ==================== Handles ====================

    /// The primary handle, connecting on first use.
    pub async fn primary_handle(&self) -> DbResult<Handle<D::Conn>> {
        let handle = self
            .primary
            .get_or_try_init(|| async {
                let target = self.config.primary_target();
                let conn = self.establish(&target).await?;
                trace_connected("primary", &target);
                Ok::<_, DbError>(Arc::new(conn))
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    /// The handle for plain reads.
    ///
    /// - Inside a transaction: the primary.
    /// - A read handle already chosen: that one.
    /// - No replicas configured: the primary.
    /// - Otherwise: the first replica (in random order) that connects, or the
    ///   primary if none does. The outcome is cached.
    pub async fn read_handle(&self) -> DbResult<Handle<D::Conn>> {
        if self.transaction_depth() > 0 {
            return self.primary_handle().await;
        }
        if let Some(handle) = self.read.get() {
            return Ok(Arc::clone(handle));
        }
        if self.config.replicas.is_empty() {
            return self.primary_handle().await;
        }
        let handle = self
            .read
            .get_or_try_init(|| self.connect_replica())
            .await?;
        Ok(Arc::clone(handle))
    }

    async fn connect_replica(&self) -> DbResult<Handle<D::Conn>> {
        let mut order: Vec<&ReplicaConfig> = self.config.replicas.iter().collect();
        order.shuffle(&mut rand::thread_rng());

        for replica in order {
            let target = self.config.replica_target(replica);
            match self.establish(&target).await {
                Ok(conn) => {
                    trace_connected("replica", &target);
                    return Ok(Arc::new(conn));
                }
                Err(err) => trace_replica_failed(&target, &err),
            }
        }

        trace_replica_fallback(self.config.replicas.len());
        self.primary_handle().await
    }

    async fn establish(&self, target: &ConnectTarget) -> DbResult<D::Conn> {
        let conn = self.connector.connect(target).await?;
        if !target.charset.is_empty() {
            let charset = conn.quote_literal(&Value::from(target.charset.as_str()));
            conn.execute(&format!("SET NAMES {charset}"), &Params::new())
                .await?;
        }
        Ok(conn)
    }

    // ==================== Execution ====================

    /// Execute a write statement on the primary; returns the affected row count.
    ///
    /// `{{table}}`/`[[column]]` markers are resolved before dispatch.
    pub async fn execute(&self, sql: &str, params: impl Into<Params>) -> DbResult<u64> {
        let params = params.into();
        let sql = quote_sql(sql, &self.config.table_prefix).into_owned();
        let conn = self.primary_handle().await?;

        let start = Instant::now();
        let affected = conn.execute(&sql, &params).await?;
        self.record(sql, params, start);
        Ok(affected)
    }

    /// Run a read on the read handle (replica or primary).
    pub async fn query(&self, sql: &str, params: impl Into<Params>) -> DbResult<Vec<Row>> {
        let conn = self.read_handle().await?;
        self.fetch_on(&conn, sql, params.into()).await
    }

    /// Run a read on the primary (locking reads, read-your-writes).
    pub async fn query_primary(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> DbResult<Vec<Row>> {
        let conn = self.primary_handle().await?;
        self.fetch_on(&conn, sql, params.into()).await
    }

    /// Run a read and map every row to `T`.
    pub async fn query_as<T: FromRow>(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> DbResult<Vec<T>> {
        let rows = self.query(sql, params).await?;
        rows.iter().map(T::from_row).collect()
    }

    async fn fetch_on(&self, conn: &D::Conn, sql: &str, params: Params) -> DbResult<Vec<Row>> {
        let sql = quote_sql(sql, &self.config.table_prefix).into_owned();
        let start = Instant::now();
        let rows = conn.fetch_all(&sql, &params).await?;
        self.record(sql, params, start);
        Ok(rows)
    }

    /// The id generated by the last INSERT on the primary.
    pub async fn last_insert_id(&self) -> DbResult<u64> {
        self.primary_handle().await?.last_insert_id().await
    }

    // ==================== Transactions ====================

    /// Current transaction depth (0 = none).
    pub fn transaction_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.transaction_depth() > 0
    }

    /// Begin a transaction, or nest one level deeper in the open one.
    ///
    /// Only the outermost call reaches the driver.
    pub async fn begin_transaction(&self) -> DbResult<()> {
        if self.transaction_depth() == 0 {
            self.primary_handle().await?.begin().await?;
        }
        self.depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Leave one transaction level; the outermost level commits.
    ///
    /// When the outermost COMMIT fails a ROLLBACK is attempted. The
    /// transaction is closed either way.
    pub async fn commit(&self) -> DbResult<()> {
        match self.transaction_depth() {
            0 => Err(DbError::Transaction(
                "commit called without an active transaction".to_string(),
            )),
            1 => {
                let result = match self.primary_handle().await {
                    Ok(conn) => match conn.commit().await {
                        Ok(()) => Ok(()),
                        Err(commit_err) => match conn.rollback().await {
                            Ok(()) => Err(commit_err),
                            Err(rollback_err) => Err(DbError::Transaction(format!(
                                "{commit_err} (rollback failed: {rollback_err})"
                            ))),
                        },
                    },
                    Err(err) => Err(err),
                };
                self.depth.store(0, Ordering::SeqCst);
                result
            }
            _ => {
                self.depth.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Roll back the whole transaction, whatever the nesting depth.
    pub async fn rollback(&self) -> DbResult<()> {
        if self.transaction_depth() == 0 {
            return Err(DbError::Transaction(
                "rollback called without an active transaction".to_string(),
            ));
        }
        let result = match self.primary_handle().await {
            Ok(conn) => conn.rollback().await,
            Err(err) => Err(err),
        };
        self.depth.store(0, Ordering::SeqCst);
        result
    }

    // ==================== Schema ====================

    /// Describe a table's columns. Each table is described once per router.
    ///
    /// `table` accepts the same forms as [`Builder::table`](crate::Builder::table).
    pub async fn describe(&self, table: &str) -> DbResult<Arc<TableSchema>> {
        let marker = table_marker(table)?;
        if let Some(schema) = self.schema.get(&marker) {
            return Ok(schema);
        }
        let columns: Vec<ColumnInfo> = self
            .query_as(&format!("SHOW FULL FIELDS FROM {marker}"), Params::new())
            .await?;
        Ok(self.schema.insert(TableSchema {
            table: marker,
            columns,
        }))
    }

    /// The auto-increment column of `table`, if it has one.
    pub async fn auto_increment_column(&self, table: &str) -> DbResult<Option<String>> {
        let schema = self.describe(table).await?;
        Ok(schema.auto_increment_column().map(str::to_string))
    }

    /// The schema cache.
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema
    }

    // ==================== Query log ====================

    /// Keep every executed statement in the log.
    pub fn enable_query_log(&self) {
        self.log().set_verbose(true);
    }

    /// Keep only the most recent statement in the log.
    pub fn disable_query_log(&self) {
        self.log().set_verbose(false);
    }

    /// Retained log entries, oldest first.
    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        self.log().entries().to_vec()
    }

    /// The most recent statement with its parameters substituted, for display.
    ///
    /// Values are quoted by the primary connection if one is open; this never
    /// opens a connection itself.
    pub fn last_sql(&self) -> Option<String> {
        let entry = self.log().last().cloned()?;
        Some(match self.primary.get() {
            Some(conn) => entry.render(|v| conn.quote_literal(v)),
            None => entry.render(Value::to_sql_literal),
        })
    }

    /// Every retained statement rendered like [`Router::last_sql`].
    pub fn rendered_log(&self) -> Vec<String> {
        let entries = self.query_log();
        match self.primary.get() {
            Some(conn) => entries
                .iter()
                .map(|e| e.render(|v| conn.quote_literal(v)))
                .collect(),
            None => entries
                .iter()
                .map(|e| e.render(Value::to_sql_literal))
                .collect(),
        }
    }

    fn record(&self, sql: String, params: Params, start: Instant) {
        let entry = QueryLogEntry {
            sql,
            params,
            elapsed: start.elapsed(),
        };
        log::emit(&entry);
        self.log().record(entry);
    }

    fn log(&self) -> MutexGuard<'_, QueryLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<D: Connector> std::fmt::Debug for Router<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("primary_open", &self.primary.initialized())
            .field("read_open", &self.read.initialized())
            .field("transaction_depth", &self.transaction_depth())
            .finish()
    }
}

#[cfg(feature = "tracing")]
fn trace_connected(role: &str, target: &ConnectTarget) {
    tracing::debug!(target: "tidesql.router", role, dsn = %target.dsn, "connection established");
}

#[cfg(feature = "tracing")]
fn trace_replica_failed(target: &ConnectTarget, err: &DbError) {
    tracing::warn!(target: "tidesql.router", dsn = %target.dsn, error = %err, "replica connection failed");
}

#[cfg(feature = "tracing")]
fn trace_replica_fallback(replicas: usize) {
    tracing::warn!(target: "tidesql.router", replicas, "all replicas failed, reading from primary");
}

#[cfg(not(feature = "tracing"))]
fn trace_connected(_role: &str, _target: &ConnectTarget) {}

#[cfg(not(feature = "tracing"))]
fn trace_replica_failed(_target: &ConnectTarget, _err: &DbError) {}

#[cfg(not(feature = "tracing"))]
fn trace_replica_fallback(_replicas: usize) {}
