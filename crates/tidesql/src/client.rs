//! Driver traits.
//!
//! The router talks to the database only through [`Connector`] (opens
//! connections) and [`Connection`] (runs statements on one connection).
//! Implement both for a concrete MySQL driver; tests use an in-memory one.

use crate::config::ConnectTarget;
use crate::error::DbResult;
use crate::params::Params;
use crate::row::Row;
use crate::value::Value;

/// One live driver connection.
///
/// SQL reaching these methods has already had its identifier markers resolved
/// and its placeholders normalized.
pub trait Connection: Send + Sync + 'static {
    /// Prepare and execute a statement, returning the affected row count.
    fn execute(
        &self,
        sql: &str,
        params: &Params,
    ) -> impl std::future::Future<Output = DbResult<u64>> + Send;

    /// Prepare and execute a query, returning all rows.
    fn fetch_all(
        &self,
        sql: &str,
        params: &Params,
    ) -> impl std::future::Future<Output = DbResult<Vec<Row>>> + Send;

    /// The identifier generated by the most recent INSERT on this connection.
    fn last_insert_id(&self) -> impl std::future::Future<Output = DbResult<u64>> + Send;

    /// Quote a value as a literal for debug rendering.
    ///
    /// The default implementation uses MySQL escaping rules.
    fn quote_literal(&self, value: &Value) -> String {
        value.to_sql_literal()
    }

    /// Start a transaction.
    fn begin(&self) -> impl std::future::Future<Output = DbResult<()>> + Send {
        async move {
            self.execute("START TRANSACTION", &Params::new()).await?;
            Ok(())
        }
    }

    /// Commit the current transaction.
    fn commit(&self) -> impl std::future::Future<Output = DbResult<()>> + Send {
        async move {
            self.execute("COMMIT", &Params::new()).await?;
            Ok(())
        }
    }

    /// Roll back the current transaction.
    fn rollback(&self) -> impl std::future::Future<Output = DbResult<()>> + Send {
        async move {
            self.execute("ROLLBACK", &Params::new()).await?;
            Ok(())
        }
    }
}

/// Opens driver connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced.
    type Conn: Connection;

    /// Open a connection to `target`.
    ///
    /// Failures should be reported as [`DbError::Driver`](crate::DbError::Driver).
    fn connect(
        &self,
        target: &ConnectTarget,
    ) -> impl std::future::Future<Output = DbResult<Self::Conn>> + Send;
}
