//! Transaction helper macro.
//!
//! Transactions live on the [`Router`](crate::Router): `begin_transaction`
//! increments a depth counter, `commit` decrements it, `rollback` discards the
//! whole transaction. While the depth is non-zero every read goes to the
//! primary.
//!
//! # Example
//!
//! ```ignore
//! use tidesql::{DbResult, params};
//!
//! # async fn demo(router: &tidesql::Router<impl tidesql::Connector>) -> DbResult<()> {
//! tidesql::transaction!(router, {
//!     router
//!         .execute("UPDATE {{%account}} SET [[balance]] = [[balance]] - ? WHERE [[id]] = ?", params![100_i64, 1_i64])
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

/// Runs the given block inside a router transaction.
///
/// - Begins (or nests) via `$router.begin_transaction().await`.
/// - Commits on `Ok(_)`. A failed outermost commit is rolled back by
///   [`Router::commit`](crate::Router::commit) and its error returned.
/// - Rolls back on `Err(_)`.
///
/// No failure leaves the outermost transaction open.
///
/// The block must evaluate to `tidesql::DbResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($router:expr, $body:block) => {{
        let __tidesql_router = $router;
        __tidesql_router.begin_transaction().await?;

        let __tidesql_tx_body_result: $crate::DbResult<_> = async { $body }.await;
        match __tidesql_tx_body_result {
            Ok(value) => {
                __tidesql_router.commit().await?;
                Ok(value)
            }
            Err(error) => match __tidesql_router.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DbError::Transaction(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}
