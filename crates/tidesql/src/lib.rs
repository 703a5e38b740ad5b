//! # tidesql
//!
//! A micro data-access layer for MySQL-style databases.
//!
//! ## Features
//!
//! - **Fluent query builder**: table/field/where/order/limit/lock, rendered once per statement
//! - **Prefix-aware quoting**: `{{%table}}` and `[[column]]` markers resolved at dispatch
//! - **Mixed placeholders**: `?` and `:name` may appear in one statement
//! - **Primary/replica routing**: random replica with failover, reads pinned to the primary inside transactions
//! - **Entity tracking**: `save()` picks INSERT or UPDATE from what was loaded, not from the id value
//! - **Safe defaults**: UPDATE and DELETE require WHERE; values are always bound
//!
//! The database driver is pluggable through the [`Connector`] and
//! [`Connection`] traits.
//!
//! ## Query Builder
//!
//! ```ignore
//! use tidesql::{Direction, Router, ConnectionConfig};
//!
//! let router = Router::new(connector, ConnectionConfig::new("mysql:host=db;dbname=app").table_prefix("app_"));
//!
//! // SELECT * FROM `app_user` WHERE `status` = ? ORDER BY `id` DESC LIMIT 10
//! let rows = router
//!     .builder()
//!     .table("user")?
//!     .where_eq([("status", 1)])?
//!     .order_by("id", Direction::Desc)?
//!     .limit(10)
//!     .find_all()
//!     .await?;
//!
//! // INSERT and fetch the generated id
//! let id = router
//!     .builder()
//!     .table("user")?
//!     .insert_get_id([("username", "alice")])
//!     .await?;
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod ident;
pub mod log;
pub mod params;
pub mod placeholder;
pub mod router;
pub mod row;
pub mod schema;
pub mod session;
pub mod transaction;
pub mod value;

pub mod prelude;

pub use builder::{Aggregate, Builder, Combinator, Condition, Direction, QuerySpec};
pub use client::{Connection, Connector};
pub use config::{ConnectTarget, ConnectionConfig, ReplicaConfig};
pub use entity::{Entity, EntityDescriptor, EntitySnapshot, EntityTracker, Record, RecordId};
pub use error::{DbError, DbResult};
pub use ident::{quote_column, quote_sql, quote_table, resolve_prefixed_table};
pub use log::{QueryLog, QueryLogEntry, QueryType};
pub use params::Params;
pub use placeholder::normalize;
pub use router::{Handle, Router};
pub use row::{FromRow, Row};
pub use schema::{ColumnInfo, SchemaCache, TableSchema};
pub use session::{EntityQuery, Session};
pub use value::{FromValue, ToValue, Value};

#[cfg(feature = "derive")]
pub use tidesql_derive::{Entity, FromRow};
