//! Convenient imports for typical `tidesql` usage.
//!
//! ```ignore
//! use tidesql::prelude::*;
//! ```

pub use crate::{
    Combinator, Condition, Connection, ConnectionConfig, Connector, DbError, DbResult, Direction,
    Entity, FromRow, FromValue, Params, Record, ReplicaConfig, Router, Row, Session, ToValue,
    Value, params,
};
