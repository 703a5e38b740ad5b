//! Unit of work: a router plus an entity tracker.
//!
//! Entities read through [`Session::find`] are registered with the session's
//! tracker, and [`Session::save`] uses that registration to choose between
//! INSERT and UPDATE.
//!
//! ```ignore
//! let session = Session::new(Arc::new(Router::new(connector, config)));
//!
//! let mut user = Record::new(User { id: 0, username: "a".into(), status: 0 });
//! session.save(&mut user).await?;        // INSERT, sets user.id
//! user.status = 1;
//! session.save(&mut user).await?;        // UPDATE ... WHERE id = <inserted id>
//!
//! let active = session
//!     .find::<User>()?
//!     .where_eq([("status", 1)])?
//!     .all()
//!     .await?;
//! ```

use crate::builder::{Builder, Combinator, Condition, Direction};
use crate::client::Connector;
use crate::entity::{Entity, EntityTracker, Record};
use crate::error::{DbError, DbResult};
use crate::params::Params;
use crate::router::Router;
use crate::value::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// A router and the tracker for the entities it loads.
pub struct Session<D: Connector> {
    router: Arc<Router<D>>,
    tracker: Arc<EntityTracker>,
}

impl<D: Connector> Clone for Session<D> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

impl<D: Connector> std::fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("router", &self.router)
            .field("tracker", &self.tracker)
            .finish()
    }
}

impl<D: Connector> Session<D> {
    /// A session with its own tracker.
    pub fn new(router: Arc<Router<D>>) -> Self {
        Self::with_tracker(router, Arc::new(EntityTracker::new()))
    }

    /// A session sharing an existing tracker.
    pub fn with_tracker(router: Arc<Router<D>>, tracker: Arc<EntityTracker>) -> Self {
        Self { router, tracker }
    }

    /// The router.
    pub fn router(&self) -> &Router<D> {
        &self.router
    }

    /// The entity tracker.
    pub fn tracker(&self) -> &EntityTracker {
        &self.tracker
    }

    /// An untyped query builder; rows it returns are not tracked.
    pub fn builder(&self) -> Builder<'_, D> {
        self.router.builder()
    }

    /// A tracked query over `T`'s table.
    pub fn find<T: Entity>(&self) -> DbResult<EntityQuery<'_, D, T>> {
        let mut builder = self.builder();
        builder.table(T::TABLE)?;
        Ok(EntityQuery {
            builder,
            tracker: &self.tracker,
            _entity: PhantomData,
        })
    }

    /// Whether `record` has never been loaded or saved through this session.
    pub fn is_new<T>(&self, record: &Record<T>) -> bool {
        self.tracker.is_new(record)
    }

    /// Start tracking a record as already persisted with its current values.
    pub fn attach<T: Entity>(&self, record: &Record<T>) {
        self.tracker.register_current(record);
    }

    /// INSERT a new record or UPDATE a tracked one.
    ///
    /// Insert: an unset (`NULL`/`0`) key column is left to the database and
    /// the generated id is written back. Update: the row is located by the
    /// primary key captured in the snapshot, and exactly one row must be
    /// affected. Either way the record's current values become its snapshot.
    pub async fn save<T: Entity>(&self, record: &mut Record<T>) -> DbResult<()> {
        let key = self.key_column::<T>().await?;
        match self.tracker.snapshot_of(record) {
            None => self.insert_record(record, key.as_deref()).await?,
            Some(snapshot) => {
                let key = require_key::<T>(key)?;
                let key_value = snapshot_key(&snapshot, &key)?;

                let mut qb = self.builder();
                qb.table(T::TABLE)?.where_eq([(key, key_value)])?;
                let affected = qb.update(record.values()).await?;
                if affected != 1 {
                    return Err(DbError::SaveConflict {
                        table: T::TABLE.to_string(),
                        affected,
                    });
                }
            }
        }
        self.tracker.register_current(record);
        Ok(())
    }

    async fn insert_record<T: Entity>(
        &self,
        record: &mut Record<T>,
        key: Option<&str>,
    ) -> DbResult<()> {
        let mut generated_key = None;
        let mut data = Vec::with_capacity(T::COLUMNS.len());
        for (column, value) in record.values() {
            if key == Some(column) && value.is_unset_key() {
                generated_key = Some(column);
            } else {
                data.push((column, value));
            }
        }

        let mut qb = self.builder();
        qb.table(T::TABLE)?;
        let affected = qb.insert(data).await?;
        if affected == 0 {
            return Err(DbError::SaveConflict {
                table: T::TABLE.to_string(),
                affected,
            });
        }

        if let Some(column) = generated_key {
            let id = self.router.last_insert_id().await?;
            record.set_value(column, Value::UInt(id))?;
        }
        Ok(())
    }

    /// DELETE a tracked record by its snapshot primary key and stop tracking it.
    ///
    /// Exactly one row must be affected.
    pub async fn delete<T: Entity>(&self, record: &Record<T>) -> DbResult<()> {
        let snapshot = self.tracker.snapshot_of(record).ok_or_else(|| {
            DbError::not_found(format!("{} record is not persisted", T::TABLE))
        })?;
        let key = require_key::<T>(self.key_column::<T>().await?)?;
        let key_value = snapshot_key(&snapshot, &key)?;

        let mut qb = self.builder();
        qb.table(T::TABLE)?.where_eq([(key, key_value)])?;
        let affected = qb.delete().await?;
        if affected != 1 {
            return Err(DbError::SaveConflict {
                table: T::TABLE.to_string(),
                affected,
            });
        }
        self.tracker.forget(record);
        Ok(())
    }

    async fn key_column<T: Entity>(&self) -> DbResult<Option<String>> {
        match T::PRIMARY_KEY {
            Some(column) => Ok(Some(column.to_string())),
            None => self.router.auto_increment_column(T::TABLE).await,
        }
    }
}

fn require_key<T: Entity>(key: Option<String>) -> DbResult<String> {
    key.ok_or_else(|| {
        DbError::config(format!(
            "table `{}` has no primary key column; declare one with #[orm(id)]",
            T::TABLE
        ))
    })
}

fn snapshot_key(snapshot: &crate::entity::EntitySnapshot, key: &str) -> DbResult<Value> {
    snapshot
        .value(key)
        .cloned()
        .ok_or_else(|| DbError::config(format!("primary key column `{key}` is not mapped")))
}

/// A query over one entity type whose results are tracked.
pub struct EntityQuery<'s, D: Connector, T: Entity> {
    builder: Builder<'s, D>,
    tracker: &'s EntityTracker,
    _entity: PhantomData<fn() -> T>,
}

impl<D: Connector, T: Entity> std::fmt::Debug for EntityQuery<'_, D, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityQuery")
            .field("table", &T::TABLE)
            .field("builder", &self.builder)
            .finish()
    }
}

impl<'s, D: Connector, T: Entity> EntityQuery<'s, D, T> {
    /// AND a raw condition.
    pub fn where_raw(&mut self, sql: &str, params: impl Into<Params>) -> &mut Self {
        self.builder.where_raw(sql, params);
        self
    }

    /// OR a raw condition.
    pub fn or_where_raw(&mut self, sql: &str, params: impl Into<Params>) -> &mut Self {
        self.builder.or_where_raw(sql, params);
        self
    }

    /// AND `column = value` pairs.
    pub fn where_eq<I, K, V>(&mut self, pairs: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.builder.where_eq(pairs)?;
        Ok(self)
    }

    /// OR `column = value` pairs.
    pub fn or_where_eq<I, K, V>(&mut self, pairs: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.builder.or_where_eq(pairs)?;
        Ok(self)
    }

    /// Add a prepared condition.
    pub fn push_where(&mut self, condition: Condition, combinator: Combinator) -> DbResult<&mut Self> {
        self.builder.push_where(condition, combinator)?;
        Ok(self)
    }

    /// Append an ORDER BY column.
    pub fn order_by(&mut self, column: &str, direction: Direction) -> DbResult<&mut Self> {
        self.builder.order_by(column, direction)?;
        Ok(self)
    }

    /// Set LIMIT.
    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.builder.limit(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.builder.offset(n);
        self
    }

    /// Lock the selected rows (`FOR UPDATE`) and read from the primary.
    pub fn lock(&mut self, enabled: bool) -> &mut Self {
        self.builder.lock(enabled);
        self
    }

    /// Render the SELECT without running it.
    pub fn to_sql(&self) -> DbResult<(String, Params)> {
        self.builder.to_sql()
    }

    /// All matching records, each registered as persisted.
    pub async fn all(&mut self) -> DbResult<Vec<Record<T>>> {
        let rows = self.builder.find_all().await?;
        rows.iter().map(|row| self.track(T::from_row(row)?)).collect()
    }

    /// The first matching record, registered as persisted.
    pub async fn one(&mut self) -> DbResult<Option<Record<T>>> {
        let row = self.builder.find_one().await?;
        row.map(|row| self.track(T::from_row(&row)?)).transpose()
    }

    /// Records from a hand-written SELECT, registered as persisted.
    pub async fn all_by_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> DbResult<Vec<Record<T>>> {
        let rows = self.builder.find_all_by_sql(sql, params).await?;
        rows.iter().map(|row| self.track(T::from_row(row)?)).collect()
    }

    /// Number of matching rows.
    pub async fn count(&mut self) -> DbResult<u64> {
        self.builder.count_all().await
    }

    fn track(&self, entity: T) -> DbResult<Record<T>> {
        let record = Record::new(entity);
        self.tracker.register_current(&record);
        Ok(record)
    }
}
