//! Entities, records and the identity-keyed state tracker.
//!
//! An [`Entity`] describes how a Rust type maps to a table. A [`Record`] wraps
//! one entity value together with an identity token; the [`EntityTracker`]
//! remembers, per identity, the column values last read from or written to the
//! database. A record with no snapshot is new and saves as an INSERT; a record
//! with a snapshot saves as an UPDATE keyed by the snapshot's primary key.
//!
//! Identity is the token, not the primary key: a loaded record stays persisted
//! even if its id is `0`, and a freshly built record is new even if the caller
//! fills in an id.

use crate::error::DbResult;
use crate::row::FromRow;
use crate::value::Value;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Table mapping for an entity type.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Debug, Clone, Default, tidesql::Entity)]
/// #[orm(table = "user")]
/// struct User {
///     #[orm(id)]
///     id: u64,
///     username: String,
///     status: i32,
/// }
/// ```
pub trait Entity: FromRow + Send + Sync + 'static {
    /// Logical table name; the table prefix applies.
    const TABLE: &'static str;

    /// Primary-key column, when declared on the type.
    ///
    /// `None` lets the router find the auto-increment column from the table
    /// schema.
    const PRIMARY_KEY: Option<&'static str> = None;

    /// Column names in declaration order.
    const COLUMNS: &'static [&'static str];

    /// Current column values in [`Entity::COLUMNS`] order.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Assign one column, e.g. the generated id after an INSERT.
    fn set_value(&mut self, column: &str, value: Value) -> DbResult<()>;

    /// Runtime view of the mapping.
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor {
            table: Self::TABLE,
            primary_key: Self::PRIMARY_KEY,
            columns: Self::COLUMNS,
        }
    }
}

/// Type descriptor: table, primary key and columns of an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub table: &'static str,
    pub primary_key: Option<&'static str>,
    pub columns: &'static [&'static str],
}

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one in-memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    fn next() -> Self {
        RecordId(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identity number.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// An entity value with an identity.
///
/// Cloning a record produces a distinct identity: the copy is a new object and
/// is not tracked.
pub struct Record<T> {
    token: Arc<RecordId>,
    entity: T,
}

impl<T> Record<T> {
    /// Wrap an entity under a fresh identity.
    pub fn new(entity: T) -> Self {
        Self {
            token: Arc::new(RecordId::next()),
            entity,
        }
    }

    /// This record's identity.
    pub fn id(&self) -> RecordId {
        *self.token
    }

    /// Drop the identity and return the entity.
    pub fn into_inner(self) -> T {
        self.entity
    }

    fn token(&self) -> &Arc<RecordId> {
        &self.token
    }
}

impl<T> From<T> for Record<T> {
    fn from(entity: T) -> Self {
        Record::new(entity)
    }
}

impl<T: Clone> Clone for Record<T> {
    fn clone(&self) -> Self {
        Record::new(self.entity.clone())
    }
}

impl<T> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

impl<T> DerefMut for Record<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entity
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id())
            .field("entity", &self.entity)
            .finish()
    }
}

/// Column values of a record as last persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    values: Vec<(String, Value)>,
}

impl EntitySnapshot {
    /// Build from `(column, value)` pairs.
    pub fn new<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Snapshot an entity's current values.
    pub fn of<T: Entity>(entity: &T) -> Self {
        Self::new(entity.values())
    }

    /// Value of `column` at snapshot time.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// All captured values.
    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }
}

struct TrackedEntry {
    token: Weak<RecordId>,
    snapshot: Arc<EntitySnapshot>,
}

/// Smallest map size that triggers a prune of dropped records.
const MIN_PRUNE_AT: usize = 64;

struct Entries {
    map: HashMap<RecordId, TrackedEntry>,
    prune_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            prune_at: MIN_PRUNE_AT,
        }
    }
}

impl Entries {
    /// Drop dead entries once the map has doubled since the last prune.
    fn maybe_prune(&mut self) {
        if self.map.len() < self.prune_at {
            return;
        }
        self.map.retain(|_, entry| entry.token.strong_count() > 0);
        self.prune_at = (self.map.len() * 2).max(MIN_PRUNE_AT);
    }
}

/// Identity-keyed map from record to its last persisted snapshot.
///
/// Entries hold a weak reference to the record's identity, so tracking never
/// keeps a record alive. Entries whose record was dropped are pruned when the
/// map has doubled since the previous prune.
#[derive(Default)]
pub struct EntityTracker {
    entries: Mutex<Entries>,
}

impl EntityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when no snapshot is registered for this record.
    pub fn is_new<T>(&self, record: &Record<T>) -> bool {
        self.snapshot_of(record).is_none()
    }

    /// Register (or replace) the snapshot for a record.
    pub fn register<T>(&self, record: &Record<T>, snapshot: EntitySnapshot) {
        let mut entries = self.lock();
        entries.maybe_prune();
        entries.map.insert(
            record.id(),
            TrackedEntry {
                token: Arc::downgrade(record.token()),
                snapshot: Arc::new(snapshot),
            },
        );
    }

    /// Register a record's current values.
    pub fn register_current<T: Entity>(&self, record: &Record<T>) {
        self.register(record, EntitySnapshot::of(&**record));
    }

    /// The registered snapshot, if any.
    pub fn snapshot_of<T>(&self, record: &Record<T>) -> Option<Arc<EntitySnapshot>> {
        let entries = self.lock();
        entries
            .map
            .get(&record.id())
            .filter(|entry| entry.token.strong_count() > 0)
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Stop tracking a record; it becomes new again.
    pub fn forget<T>(&self, record: &Record<T>) -> bool {
        self.lock().map.remove(&record.id()).is_some()
    }

    /// Number of live tracked records.
    pub fn len(&self) -> usize {
        self.lock()
            .map
            .values()
            .filter(|entry| entry.token.strong_count() > 0)
            .count()
    }

    /// Check if no live record is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every record.
    pub fn clear(&self) {
        *self.lock() = Entries::default();
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EntityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityTracker")
            .field("tracked", &self.len())
            .finish()
    }
}
