//! Table schema descriptions.
//!
//! The router describes a table once (`SHOW FULL FIELDS FROM ...`) and keeps
//! the result for its whole lifetime. Entity saves use it to find the
//! auto-increment column when the entity type does not declare one.

use crate::error::DbResult;
use crate::row::{FromRow, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One column as reported by the schema description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: Option<String>,
    pub key: Option<String>,
    /// Free-text attributes, e.g. `auto_increment`.
    pub extra: String,
}

impl ColumnInfo {
    /// Whether the `extra` attribute marks this column as auto-increment.
    pub fn is_auto_increment(&self) -> bool {
        self.extra.to_ascii_lowercase().contains("auto_increment")
    }
}

impl FromRow for ColumnInfo {
    fn from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            name: row.try_get("Field")?,
            column_type: row.try_get("Type").ok(),
            key: row.try_get::<Option<String>>("Key").ok().flatten(),
            extra: row.try_get::<Option<String>>("Extra")?.unwrap_or_default(),
        })
    }
}

/// Cached descriptions of a table's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// The first auto-increment column, if any.
    pub fn auto_increment_column(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.is_auto_increment())
            .map(|c| c.name.as_str())
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Table schemas keyed by table marker, filled lazily.
#[derive(Debug, Default)]
pub struct SchemaCache {
    tables: Mutex<HashMap<String, Arc<TableSchema>>>,
}

impl SchemaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached schema for `table`, if described before.
    pub fn get(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.lock().get(table).cloned()
    }

    /// Store a schema, keeping an existing entry if one raced in first.
    pub fn insert(&self, schema: TableSchema) -> Arc<TableSchema> {
        let mut tables = self.lock();
        tables
            .entry(schema.table.clone())
            .or_insert_with(|| Arc::new(schema))
            .clone()
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<TableSchema>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
