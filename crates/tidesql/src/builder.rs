//! Fluent query builder.
//!
//! A [`Builder`] accumulates table, projection, conditions, ordering,
//! limit/offset and the lock flag, then renders and runs one statement through
//! a [`Router`]. Every terminal operation (`find_*`, `insert*`, `update`,
//! `delete`, aggregates) clears the accumulated state, so the same builder
//! starts clean for the next statement.
//!
//! # Example
//!
//! ```ignore
//! let mut qb = router.builder();
//! let rows = qb
//!     .table("user")?
//!     .where_eq([("status", 1)])?
//!     .order_by("id", Direction::Desc)?
//!     .limit(10)
//!     .find_all()
//!     .await?;
//! ```

use crate::client::Connector;
use crate::error::{DbError, DbResult};
use crate::ident::{column_marker, table_marker};
use crate::params::Params;
use crate::placeholder::normalize;
use crate::router::Router;
use crate::row::{FromRow, Row};
use crate::value::{FromValue, Value};

const LOCK_CLAUSE: &str = " FOR UPDATE";

/// How a new condition joins what is already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    fn glue(self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    fn as_sql(self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }
}

/// A WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A raw SQL fragment with `?` and/or `:name` placeholders.
    Raw { sql: String, params: Params },
    /// `column = value` pairs joined by `glue`. Values are always bound.
    Map {
        pairs: Vec<(String, Value)>,
        glue: Combinator,
    },
}

impl Condition {
    /// A raw fragment.
    pub fn raw(sql: impl Into<String>, params: impl Into<Params>) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params: params.into(),
        }
    }

    /// Every pair must match (`a = ? AND b = ?`).
    pub fn all_of<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Condition::Map {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            glue: Combinator::And,
        }
    }

    /// Any pair may match (`a = ? OR b = ?`).
    pub fn any_of<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Condition::Map {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            glue: Combinator::Or,
        }
    }

    /// Render into a fragment and its parameters.
    ///
    /// Map keys are validated here; `NULL` values render as `IS NULL`.
    fn into_fragment(self) -> DbResult<(String, Params)> {
        match self {
            Condition::Raw { sql, params } => Ok((sql, params)),
            Condition::Map { pairs, glue } => {
                let mut parts = Vec::with_capacity(pairs.len());
                let mut params = Params::new();
                for (column, value) in pairs {
                    let column = column_marker(&column)?;
                    if value.is_null() {
                        parts.push(format!("{column} IS NULL"));
                    } else {
                        parts.push(format!("{column} = ?"));
                        params.push(value);
                    }
                }
                Ok((parts.join(glue.glue()), params))
            }
        }
    }
}

/// Accumulated state for one statement.
///
/// Identifiers are stored as `{{table}}`/`[[column]]` markers and resolved by
/// the router at execution time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    table: Option<String>,
    fields: Vec<String>,
    condition: Option<String>,
    params: Params,
    order_by: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    lock: bool,
}

impl QuerySpec {
    /// The table marker, if set.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// The accumulated WHERE fragment, if any.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Parameters bound so far.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Whether the row-locking clause is enabled.
    pub fn is_locked(&self) -> bool {
        self.lock
    }

    fn require_table(&self) -> DbResult<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| DbError::config("No table selected; call table() first"))
    }

    fn push_condition(&mut self, sql: String, params: Params, combinator: Combinator) {
        if sql.trim().is_empty() {
            return;
        }
        self.condition = Some(match self.condition.take() {
            None => sql,
            Some(existing) => format!("({existing}){}({sql})", combinator.glue()),
        });
        self.params.merge(params);
    }

    fn projection(&self) -> String {
        if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        }
    }

    fn where_clause(&self) -> String {
        match &self.condition {
            Some(condition) => format!(" WHERE {condition}"),
            None => String::new(),
        }
    }

    fn order_clause(&self) -> String {
        if self.order_by.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .order_by
            .iter()
            .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    }

    fn limit_clause(&self) -> DbResult<String> {
        match (self.limit, self.offset) {
            (None, None) => Ok(String::new()),
            (None, Some(_)) => Err(DbError::config("offset() requires limit()")),
            (Some(limit), None | Some(0)) => Ok(format!(" LIMIT {limit}")),
            (Some(limit), Some(offset)) => Ok(format!(" LIMIT {offset},{limit}")),
        }
    }

    fn lock_clause(&self) -> &'static str {
        if self.lock { LOCK_CLAUSE } else { "" }
    }

    /// Render the SELECT statement (placeholders not yet normalized).
    fn select_sql(&self) -> DbResult<String> {
        Ok(format!(
            "SELECT {} FROM {}{}{}{}{}",
            self.projection(),
            self.require_table()?,
            self.where_clause(),
            self.order_clause(),
            self.limit_clause()?,
            self.lock_clause(),
        ))
    }

    fn aggregate_sql(&self, func: Aggregate, field: &str) -> DbResult<String> {
        let field = if field == "*" {
            "*".to_string()
        } else {
            column_marker(field)?
        };
        Ok(format!(
            "SELECT {}({field}) FROM {}{}{}",
            func.as_sql(),
            self.require_table()?,
            self.where_clause(),
            self.lock_clause(),
        ))
    }
}

/// Fluent single-statement query builder bound to a router.
pub struct Builder<'r, D: Connector> {
    router: &'r Router<D>,
    spec: QuerySpec,
}

impl<D: Connector> std::fmt::Debug for Builder<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder").field("spec", &self.spec).finish()
    }
}

impl<D: Connector> Router<D> {
    /// Start a query builder on this router.
    pub fn builder(&self) -> Builder<'_, D> {
        Builder::new(self)
    }
}

impl<'r, D: Connector> Builder<'r, D> {
    /// Create an empty builder.
    pub fn new(router: &'r Router<D>) -> Self {
        Self {
            router,
            spec: QuerySpec::default(),
        }
    }

    /// The router statements run on.
    pub fn router(&self) -> &'r Router<D> {
        self.router
    }

    /// The state accumulated so far.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Discard the accumulated state.
    pub fn reset(&mut self) -> &mut Self {
        self.spec = QuerySpec::default();
        self
    }

    // ==================== Table & projection ====================

    /// Set the table.
    ///
    /// A bare name gets the configured prefix (`user` ≡ `{{%user}}`). Use
    /// `{{user}}` for no prefix, `{{user%}}` for a suffix, `{{wp_user}}` for a
    /// literal foreign prefix. Invalid names fail here.
    pub fn table(&mut self, name: &str) -> DbResult<&mut Self> {
        self.spec.table = Some(table_marker(name)?);
        Ok(self)
    }

    /// Select specific columns instead of `*`.
    ///
    /// Accepts `*`, `column`, `table.column` and `table.*`.
    pub fn field(&mut self, fields: &[&str]) -> DbResult<&mut Self> {
        let mut rendered = Vec::with_capacity(fields.len());
        for field in fields {
            if *field == "*" {
                rendered.push("*".to_string());
            } else if let Some(table) = field.strip_suffix(".*") {
                rendered.push(format!("{}.*", column_marker(table)?));
            } else {
                rendered.push(column_marker(field)?);
            }
        }
        self.spec.fields = rendered;
        Ok(self)
    }

    // ==================== WHERE ====================

    /// Add a condition, joined to the existing one by `combinator`.
    ///
    /// The existing condition and the new one are each parenthesized, so
    /// precedence does not depend on call order. Empty conditions are ignored.
    pub fn push_where(&mut self, condition: Condition, combinator: Combinator) -> DbResult<&mut Self> {
        let (sql, params) = condition.into_fragment()?;
        self.spec.push_condition(sql, params, combinator);
        Ok(self)
    }

    /// AND a raw condition, e.g. `where_raw("[[age]] > ? AND [[name]] = :name", params)`.
    pub fn where_raw(&mut self, sql: &str, params: impl Into<Params>) -> &mut Self {
        self.spec
            .push_condition(sql.to_string(), params.into(), Combinator::And);
        self
    }

    /// OR a raw condition.
    pub fn or_where_raw(&mut self, sql: &str, params: impl Into<Params>) -> &mut Self {
        self.spec
            .push_condition(sql.to_string(), params.into(), Combinator::Or);
        self
    }

    /// AND a set of `column = value` conditions (joined with AND).
    pub fn where_eq<I, K, V>(&mut self, pairs: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.push_where(Condition::all_of(pairs), Combinator::And)
    }

    /// OR a set of `column = value` conditions (joined with AND).
    pub fn or_where_eq<I, K, V>(&mut self, pairs: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.push_where(Condition::all_of(pairs), Combinator::Or)
    }

    // ==================== Ordering, paging, locking ====================

    /// Append an ORDER BY column.
    pub fn order_by(&mut self, column: &str, direction: Direction) -> DbResult<&mut Self> {
        let column = column_marker(column)?;
        self.spec.order_by.push((column, direction));
        Ok(self)
    }

    /// Append several ORDER BY columns in order.
    pub fn order_by_all<'c, I>(&mut self, columns: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = (&'c str, Direction)>,
    {
        for (column, direction) in columns {
            self.order_by(column, direction)?;
        }
        Ok(self)
    }

    /// Set LIMIT.
    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.spec.limit = Some(n);
        self
    }

    /// Set OFFSET. Requires a limit at render time.
    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.spec.offset = Some(n);
        self
    }

    /// Append `FOR UPDATE` to reads and route them to the primary.
    pub fn lock(&mut self, enabled: bool) -> &mut Self {
        self.spec.lock = enabled;
        self
    }

    /// Render the SELECT for the current state without running or resetting it.
    pub fn to_sql(&self) -> DbResult<(String, Params)> {
        let sql = self.spec.select_sql()?;
        normalize(&sql, self.spec.params.clone())
    }

    // ==================== Reads ====================

    /// Run the SELECT and return all rows.
    pub async fn find_all(&mut self) -> DbResult<Vec<Row>> {
        let spec = std::mem::take(&mut self.spec);
        let sql = spec.select_sql()?;
        self.read(spec.lock, &sql, spec.params).await
    }

    /// Run the SELECT with `LIMIT 1` and return the first row, if any.
    pub async fn find_one(&mut self) -> DbResult<Option<Row>> {
        self.spec.limit = Some(1);
        let rows = self.find_all().await?;
        Ok(rows.into_iter().next())
    }

    /// Run the SELECT and map all rows to `T` (no entity tracking).
    pub async fn find_all_as<T: FromRow>(&mut self) -> DbResult<Vec<T>> {
        let rows = self.find_all().await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Run the SELECT with `LIMIT 1` and map the row to `T` (no entity tracking).
    pub async fn find_one_as<T: FromRow>(&mut self) -> DbResult<Option<T>> {
        let row = self.find_one().await?;
        row.as_ref().map(T::from_row).transpose()
    }

    /// Run a hand-written SELECT. The lock flag still applies.
    pub async fn find_all_by_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> DbResult<Vec<Row>> {
        let spec = std::mem::take(&mut self.spec);
        let sql = format!("{}{}", sql.trim_end(), spec.lock_clause());
        self.read(spec.lock, &sql, params.into()).await
    }

    async fn read(&self, lock: bool, sql: &str, params: Params) -> DbResult<Vec<Row>> {
        let (sql, params) = normalize(sql, params)?;
        if lock {
            self.router.query_primary(&sql, params).await
        } else {
            self.router.query(&sql, params).await
        }
    }

    // ==================== Aggregates ====================

    /// Run `SELECT <func>(<field>) FROM <table> <where>` and return the scalar.
    ///
    /// `field` may be `*`. Ordering and limits do not apply.
    pub async fn aggregate(&mut self, func: Aggregate, field: &str) -> DbResult<Value> {
        let spec = std::mem::take(&mut self.spec);
        let sql = spec.aggregate_sql(func, field)?;
        let rows = self.read(spec.lock, &sql, spec.params).await?;
        Ok(rows
            .first()
            .and_then(Row::first)
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// `COUNT(field)`; use `*` to count rows.
    pub async fn count(&mut self, field: &str) -> DbResult<u64> {
        let value = self.aggregate(Aggregate::Count, field).await?;
        match value {
            Value::Null => Ok(0),
            other => u64::from_value("count", &other),
        }
    }

    /// `COUNT(*)`.
    pub async fn count_all(&mut self) -> DbResult<u64> {
        self.count("*").await
    }

    /// `SUM(field)`; `NULL` when no rows match.
    pub async fn sum(&mut self, field: &str) -> DbResult<Value> {
        self.aggregate(Aggregate::Sum, field).await
    }

    /// `AVG(field)`; `NULL` when no rows match.
    pub async fn avg(&mut self, field: &str) -> DbResult<Value> {
        self.aggregate(Aggregate::Avg, field).await
    }

    /// `MIN(field)`.
    pub async fn min(&mut self, field: &str) -> DbResult<Value> {
        self.aggregate(Aggregate::Min, field).await
    }

    /// `MAX(field)`.
    pub async fn max(&mut self, field: &str) -> DbResult<Value> {
        self.aggregate(Aggregate::Max, field).await
    }

    // ==================== Writes ====================

    /// INSERT one row; returns the affected row count.
    pub async fn insert<I, K, V>(&mut self, data: I) -> DbResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let spec = std::mem::take(&mut self.spec);
        let table = spec.require_table()?;

        let mut columns = Vec::new();
        let mut params = Params::new();
        for (column, value) in data {
            columns.push(column_marker(column.as_ref())?);
            params.push(value);
        }
        if columns.is_empty() {
            return Err(DbError::config("insert() requires at least one column"));
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        self.router.execute(&sql, params).await
    }

    /// INSERT one row and return the generated id.
    ///
    /// Returns `0` when the insert affected no rows (e.g. a duplicate silently
    /// ignored); that is a result, not an error.
    pub async fn insert_get_id<I, K, V>(&mut self, data: I) -> DbResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        if self.insert(data).await? > 0 {
            self.router.last_insert_id().await
        } else {
            Ok(0)
        }
    }

    /// UPDATE matching rows; returns the affected row count.
    ///
    /// Refuses to run without a WHERE condition.
    pub async fn update<I, K, V>(&mut self, data: I) -> DbResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let spec = std::mem::take(&mut self.spec);
        let table = spec.require_table()?;
        if spec.condition.is_none() {
            return Err(DbError::config("update() requires a WHERE condition"));
        }

        let mut assignments = Vec::new();
        let mut params = Params::new();
        for (column, value) in data {
            assignments.push(format!("{} = ?", column_marker(column.as_ref())?));
            params.push(value);
        }
        if assignments.is_empty() {
            return Err(DbError::config("update() requires at least one column"));
        }
        params.merge(spec.params.clone());

        let sql = format!(
            "UPDATE {table} SET {}{}",
            assignments.join(", "),
            spec.where_clause()
        );
        let (sql, params) = normalize(&sql, params)?;
        self.router.execute(&sql, params).await
    }

    /// DELETE matching rows; returns the affected row count.
    ///
    /// Refuses to run without a WHERE condition.
    pub async fn delete(&mut self) -> DbResult<u64> {
        let spec = std::mem::take(&mut self.spec);
        let table = spec.require_table()?;
        if spec.condition.is_none() {
            return Err(DbError::config("delete() requires a WHERE condition"));
        }
        let sql = format!("DELETE FROM {table}{}", spec.where_clause());
        let (sql, params) = normalize(&sql, spec.params.clone())?;
        self.router.execute(&sql, params).await
    }
}
