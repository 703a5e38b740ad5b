//! Query log.
//!
//! The router records every successfully executed statement. In the default
//! mode the log keeps only the most recent entry; in verbose mode it keeps all.

use crate::params::Params;
use crate::placeholder::{Placeholder, scan};
use crate::value::Value;
use std::time::Duration;

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// SELECT query
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Other SQL (e.g., SHOW, SET, transaction control)
    Other,
}

impl QueryType {
    /// Detect query type from the leading keyword of a SQL string.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start().trim_start_matches('(').trim_start();
        if starts_with_keyword(trimmed, "SELECT") {
            QueryType::Select
        } else if starts_with_keyword(trimmed, "INSERT") || starts_with_keyword(trimmed, "REPLACE")
        {
            QueryType::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.len() >= keyword.len()
        && sql.as_bytes()[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
        && sql.as_bytes()
            .get(keyword.len())
            .is_none_or(|b| !b.is_ascii_alphanumeric() && *b != b'_')
}

/// One executed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    /// SQL as sent to the driver.
    pub sql: String,
    /// Bound parameters.
    pub params: Params,
    /// Wall-clock execution time.
    pub elapsed: Duration,
}

impl QueryLogEntry {
    /// Elapsed time in milliseconds, rounded to two decimals.
    pub fn elapsed_ms(&self) -> f64 {
        (self.elapsed.as_secs_f64() * 100_000.0).round() / 100.0
    }

    /// Detected statement type.
    pub fn query_type(&self) -> QueryType {
        QueryType::from_sql(&self.sql)
    }

    /// Render the SQL with every placeholder replaced by its quoted value.
    ///
    /// Placeholders without a bound value are left as-is.
    pub fn render(&self, quote: impl Fn(&Value) -> String) -> String {
        let mut out = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut last = 0;
        let mut positional = self.params.positional_values().iter();

        for marker in scan(&self.sql) {
            match marker {
                Placeholder::Positional(at) => {
                    out.push_str(&self.sql[last..at]);
                    match positional.next() {
                        Some(value) => out.push_str(&quote(value)),
                        None => out.push('?'),
                    }
                    last = at + 1;
                }
                Placeholder::Named(at, len) => {
                    let end = at + 1 + len;
                    out.push_str(&self.sql[last..at]);
                    match self.params.get_named(&self.sql[at + 1..end]) {
                        Some(value) => out.push_str(&quote(value)),
                        None => out.push_str(&self.sql[at..end]),
                    }
                    last = end;
                }
            }
        }
        out.push_str(&self.sql[last..]);
        out
    }
}

/// The router's log buffer.
#[derive(Debug, Clone, Default)]
pub struct QueryLog {
    verbose: bool,
    entries: Vec<QueryLogEntry>,
}

impl QueryLog {
    /// Create a log; `verbose` keeps every entry instead of only the last.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            entries: Vec::new(),
        }
    }

    /// Switch between verbose and single-slot mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Whether every entry is kept.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Record an executed statement.
    pub fn record(&mut self, entry: QueryLogEntry) {
        if !self.verbose {
            self.entries.clear();
        }
        self.entries.push(entry);
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> &[QueryLogEntry] {
        &self.entries
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&QueryLogEntry> {
        self.entries.last()
    }
}

#[cfg(feature = "tracing")]
pub(crate) fn emit(entry: &QueryLogEntry) {
    tracing::debug!(
        target: "tidesql.sql",
        query_type = ?entry.query_type(),
        elapsed_ms = entry.elapsed_ms(),
        param_count = entry.params.len(),
        sql = %entry.sql,
    );
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn emit(_entry: &QueryLogEntry) {}
