//! In-memory scripted driver shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tidesql::{ConnectTarget, Connection, Connector, DbError, DbResult, Params, Row, Value};

/// One statement seen by the driver.
#[derive(Debug, Clone)]
pub struct Executed {
    pub dsn: String,
    pub sql: String,
    pub params: Params,
}

#[derive(Default)]
struct State {
    statements: Mutex<Vec<Executed>>,
    connects: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    failing_sql: Mutex<HashMap<String, usize>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    affected: Mutex<VecDeque<u64>>,
    schemas: Mutex<HashMap<String, Vec<Row>>>,
    next_insert_id: AtomicU64,
    last_insert_id: AtomicU64,
}

/// Opens [`MockConn`]s that share one script and one statement log.
///
/// - `fetch_all` pops the next scripted row set (empty when none is queued),
///   except `SHOW FULL FIELDS`, which answers from [`MockConnector::set_schema`].
/// - `execute` pops the next scripted affected count (1 when none is queued).
///   Session and transaction statements return 0 and never touch the queue.
/// - A statement registered with [`MockConnector::fail_sql`] is logged and
///   then fails.
/// - A successful INSERT assigns the next insert id.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<State>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        let state = State::default();
        state.next_insert_id.store(1, Ordering::SeqCst);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.rows.lock().unwrap().push_back(rows);
    }

    pub fn push_affected(&self, affected: u64) {
        self.state.affected.lock().unwrap().push_back(affected);
    }

    pub fn fail_dsn(&self, dsn: &str) {
        self.state.failing.lock().unwrap().insert(dsn.to_string());
    }

    /// Fail the next `times` executions of exactly `sql`.
    pub fn fail_sql(&self, sql: &str, times: usize) {
        self.state
            .failing_sql
            .lock()
            .unwrap()
            .insert(sql.to_string(), times);
    }

    pub fn set_next_insert_id(&self, id: u64) {
        self.state.next_insert_id.store(id, Ordering::SeqCst);
    }

    /// Describe a table by its quoted name, e.g. `` `user` ``.
    pub fn set_schema(&self, quoted_table: &str, columns: &[(&str, &str)]) {
        let rows = columns
            .iter()
            .map(|(name, extra)| {
                Row::from_pairs([
                    ("Field", Value::from(*name)),
                    ("Type", Value::from("varchar(255)")),
                    ("Key", Value::Null),
                    ("Extra", Value::from(*extra)),
                ])
            })
            .collect();
        self.state
            .schemas
            .lock()
            .unwrap()
            .insert(quoted_table.to_string(), rows);
    }

    /// Every statement, control statements included.
    pub fn statements(&self) -> Vec<Executed> {
        self.state.statements.lock().unwrap().clone()
    }

    /// SQL of every statement except session and transaction control.
    pub fn queries(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|e| !is_control(&e.sql))
            .map(|e| e.sql)
            .collect()
    }

    /// SQL of every statement.
    pub fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|e| e.sql).collect()
    }

    /// The most recent non-control statement.
    pub fn last_query(&self) -> Option<Executed> {
        self.statements()
            .into_iter()
            .rev()
            .find(|e| !is_control(&e.sql))
    }

    /// DSNs of every connection attempt, in order.
    pub fn connects(&self) -> Vec<String> {
        self.state.connects.lock().unwrap().clone()
    }
}

fn is_control(sql: &str) -> bool {
    sql.starts_with("SET NAMES")
        || sql == "START TRANSACTION"
        || sql == "COMMIT"
        || sql == "ROLLBACK"
}

impl Connector for MockConnector {
    type Conn = MockConn;

    async fn connect(&self, target: &ConnectTarget) -> DbResult<MockConn> {
        self.state.connects.lock().unwrap().push(target.dsn.clone());
        if self.state.failing.lock().unwrap().contains(&target.dsn) {
            return Err(DbError::driver(format!("cannot connect to {}", target.dsn)));
        }
        Ok(MockConn {
            dsn: target.dsn.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockConn {
    pub dsn: String,
    state: Arc<State>,
}

impl MockConn {
    fn log(&self, sql: &str, params: &Params) -> DbResult<()> {
        self.state.statements.lock().unwrap().push(Executed {
            dsn: self.dsn.clone(),
            sql: sql.to_string(),
            params: params.clone(),
        });
        let mut failing = self.state.failing_sql.lock().unwrap();
        match failing.get_mut(sql) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(DbError::driver(format!("{sql} failed")))
            }
            _ => Ok(()),
        }
    }
}

impl Connection for MockConn {
    async fn execute(&self, sql: &str, params: &Params) -> DbResult<u64> {
        self.log(sql, params)?;
        if is_control(sql) {
            return Ok(0);
        }
        let affected = self.state.affected.lock().unwrap().pop_front().unwrap_or(1);
        if sql.starts_with("INSERT") && affected > 0 {
            let id = self.state.next_insert_id.fetch_add(1, Ordering::SeqCst);
            self.state.last_insert_id.store(id, Ordering::SeqCst);
        }
        Ok(affected)
    }

    async fn fetch_all(&self, sql: &str, params: &Params) -> DbResult<Vec<Row>> {
        self.log(sql, params)?;
        if let Some(table) = sql.strip_prefix("SHOW FULL FIELDS FROM ") {
            return Ok(self
                .state
                .schemas
                .lock()
                .unwrap()
                .get(table)
                .cloned()
                .unwrap_or_default());
        }
        Ok(self.state.rows.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn last_insert_id(&self) -> DbResult<u64> {
        Ok(self.state.last_insert_id.load(Ordering::SeqCst))
    }
}
