//! Connection configuration.
//!
//! A [`ConnectionConfig`] describes the primary connection plus an ordered list
//! of replicas. Replica entries may omit any field; missing fields inherit from
//! the primary by structural merge.
//!
//! # Example
//!
//! ```ignore
//! use tidesql::{ConnectionConfig, ReplicaConfig};
//!
//! let config = ConnectionConfig::new("mysql:host=10.0.0.1;dbname=app")
//!     .credentials("app", "secret")
//!     .table_prefix("cms_")
//!     .replica(ReplicaConfig::new().dsn("mysql:host=10.0.0.2;dbname=app"));
//! ```

use crate::error::DbResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Configuration for the primary connection and its replicas.
///
/// Immutable once handed to a [`Router`](crate::Router).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Driver DSN, e.g. `mysql:host=localhost;dbname=app`.
    pub dsn: String,
    pub username: String,
    pub password: String,
    /// Connection character set; issued as `SET NAMES` after connecting. Empty skips it.
    pub charset: String,
    /// Prefix substituted for `%` in `{{%table}}` markers.
    #[serde(alias = "tablePrefix")]
    pub table_prefix: String,
    /// Driver-specific options.
    pub options: Map<String, JsonValue>,
    /// Read replicas, tried in random order.
    #[serde(alias = "slave", alias = "slaves")]
    pub replicas: Vec<ReplicaConfig>,
    /// Keep every executed statement in the query log instead of only the last one.
    pub verbose_log: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            dsn: "mysql:host=localhost".to_string(),
            username: "root".to_string(),
            password: String::new(),
            charset: "utf8".to_string(),
            table_prefix: String::new(),
            options: Map::new(),
            replicas: Vec::new(),
            verbose_log: false,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("charset", &self.charset)
            .field("table_prefix", &self.table_prefix)
            .field("options", &self.options)
            .field("replicas", &self.replicas)
            .field("verbose_log", &self.verbose_log)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create a configuration with defaults for everything but the DSN.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> DbResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the connection character set.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the table prefix.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Set a driver option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add a replica.
    pub fn replica(mut self, replica: ReplicaConfig) -> Self {
        self.replicas.push(replica);
        self
    }

    /// Enable verbose query logging.
    pub fn verbose_log(mut self, enabled: bool) -> Self {
        self.verbose_log = enabled;
        self
    }

    /// Settings for the primary connection.
    pub fn primary_target(&self) -> ConnectTarget {
        ConnectTarget {
            dsn: self.dsn.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            charset: self.charset.clone(),
            options: self.options.clone(),
        }
    }

    /// Settings for a replica: the replica's fields merged over the primary's.
    ///
    /// Options merge recursively, so a replica overriding one option keeps the rest.
    pub fn replica_target(&self, replica: &ReplicaConfig) -> ConnectTarget {
        let mut target = self.primary_target();
        if let Some(dsn) = &replica.dsn {
            target.dsn = dsn.clone();
        }
        if let Some(username) = &replica.username {
            target.username = username.clone();
        }
        if let Some(password) = &replica.password {
            target.password = password.clone();
        }
        if let Some(charset) = &replica.charset {
            target.charset = charset.clone();
        }
        for (key, value) in &replica.options {
            match target.options.get_mut(key) {
                Some(existing) => merge_json(existing, value),
                None => {
                    target.options.insert(key.clone(), value.clone());
                }
            }
        }
        target
    }
}

/// A replica entry. Unset fields inherit from the primary.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    pub dsn: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub charset: Option<String>,
    pub options: Map<String, JsonValue>,
}

impl fmt::Debug for ReplicaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaConfig")
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("charset", &self.charset)
            .field("options", &self.options)
            .finish()
    }
}

impl ReplicaConfig {
    /// Create an empty replica entry (inherits everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the DSN.
    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    /// Override username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Override the character set.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Override a driver option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Fully resolved settings for opening one connection.
#[derive(Clone, PartialEq)]
pub struct ConnectTarget {
    pub dsn: String,
    pub username: String,
    pub password: String,
    pub charset: String,
    pub options: Map<String, JsonValue>,
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("dsn", &self.dsn)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("charset", &self.charset)
            .field("options", &self.options)
            .finish()
    }
}

/// Recursively replace `base` with `over`: objects merge per key, arrays per
/// index, anything else is overwritten.
fn merge_json(base: &mut JsonValue, over: &JsonValue) {
    match (base, over) {
        (JsonValue::Object(base), JsonValue::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (JsonValue::Array(base), JsonValue::Array(over)) => {
            for (i, value) in over.iter().enumerate() {
                match base.get_mut(i) {
                    Some(existing) => merge_json(existing, value),
                    None => base.push(value.clone()),
                }
            }
        }
        (base, over) => *base = over.clone(),
    }
}
