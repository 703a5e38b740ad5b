//! Bound parameter sets.

use crate::error::{DbError, DbResult};
use crate::value::Value;
use std::collections::BTreeMap;

/// Prefix reserved for names generated by the placeholder normalizer.
///
/// Caller-supplied named parameters may not start with it.
pub const RESERVED_PARAM_PREFIX: &str = "_qb_";

/// Parameters for one statement: `?` values in order plus `:name` values.
///
/// Named keys are stored without the leading `:`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl Params {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a positional parameter set.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            named: BTreeMap::new(),
        }
    }

    /// Create a named parameter set.
    ///
    /// Fails if a name is empty or uses the reserved prefix.
    pub fn named<I, K, V>(values: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut params = Self::new();
        for (name, value) in values {
            params.bind_named(name.as_ref(), value)?;
        }
        Ok(params)
    }

    /// Append a positional value.
    pub fn push(&mut self, value: impl Into<Value>) -> &mut Self {
        self.positional.push(value.into());
        self
    }

    /// Bind a caller-supplied named value. `":name"` and `"name"` are equivalent.
    pub fn bind_named(&mut self, name: &str, value: impl Into<Value>) -> DbResult<&mut Self> {
        let key = name.strip_prefix(':').unwrap_or(name);
        if key.is_empty() {
            return Err(DbError::config("Named parameter cannot be empty"));
        }
        if key.starts_with(RESERVED_PARAM_PREFIX) {
            return Err(DbError::config(format!(
                "Named parameter ':{key}' uses the reserved prefix '{RESERVED_PARAM_PREFIX}'"
            )));
        }
        self.named.insert(key.to_string(), value.into());
        Ok(self)
    }

    pub(crate) fn insert_generated(&mut self, name: String, value: Value) {
        self.named.insert(name, value);
    }

    pub(crate) fn take_positional(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.positional)
    }

    /// Merge another set into this one.
    ///
    /// Positional values are appended, named values overwrite same-named ones.
    pub fn merge(&mut self, other: Params) {
        self.positional.extend(other.positional);
        self.named.extend(other.named);
    }

    /// Positional values in order.
    pub fn positional_values(&self) -> &[Value] {
        &self.positional
    }

    /// Named values, keyed without the leading `:`.
    pub fn named_values(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// Look up a named value (with or without the leading `:`).
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name.strip_prefix(':').unwrap_or(name))
    }

    /// Total number of bound values.
    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    /// Check if there are no bound values.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            named: BTreeMap::new(),
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

/// Build a positional [`Params`] from a list of expressions.
///
/// ```ignore
/// let params = tidesql::params!["alice", 1_i64];
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($value:expr),+ $(,)?) => {
        $crate::Params::from(vec![$($crate::Value::from($value)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_strips_colon() {
        let p = Params::named([(":name", "alice")]).unwrap();
        assert_eq!(p.get_named("name"), Some(&Value::from("alice")));
        assert_eq!(p.get_named(":name"), Some(&Value::from("alice")));
    }

    #[test]
    fn reserved_prefix_is_rejected() {
        let err = Params::named([("_qb_0", 1_i64)]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn merge_appends_positional_and_overlays_named() {
        let mut a = Params::positional([1_i64, 2]);
        a.bind_named("x", "old").unwrap();
        let mut b = Params::positional([3_i64]);
        b.bind_named("x", "new").unwrap();
        a.merge(b);

        assert_eq!(
            a.positional_values(),
            &[Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(a.get_named("x"), Some(&Value::from("new")));
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn params_macro_builds_positional() {
        let p = crate::params!["a", 2_i64];
        assert_eq!(p.positional_values(), &[Value::from("a"), Value::Int(2)]);
        assert!(crate::params![].is_empty());
    }
}
