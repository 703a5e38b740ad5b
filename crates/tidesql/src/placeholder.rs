//! Placeholder normalization.
//!
//! Drivers bind either `?` markers or `:name` markers, never both in one
//! statement. When a statement mixes them, every `?` is rewritten to a fresh
//! `:_qb_<n>` marker and its value moves into the named set.
//!
//! The `<n>` comes from a process-wide counter, so SQL fragments produced by
//! separate normalizer calls can be concatenated without colliding names.

use crate::error::{DbError, DbResult};
use crate::params::{Params, RESERVED_PARAM_PREFIX};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generated placeholder names.
static PLACEHOLDER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A placeholder found in a SQL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?` at the given byte offset.
    Positional(usize),
    /// `:name` starting at the given byte offset (the `:`), with the name's byte length.
    Named(usize, usize),
}

/// Find all placeholders outside of quoted literals and identifiers.
///
/// `::` casts are not treated as named markers.
pub fn scan(sql: &str) -> Vec<Placeholder> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'?' => out.push(Placeholder::Positional(i)),
            b':' => {
                if bytes.get(i + 1) == Some(&b':') {
                    i += 2;
                    continue;
                }
                let prev_is_colon = i > 0 && bytes[i - 1] == b':';
                let len = bytes[i + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
                    .count();
                if len > 0 && !prev_is_colon {
                    out.push(Placeholder::Named(i, len));
                    i += 1 + len;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out
}

/// Rewrite `sql` so positional and named markers never coexist.
///
/// - Only one marker style present: `sql` and `params` pass through unchanged.
/// - Both present: each `?` (left to right) becomes `:_qb_<n>` and the
///   positional value with the same index moves to the named set under that
///   name. The number of positional values must match the number of `?`.
pub fn normalize(sql: &str, mut params: Params) -> DbResult<(String, Params)> {
    let markers = scan(sql);
    let positions: Vec<usize> = markers
        .iter()
        .filter_map(|m| match m {
            Placeholder::Positional(at) => Some(*at),
            Placeholder::Named(..) => None,
        })
        .collect();
    let has_named = markers.len() > positions.len();

    if positions.is_empty() || !has_named {
        return Ok((sql.to_string(), params));
    }

    let values = params.take_positional();
    if values.len() != positions.len() {
        return Err(DbError::config(format!(
            "SQL has {} positional placeholders but {} positional values were bound",
            positions.len(),
            values.len()
        )));
    }

    let mut out = String::with_capacity(sql.len() + positions.len() * 8);
    let mut last = 0;
    for (at, value) in positions.into_iter().zip(values) {
        let n = PLACEHOLDER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!("{RESERVED_PARAM_PREFIX}{n}");
        out.push_str(&sql[last..at]);
        out.push(':');
        out.push_str(&name);
        params.insert_generated(name, value);
        last = at + 1;
    }
    out.push_str(&sql[last..]);

    Ok((out, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn named(sql: &str) -> Vec<&str> {
        scan(sql)
            .into_iter()
            .filter_map(|p| match p {
                Placeholder::Named(at, len) => Some(&sql[at + 1..at + 1 + len]),
                Placeholder::Positional(_) => None,
            })
            .collect()
    }

    #[test]
    fn scan_finds_both_styles() {
        let sql = "a = ? AND b = :b OR c = ?";
        let found = scan(sql);
        assert_eq!(found.len(), 3);
        assert_eq!(named(sql), vec!["b"]);
    }

    #[test]
    fn scan_skips_literals_and_casts() {
        let sql = "a = '?:x' AND b = \"it\\'s ?\" AND c::int = ? AND `we?ird` = :d";
        let found = scan(sql);
        assert_eq!(found.len(), 2);
        assert_eq!(named(sql), vec!["d"]);
    }

    #[test]
    fn single_style_is_untouched() {
        let params = Params::positional([1_i64, 2]);
        let (sql, out) = normalize("a = ? AND b = ?", params.clone()).unwrap();
        assert_eq!(sql, "a = ? AND b = ?");
        assert_eq!(out, params);

        let params = Params::named([("a", 1_i64)]).unwrap();
        let (sql, out) = normalize("a = :a", params.clone()).unwrap();
        assert_eq!(sql, "a = :a");
        assert_eq!(out, params);
    }

    #[test]
    fn mixed_styles_are_rewritten_in_order() {
        let mut params = Params::positional(["x", "z"]);
        params.bind_named("b", "y").unwrap();

        let (sql, out) = normalize("a = ? AND b = :b AND c = ?", params).unwrap();

        assert!(!sql.contains('?'));
        assert!(out.positional_values().is_empty());
        assert_eq!(out.named_values().len(), 3);

        let generated = named(&sql);
        assert_eq!(generated.len(), 3);
        assert_eq!(generated[1], "b");
        assert!(generated[0].starts_with(RESERVED_PARAM_PREFIX));
        assert!(generated[2].starts_with(RESERVED_PARAM_PREFIX));
        assert_eq!(out.get_named(generated[0]), Some(&Value::from("x")));
        assert_eq!(out.get_named(generated[2]), Some(&Value::from("z")));
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut params = Params::positional([1_i64]);
        params.bind_named("b", 2_i64).unwrap();
        let (sql, out) = normalize("a = ? AND b = :b", params).unwrap();
        let (again, out_again) = normalize(&sql, out.clone()).unwrap();
        assert_eq!(again, sql);
        assert_eq!(out_again, out);
    }

    #[test]
    fn generated_names_never_repeat_across_calls() {
        let mut p1 = Params::positional([1_i64]);
        p1.bind_named("b", 2_i64).unwrap();
        let mut p2 = Params::positional([3_i64]);
        p2.bind_named("b", 4_i64).unwrap();

        let (s1, _) = normalize("a = ? AND b = :b", p1).unwrap();
        let (s2, _) = normalize("a = ? AND b = :b", p2).unwrap();
        assert_ne!(named(&s1)[0], named(&s2)[0]);
    }

    #[test]
    fn mismatched_positional_count_is_rejected() {
        let mut params = Params::positional([1_i64]);
        params.bind_named("b", 2_i64).unwrap();
        let err = normalize("a = ? AND b = :b AND c = ?", params).unwrap_err();
        assert!(err.is_configuration());
    }
}
