//! MySQL identifier quoting and table-prefix resolution.
//!
//! SQL handed to the router may contain two kinds of markers:
//!
//! - `{{name}}` for tables. A `%` inside the marker expands to the configured
//!   table prefix: `{{%user}}` → `` `cms_user` ``, `{{user%}}` → `` `usercms_` ``.
//!   `{{user}}` and `{{wp_user}}` are quoted verbatim.
//! - `[[name]]` for columns. Dotted names are quoted per segment:
//!   `[[u.name]]` → `` `u`.`name` ``.
//!
//! # Example
//! ```ignore
//! use tidesql::ident::quote_sql;
//!
//! let sql = quote_sql("SELECT [[id]] FROM {{%user}}", "cms_");
//! assert_eq!(sql, "SELECT `id` FROM `cms_user`");
//! ```

use crate::error::{DbError, DbResult};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{(%?[\w\-\.\$ ]+%?)\}\}|\[\[([\w\-\. ]+)\]\]")
            .expect("invalid built-in marker regex")
    })
}

fn table_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\{\{%?[\w\-\.\$]+%?\}\}$").expect("invalid built-in table regex")
    })
}

fn column_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("invalid built-in column regex"))
}

/// Quote a table name.
///
/// Names containing `(`, `{{`, `[[` or a backtick are returned untouched. Dotted names
/// are quoted per segment.
pub fn quote_table(name: &str) -> String {
    if name.contains('(') || name.contains("{{") || name.contains("[[") {
        return name.to_string();
    }
    if !name.contains('.') {
        return quote_simple_table(name);
    }
    name.split('.')
        .map(quote_simple_table)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a column name.
///
/// Names containing `(`, `[[` or `{{` are returned untouched. `table.column`
/// quotes the table part as a table and the last segment as a column; `*` is
/// never quoted.
pub fn quote_column(name: &str) -> String {
    if name.contains('(') || name.contains("[[") || name.contains("{{") {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(pos) => {
            let (table, column) = (&name[..pos], &name[pos + 1..]);
            format!("{}.{}", quote_table(table), quote_simple_column(column))
        }
        None => quote_simple_column(name),
    }
}

fn quote_simple_table(name: &str) -> String {
    if name.contains('`') {
        name.to_string()
    } else {
        format!("`{name}`")
    }
}

fn quote_simple_column(name: &str) -> String {
    if name.contains('`') || name == "*" {
        name.to_string()
    } else {
        format!("`{name}`")
    }
}

/// Resolve a table reference to its quoted, prefixed form.
///
/// Accepts either a `{{...}}` marker or a bare name; `%` expands to `prefix`.
pub fn resolve_prefixed_table(pattern: &str, prefix: &str) -> String {
    let inner = pattern
        .strip_prefix("{{")
        .and_then(|p| p.strip_suffix("}}"))
        .unwrap_or(pattern);
    quote_table(inner).replace('%', prefix)
}

/// Replace every `{{table}}` and `[[column]]` marker in `sql`.
///
/// Returns the input unchanged (borrowed) when it has no markers.
pub fn quote_sql<'a>(sql: &'a str, prefix: &str) -> Cow<'a, str> {
    marker_re().replace_all(sql, |caps: &Captures<'_>| {
        if let Some(column) = caps.get(2) {
            quote_column(column.as_str())
        } else {
            resolve_prefixed_table(&caps[1], prefix)
        }
    })
}

/// Normalize and validate a table name given to a builder.
///
/// A bare name `user` becomes `{{%user}}` (prefixed). Explicit markers are
/// kept. Anything that does not match the table pattern is rejected.
pub fn table_marker(name: &str) -> DbResult<String> {
    let marker = if name.contains("{{") {
        name.to_string()
    } else {
        format!("{{{{%{name}}}}}")
    };
    if !table_marker_re().is_match(&marker) {
        return Err(DbError::config(format!("Invalid table name: '{name}'")));
    }
    Ok(marker)
}

/// Check a column name against `[A-Za-z0-9_.\-]+`.
pub fn check_column_name(name: &str) -> DbResult<()> {
    if column_re().is_match(name) {
        Ok(())
    } else {
        Err(DbError::config(format!(
            "Invalid column name '{name}': only letters, digits, '_', '.' and '-' are allowed"
        )))
    }
}

/// Validate a column name and wrap it in a `[[...]]` marker.
pub fn column_marker(name: &str) -> DbResult<String> {
    check_column_name(name)?;
    Ok(format!("[[{name}]]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_table_simple_and_dotted() {
        assert_eq!(quote_table("user"), "`user`");
        assert_eq!(quote_table("db.user"), "`db`.`user`");
    }

    #[test]
    fn quote_table_passes_through_raw_expressions() {
        assert_eq!(quote_table("(SELECT 1)"), "(SELECT 1)");
        assert_eq!(quote_table("{{user}}"), "{{user}}");
        assert_eq!(quote_table("[[user]]"), "[[user]]");
        assert_eq!(quote_table("[[u]].[[id]]"), "[[u]].[[id]]");
        assert_eq!(quote_table("`user`"), "`user`");
    }

    #[test]
    fn quote_column_variants() {
        assert_eq!(quote_column("name"), "`name`");
        assert_eq!(quote_column("u.name"), "`u`.`name`");
        assert_eq!(quote_column("*"), "*");
        assert_eq!(quote_column("u.*"), "`u`.*");
        assert_eq!(quote_column("COUNT(id)"), "COUNT(id)");
    }

    #[test]
    fn quote_column_is_idempotent_on_markers() {
        assert_eq!(quote_column("[[x]]"), "[[x]]");
        assert_eq!(quote_column("`x`"), "`x`");
    }

    #[test]
    fn prefix_resolution() {
        assert_eq!(resolve_prefixed_table("{{%user}}", "cms_"), "`cms_user`");
        assert_eq!(resolve_prefixed_table("{{user%}}", "_cms"), "`user_cms`");
        assert_eq!(resolve_prefixed_table("{{user}}", "cms_"), "`user`");
        assert_eq!(resolve_prefixed_table("{{wp_user}}", "cms_"), "`wp_user`");
        assert_eq!(resolve_prefixed_table("%user", "cms_"), "`cms_user`");
    }

    #[test]
    fn quote_sql_replaces_all_markers() {
        let sql = quote_sql(
            "SELECT [[u.id]], [[name]] FROM {{%user}} WHERE [[status]] = ?",
            "cms_",
        );
        assert_eq!(
            sql,
            "SELECT `u`.`id`, `name` FROM `cms_user` WHERE `status` = ?"
        );
    }

    #[test]
    fn quote_sql_without_markers_borrows() {
        let sql = quote_sql("SELECT 1", "cms_");
        assert!(matches!(sql, Cow::Borrowed(_)));
    }

    #[test]
    fn table_marker_wraps_bare_names() {
        assert_eq!(table_marker("user").unwrap(), "{{%user}}");
        assert_eq!(table_marker("{{user}}").unwrap(), "{{user}}");
        assert_eq!(table_marker("{{%user%}}").unwrap(), "{{%user%}}");
        assert_eq!(table_marker("db.user").unwrap(), "{{%db.user}}");
    }

    #[test]
    fn table_marker_rejects_bad_names() {
        assert!(table_marker("user; DROP TABLE x").is_err());
        assert!(table_marker("").is_err());
        assert!(table_marker("{{user}} u").is_err());
        assert!(table_marker("us er").is_err());
    }

    #[test]
    fn column_names_are_checked() {
        assert!(check_column_name("user_name").is_ok());
        assert!(check_column_name("u.name").is_ok());
        assert!(check_column_name("first-name").is_ok());
        assert!(check_column_name("name = 1 OR 1").is_err());
        assert!(check_column_name("").is_err());
        assert_eq!(column_marker("id").unwrap(), "[[id]]");
    }
}
