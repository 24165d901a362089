//! SQL identifier quoting and statement assembly
//!
//! Operators never concatenate SQL ad hoc; the statements they send to the
//! warehouse are built here so they can be unit-tested without a connection.

use crate::table_name::TableName;

/// Quote a SQL identifier, doubling embedded double quotes.
///
/// # Examples
/// ```
/// use wf_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("users"), r#""users""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a potentially schema-qualified name, one component at a time.
///
/// # Examples
/// ```
/// use wf_core::sql_utils::quote_qualified;
/// assert_eq!(quote_qualified("staging.events"), r#""staging"."events""#);
/// ```
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Escape a value for use inside a single-quoted SQL string literal.
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// `TRUNCATE TABLE <table>`
pub fn truncate_statement(table: &TableName) -> String {
    format!("TRUNCATE TABLE {}", table.quoted())
}

/// `INSERT INTO <table> (<columns>) <select>`
///
/// An empty column list omits the parenthesised list entirely. Trailing
/// semicolons on the select are dropped so the statement stays single.
pub fn insert_select_statement(table: &TableName, columns: &[String], select: &str) -> String {
    let select = strip_trailing_semicolons(select);
    if columns.is_empty() {
        format!("INSERT INTO {}\n{}", table.quoted(), select)
    } else {
        let cols = columns
            .iter()
            .map(|c| quote_ident(c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("INSERT INTO {} ({})\n{}", table.quoted(), cols, select)
    }
}

/// `SELECT COUNT(*) FROM <table>`
pub fn row_count_query(table: &TableName) -> String {
    format!("SELECT COUNT(*) FROM {}", table.quoted())
}

/// Trim whitespace and any trailing `;` from a statement.
pub fn strip_trailing_semicolons(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

#[cfg(test)]
#[path = "sql_utils_test.rs"]
mod tests;
