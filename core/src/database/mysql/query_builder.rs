//! SQL text for the page read and the batch writes.
//!
//! Table, key column, predicate and SET clause are operator supplied and embedded
//! verbatim. Cursor, limit and keys are always bound as parameters; the `render_*`
//! variants inline them only for the statement echoed to the log.

use crate::config::WriteAction;

fn page_select(
    table: &str,
    primary_key: &str,
    where_clause: &str,
    cursor: &str,
    limit: &str,
) -> String {
    // The predicate is parenthesised so an OR inside it can not escape the cursor bound.
    // The alias must not shadow the key column, or ORDER BY sorts the cast and skips the index.
    format!(
        "SELECT CAST({pk} AS SIGNED) AS batch_key FROM {table} WHERE ({where_clause}) AND {pk} > {cursor} ORDER BY {pk} ASC LIMIT {limit}",
        pk = primary_key,
    )
}

/// Builds the page read with `?` placeholders for the cursor and the limit.
pub fn build_page_select(table: &str, primary_key: &str, where_clause: &str) -> String {
    page_select(table, primary_key, where_clause, "?", "?")
}

pub fn render_page_select(
    table: &str,
    primary_key: &str,
    where_clause: &str,
    cursor: i64,
    limit: u64,
) -> String {
    page_select(table, primary_key, where_clause, &cursor.to_string(), &limit.to_string())
}

fn write_statement(action: &WriteAction, table: &str, primary_key: &str, in_list: &str) -> String {
    match action {
        WriteAction::Update { set_clause } => {
            format!("UPDATE {} SET {} WHERE {} IN ({})", table, set_clause, primary_key, in_list)
        }
        WriteAction::Delete => {
            format!("DELETE FROM {} WHERE {} IN ({})", table, primary_key, in_list)
        }
    }
}

#[inline]
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Builds the UPDATE or DELETE restricted to `key_count` bound keys.
pub fn build_write_statement(
    action: &WriteAction,
    table: &str,
    primary_key: &str,
    key_count: usize,
) -> String {
    write_statement(action, table, primary_key, &placeholders(key_count))
}

pub fn render_write_statement(
    action: &WriteAction,
    table: &str,
    primary_key: &str,
    keys: &[i64],
) -> String {
    let in_list = keys.iter().map(|key| key.to_string()).collect::<Vec<_>>().join(", ");
    write_statement(action, table, primary_key, &in_list)
}
