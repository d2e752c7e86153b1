//! Rewrites generic batch UPDATE/DELETE statements into the multi-table
//! syntax PostgreSQL accepts.
//!
//! The upstream batch generator emits one fixed statement shape per kind:
//!
//! - `DELETE {a} FROM {table} AS {a} WHERE {predicate}`
//! - `UPDATE {a} SET {assignments} FROM {table} AS {a} [JOIN {table2} ON
//!   {join predicate}] WHERE {predicate}`
//!
//! with a single-character alias `{a}` directly after the verb. This module
//! only tokenizes those known markers and splices the statement around them;
//! it is deliberately not a SQL parser. Input that misses an expected marker
//! is rejected instead of being spliced into garbled SQL.

use tracing::debug;

use crate::query_builder::quote_identifiers;
use crate::types::Sql;

/// The statement shapes the rewriter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatementKind {
    Update,
    Delete,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BatchRewriteError {
    #[error("batch statement is too short to carry an alias after the leading verb")]
    StatementTooShort,

    #[error("batch statement is missing the expected `{0}` marker")]
    MissingMarker(&'static str),
}

// `DELETE ` and `UPDATE ` are both seven bytes; the generator places the
// alias right after the verb.
const ALIAS_OFFSET: usize = 7;

/// Rewrites a generic batch statement into PostgreSQL syntax.
pub fn restructure_for_batch(
    sql: &str,
    kind: BatchStatementKind,
) -> Result<Sql, BatchRewriteError> {
    let sql = quote_identifiers(sql);

    let alias = sql
        .get(ALIAS_OFFSET..)
        .and_then(|rest| rest.chars().next())
        .ok_or(BatchRewriteError::StatementTooShort)?;

    let rewritten = match kind {
        BatchStatementKind::Delete => restructure_delete(&sql, alias)?,
        BatchStatementKind::Update => restructure_update(&sql, alias)?,
    };

    debug!("Restructured batch statement: {}", rewritten);

    Ok(Sql::new(rewritten))
}

/// PostgreSQL expresses the delete filter purely through the table and alias
/// after FROM, so the alias after the verb is dropped outright.
fn restructure_delete(sql: &str, alias: char) -> Result<String, BatchRewriteError> {
    let leading = format!("DELETE {alias}");
    if !sql.starts_with(&leading) {
        return Err(BatchRewriteError::MissingMarker("DELETE <alias>"));
    }

    // keeps the space that separated verb and alias, output reads `DELETE  FROM`
    Ok(format!("DELETE {}", &sql[leading.len()..]))
}

fn restructure_update(sql: &str, alias: char) -> Result<String, BatchRewriteError> {
    let leading = format!("UPDATE {alias}");
    if !sql.starts_with(&leading) {
        return Err(BatchRewriteError::MissingMarker("UPDATE <alias>"));
    }

    let from_index = sql
        .find("FROM")
        .ok_or(BatchRewriteError::MissingMarker("FROM"))?;
    let as_marker = format!("AS {alias}");
    let as_index = match sql.find(&as_marker) {
        Some(index) if index > from_index => index,
        _ => return Err(BatchRewriteError::MissingMarker("AS <alias>")),
    };

    // the segment keeps its alias marker so the rewritten head stays aliased,
    // e.g. `UPDATE "Item" AS i SET ...`
    let table_segment = &sql[from_index + "FROM".len()..as_index + as_marker.len()];

    let rewritten = if let Some(join_index) = sql.find("JOIN ") {
        let on_index = match sql.find(" ON") {
            Some(index) if index > join_index => index,
            _ => return Err(BatchRewriteError::MissingMarker(" ON")),
        };
        let where_index = match sql.find("WHERE") {
            Some(index) if index > on_index => index,
            _ => return Err(BatchRewriteError::MissingMarker("WHERE")),
        };

        let joined_table = &sql[join_index + "JOIN ".len()..on_index];
        let join_predicate = &sql[on_index + " ON".len()..where_index];
        let old_segment = &sql[from_index..where_index];

        // the joined table becomes the sole FROM target and the join
        // predicate moves into the WHERE clause
        let mut rewritten = sql.replacen(old_segment, &format!("FROM {joined_table}"), 1);
        rewritten = rewritten.replacen("WHERE", " WHERE", 1);
        rewritten.push_str(" AND");
        rewritten.push_str(join_predicate);
        rewritten
    } else {
        sql.replacen(&as_marker, "", 1)
    };

    Ok(rewritten.replacen(&leading, &format!("UPDATE{table_segment}"), 1))
}
