//! Shared SQL rendering helpers used by every statement builder in this crate.

use crate::table_info::{BulkConfig, OperationType, TableInfo};

/// Converts generic bracket-quoted identifiers (`[name]`) into the
/// double-quoted form PostgreSQL accepts (`"name"`).
///
/// Every public statement builder applies this exactly once, as the last
/// assembly step, so no generic brackets leak into the output. It is not
/// idempotent on already double-quoted input and must not be applied twice.
pub fn quote_identifiers(sql: &str) -> String {
    sql.chars()
        .map(|c| if c == '[' || c == ']' { '"' } else { c })
        .collect()
}

/// Renders a comma-separated column list in generic bracket quoting.
///
/// `prefix_table` prefixes every column reference; `equals_table` turns each
/// entry into an equality against the same column of another table, which
/// covers both upsert SET lists (`EXCLUDED`) and staging-table predicates.
pub fn comma_separated_columns(
    columns: &[String],
    prefix_table: Option<&str>,
    equals_table: Option<&str>,
) -> String {
    columns
        .iter()
        .map(|column| {
            let mut rendered = match prefix_table {
                Some(prefix) => format!("{prefix}.[{column}]"),
                None => format!("[{column}]"),
            };
            if let Some(equals) = equals_table {
                rendered.push_str(&format!(" = {equals}.[{column}]"));
            }
            rendered
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolves the ordered destination column list participating in a statement.
///
/// For inserts, columns with a database default are omitted so the database
/// supplies them. The identity column is dropped unless the caller keeps
/// identity values, or the column doubles as the conflict target outside of
/// plain inserts. Filtering happens on a locally built list; the shared
/// [`TableInfo`] is never touched.
pub fn column_list(
    table_info: &TableInfo,
    config: &BulkConfig,
    operation: OperationType,
) -> Vec<String> {
    let mut columns: Vec<String> = table_info
        .property_column_names
        .iter()
        .filter(|(property, _)| {
            operation != OperationType::Insert
                || !table_info.default_value_properties.contains(property)
        })
        .map(|(_, column)| column.clone())
        .collect();

    if let Some(identity) = &table_info.identity_column_name {
        let first_unique_column = table_info
            .primary_keys_property_column_names
            .first()
            .map(|(_, column)| column);

        if !config.keep_identity
            && (operation == OperationType::Insert || first_unique_column != Some(identity))
        {
            columns.retain(|column| column != identity);
        }
    }

    columns
}
