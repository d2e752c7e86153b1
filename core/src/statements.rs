//! Staging-table lifecycle and merge statement synthesis.
//!
//! The flow these builders support: create an empty structural copy of the
//! destination table, open a binary COPY channel into it, then fold the
//! staged rows into the live table with a single merge statement.

use tracing::debug;

use crate::query_builder::{column_list, comma_separated_columns, quote_identifiers};
use crate::table_info::{BulkConfig, OperationType, TableInfo};
use crate::types::Sql;

#[derive(thiserror::Error, Debug)]
pub enum MergeTableError {
    #[error("{0} is not supported for PostgreSQL, use a combination of InsertOrUpdate with Read and Delete")]
    UnsupportedOperation(OperationType),
}

/// Generates SQL to create an empty structural copy of a table.
///
/// Columns, types and defaults carry over; constraints and indexes do not.
pub fn create_staging_table(existing_table_name: &str, new_table_name: &str) -> Sql {
    let q = format!("CREATE TABLE {new_table_name} AS TABLE {existing_table_name} WITH NO DATA;");
    Sql::new(quote_identifiers(&q))
}

/// Generates the COPY statement that opens a binary bulk-load channel.
///
/// The target is the explicit `table_name` when given, otherwise the staging
/// table when the metadata routes loads through it, otherwise the live table.
/// The column order fixed here is the order the caller must stream
/// binary-encoded rows in.
pub fn copy_into_table(
    table_info: &TableInfo,
    config: &BulkConfig,
    operation: OperationType,
    table_name: Option<&str>,
) -> Sql {
    let table_name = table_name.unwrap_or(if table_info.insert_to_temp_table {
        &table_info.full_temp_table_name
    } else {
        &table_info.full_table_name
    });
    let table_name = quote_identifiers(table_name);

    let columns = column_list(table_info, config, operation);
    let columns_text = quote_identifiers(&comma_separated_columns(&columns, None, None));

    Sql::new(format!(
        "COPY {table_name} ({columns_text}) FROM STDIN (FORMAT BINARY);"
    ))
}

/// Generates the merge statement folding staging-table rows into the live
/// table for the given operation.
///
/// `Read` joins the staging table back on the primary key, `Delete` removes
/// every matched row, the insert variants upsert over the primary-key
/// conflict target. `InsertOrUpdateOrDelete` has no single-statement
/// PostgreSQL equivalent and fails before any text is assembled.
pub fn merge_table(
    table_info: &TableInfo,
    config: &BulkConfig,
    operation: OperationType,
) -> Result<Sql, MergeTableError> {
    if operation == OperationType::InsertOrUpdateOrDelete {
        return Err(MergeTableError::UnsupportedOperation(operation));
    }

    let full_table_name = &table_info.full_table_name;
    let full_temp_table_name = &table_info.full_temp_table_name;
    let primary_key_columns = table_info.primary_key_columns();

    let mut q = match operation {
        OperationType::Read => {
            let read_by_columns = comma_separated_columns(&primary_key_columns, None, None);

            format!(
                "SELECT {full_table_name}.* FROM {full_table_name} \
                 JOIN {full_temp_table_name} USING ({read_by_columns})"
            )
        }
        OperationType::Delete => {
            let delete_by_columns = comma_separated_columns(
                &primary_key_columns,
                Some(full_table_name),
                Some(full_temp_table_name),
            )
            .replace(',', " AND");

            format!(
                "DELETE FROM {full_table_name} \
                 USING {full_temp_table_name} \
                 WHERE {delete_by_columns}"
            )
        }
        _ => {
            let columns = column_list(table_info, config, operation);
            let columns_text = comma_separated_columns(&columns, None, None);
            let update_by_columns = comma_separated_columns(&primary_key_columns, None, None);

            // the SET list derives from the insert column set, narrowed to
            // columns the host marked as updatable
            let insert_columns = column_list(table_info, config, OperationType::Insert);
            let columns_to_update: Vec<String> = insert_columns
                .into_iter()
                .filter(|column| {
                    table_info
                        .property_column_names_update
                        .iter()
                        .any(|(_, update_column)| update_column == column)
                })
                .collect();
            let equals_columns =
                comma_separated_columns(&columns_to_update, None, Some("EXCLUDED"));

            let mut q = format!(
                "INSERT INTO {full_table_name} ({columns_text}) \
                 (SELECT {columns_text} FROM {full_temp_table_name}) \
                 ON CONFLICT ({update_by_columns}) \
                 DO UPDATE SET {equals_columns}"
            );

            if table_info.created_output_table {
                let returning_columns =
                    comma_separated_columns(&table_info.mapped_columns(), None, None);
                q.push_str(&format!(" RETURNING {returning_columns}"));
            }

            q
        }
    };

    q = quote_identifiers(&q);
    q.push(';');

    let q = apply_source_destination_mappings(q, config);

    debug!("Generated {} merge statement: {}", operation, q);

    Ok(Sql::new(q))
}

/// Substitutes caller-supplied source column names for destination column
/// names inside the projection list of an assembled merge statement.
///
/// The projection segment is bounded by the first `SELECT ` and the first
/// ` FROM`; identical column literals outside it (insert list, conflict
/// target, SET list, RETURNING) stay untouched. The statement is only
/// re-spliced when a substitution actually changed the segment.
fn apply_source_destination_mappings(q: String, config: &BulkConfig) -> String {
    if config.custom_source_table_name.is_none() {
        return q;
    }
    let mappings = match &config.custom_source_destination_mapping_columns {
        Some(mappings) if !mappings.is_empty() => mappings,
        _ => return q,
    };

    let start_index = match q.find("SELECT ") {
        Some(index) => index,
        None => return q,
    };
    let from_index = match q.find(" FROM") {
        Some(index) if index > start_index => index,
        _ => return q,
    };

    let segment = q[start_index..from_index].to_string();
    let mut segment_updated = segment.clone();
    for (source_column, destination_column) in mappings {
        let destination_formatted = format!("\"{destination_column}\"");
        if segment.contains(&destination_formatted) {
            segment_updated =
                segment_updated.replace(&destination_formatted, &format!("\"{source_column}\""));
        }
    }

    if segment != segment_updated {
        q.replace(&segment, &segment_updated)
    } else {
        q
    }
}

/// Generates SQL to truncate a table, resetting identity sequences.
///
/// RESTART IDENTITY is not undoable by a transaction rollback on every
/// engine configuration; callers own that caveat.
pub fn truncate_table(table_name: &str) -> Sql {
    Sql::new(quote_identifiers(&format!(
        "TRUNCATE {table_name} RESTART IDENTITY;"
    )))
}

/// Generates SQL to drop a table. Safe to run when the table does not exist.
pub fn drop_table(table_name: &str) -> Sql {
    Sql::new(quote_identifiers(&format!(
        "DROP TABLE IF EXISTS {table_name}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn item_table_info() -> TableInfo {
        TableInfo {
            table_name: "Item".to_string(),
            schema: None,
            full_table_name: "[Item]".to_string(),
            full_temp_table_name: "[ItemTemp1234]".to_string(),
            property_column_names: vec![
                ("ItemId".to_string(), "ItemId".to_string()),
                ("Name".to_string(), "Name".to_string()),
                ("Price".to_string(), "Price".to_string()),
            ],
            primary_keys_property_column_names: vec![(
                "ItemId".to_string(),
                "ItemId".to_string(),
            )],
            property_column_names_update: vec![
                ("Name".to_string(), "Name".to_string()),
                ("Price".to_string(), "Price".to_string()),
            ],
            default_value_properties: HashSet::new(),
            identity_column_name: Some("ItemId".to_string()),
            insert_to_temp_table: true,
            created_output_table: false,
        }
    }

    #[test]
    fn test_create_staging_table() {
        let sql = create_staging_table("[Item]", "[ItemTemp1234]");
        assert_eq!(
            sql.as_str(),
            "CREATE TABLE \"ItemTemp1234\" AS TABLE \"Item\" WITH NO DATA;"
        );
    }

    #[test]
    fn test_create_staging_table_is_deterministic() {
        let first = create_staging_table("[Item]", "[ItemTemp1234]");
        let second = create_staging_table("[Item]", "[ItemTemp1234]");
        assert_eq!(first.as_str(), second.as_str());
    }

    #[test]
    fn test_copy_into_table_routes_to_staging_table() {
        let sql = copy_into_table(
            &item_table_info(),
            &BulkConfig::default(),
            OperationType::Insert,
            None,
        );
        assert_eq!(
            sql.as_str(),
            "COPY \"ItemTemp1234\" (\"Name\", \"Price\") FROM STDIN (FORMAT BINARY);"
        );
    }

    #[test]
    fn test_copy_into_table_live_table_and_override() {
        let mut table_info = item_table_info();
        table_info.insert_to_temp_table = false;

        let sql = copy_into_table(
            &table_info,
            &BulkConfig::default(),
            OperationType::Insert,
            None,
        );
        assert_eq!(
            sql.as_str(),
            "COPY \"Item\" (\"Name\", \"Price\") FROM STDIN (FORMAT BINARY);"
        );

        let sql = copy_into_table(
            &table_info,
            &BulkConfig::default(),
            OperationType::Insert,
            Some("[Other]"),
        );
        assert_eq!(
            sql.as_str(),
            "COPY \"Other\" (\"Name\", \"Price\") FROM STDIN (FORMAT BINARY);"
        );
    }

    #[test]
    fn test_merge_table_read() {
        let sql = merge_table(
            &item_table_info(),
            &BulkConfig::default(),
            OperationType::Read,
        )
        .unwrap();
        assert_eq!(
            sql.as_str(),
            "SELECT \"Item\".* FROM \"Item\" JOIN \"ItemTemp1234\" USING (\"ItemId\");"
        );
    }

    #[test]
    fn test_merge_table_delete() {
        let sql = merge_table(
            &item_table_info(),
            &BulkConfig::default(),
            OperationType::Delete,
        )
        .unwrap();
        assert_eq!(
            sql.as_str(),
            "DELETE FROM \"Item\" USING \"ItemTemp1234\" \
             WHERE \"Item\".\"ItemId\" = \"ItemTemp1234\".\"ItemId\";"
        );
    }

    #[test]
    fn test_merge_table_delete_composite_key() {
        let mut table_info = item_table_info();
        table_info.primary_keys_property_column_names = vec![
            ("ItemId".to_string(), "ItemId".to_string()),
            ("Name".to_string(), "Name".to_string()),
        ];

        let sql = merge_table(&table_info, &BulkConfig::default(), OperationType::Delete).unwrap();
        assert_eq!(
            sql.as_str(),
            "DELETE FROM \"Item\" USING \"ItemTemp1234\" \
             WHERE \"Item\".\"ItemId\" = \"ItemTemp1234\".\"ItemId\" AND \
             \"Item\".\"Name\" = \"ItemTemp1234\".\"Name\";"
        );
    }

    #[test]
    fn test_merge_table_insert_or_update() {
        let sql = merge_table(
            &item_table_info(),
            &BulkConfig::default(),
            OperationType::InsertOrUpdate,
        )
        .unwrap();
        assert_eq!(
            sql.as_str(),
            "INSERT INTO \"Item\" (\"ItemId\", \"Name\", \"Price\") \
             (SELECT \"ItemId\", \"Name\", \"Price\" FROM \"ItemTemp1234\") \
             ON CONFLICT (\"ItemId\") \
             DO UPDATE SET \"Name\" = EXCLUDED.\"Name\", \"Price\" = EXCLUDED.\"Price\";"
        );
    }

    #[test]
    fn test_merge_table_returning_output_rows() {
        let mut table_info = item_table_info();
        table_info.created_output_table = true;

        let sql = merge_table(
            &table_info,
            &BulkConfig::default(),
            OperationType::InsertOrUpdate,
        )
        .unwrap();
        assert!(sql
            .as_str()
            .ends_with(" RETURNING \"ItemId\", \"Name\", \"Price\";"));
    }

    #[test]
    fn test_merge_table_unsupported_operation() {
        let error = merge_table(
            &item_table_info(),
            &BulkConfig::default(),
            OperationType::InsertOrUpdateOrDelete,
        )
        .unwrap_err();

        let message = error.to_string();
        assert!(message.contains("InsertOrUpdateOrDelete"));
        assert!(message.contains("InsertOrUpdate with Read and Delete"));
    }

    #[test]
    fn test_custom_mapping_only_rewrites_projection_segment() {
        let mut table_info = item_table_info();
        table_info.created_output_table = true;

        let config = BulkConfig {
            custom_source_table_name: Some("staging_items".to_string()),
            custom_source_destination_mapping_columns: Some(vec![(
                "src_price".to_string(),
                "Price".to_string(),
            )]),
            ..Default::default()
        };

        let sql = merge_table(&table_info, &config, OperationType::InsertOrUpdate).unwrap();
        assert_eq!(
            sql.as_str(),
            "INSERT INTO \"Item\" (\"ItemId\", \"Name\", \"Price\") \
             (SELECT \"ItemId\", \"Name\", \"src_price\" FROM \"ItemTemp1234\") \
             ON CONFLICT (\"ItemId\") \
             DO UPDATE SET \"Name\" = EXCLUDED.\"Name\", \"Price\" = EXCLUDED.\"Price\" \
             RETURNING \"ItemId\", \"Name\", \"Price\";"
        );
    }

    #[test]
    fn test_custom_mapping_without_match_leaves_statement_unchanged() {
        let config = BulkConfig {
            custom_source_table_name: Some("staging_items".to_string()),
            custom_source_destination_mapping_columns: Some(vec![(
                "src_x".to_string(),
                "NotAColumn".to_string(),
            )]),
            ..Default::default()
        };

        let with_mapping =
            merge_table(&item_table_info(), &config, OperationType::InsertOrUpdate).unwrap();
        let without_mapping = merge_table(
            &item_table_info(),
            &BulkConfig::default(),
            OperationType::InsertOrUpdate,
        )
        .unwrap();
        assert_eq!(with_mapping.as_str(), without_mapping.as_str());
    }

    #[test]
    fn test_custom_mapping_requires_custom_source_table() {
        let config = BulkConfig {
            custom_source_destination_mapping_columns: Some(vec![(
                "src_price".to_string(),
                "Price".to_string(),
            )]),
            ..Default::default()
        };

        let sql = merge_table(&item_table_info(), &config, OperationType::InsertOrUpdate).unwrap();
        assert!(sql.as_str().contains("\"Price\" FROM \"ItemTemp1234\""));
    }

    #[test]
    fn test_truncate_table() {
        let sql = truncate_table("[Item]");
        assert_eq!(sql.as_str(), "TRUNCATE \"Item\" RESTART IDENTITY;");
    }

    #[test]
    fn test_drop_table() {
        let sql = drop_table("[ItemTemp1234]");
        assert_eq!(sql.as_str(), "DROP TABLE IF EXISTS \"ItemTemp1234\"");
    }
}
