use std::collections::HashSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The kind of bulk operation a statement is being built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Insert,
    InsertOrUpdate,
    InsertOrUpdateOrDelete,
    Update,
    Delete,
    Read,
}

impl Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationType::Insert => "Insert",
            OperationType::InsertOrUpdate => "InsertOrUpdate",
            OperationType::InsertOrUpdateOrDelete => "InsertOrUpdateOrDelete",
            OperationType::Update => "Update",
            OperationType::Delete => "Delete",
            OperationType::Read => "Read",
        };
        write!(f, "{name}")
    }
}

/// Per-call options supplied by the host application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Keep caller-supplied identity values instead of letting the database
    /// generate them.
    pub keep_identity: bool,
    /// Staging source table to read from instead of the default staging table.
    pub custom_source_table_name: Option<String>,
    /// Source column name to destination column name substitutions applied to
    /// the merge statement's projection list.
    pub custom_source_destination_mapping_columns: Option<Vec<(String, String)>>,
}

/// Resolved metadata of a destination table and its staging copy.
///
/// Built once by the host's metadata layer and shared read-only between
/// callers; no builder in this crate mutates it, so one instance can back
/// concurrent statement generation.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_name: String,
    pub schema: Option<String>,
    pub full_table_name: String,
    pub full_temp_table_name: String,
    /// Ordered property to column mapping. The order is load-bearing: it
    /// drives the column order of COPY and INSERT column lists.
    pub property_column_names: Vec<(String, String)>,
    /// Ordered primary-key subset of the mapping. The order determines the
    /// conflict target and USING clause column order.
    pub primary_keys_property_column_names: Vec<(String, String)>,
    /// Columns allowed to be rewritten by the upsert SET list.
    pub property_column_names_update: Vec<(String, String)>,
    /// Properties whose columns carry a database default and are omitted from
    /// plain inserts.
    pub default_value_properties: HashSet<String>,
    pub identity_column_name: Option<String>,
    /// Route bulk loads through the staging table rather than the live table.
    pub insert_to_temp_table: bool,
    /// Append a RETURNING clause to merge statements.
    pub created_output_table: bool,
}

impl TableInfo {
    pub fn has_identity(&self) -> bool {
        self.identity_column_name.is_some()
    }

    /// Destination column names of the primary-key subset, in order.
    pub fn primary_key_columns(&self) -> Vec<String> {
        self.primary_keys_property_column_names
            .iter()
            .map(|(_, column)| column.clone())
            .collect()
    }

    /// All mapped destination column names, in definition order.
    pub fn mapped_columns(&self) -> Vec<String> {
        self.property_column_names
            .iter()
            .map(|(_, column)| column.clone())
            .collect()
    }
}
