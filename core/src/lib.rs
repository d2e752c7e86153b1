//! SQL statement builders for PostgreSQL bulk set operations using a
//! staging-table strategy: rows are bulk-loaded into a structural copy of the
//! destination table, then merged into it with a single statement.

mod batch;
mod constraints;
mod query_builder;
mod statements;
mod table_info;
mod types;

pub use batch::{restructure_for_batch, BatchRewriteError, BatchStatementKind};
pub use constraints::{
    count_unique_constraints, create_unique_constraint, create_unique_index,
    drop_unique_constraint, unique_constraint_name,
};
pub use query_builder::{column_list, comma_separated_columns, quote_identifiers};
pub use statements::{
    copy_into_table, create_staging_table, drop_table, merge_table, truncate_table,
    MergeTableError,
};
pub use table_info::{BulkConfig, OperationType, TableInfo};
pub use types::Sql;
