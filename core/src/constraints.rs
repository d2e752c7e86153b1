//! Unique-constraint probing and the temporary unique index/constraint
//! lifecycle used to establish an upsert conflict target when the table has
//! none.

use tracing::info;

use crate::table_info::TableInfo;
use crate::types::Sql;

/// Deterministic name shared by the temporary unique index and the constraint
/// promoted from it.
///
/// Pure function of schema, table and ordered primary-key columns, so a
/// create/drop pair computed from the same metadata always matches.
pub fn unique_constraint_name(table_info: &TableInfo) -> String {
    let schema_dash = match &table_info.schema {
        Some(schema) => format!("{schema}_"),
        None => String::new(),
    };
    let unique_columns_dash = table_info.primary_key_columns().join("_");

    format!(
        "tempUniqueIndex_{schema_dash}{}_{unique_columns_dash}",
        table_info.table_name
    )
}

fn formatted_full_table_name(table_info: &TableInfo) -> String {
    let schema_formatted = match &table_info.schema {
        Some(schema) => format!("\"{schema}\"."),
        None => String::new(),
    };
    format!("{schema_formatted}\"{}\"", table_info.table_name)
}

/// Generates the catalog query counting UNIQUE or PRIMARY KEY constraints
/// covering every primary-key column of the table.
///
/// One constraint-column-usage reference is joined per primary-key column
/// (aliased `cu0`, `cu1`, ...). A zero count means no conflict target exists
/// and a temporary unique index has to be created before an upsert can run.
pub fn count_unique_constraints(table_info: &TableInfo) -> Sql {
    let mut q = String::from("SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc ");

    for (index, pk_column) in table_info.primary_key_columns().iter().enumerate() {
        q.push_str(&format!(
            "INNER JOIN INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE cu{index} \
             ON cu{index}.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
             AND cu{index}.COLUMN_NAME = '{pk_column}' "
        ));
    }

    q.push_str(&format!(
        "WHERE (tc.CONSTRAINT_TYPE = 'UNIQUE' OR tc.CONSTRAINT_TYPE = 'PRIMARY KEY') \
         AND tc.TABLE_NAME = '{}' ",
        table_info.table_name
    ));

    Sql::new(q)
}

/// Generates SQL to build the temporary unique index without blocking writes.
pub fn create_unique_index(table_info: &TableInfo) -> Sql {
    let unique_columns = table_info.primary_key_columns();
    let unique_columns_formatted = format!("\"{}\"", unique_columns.join("\", \""));
    let index_name = unique_constraint_name(table_info);

    info!(
        "Creating temporary unique index: table - {} index - {}",
        table_info.table_name, index_name
    );

    // CONCURRENTLY is used to avoid locking the table for writes
    Sql::new(format!(
        "CREATE UNIQUE INDEX CONCURRENTLY IF NOT EXISTS \"{index_name}\" \
         ON {} ({unique_columns_formatted});",
        formatted_full_table_name(table_info)
    ))
}

/// Generates SQL to promote the temporary unique index into a constraint
/// usable as an upsert conflict target, without a table rewrite.
pub fn create_unique_constraint(table_info: &TableInfo) -> Sql {
    let constraint_name = unique_constraint_name(table_info);

    Sql::new(format!(
        "ALTER TABLE {} \
         ADD CONSTRAINT \"{constraint_name}\" \
         UNIQUE USING INDEX \"{constraint_name}\";",
        formatted_full_table_name(table_info)
    ))
}

/// Generates SQL to drop the temporary constraint created above, using the
/// same deterministic name.
pub fn drop_unique_constraint(table_info: &TableInfo) -> Sql {
    let constraint_name = unique_constraint_name(table_info);

    info!(
        "Dropping temporary unique constraint: table - {} constraint - {}",
        table_info.table_name, constraint_name
    );

    Sql::new(format!(
        "ALTER TABLE {} DROP CONSTRAINT \"{constraint_name}\";",
        formatted_full_table_name(table_info)
    ))
}
