//! Table rebuilder.
//!
//! SQLite's ALTER TABLE cannot express most structural changes (dropping
//! several columns at once, changing types or constraints), so a changed
//! table is rebuilt with the create-copy-drop-rename procedure: create
//! the desired table under a temporary name, copy the rows for the
//! columns common to both definitions, drop the old table, rename the
//! temporary one into place. Runs inside the orchestrator's transaction
//! with foreign key enforcement suspended; any failure aborts the whole
//! transaction.
//!
//! Indexes and triggers owned by the table are destroyed by the drop and
//! recreated by the final phase of the plan, from the desired
//! definitions.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::catalog::{table_columns, SchemaObject};
use crate::ddl::{quote_ident, rename_create_table};
use crate::error::Result;
use crate::sync::execute_statement;

/// Prefix of the temporary table used during a rebuild. Only ever
/// visible inside the rebuild transaction.
const TEMP_PREFIX: &str = "schemasync_new_";

/// Rebuilds `old` into `new`, preserving the rows of every column that
/// exists, by name, in both definitions.
pub async fn rebuild_table(
    conn: &mut SqliteConnection,
    old: &SchemaObject,
    new: &SchemaObject,
) -> Result<()> {
    let temp_name = format!("{TEMP_PREFIX}{}", new.name);
    debug!(table = %new.name, temp = %temp_name, "Rebuilding table");

    // 1. Create the desired table under the temporary name.
    let create_sql = rename_create_table(&new.definition, &new.name, &temp_name)?;
    execute_statement(conn, &create_sql).await?;

    // 2. Copy the columns common to both definitions. Dropped columns
    //    are discarded; added columns take their declared default.
    let old_columns = table_columns(conn, &old.name).await?;
    let new_columns = table_columns(conn, &temp_name).await?;
    let shared: Vec<String> = new_columns
        .into_iter()
        .filter(|c| old_columns.iter().any(|o| o.eq_ignore_ascii_case(c)))
        .collect();

    if shared.is_empty() {
        debug!(table = %new.name, "No columns in common, copying nothing");
    } else {
        let column_list = shared
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let copy_sql = format!(
            "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
            quote_ident(&temp_name),
            quote_ident(&old.name)
        );
        execute_statement(conn, &copy_sql).await?;
    }

    // 3. Drop the old table (its indexes and triggers go with it).
    execute_statement(conn, &format!("DROP TABLE {}", quote_ident(&old.name))).await?;

    // 4. Rename the temporary table into place.
    execute_statement(
        conn,
        &format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(&temp_name),
            quote_ident(&new.name)
        ),
    )
    .await?;

    Ok(())
}
