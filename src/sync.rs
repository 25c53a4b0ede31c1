//! Transaction orchestrator.
//!
//! Entry point of the synchronizer: capture the live catalog, load the
//! desired catalog, diff them, then apply the resulting plan inside a
//! single write transaction with foreign key enforcement suspended. A
//! foreign key check runs before commit; any failure rolls the whole
//! transaction back, leaving the live schema exactly as it was.
//!
//! The caller owns the write connection for the duration of the call
//! and must not hand out read connections on the same file until it
//! returns. Nothing here is retried: the schema text is static, so a
//! retry would reproduce the same failure.

use sqlx::{Connection, Row, SqliteConnection};
use tracing::{debug, info};

use crate::catalog::capture;
use crate::diff::{diff, Action, Plan};
use crate::error::{IntegrityViolation, Result, SyncError};
use crate::loader::load_desired;
use crate::rebuild::rebuild_table;

/// What a plan application changed, for logging.
#[derive(Debug, Default)]
struct SyncStats {
    created: usize,
    dropped: usize,
    rebuilt: usize,
}

/// Computes the plan that would bring the live database in line with
/// `schema_text`, without applying it.
pub async fn plan(conn: &mut SqliteConnection, schema_text: &str) -> Result<Plan> {
    let live = capture(conn).await?;
    let desired = load_desired(schema_text).await?;
    diff(&live, &desired)
}

/// Synchronizes the live database with the desired schema.
///
/// On success the live structure equals the desired one; on failure it
/// is unchanged. Calling this twice with the same text computes an
/// empty plan on the second call and performs no writes.
pub async fn synchronize(conn: &mut SqliteConnection, schema_text: &str) -> Result<()> {
    let plan = self::plan(conn, schema_text).await?;
    if plan.is_empty() {
        info!("Live schema already matches desired schema");
        return Ok(());
    }
    info!(actions = plan.len(), "Synchronizing schema");

    // The pragma is a no-op inside a transaction, so toggle it around
    // the transaction on the connection itself.
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;
    let applied = apply_plan(conn, &plan).await;
    let restored = sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await;

    let stats = applied?;
    restored?;

    info!(
        created = stats.created,
        dropped = stats.dropped,
        rebuilt = stats.rebuilt,
        "Schema synchronized"
    );
    Ok(())
}

/// Applies the plan inside one transaction, checking referential
/// integrity before committing. Dropping the transaction on the error
/// path rolls everything back.
async fn apply_plan(conn: &mut SqliteConnection, plan: &Plan) -> Result<SyncStats> {
    let mut tx = conn.begin().await?;
    let mut stats = SyncStats::default();

    for action in plan.actions() {
        debug!(action = %action, "Applying");
        match action {
            Action::Create(object) => {
                execute_statement(&mut tx, &object.definition).await?;
                stats.created += 1;
            }
            Action::Drop(object) => {
                let statement = format!(
                    "DROP {} {}",
                    object.kind.sql_keyword(),
                    crate::ddl::quote_ident(&object.name)
                );
                execute_statement(&mut tx, &statement).await?;
                stats.dropped += 1;
            }
            Action::RecreateTable { old, new, .. } => {
                rebuild_table(&mut tx, old, new).await?;
                stats.rebuilt += 1;
            }
            Action::NoOp => {}
        }
    }

    check_integrity(&mut tx).await?;
    tx.commit().await?;
    Ok(stats)
}

/// Runs `PRAGMA foreign_key_check` and fails if it reports violations.
async fn check_integrity(conn: &mut SqliteConnection) -> Result<()> {
    let rows = sqlx::query("PRAGMA foreign_key_check")
        .fetch_all(&mut *conn)
        .await?;
    if rows.is_empty() {
        return Ok(());
    }

    let mut violations = Vec::with_capacity(rows.len());
    for row in &rows {
        violations.push(IntegrityViolation {
            table: row.try_get(0)?,
            rowid: row.try_get(1)?,
            parent: row.try_get(2)?,
            constraint_index: row.try_get(3)?,
        });
    }
    Err(SyncError::Integrity(violations))
}

/// Executes one plan statement, wrapping failures with the statement
/// text.
pub(crate) async fn execute_statement(conn: &mut SqliteConnection, statement: &str) -> Result<()> {
    debug!(sql = %statement, "Executing");
    sqlx::query(statement)
        .execute(&mut *conn)
        .await
        .map_err(|source| SyncError::Apply {
            statement: statement.to_string(),
            source,
        })?;
    Ok(())
}
