//! Desired-schema loader.
//!
//! The desired schema arrives as a single script of CREATE statements.
//! Rather than parsing it ourselves, we execute it against a private
//! in-memory SQLite instance and introspect that instance with the same
//! catalog capture used for the live database. SQLite's own DDL
//! validation applies: a script that does not parse, or a trigger that
//! references a missing table, is rejected here before the live
//! database is touched.

use sqlx::{Connection, SqliteConnection};
use tracing::debug;

use crate::catalog::{capture, Catalog};
use crate::error::{Result, SyncError};

/// Executes `schema_text` against a throwaway in-memory database and
/// returns the catalog it produces.
///
/// The scratch instance is discarded afterwards; the live database is
/// never involved.
pub async fn load_desired(schema_text: &str) -> Result<Catalog> {
    let mut scratch = SqliteConnection::connect("sqlite::memory:")
        .await
        .map_err(SyncError::DesiredSchema)?;

    if !schema_text.trim().is_empty() {
        sqlx::raw_sql(schema_text)
            .execute(&mut scratch)
            .await
            .map_err(SyncError::DesiredSchema)?;
    }

    let catalog = capture(&mut scratch).await?;
    debug!(objects = catalog.len(), "Loaded desired schema");

    let _ = scratch.close().await;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObjectKind;

    #[tokio::test]
    async fn test_load_empty_schema() {
        let catalog = load_desired("").await.unwrap();
        assert!(catalog.is_empty());

        let catalog = load_desired("   \n  ").await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_load_multi_statement_script() {
        let catalog = load_desired(
            "CREATE TABLE users(id INTEGER PRIMARY KEY, email TEXT);
             CREATE INDEX idx_users_email ON users(email);
             CREATE TRIGGER trg AFTER DELETE ON users BEGIN SELECT 1; END;",
        )
        .await
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert!(catalog.contains(ObjectKind::Table, "users"));
        assert!(catalog.contains(ObjectKind::Index, "idx_users_email"));
        assert!(catalog.contains(ObjectKind::Trigger, "trg"));
    }

    #[tokio::test]
    async fn test_load_syntax_error() {
        let result = load_desired("CREATE TABL users(id INTEGER)").await;
        assert!(matches!(result, Err(SyncError::DesiredSchema(_))));
    }

    #[tokio::test]
    async fn test_load_semantic_error() {
        // Trigger on a table that the script never creates.
        let result =
            load_desired("CREATE TRIGGER trg AFTER INSERT ON missing BEGIN SELECT 1; END;").await;
        assert!(matches!(result, Err(SyncError::DesiredSchema(_))));
    }
}
