//! Error types for the schema synchronizer.

/// A row reported by `PRAGMA foreign_key_check` after applying a plan.
#[derive(Debug, Clone)]
pub struct IntegrityViolation {
    /// Table containing the dangling reference.
    pub table: String,
    /// Rowid of the offending row (NULL for WITHOUT ROWID tables).
    pub rowid: Option<i64>,
    /// Table the foreign key points at.
    pub parent: String,
    /// Index of the foreign key constraint within the referencing table.
    pub constraint_index: i64,
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.rowid {
            Some(rowid) => write!(
                f,
                "{} (rowid {}) references missing row in {}",
                self.table, rowid, self.parent
            ),
            None => write!(f, "{} references missing row in {}", self.table, self.parent),
        }
    }
}

/// Errors that can occur while synchronizing a schema.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Reading the schema catalog of the live or scratch database failed.
    #[error("Failed to read schema catalog: {0}")]
    Introspection(#[source] sqlx::Error),

    /// The desired schema script failed to execute against the scratch instance.
    #[error("Desired schema failed to execute: {0}")]
    DesiredSchema(#[source] sqlx::Error),

    /// An internal invariant was violated while building the plan.
    #[error("Invalid plan: {0}")]
    Planning(String),

    /// A DDL statement failed while applying the plan.
    #[error("Failed to apply '{statement}': {source}")]
    Apply {
        /// The statement that failed.
        statement: String,
        /// The underlying database error.
        source: sqlx::Error,
    },

    /// The post-migration foreign key check reported violations.
    #[error("Foreign key check failed:\n{}", .0.iter().map(|v| format!("  - {}", v)).collect::<Vec<_>>().join("\n"))]
    Integrity(Vec<IntegrityViolation>),

    /// Database error outside of plan application (transaction control, pragmas).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for synchronizer operations.
pub type Result<T> = std::result::Result<T, SyncError>;
