//! Declarative schema synchronization for SQLite.
//!
//! `schemasync` takes a single "desired schema" script (the complete
//! target structure of a database, as plain CREATE statements) and
//! makes the live database match it. There are no numbered migration
//! files and no migration history table: the desired script is the only
//! input, and the synchronizer computes the minimal set of DDL
//! operations at every call.
//!
//! # Architecture
//!
//! - **Catalog** - introspects `sqlite_master` into a normalized snapshot
//!   of tables, indexes and triggers
//! - **Loader** - executes the desired script against a throwaway
//!   in-memory instance and captures its catalog
//! - **Diff** - compares live and desired catalogs into an ordered plan
//! - **Rebuilder** - applies table changes SQLite's ALTER TABLE cannot
//!   express, via create-copy-drop-rename
//! - **Sync** - wraps plan application in one transaction with a foreign
//!   key check before commit
//!
//! # Example
//!
//! ```rust,no_run
//! use sqlx::{Connection, SqliteConnection};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = SqliteConnection::connect("sqlite:app.db").await?;
//! schemasync::synchronize(
//!     &mut conn,
//!     "CREATE TABLE users(id INTEGER PRIMARY KEY, email TEXT);
//!      CREATE INDEX idx_users_email ON users(email);",
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//!
//! Renames are never inferred: a table or column that appears under a
//! new name in the desired schema is treated as a drop of the old object
//! plus a create of the new one, and any data in a renamed column is
//! lost. Comparison is textual (lightly normalized), not semantic: a
//! reformatted but equivalent definition counts as a change and forces a
//! table rebuild.

pub mod catalog;
pub mod ddl;
pub mod diff;
pub mod error;
pub mod loader;
pub mod rebuild;
pub mod sync;

pub use error::{Result, SyncError};
pub use sync::{plan, synchronize};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::catalog::{capture, Catalog, ObjectKind, SchemaObject};
    pub use crate::diff::{diff, Action, Plan};
    pub use crate::error::{IntegrityViolation, Result, SyncError};
    pub use crate::loader::load_desired;
    pub use crate::sync::{plan, synchronize};
}
