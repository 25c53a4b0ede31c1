//! Schema catalog types and live-database introspection.
//!
//! A [`Catalog`] is a snapshot of the user-visible schema objects of one
//! SQLite database: tables, indexes and triggers, each with the canonical
//! DDL text stored in `sqlite_master`. Catalogs are the unit of
//! comparison between the live database and the desired schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use crate::ddl::{normalize_definition, quote_ident};
use crate::error::{Result, SyncError};

/// Query for the user-defined schema objects of a database.
///
/// Internal objects (`sqlite_sequence`, auto-indexes backing UNIQUE and
/// PRIMARY KEY constraints) are excluded: their names start with
/// `sqlite_` and auto-indexes carry a NULL `sql` column. They are
/// created and destroyed by SQLite itself as a side effect of the
/// statements the synchronizer runs.
const CATALOG_QUERY: &str = "SELECT type, name, tbl_name, sql FROM sqlite_master \
     WHERE type IN ('table', 'index', 'trigger') \
     AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL \
     ORDER BY type, name";

/// Kind of schema object tracked by the synchronizer.
///
/// A closed set: the diff engine branches exhaustively over it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// A table.
    Table,
    /// An index.
    Index,
    /// A trigger.
    Trigger,
}

impl ObjectKind {
    /// Parses the `type` column of `sqlite_master`.
    #[must_use]
    pub fn from_sqlite_type(raw: &str) -> Option<Self> {
        match raw {
            "table" => Some(Self::Table),
            "index" => Some(Self::Index),
            "trigger" => Some(Self::Trigger),
            _ => None,
        }
    }

    /// Returns the keyword used in `DROP <keyword> <name>` statements.
    #[must_use]
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Index => "INDEX",
            Self::Trigger => "TRIGGER",
        }
    }

    /// Returns the lowercase display name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Index => "index",
            Self::Trigger => "trigger",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One schema object with its canonical definition text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObject {
    /// Object kind.
    pub kind: ObjectKind,
    /// Object name (unique within its kind).
    pub name: String,
    /// Table this object belongs to. Empty for tables themselves.
    pub owner_table: String,
    /// The CREATE statement as stored in `sqlite_master`.
    pub definition: String,
}

impl SchemaObject {
    /// Creates a new schema object.
    #[must_use]
    pub fn new(
        kind: ObjectKind,
        name: impl Into<String>,
        owner_table: impl Into<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            owner_table: owner_table.into(),
            definition: definition.into(),
        }
    }

    /// Returns the normalized definition used for change detection.
    #[must_use]
    pub fn normalized_definition(&self) -> String {
        normalize_definition(&self.definition)
    }

    /// Returns true if both objects have the same definition after
    /// normalization.
    #[must_use]
    pub fn same_definition(&self, other: &SchemaObject) -> bool {
        self.normalized_definition() == other.normalized_definition()
    }
}

impl std::fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// A snapshot of a database's schema objects, keyed by `(kind, name)`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    objects: BTreeMap<(ObjectKind, String), SchemaObject>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an object into the catalog.
    ///
    /// Fails if an object with the same `(kind, name)` is already
    /// present; a catalog snapshot must never contain duplicates.
    pub fn insert(&mut self, object: SchemaObject) -> Result<()> {
        let key = (object.kind, object.name.clone());
        if self.objects.contains_key(&key) {
            return Err(SyncError::Planning(format!(
                "duplicate {} '{}' in catalog",
                object.kind, object.name
            )));
        }
        self.objects.insert(key, object);
        Ok(())
    }

    /// Looks up an object by kind and name.
    #[must_use]
    pub fn get(&self, kind: ObjectKind, name: &str) -> Option<&SchemaObject> {
        self.objects.get(&(kind, name.to_string()))
    }

    /// Returns true if an object with this kind and name exists.
    #[must_use]
    pub fn contains(&self, kind: ObjectKind, name: &str) -> bool {
        self.get(kind, name).is_some()
    }

    /// Iterates over all objects, tables first, in name order within each
    /// kind.
    pub fn objects(&self) -> impl Iterator<Item = &SchemaObject> {
        self.objects.values()
    }

    /// Iterates over objects of one kind, in name order.
    pub fn objects_of(&self, kind: ObjectKind) -> impl Iterator<Item = &SchemaObject> {
        self.objects.values().filter(move |o| o.kind == kind)
    }

    /// Iterates over the indexes and triggers owned by a table, in
    /// catalog order.
    pub fn owned_by<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SchemaObject> {
        self.objects
            .values()
            .filter(move |o| o.kind != ObjectKind::Table && o.owner_table == table)
    }

    /// Number of objects in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the catalog holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Captures the schema catalog of the connected database.
///
/// Read-only: issues a single query against `sqlite_master`.
pub async fn capture(conn: &mut SqliteConnection) -> Result<Catalog> {
    let rows = sqlx::query(CATALOG_QUERY)
        .fetch_all(&mut *conn)
        .await
        .map_err(SyncError::Introspection)?;

    let mut catalog = Catalog::new();
    for row in &rows {
        let raw_kind: String = row.try_get("type").map_err(SyncError::Introspection)?;
        let Some(kind) = ObjectKind::from_sqlite_type(&raw_kind) else {
            continue;
        };
        let name: String = row.try_get("name").map_err(SyncError::Introspection)?;
        let tbl_name: String = row.try_get("tbl_name").map_err(SyncError::Introspection)?;
        let definition: String = row.try_get("sql").map_err(SyncError::Introspection)?;

        let owner_table = if kind == ObjectKind::Table {
            String::new()
        } else {
            tbl_name
        };
        catalog.insert(SchemaObject {
            kind,
            name,
            owner_table,
            definition,
        })?;
    }

    debug!(objects = catalog.len(), "Captured schema catalog");
    Ok(catalog)
}

/// Returns the column names of a table, in declaration order.
pub async fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(SyncError::Introspection)?;

    rows.iter()
        .map(|row| row.try_get("name").map_err(SyncError::Introspection))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Connection;

    async fn connect() -> SqliteConnection {
        SqliteConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite database")
    }

    #[tokio::test]
    async fn test_capture_empty_database() {
        let mut conn = connect().await;
        let catalog = capture(&mut conn).await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_capture_tables_indexes_triggers() {
        let mut conn = connect().await;
        sqlx::raw_sql(
            "CREATE TABLE users(id INTEGER PRIMARY KEY, email TEXT);
             CREATE INDEX idx_users_email ON users(email);
             CREATE TRIGGER trg_users AFTER INSERT ON users BEGIN SELECT 1; END;",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        let catalog = capture(&mut conn).await.unwrap();
        assert_eq!(catalog.len(), 3);

        let table = catalog.get(ObjectKind::Table, "users").unwrap();
        assert_eq!(table.owner_table, "");
        assert!(table.definition.contains("CREATE TABLE"));

        let index = catalog.get(ObjectKind::Index, "idx_users_email").unwrap();
        assert_eq!(index.owner_table, "users");

        let trigger = catalog.get(ObjectKind::Trigger, "trg_users").unwrap();
        assert_eq!(trigger.owner_table, "users");
    }

    #[tokio::test]
    async fn test_capture_skips_internal_objects() {
        let mut conn = connect().await;
        // AUTOINCREMENT creates sqlite_sequence; UNIQUE creates an
        // auto-index. Neither should appear in the catalog.
        sqlx::raw_sql(
            "CREATE TABLE t(id INTEGER PRIMARY KEY AUTOINCREMENT, email TEXT UNIQUE);",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        let catalog = capture(&mut conn).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains(ObjectKind::Table, "t"));
    }

    #[tokio::test]
    async fn test_table_columns() {
        let mut conn = connect().await;
        sqlx::raw_sql("CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .execute(&mut conn)
            .await
            .unwrap();

        let columns = table_columns(&mut conn, "t").await.unwrap();
        assert_eq!(columns, vec!["id", "name", "age"]);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut catalog = Catalog::new();
        let object = SchemaObject::new(ObjectKind::Table, "t", "", "CREATE TABLE t(id INTEGER)");
        catalog.insert(object.clone()).unwrap();

        let result = catalog.insert(object);
        assert!(matches!(result, Err(SyncError::Planning(_))));
    }

    #[test]
    fn test_owned_by() {
        let mut catalog = Catalog::new();
        catalog
            .insert(SchemaObject::new(
                ObjectKind::Table,
                "t",
                "",
                "CREATE TABLE t(id INTEGER)",
            ))
            .unwrap();
        catalog
            .insert(SchemaObject::new(
                ObjectKind::Index,
                "idx_t",
                "t",
                "CREATE INDEX idx_t ON t(id)",
            ))
            .unwrap();
        catalog
            .insert(SchemaObject::new(
                ObjectKind::Index,
                "idx_other",
                "other",
                "CREATE INDEX idx_other ON other(id)",
            ))
            .unwrap();

        let owned: Vec<_> = catalog.owned_by("t").map(|o| o.name.as_str()).collect();
        assert_eq!(owned, vec!["idx_t"]);
    }

    #[test]
    fn test_same_definition_ignores_rename_quoting() {
        let a = SchemaObject::new(ObjectKind::Table, "t", "", "CREATE TABLE \"t\"(id INTEGER)");
        let b = SchemaObject::new(ObjectKind::Table, "t", "", "CREATE TABLE t(id INTEGER)");
        assert!(a.same_definition(&b));
    }
}
