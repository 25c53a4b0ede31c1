//! End-to-end synchronization scenarios against real SQLite databases.

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, Row, SqliteConnection};

use schemasync::prelude::*;

async fn connect_memory() -> SqliteConnection {
    SqliteConnection::connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database")
}

#[tokio::test]
async fn empty_schema_leaves_no_user_tables() {
    let mut conn = connect_memory().await;
    synchronize(
        &mut conn,
        "CREATE TABLE a(id INTEGER); CREATE TABLE b(id INTEGER);",
    )
    .await
    .unwrap();

    synchronize(&mut conn, "").await.unwrap();

    let catalog = capture(&mut conn).await.unwrap();
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn fresh_table_round_trips_data() {
    let mut conn = connect_memory().await;
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
    )
    .await
    .unwrap();

    sqlx::query("INSERT INTO t VALUES (7, 'seven')")
        .execute(&mut conn)
        .await
        .unwrap();

    let row = sqlx::query("SELECT id, name FROM t")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("id"), 7);
    assert_eq!(row.get::<String, _>("name"), "seven");
}

#[tokio::test]
async fn removed_table_is_gone() {
    let mut conn = connect_memory().await;
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
    )
    .await
    .unwrap();

    synchronize(&mut conn, "").await.unwrap();

    let insert = sqlx::query("INSERT INTO t VALUES (1, 'x')")
        .execute(&mut conn)
        .await;
    assert!(insert.is_err(), "insert into dropped table should fail");
}

#[tokio::test]
async fn added_column_preserves_existing_rows() {
    let mut conn = connect_memory().await;
    synchronize(&mut conn, "CREATE TABLE t(id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    sqlx::query("INSERT INTO t VALUES (1)")
        .execute(&mut conn)
        .await
        .unwrap();

    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
    )
    .await
    .unwrap();

    // The old row keeps its id and gains a NULL name.
    let row = sqlx::query("SELECT id, name FROM t WHERE id = 1")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.get::<i64, _>("id"), 1);
    assert_eq!(row.get::<Option<String>, _>("name"), None);

    // New inserts can use the new column.
    sqlx::query("INSERT INTO t VALUES (2, 'two')")
        .execute(&mut conn)
        .await
        .unwrap();
    let row = sqlx::query("SELECT name FROM t WHERE id = 2")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("name"), "two");
}

#[tokio::test]
async fn removed_column_is_unreferencable() {
    let mut conn = connect_memory().await;
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
    )
    .await
    .unwrap();
    sqlx::query("INSERT INTO t VALUES (1, 'x')")
        .execute(&mut conn)
        .await
        .unwrap();

    synchronize(&mut conn, "CREATE TABLE t(id INTEGER PRIMARY KEY)")
        .await
        .unwrap();

    let select = sqlx::query("SELECT name FROM t").fetch_all(&mut conn).await;
    assert!(select.is_err(), "dropped column should not be selectable");

    let row: (i64,) = sqlx::query_as("SELECT id FROM t")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.0, 1);
}

#[tokio::test]
async fn changed_index_leaves_no_stale_definition() {
    let mut conn = connect_memory().await;
    synchronize(
        &mut conn,
        "CREATE TABLE t(a INTEGER, b INTEGER);
         CREATE INDEX idx_t ON t(a);",
    )
    .await
    .unwrap();

    synchronize(
        &mut conn,
        "CREATE TABLE t(a INTEGER, b INTEGER);
         CREATE INDEX idx_t ON t(b);",
    )
    .await
    .unwrap();

    let catalog = capture(&mut conn).await.unwrap();
    let indexes: Vec<&SchemaObject> = catalog.objects_of(ObjectKind::Index).collect();
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].definition.contains("t(b)"));
}

#[tokio::test]
async fn trigger_added_then_removed() {
    let mut conn = connect_memory().await;
    let with_trigger = "CREATE TABLE t(id INTEGER PRIMARY KEY);
         CREATE TRIGGER fail_trigger AFTER INSERT ON t BEGIN SELECT RAISE(FAIL, 'x'); END;";
    let without_trigger = "CREATE TABLE t(id INTEGER PRIMARY KEY);";

    synchronize(&mut conn, with_trigger).await.unwrap();
    assert!(sqlx::query("INSERT INTO t VALUES (1)")
        .execute(&mut conn)
        .await
        .is_err());

    synchronize(&mut conn, without_trigger).await.unwrap();
    sqlx::query("INSERT INTO t VALUES (1)")
        .execute(&mut conn)
        .await
        .unwrap();
}

#[tokio::test]
async fn index_and_trigger_survive_table_rebuild() {
    let mut conn = connect_memory().await;
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, v INTEGER);
         CREATE INDEX idx_t_v ON t(v);
         CREATE TRIGGER trg_t AFTER INSERT ON t BEGIN UPDATE t SET v = NEW.v + 1 WHERE id = NEW.id; END;",
    )
    .await
    .unwrap();

    // Widen the table; its index and trigger are unchanged in the
    // desired schema and must come back after the rebuild.
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, v INTEGER, extra TEXT);
         CREATE INDEX idx_t_v ON t(v);
         CREATE TRIGGER trg_t AFTER INSERT ON t BEGIN UPDATE t SET v = NEW.v + 1 WHERE id = NEW.id; END;",
    )
    .await
    .unwrap();

    let catalog = capture(&mut conn).await.unwrap();
    assert!(catalog.contains(ObjectKind::Index, "idx_t_v"));
    assert!(catalog.contains(ObjectKind::Trigger, "trg_t"));

    // The recreated trigger still fires.
    sqlx::query("INSERT INTO t (id, v) VALUES (1, 10)")
        .execute(&mut conn)
        .await
        .unwrap();
    let row: (i64,) = sqlx::query_as("SELECT v FROM t WHERE id = 1")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.0, 11);
}

#[tokio::test]
async fn synchronize_file_backed_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.db");

    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT)",
    )
    .await
    .unwrap();
    sqlx::query("INSERT INTO t VALUES (1, 'persisted')")
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();

    // Reopen and evolve the schema; data must survive the rebuild.
    let mut conn = SqliteConnectOptions::new()
        .filename(&path)
        .connect()
        .await
        .unwrap();
    synchronize(
        &mut conn,
        "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT, flag INTEGER DEFAULT 0)",
    )
    .await
    .unwrap();

    let row = sqlx::query("SELECT name, flag FROM t WHERE id = 1")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("name"), "persisted");
    assert_eq!(row.get::<i64, _>("flag"), 0);
}
