use mushdomain_core::db::migrations::latest_version;
use mushdomain_core::db::{
    is_constraint_violation, open_db, open_db_in_memory, DbError, ScopedSavepoint,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "domains",
        "rooms",
        "members",
        "details",
        "feeding",
        "boons",
        "boon_transactions",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn uniqueness_indexes_are_named() {
    let conn = open_db_in_memory().unwrap();
    for index in [
        "unique_player_domain_names",
        "unique_sphere_domain_names",
        "unique_sphere_room",
        "unique_domain_member",
        "unique_domain_detail",
    ] {
        let exists: i64 = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1);",
                [index],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1, "index {index} does not exist");
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let err = conn
        .execute(
            "INSERT INTO rooms (idDomains, sphere, room) VALUES (999, '#1', '#2');",
            [],
        )
        .unwrap_err();
    assert!(is_constraint_violation(&err));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("domain.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO domains (name, sphere, owner) VALUES ('Keep', '#2', '#1');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM domains;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn dropped_savepoint_rolls_back_and_released_savepoint_keeps_writes() {
    let conn = open_db_in_memory().unwrap();

    {
        let savepoint = ScopedSavepoint::open(&conn, "discarded").unwrap();
        savepoint
            .conn()
            .execute("INSERT INTO feeding (player) VALUES ('#1');", [])
            .unwrap();
    }
    assert_eq!(feeding_rows(&conn), 0);

    let savepoint = ScopedSavepoint::open(&conn, "kept").unwrap();
    savepoint
        .conn()
        .execute("INSERT INTO feeding (player) VALUES ('#2');", [])
        .unwrap();
    savepoint.release().unwrap();
    assert_eq!(feeding_rows(&conn), 1);
}

#[test]
fn savepoints_nest_inside_an_outer_transaction() {
    let mut conn = open_db_in_memory().unwrap();
    let tx = conn.transaction().unwrap();

    tx.execute("INSERT INTO feeding (player) VALUES ('#outer');", [])
        .unwrap();
    let inner = ScopedSavepoint::open(&tx, "inner").unwrap();
    inner
        .conn()
        .execute("INSERT INTO feeding (player) VALUES ('#inner');", [])
        .unwrap();
    inner.rollback().unwrap();
    tx.commit().unwrap();

    assert_eq!(feeding_rows(&conn), 1);
}

fn feeding_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM feeding;", [], |row| row.get(0))
        .unwrap()
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
