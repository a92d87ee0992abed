use memberdb_core::db::schema::{find_gap, latest_version, schema_version, SchemaGap};
use memberdb_core::db::{open_db, open_db_in_memory, DbError};
use memberdb_core::{RepoError, Session};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_creates_member_and_team_tables() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_columns(&conn, "team", &["team_id", "name"]);
    assert_columns(&conn, "member", &["member_id", "username", "age", "team_id"]);

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_file_database_keeps_rows_and_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("members.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO team (team_id, name) VALUES ('6f1c3c1e-8d4a-4b43-9f57-0c8a1d1f0a01', 'teamA');",
        [],
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    let teams: i64 = conn
        .query_row("SELECT COUNT(*) FROM team;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(teams, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
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
fn session_refuses_unmigrated_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    match Session::begin(&mut conn).err().unwrap() {
        RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        } => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn session_refuses_schema_without_required_column() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE team (team_id TEXT PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE member (member_id TEXT PRIMARY KEY, username TEXT NOT NULL, team_id TEXT);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    match Session::begin(&mut conn).err().unwrap() {
        RepoError::MissingRequiredColumn { table, column } => {
            assert_eq!(table, "member");
            assert_eq!(column, "age");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn session_refuses_schema_without_team_table() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE member (member_id TEXT PRIMARY KEY, username TEXT, age INTEGER, team_id TEXT);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    assert_eq!(find_gap(&conn).unwrap(), Some(SchemaGap::Table("team")));
    assert!(matches!(
        Session::begin(&mut conn).err().unwrap(),
        RepoError::MissingRequiredTable("team")
    ));
}

#[test]
fn opened_database_has_no_schema_gap() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(find_gap(&conn).unwrap(), None);
}

fn assert_columns(conn: &Connection, table: &str, expected: &[&str]) {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(columns, expected, "unexpected columns for {table}");
}
