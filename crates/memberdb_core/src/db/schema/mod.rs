//! Member/team schema: versioned DDL steps and the readiness check that
//! sessions run before touching entity tables.
//!
//! # Invariants
//! - `PRAGMA user_version` equals the version of the last applied step.
//! - `REQUIRED_COLUMNS` lists every column the entity mappings read.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "member_team_tables",
    sql: include_str!("0001_member_team.sql"),
}];

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("team", &["team_id", "name"]),
    ("member", &["member_id", "username", "age", "team_id"]),
];

/// Schema version this build writes and expects.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Schema version recorded in the database file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Version change performed by [`upgrade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upgrade {
    pub from: u32,
    pub to: u32,
}

impl Upgrade {
    pub fn applied(&self) -> bool {
        self.from != self.to
    }
}

/// Brings `conn` to [`latest_version`] inside one transaction.
///
/// A database written by a newer build is refused untouched.
pub(crate) fn upgrade(conn: &mut Connection) -> DbResult<Upgrade> {
    let from = schema_version(conn)?;
    let to = latest_version();
    if from > to {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: to,
        });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > from).collect();
    if pending.is_empty() {
        return Ok(Upgrade { from, to: from });
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=schema_step module=db version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={from} to_version={to} steps={}",
        pending.len()
    );
    Ok(Upgrade { from, to })
}

/// First reason a connection cannot back a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGap {
    Version { expected: u32, actual: u32 },
    Table(&'static str),
    Column {
        table: &'static str,
        column: &'static str,
    },
}

/// Checks version and entity columns; `None` means the schema is usable.
pub fn find_gap(conn: &Connection) -> DbResult<Option<SchemaGap>> {
    let expected = latest_version();
    let actual = schema_version(conn)?;
    if actual != expected {
        return Ok(Some(SchemaGap::Version { expected, actual }));
    }

    for &(table, required) in REQUIRED_COLUMNS {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            return Ok(Some(SchemaGap::Table(table)));
        }
        if let Some(&column) = required
            .iter()
            .find(|column| !columns.iter().any(|name| name == *column))
        {
            return Ok(Some(SchemaGap::Column { table, column }));
        }
    }
    Ok(None)
}

// `table_info` yields no rows for a missing table.
fn table_columns(conn: &Connection, table: &str) -> DbResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}
