//! Connection bootstrap for the member store.
//!
//! # Invariants
//! - `foreign_keys=ON`, so `member.team_id` must name an existing team.
//! - The schema is upgraded before the connection is returned.
//!
//! # See also
//! - `schema::find_gap`, which `Session::begin` runs on connections that did
//!   not come from here.

use super::schema::{self, Upgrade};
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) a member database file.
///
/// Emits `db_open` events with mode, duration and schema versions.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with("file", || Connection::open(path))
}

/// Opens a fresh in-memory member database.
///
/// Every call yields an isolated database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = connect()
        .map_err(DbError::from)
        .and_then(|mut conn| prepare(&mut conn).map(|upgrade| (conn, upgrade)));

    match result {
        Ok((conn, Upgrade { from, to })) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={} schema_from={from} schema_to={to}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<Upgrade> {
    conn.pragma_update(None, "foreign_keys", true)?;
    // Why: a CLI run and an embedding process may share one file; a locked
    // database should wait briefly instead of failing `Session::begin`.
    conn.busy_timeout(BUSY_TIMEOUT)?;
    schema::upgrade(conn)
}
