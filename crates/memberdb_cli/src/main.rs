//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `memberdb_core` linkage and the configured database end to end.
//! - Keep output deterministic (`key=value` lines) for quick sanity checks.

use log::{error, info};
use memberdb_core::db::schema::schema_version;
use memberdb_core::{CoreConfig, MemberJpaRepository, Session, TeamJpaRepository};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error");
            eprintln!("memberdb error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = CoreConfig::from_env().map_err(|err| err.to_string())?;
    config.init_logging()?;

    println!("memberdb_core ping={}", memberdb_core::ping());
    println!("memberdb_core version={}", memberdb_core::core_version());

    let mut conn = config.open_db().map_err(|err| err.to_string())?;
    let version = schema_version(&conn).map_err(|err| err.to_string())?;
    println!("schema_version={version}");

    let session = Session::begin(&mut conn).map_err(|err| err.to_string())?;
    let members = MemberJpaRepository::new(&session)
        .count()
        .map_err(|err| err.to_string())?;
    let teams = TeamJpaRepository::new(&session)
        .count()
        .map_err(|err| err.to_string())?;
    session.rollback().map_err(|err| err.to_string())?;

    println!("members={members}");
    println!("teams={teams}");
    info!("event=cli_run module=cli status=ok members={members} teams={teams}");
    Ok(())
}
