//! Member/team persistence core.
//! Entities, a transactional session with an identity map, and repositories
//! whose queries are derived from method names or looked up by name.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;
pub mod session;

pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::dto::MemberDto;
pub use model::member::{Member, MemberId};
pub use model::team::{Team, TeamId};
pub use model::validation::EntityValidationError;
pub use query::page::{Direction, Page, PageRequest, Slice, Sort};
pub use query::{QueryArg, QueryError};
pub use repo::{
    CrudRepository, MemberJpaRepository, MemberRepository, RepoError, RepoResult,
    SqliteMemberRepository, TeamJpaRepository, TeamRepository,
};
pub use service::member_service::MemberService;
pub use session::Session;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
