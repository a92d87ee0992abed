//! Repository layer over the session.
//!
//! # Responsibility
//! - Define entity-oriented data access contracts.
//! - Keep SQL and query construction out of service orchestration.
//!
//! # Invariants
//! - Repositories never touch the connection directly; every read and
//!   write goes through the session so the identity map stays coherent.
//! - Repository APIs return semantic errors (`NotFound`, `NonUniqueResult`)
//!   in addition to wrapped store errors.

pub mod crud;
pub mod error;
pub mod member_jpa_repo;
pub mod member_repo;
pub mod team_repo;

pub use crud::{CrudRepository, SimpleRepository};
pub use error::{RepoError, RepoResult};
pub use member_jpa_repo::MemberJpaRepository;
pub use member_repo::{MemberRepository, SqliteMemberRepository};
pub use team_repo::{TeamJpaRepository, TeamRepository};
