//! Member use-case service.
//!
//! # Responsibility
//! - Provide member entry points for callers outside the persistence layer.
//! - Return `MemberDto` projections instead of entities across this boundary.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Team assignment goes through `Member::change_team` and `save`, so the
//!   session keeps both sides of the association in step.

use crate::model::dto::MemberDto;
use crate::model::member::{Member, MemberId};
use crate::model::team::Team;
use crate::query::page::{Page, PageRequest};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::member_repo::MemberRepository;

/// Use-case service wrapper over a member repository.
pub struct MemberService<R: MemberRepository> {
    repo: R,
}

impl<R: MemberRepository> MemberService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Creates and saves a member without a team.
    pub fn register(&self, username: impl Into<String>, age: i32) -> RepoResult<Member> {
        self.repo.save(&Member::with_age(username, age))
    }

    /// One page of members of exactly `age`, as DTOs without team names.
    pub fn member_page(&self, age: i32, request: &PageRequest) -> RepoResult<Page<MemberDto>> {
        let page = self.repo.find_by_age(age, request)?;
        Ok(page.map(|member| MemberDto::from(&member)))
    }

    /// Members with a team, each with the team name.
    pub fn roster(&self) -> RepoResult<Vec<MemberDto>> {
        self.repo.find_member_dto()
    }

    /// Moves a stored member into `team`.
    ///
    /// # Errors
    /// - `NotFound` when no member has `member_id`.
    pub fn assign_team(&self, member_id: MemberId, team: &mut Team) -> RepoResult<Member> {
        let mut member = self
            .repo
            .find_by_id(member_id)?
            .ok_or(RepoError::NotFound {
                entity: "Member",
                id: member_id,
            })?;
        member.change_team(team);
        self.repo.save(&member)
    }

    /// Ages every member at or above `age` by one year.
    pub fn celebrate_birthdays(&self, age: i32) -> RepoResult<usize> {
        self.repo.bulk_age_plus(age)
    }
}
