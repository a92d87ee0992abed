//! Hand-written member repository over the session.
//!
//! Every query here is spelled out in SQL. Unlike the declarative repository,
//! `bulk_age_plus` leaves the session untouched, so managed members keep
//! their pre-update state until the caller clears the session.

use crate::model::member::{Member, MemberId};
use crate::query::named::{named_query, MEMBER_BULK_AGE_PLUS, MEMBER_FIND_BY_USERNAME};
use crate::query::QueryArg;
use crate::repo::error::{RepoError, RepoResult};
use crate::session::mapping::Entity;
use crate::session::Session;
use rusqlite::types::Value;

/// Hand-written member repository.
pub struct MemberJpaRepository<'s, 'conn> {
    session: &'s Session<'conn>,
}

impl<'s, 'conn> MemberJpaRepository<'s, 'conn> {
    pub fn new(session: &'s Session<'conn>) -> Self {
        Self { session }
    }

    /// Inserts `member` and starts tracking it.
    pub fn save(&self, member: &Member) -> RepoResult<Member> {
        self.session.persist(member)?;
        Ok(member.clone())
    }

    /// Loads a member that must exist.
    pub fn find(&self, id: MemberId) -> RepoResult<Member> {
        self.find_by_id(id)?.ok_or(RepoError::NotFound {
            entity: Member::NAME,
            id,
        })
    }

    pub fn find_by_id(&self, id: MemberId) -> RepoResult<Option<Member>> {
        self.session.find(id)
    }

    pub fn find_all(&self) -> RepoResult<Vec<Member>> {
        let sql = format!("{} ORDER BY m.rowid ASC", Member::SELECT_SQL);
        self.session.load_entities(&sql, &[], false)
    }

    pub fn delete(&self, member: &Member) -> RepoResult<()> {
        self.session.remove::<Member>(member.id)?;
        Ok(())
    }

    pub fn count(&self) -> RepoResult<u64> {
        self.session.query_count("SELECT COUNT(*) FROM member m", &[])
    }

    pub fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Member>> {
        let sql = format!(
            "{} WHERE m.username = ?1 AND m.age > ?2 ORDER BY m.rowid ASC",
            Member::SELECT_SQL
        );
        self.session.load_entities(
            &sql,
            &[
                Value::Text(username.to_string()),
                Value::Integer(i64::from(age)),
            ],
            false,
        )
    }

    /// Runs the registered `Member.findByUsername` query.
    pub fn find_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        let bound = named_query(MEMBER_FIND_BY_USERNAME)?
            .bind(&[("username", QueryArg::from(username))])?;
        self.session.load_entities(&bound.sql, &bound.binds, false)
    }

    /// Members of exactly `age`, by username descending, `limit` rows from
    /// `offset`.
    pub fn find_by_page(&self, age: i32, offset: u64, limit: u64) -> RepoResult<Vec<Member>> {
        let sql = format!(
            "{} WHERE m.age = ?1 ORDER BY m.username DESC, m.rowid ASC LIMIT {limit} OFFSET {offset}",
            Member::SELECT_SQL
        );
        self.session
            .load_entities(&sql, &[Value::Integer(i64::from(age))], false)
    }

    pub fn total_count(&self, age: i32) -> RepoResult<u64> {
        self.session.query_count(
            "SELECT COUNT(m.member_id) FROM member m WHERE m.age = ?1",
            &[Value::Integer(i64::from(age))],
        )
    }

    /// Adds one year to every member aged `age` or older. Managed members
    /// are not refreshed.
    pub fn bulk_age_plus(&self, age: i32) -> RepoResult<usize> {
        let bound = named_query(MEMBER_BULK_AGE_PLUS)?.bind(&[("age", QueryArg::from(age))])?;
        self.session.execute_update(&bound.sql, &bound.binds)
    }
}
