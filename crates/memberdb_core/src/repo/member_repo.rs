//! Declarative member repository.
//!
//! # Responsibility
//! - Expose the member query contract: derived finders, named queries,
//!   projections, paging, bulk update and fetch plans.
//! - Keep every load inside the session's identity map.
//!
//! # Invariants
//! - Finder SQL comes from method names or the named-query registry; caller
//!   values are always bound.
//! - Ordered results break ties on insertion order.
//! - `bulk_age_plus` leaves the session cleared.

use crate::model::dto::MemberDto;
use crate::model::member::Member;
use crate::model::team::Team;
use crate::query::derived::{DerivedQuery, Subject};
use crate::query::named::{
    named_query, MEMBER_BULK_AGE_PLUS, MEMBER_FIND_BY_NAMES, MEMBER_FIND_BY_USERNAME,
    MEMBER_FIND_MEMBER_DTO, MEMBER_FIND_MEMBER_FETCH_JOIN, MEMBER_FIND_USER,
    MEMBER_FIND_USERNAME_LIST,
};
use crate::query::page::{Direction, Page, PageRequest, Slice, Sort};
use crate::query::{QueryArg, QueryError};
use crate::repo::crud::{CrudRepository, SimpleRepository};
use crate::repo::error::{RepoError, RepoResult};
use crate::session::mapping::{parse_uuid, Entity, MEMBER_GRAPH_SELECT_SQL};
use crate::session::Session;
use log::debug;
use rusqlite::types::Value;
use uuid::Uuid;

/// Member data access contract.
pub trait MemberRepository: CrudRepository<Member> {
    fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Member>>;
    /// Runs the registered `Member.findByUsername` query.
    fn find_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    fn find_user(&self, username: &str, age: i32) -> RepoResult<Vec<Member>>;
    fn find_username_list(&self) -> RepoResult<Vec<String>>;
    /// Members that have a team, projected with the team name.
    fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>>;
    /// Members whose username is in `names`. An empty list matches nothing.
    fn find_by_names(&self, names: &[String]) -> RepoResult<Vec<Member>>;
    fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    /// Fails with `NonUniqueResult` when several members match.
    fn find_member_by_username(&self, username: &str) -> RepoResult<Option<Member>>;
    fn find_optional_by_username(&self, username: &str) -> RepoResult<Option<Member>>;
    fn find_by_age(&self, age: i32, pageable: &PageRequest) -> RepoResult<Page<Member>>;
    fn count_by_age(&self, age: i32) -> RepoResult<u64>;
    fn exists_by_username(&self, username: &str) -> RepoResult<bool>;
    fn find_slice_by_age(&self, age: i32, pageable: &PageRequest) -> RepoResult<Slice<Member>>;
    /// Adds one year to every member aged `age` or older, then clears the
    /// session. Members already at `i32::MAX` are left as they are. Returns
    /// the number of updated rows.
    fn bulk_age_plus(&self, age: i32) -> RepoResult<usize>;
    fn find_member_fetch_join(&self) -> RepoResult<Vec<Member>>;
    fn find_member_entity_graph(&self) -> RepoResult<Vec<Member>>;
    fn find_entity_graph_by_username(&self, username: &str) -> RepoResult<Vec<Member>>;
    /// Loads without change tracking; later modifications are never flushed.
    fn find_read_only_by_username(&self, username: &str) -> RepoResult<Option<Member>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPlan {
    Lazy,
    WithTeam,
}

#[derive(Debug, Clone, Copy, Default)]
struct Window {
    limit: Option<u64>,
    offset: u64,
}

/// Session-backed member repository.
pub struct SqliteMemberRepository<'s, 'conn> {
    session: &'s Session<'conn>,
    crud: SimpleRepository<'s, 'conn, Member>,
}

impl<'s, 'conn> SqliteMemberRepository<'s, 'conn> {
    pub fn new(session: &'s Session<'conn>) -> Self {
        Self {
            session,
            crud: SimpleRepository::new(session),
        }
    }

    pub fn session(&self) -> &'s Session<'conn> {
        self.session
    }

    fn select_derived(
        &self,
        method: &str,
        args: &[QueryArg],
        plan: FetchPlan,
        read_only: bool,
        sort: &Sort,
        window: Window,
    ) -> RepoResult<Vec<Member>> {
        let query = DerivedQuery::parse(method, Member::PROPERTIES)?;
        if query.subject() != Subject::Find {
            return Err(QueryError::InvalidMethodName(method.to_string()).into());
        }
        let rendered = query.render(args)?;

        let base = match plan {
            FetchPlan::Lazy => Member::SELECT_SQL,
            FetchPlan::WithTeam => MEMBER_GRAPH_SELECT_SQL,
        };
        let mut orders = rendered.order_by;
        orders.extend(sort.resolve(Member::PROPERTIES)?);

        let mut sql = format!("{base}{}{}", rendered.where_clause, order_clause(&orders));
        let limit = match (rendered.limit, window.limit) {
            (Some(derived), Some(paged)) => Some(u64::from(derived).min(paged)),
            (derived, paged) => derived.map(u64::from).or(paged),
        };
        if let Some(limit) = limit {
            sql.push_str(&format!(
                " LIMIT {} OFFSET {}",
                sql_integer(limit),
                sql_integer(window.offset)
            ));
        }

        let members = match plan {
            FetchPlan::Lazy => self
                .session
                .load_entities::<Member>(&sql, &rendered.binds, read_only)?,
            FetchPlan::WithTeam => self.load_graph(&sql, &rendered.binds)?,
        };
        debug!(
            "event=derived_query module=repo status=ok method={method} rows={}",
            members.len()
        );
        Ok(members)
    }

    /// Runs a `count_by_…` or `exists_by_…` method as one scalar statement.
    fn scalar_derived(&self, method: &str, args: &[QueryArg]) -> RepoResult<u64> {
        let query = DerivedQuery::parse(method, Member::PROPERTIES)?;
        let rendered = query.render(args)?;
        let sql = match query.subject() {
            Subject::Count => format!(
                "SELECT COUNT({}) FROM {}{}",
                Member::ID_COLUMN,
                Member::FROM_SQL,
                rendered.where_clause
            ),
            Subject::Exists => format!(
                "SELECT EXISTS(SELECT 1 FROM {}{})",
                Member::FROM_SQL,
                rendered.where_clause
            ),
            Subject::Find => return Err(QueryError::InvalidMethodName(method.to_string()).into()),
        };
        self.session.query_count(&sql, &rendered.binds)
    }

    fn select_single(
        &self,
        method: &str,
        username: &str,
        read_only: bool,
    ) -> RepoResult<Option<Member>> {
        let members = self.select_derived(
            method,
            &[QueryArg::from(username)],
            FetchPlan::Lazy,
            read_only,
            &Sort::unsorted(),
            Window::default(),
        )?;
        single_result(members)
    }

    fn select_named(&self, name: &str, params: &[(&str, QueryArg)]) -> RepoResult<Vec<Member>> {
        let bound = named_query(name)?.bind(params)?;
        self.session
            .load_entities::<Member>(&bound.sql, &bound.binds, false)
    }

    /// Loads member rows joined with their team and registers both.
    fn load_graph(&self, sql: &str, binds: &[Value]) -> RepoResult<Vec<Member>> {
        let rows = self.session.query_rows(sql, binds, |row| {
            let member = Member::from_row(row)?;
            let team = match member.team_id {
                Some(_) => Some(Team::from_row(row)?),
                None => None,
            };
            Ok((member, team))
        })?;

        Ok(rows
            .into_iter()
            .map(|(member, team)| {
                if let Some(team) = team {
                    self.session.register(team, false);
                }
                self.session.register(member, false)
            })
            .collect())
    }
}

impl CrudRepository<Member> for SqliteMemberRepository<'_, '_> {
    fn save(&self, entity: &Member) -> RepoResult<Member> {
        self.crud.save(entity)
    }

    fn save_all(&self, entities: &[Member]) -> RepoResult<Vec<Member>> {
        self.crud.save_all(entities)
    }

    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Member>> {
        self.crud.find_by_id(id)
    }

    /// Loads every member together with its team.
    fn find_all(&self) -> RepoResult<Vec<Member>> {
        let sql = format!("{MEMBER_GRAPH_SELECT_SQL} ORDER BY {} ASC", Member::ORDER_COLUMN);
        self.load_graph(&sql, &[])
    }

    fn count(&self) -> RepoResult<u64> {
        self.crud.count()
    }

    fn exists_by_id(&self, id: Uuid) -> RepoResult<bool> {
        self.crud.exists_by_id(id)
    }

    fn delete(&self, entity: &Member) -> RepoResult<()> {
        self.crud.delete(entity)
    }

    fn delete_by_id(&self, id: Uuid) -> RepoResult<()> {
        self.crud.delete_by_id(id)
    }

    fn delete_all(&self) -> RepoResult<()> {
        self.crud.delete_all()
    }
}

impl MemberRepository for SqliteMemberRepository<'_, '_> {
    fn find_by_username_and_age_greater_than(
        &self,
        username: &str,
        age: i32,
    ) -> RepoResult<Vec<Member>> {
        self.select_derived(
            "find_by_username_and_age_greater_than",
            &[QueryArg::from(username), QueryArg::from(age)],
            FetchPlan::Lazy,
            false,
            &Sort::unsorted(),
            Window::default(),
        )
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.select_named(MEMBER_FIND_BY_USERNAME, &[("username", QueryArg::from(username))])
    }

    fn find_user(&self, username: &str, age: i32) -> RepoResult<Vec<Member>> {
        self.select_named(
            MEMBER_FIND_USER,
            &[
                ("username", QueryArg::from(username)),
                ("age", QueryArg::from(age)),
            ],
        )
    }

    fn find_username_list(&self) -> RepoResult<Vec<String>> {
        let bound = named_query(MEMBER_FIND_USERNAME_LIST)?.bind(&[])?;
        self.session
            .query_rows(&bound.sql, &bound.binds, |row| Ok(row.get(0)?))
    }

    fn find_member_dto(&self) -> RepoResult<Vec<MemberDto>> {
        let bound = named_query(MEMBER_FIND_MEMBER_DTO)?.bind(&[])?;
        self.session.query_rows(&bound.sql, &bound.binds, |row| {
            let id: String = row.get("member_id")?;
            Ok(MemberDto::new(
                parse_uuid(&id, "member.member_id")?,
                row.get::<_, String>("username")?,
                Some(row.get("team_name")?),
            ))
        })
    }

    fn find_by_names(&self, names: &[String]) -> RepoResult<Vec<Member>> {
        self.select_named(MEMBER_FIND_BY_NAMES, &[("names", QueryArg::from(names))])
    }

    fn find_list_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.select_derived(
            "find_list_by_username",
            &[QueryArg::from(username)],
            FetchPlan::Lazy,
            false,
            &Sort::unsorted(),
            Window::default(),
        )
    }

    fn find_member_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.select_single("find_member_by_username", username, false)
    }

    fn find_optional_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.select_single("find_optional_by_username", username, false)
    }

    fn count_by_age(&self, age: i32) -> RepoResult<u64> {
        self.scalar_derived("count_by_age", &[QueryArg::from(age)])
    }

    fn exists_by_username(&self, username: &str) -> RepoResult<bool> {
        Ok(self.scalar_derived("exists_by_username", &[QueryArg::from(username)])? == 1)
    }

    fn find_by_age(&self, age: i32, pageable: &PageRequest) -> RepoResult<Page<Member>> {
        let content = self.select_derived(
            "find_by_age",
            &[QueryArg::from(age)],
            FetchPlan::Lazy,
            false,
            pageable.sort(),
            Window {
                limit: Some(u64::from(pageable.page_size())),
                offset: pageable.offset(),
            },
        )?;
        let total = self.count_by_age(age)?;
        Ok(Page::new(content, pageable, total))
    }

    fn find_slice_by_age(&self, age: i32, pageable: &PageRequest) -> RepoResult<Slice<Member>> {
        let rows = self.select_derived(
            "find_by_age",
            &[QueryArg::from(age)],
            FetchPlan::Lazy,
            false,
            pageable.sort(),
            Window {
                limit: Some(u64::from(pageable.page_size()) + 1),
                offset: pageable.offset(),
            },
        )?;
        Ok(Slice::from_lookahead(rows, pageable))
    }

    fn bulk_age_plus(&self, age: i32) -> RepoResult<usize> {
        let bound = named_query(MEMBER_BULK_AGE_PLUS)?.bind(&[("age", QueryArg::from(age))])?;
        let affected = self.session.execute_update(&bound.sql, &bound.binds)?;
        self.session.clear();
        debug!("event=bulk_update module=repo status=ok affected={affected} cleared=true");
        Ok(affected)
    }

    fn find_member_fetch_join(&self) -> RepoResult<Vec<Member>> {
        let bound = named_query(MEMBER_FIND_MEMBER_FETCH_JOIN)?.bind(&[])?;
        self.load_graph(&bound.sql, &bound.binds)
    }

    fn find_member_entity_graph(&self) -> RepoResult<Vec<Member>> {
        let sql = format!("{MEMBER_GRAPH_SELECT_SQL} ORDER BY {} ASC", Member::ORDER_COLUMN);
        self.load_graph(&sql, &[])
    }

    fn find_entity_graph_by_username(&self, username: &str) -> RepoResult<Vec<Member>> {
        self.select_derived(
            "find_entity_graph_by_username",
            &[QueryArg::from(username)],
            FetchPlan::WithTeam,
            false,
            &Sort::unsorted(),
            Window::default(),
        )
    }

    fn find_read_only_by_username(&self, username: &str) -> RepoResult<Option<Member>> {
        self.select_single("find_read_only_by_username", username, true)
    }
}

fn order_clause(orders: &[(&'static str, Direction)]) -> String {
    let mut keys: Vec<String> = orders
        .iter()
        .map(|(column, direction)| format!("{column} {}", direction.as_sql()))
        .collect();
    keys.push(format!("{} ASC", Member::ORDER_COLUMN));
    format!(" ORDER BY {}", keys.join(", "))
}

// SQLite integers are signed 64-bit.
fn sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn single_result(mut members: Vec<Member>) -> RepoResult<Option<Member>> {
    match members.len() {
        0 | 1 => Ok(members.pop()),
        count => Err(RepoError::NonUniqueResult {
            entity: Member::NAME,
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{order_clause, single_result, FetchPlan, SqliteMemberRepository, Window};
    use crate::db::open_db_in_memory;
    use crate::model::member::Member;
    use crate::query::page::{Direction, Sort};
    use crate::query::{QueryArg, QueryError};
    use crate::repo::error::RepoError;
    use crate::session::Session;

    #[test]
    fn order_clause_always_ends_with_insertion_order() {
        assert_eq!(order_clause(&[]), " ORDER BY m.rowid ASC");
        assert_eq!(
            order_clause(&[("m.username", Direction::Desc)]),
            " ORDER BY m.username DESC, m.rowid ASC"
        );
    }

    #[test]
    fn single_result_rejects_duplicates() {
        assert_eq!(single_result(Vec::new()).unwrap(), None);

        let duplicates = vec![Member::new("AAA"), Member::new("AAA")];
        match single_result(duplicates).unwrap_err() {
            RepoError::NonUniqueResult { entity, count } => {
                assert_eq!(entity, "Member");
                assert_eq!(count, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn subject_decides_statement_shape() {
        let mut conn = open_db_in_memory().unwrap();
        let session = Session::begin(&mut conn).unwrap();
        let repo = SqliteMemberRepository::new(&session);
        let args = [QueryArg::from(10)];

        assert!(matches!(
            repo.select_derived(
                "count_by_age",
                &args,
                FetchPlan::Lazy,
                false,
                &Sort::unsorted(),
                Window::default(),
            )
            .unwrap_err(),
            RepoError::Query(QueryError::InvalidMethodName(_))
        ));
        assert!(matches!(
            repo.scalar_derived("find_by_age", &args).unwrap_err(),
            RepoError::Query(QueryError::InvalidMethodName(_))
        ));
        assert_eq!(repo.scalar_derived("exists_by_age", &args).unwrap(), 0);
    }
}
