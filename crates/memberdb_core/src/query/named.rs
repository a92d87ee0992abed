//! Registry of named queries.
//!
//! Queries are written once with `:name` parameters and bound by name. A
//! parameter bound to a list expands to a parenthesized placeholder list, so
//! `m.username IN :names` accepts any number of values.

use crate::query::{QueryArg, QueryError, QueryResult};
use crate::session::mapping::{member_columns, team_graph_columns};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

static PARAMETER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([a-z_][a-z0-9_]*)").expect("valid named parameter regex"));

pub const MEMBER_FIND_BY_USERNAME: &str = "Member.findByUsername";
pub const MEMBER_FIND_USER: &str = "Member.findUser";
pub const MEMBER_FIND_USERNAME_LIST: &str = "Member.findUsernameList";
pub const MEMBER_FIND_MEMBER_DTO: &str = "Member.findMemberDto";
pub const MEMBER_FIND_BY_NAMES: &str = "Member.findByNames";
pub const MEMBER_BULK_AGE_PLUS: &str = "Member.bulkAgePlus";
pub const MEMBER_FIND_MEMBER_FETCH_JOIN: &str = "Member.findMemberFetchJoin";

/// A statement registered under a stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedQuery {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Positional SQL produced by binding a named query.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub binds: Vec<Value>,
}

const NAMED_QUERIES: &[NamedQuery] = &[
    NamedQuery {
        name: MEMBER_FIND_BY_USERNAME,
        sql: concat!(
            "SELECT ",
            member_columns!(),
            " FROM member m WHERE m.username = :username ORDER BY m.rowid ASC"
        ),
    },
    NamedQuery {
        name: MEMBER_FIND_USER,
        sql: concat!(
            "SELECT ",
            member_columns!(),
            " FROM member m WHERE m.username = :username AND m.age = :age ORDER BY m.rowid ASC"
        ),
    },
    NamedQuery {
        name: MEMBER_FIND_USERNAME_LIST,
        sql: "SELECT m.username FROM member m ORDER BY m.rowid ASC",
    },
    NamedQuery {
        name: MEMBER_FIND_MEMBER_DTO,
        sql: "SELECT m.member_id AS member_id, m.username AS username, t.name AS team_name \
              FROM member m INNER JOIN team t ON t.team_id = m.team_id ORDER BY m.rowid ASC",
    },
    NamedQuery {
        name: MEMBER_FIND_BY_NAMES,
        sql: concat!(
            "SELECT ",
            member_columns!(),
            " FROM member m WHERE m.username IN :names ORDER BY m.rowid ASC"
        ),
    },
    NamedQuery {
        name: MEMBER_BULK_AGE_PLUS,
        // Members at i32::MAX are skipped; a larger stored age no longer decodes.
        sql: "UPDATE member SET age = age + 1 WHERE age >= :age AND age < 2147483647",
    },
    NamedQuery {
        name: MEMBER_FIND_MEMBER_FETCH_JOIN,
        sql: concat!(
            "SELECT ",
            member_columns!(),
            ", ",
            team_graph_columns!(),
            " FROM member m LEFT JOIN team t ON t.team_id = m.team_id ORDER BY m.rowid ASC"
        ),
    },
];

/// Looks up a registered query by name.
pub fn named_query(name: &str) -> QueryResult<&'static NamedQuery> {
    NAMED_QUERIES
        .iter()
        .find(|query| query.name == name)
        .ok_or_else(|| QueryError::UnknownNamedQuery(name.to_string()))
}

/// Names of all registered queries, in registration order.
pub fn registered_names() -> impl Iterator<Item = &'static str> {
    NAMED_QUERIES.iter().map(|query| query.name)
}

impl NamedQuery {
    /// Binds `params` by name and rewrites the statement to positional `?`.
    ///
    /// Every parameter referenced by the statement must be supplied, and
    /// every supplied parameter must be referenced.
    pub fn bind(&self, params: &[(&str, QueryArg)]) -> QueryResult<BoundQuery> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut binds = Vec::new();
        let mut used = vec![false; params.len()];
        let mut last_end = 0;

        for captures in PARAMETER_RE.captures_iter(self.sql) {
            let whole = captures.get(0).expect("capture group 0 always matches");
            let name = &captures[1];
            let position = params
                .iter()
                .position(|(param, _)| *param == name)
                .ok_or_else(|| QueryError::MissingParameter {
                    query: self.name,
                    parameter: name.to_string(),
                })?;
            used[position] = true;

            sql.push_str(&self.sql[last_end..whole.start()]);
            match &params[position].1 {
                QueryArg::Scalar(value) => {
                    sql.push('?');
                    binds.push(value.clone());
                }
                QueryArg::List(values) => {
                    sql.push('(');
                    sql.push_str(&vec!["?"; values.len()].join(", "));
                    sql.push(')');
                    binds.extend(values.iter().cloned());
                }
            }
            last_end = whole.end();
        }
        sql.push_str(&self.sql[last_end..]);

        if let Some(unused) = used.iter().position(|was_used| !was_used) {
            return Err(QueryError::UnusedParameter {
                query: self.name,
                parameter: params[unused].0.to_string(),
            });
        }

        Ok(BoundQuery { sql, binds })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        named_query, registered_names, MEMBER_BULK_AGE_PLUS, MEMBER_FIND_BY_NAMES,
        MEMBER_FIND_USER,
    };
    use crate::query::{QueryArg, QueryError};
    use rusqlite::types::Value;
    use std::collections::HashSet;

    #[test]
    fn registered_names_are_unique() {
        let names: Vec<_> = registered_names().collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn binds_scalar_parameters_in_statement_order() {
        let query = named_query(MEMBER_FIND_USER).unwrap();
        let bound = query
            .bind(&[("age", QueryArg::from(10)), ("username", QueryArg::from("AAA"))])
            .unwrap();

        assert!(bound.sql.contains("m.username = ? AND m.age = ?"));
        assert_eq!(
            bound.binds,
            vec![Value::Text("AAA".to_string()), Value::Integer(10)]
        );
    }

    #[test]
    fn list_parameter_expands_placeholders() {
        let query = named_query(MEMBER_FIND_BY_NAMES).unwrap();
        let names = vec!["aaa".to_string(), "bbb".to_string()];
        let bound = query.bind(&[("names", QueryArg::from(names))]).unwrap();

        assert!(bound.sql.contains("m.username IN (?, ?)"));
        assert_eq!(bound.binds.len(), 2);
    }

    #[test]
    fn missing_and_unused_parameters_are_rejected() {
        let query = named_query(MEMBER_BULK_AGE_PLUS).unwrap();
        assert!(matches!(
            query.bind(&[]).unwrap_err(),
            QueryError::MissingParameter { .. }
        ));
        assert!(matches!(
            query
                .bind(&[("age", QueryArg::from(20)), ("extra", QueryArg::from(1))])
                .unwrap_err(),
            QueryError::UnusedParameter { .. }
        ));
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            named_query("Member.nope").unwrap_err(),
            QueryError::UnknownNamedQuery("Member.nope".to_string())
        );
    }
}
