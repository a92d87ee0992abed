//! Entity-to-table mapping metadata.
//!
//! # Responsibility
//! - Describe how `Member` and `Team` map to the `member` and `team` tables.
//! - Decode result rows into entities.
//! - Keep the inverse `Team::members` collection in step with member changes
//!   inside one persistence context.
//!
//! # Invariants
//! - Column lists are shared through the `*_columns!` macros so that every
//!   query decodes rows the same way.
//! - `column_values` never includes the id; inserts bind it first, updates last.

use crate::model::member::Member;
use crate::model::team::Team;
use crate::model::validation::EntityValidationError;
use crate::query::Property;
use crate::repo::error::{RepoError, RepoResult};
use crate::session::context::{EntityMap, PersistenceContext};
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

macro_rules! member_columns {
    () => {
        "m.member_id AS member_id, m.username AS username, m.age AS age, m.team_id AS team_id"
    };
}

macro_rules! team_columns {
    () => {
        "t.team_id AS team_id, t.name AS name, \
         (SELECT group_concat(tm.member_id) FROM member tm WHERE tm.team_id = t.team_id) AS member_ids"
    };
}

/// Team columns appended to a member row for fetch-join loading. `team_id`
/// is taken from the member side.
macro_rules! team_graph_columns {
    () => {
        "t.name AS name, \
         (SELECT group_concat(tm.member_id) FROM member tm WHERE tm.team_id = t.team_id) AS member_ids"
    };
}

pub(crate) use member_columns;
pub(crate) use team_graph_columns;

/// Member rows joined with their (optional) team in one statement.
pub const MEMBER_GRAPH_SELECT_SQL: &str = concat!(
    "SELECT ",
    member_columns!(),
    ", ",
    team_graph_columns!(),
    " FROM member m LEFT JOIN team t ON t.team_id = m.team_id"
);

/// Mapping contract between an entity type and its table.
pub trait Entity: Clone + PartialEq + Sized {
    /// Entity name used in errors and logs.
    const NAME: &'static str;
    const SELECT_SQL: &'static str;
    /// Table with alias, for `COUNT`/`EXISTS` queries.
    const FROM_SQL: &'static str;
    const ID_COLUMN: &'static str;
    /// Column giving insertion order; default ordering and page tie-break.
    const ORDER_COLUMN: &'static str;
    const INSERT_SQL: &'static str;
    const UPDATE_SQL: &'static str;
    const DELETE_SQL: &'static str;
    /// Properties addressable from derived queries and sort keys.
    const PROPERTIES: &'static [Property];

    fn id(&self) -> Uuid;
    fn validate(&self) -> Result<(), EntityValidationError>;
    fn column_values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
    fn managed(context: &PersistenceContext) -> &EntityMap<Self>;
    fn managed_mut(context: &mut PersistenceContext) -> &mut EntityMap<Self>;

    /// Called after a managed instance is created, replaced or removed.
    fn on_transition(
        _context: &mut PersistenceContext,
        _id: Uuid,
        _previous: Option<&Self>,
        _current: Option<&Self>,
    ) {
    }
}

const MEMBER_PROPERTIES: &[Property] = &[
    Property {
        name: "id",
        column: "m.member_id",
    },
    Property {
        name: "username",
        column: "m.username",
    },
    Property {
        name: "age",
        column: "m.age",
    },
    Property {
        name: "team_id",
        column: "m.team_id",
    },
];

const TEAM_PROPERTIES: &[Property] = &[
    Property {
        name: "id",
        column: "t.team_id",
    },
    Property {
        name: "name",
        column: "t.name",
    },
];

impl Entity for Member {
    const NAME: &'static str = "Member";
    const SELECT_SQL: &'static str = concat!("SELECT ", member_columns!(), " FROM member m");
    const FROM_SQL: &'static str = "member m";
    const ID_COLUMN: &'static str = "m.member_id";
    const ORDER_COLUMN: &'static str = "m.rowid";
    const INSERT_SQL: &'static str =
        "INSERT INTO member (member_id, username, age, team_id) VALUES (?1, ?2, ?3, ?4);";
    const UPDATE_SQL: &'static str =
        "UPDATE member SET username = ?1, age = ?2, team_id = ?3 WHERE member_id = ?4;";
    const DELETE_SQL: &'static str = "DELETE FROM member WHERE member_id = ?1;";
    const PROPERTIES: &'static [Property] = MEMBER_PROPERTIES;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        Member::validate(self)
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.username.clone()),
            Value::Integer(i64::from(self.age)),
            self.team_id
                .map_or(Value::Null, |team_id| Value::Text(team_id.to_string())),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id_text: String = row.get("member_id")?;
        let team_id = match row.get::<_, Option<String>>("team_id")? {
            Some(value) => Some(parse_uuid(&value, "member.team_id")?),
            None => None,
        };
        let member = Member {
            id: parse_uuid(&id_text, "member.member_id")?,
            username: row.get("username")?,
            age: row.get("age")?,
            team_id,
        };
        member.validate()?;
        Ok(member)
    }

    fn managed(context: &PersistenceContext) -> &EntityMap<Self> {
        context.members()
    }

    fn managed_mut(context: &mut PersistenceContext) -> &mut EntityMap<Self> {
        context.members_mut()
    }

    fn on_transition(
        context: &mut PersistenceContext,
        id: Uuid,
        previous: Option<&Self>,
        current: Option<&Self>,
    ) {
        let new_team = current.and_then(|member| member.team_id);
        let teams = context.teams_mut();

        match current {
            // Removed: no managed team may keep listing the member.
            None => teams.for_each_mut(|team| team.remove_member(id)),
            Some(_) => {
                if let Some(old_team) = previous.and_then(|member| member.team_id) {
                    if Some(old_team) != new_team {
                        teams.update(old_team, |team| team.remove_member(id));
                    }
                }
                if let Some(new_team) = new_team {
                    teams.update(new_team, |team| team.add_member(id));
                }
            }
        }
    }
}

impl Entity for Team {
    const NAME: &'static str = "Team";
    const SELECT_SQL: &'static str = concat!("SELECT ", team_columns!(), " FROM team t");
    const FROM_SQL: &'static str = "team t";
    const ID_COLUMN: &'static str = "t.team_id";
    const ORDER_COLUMN: &'static str = "t.rowid";
    const INSERT_SQL: &'static str = "INSERT INTO team (team_id, name) VALUES (?1, ?2);";
    const UPDATE_SQL: &'static str = "UPDATE team SET name = ?1 WHERE team_id = ?2;";
    const DELETE_SQL: &'static str = "DELETE FROM team WHERE team_id = ?1;";
    const PROPERTIES: &'static [Property] = TEAM_PROPERTIES;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        Team::validate(self)
    }

    fn column_values(&self) -> Vec<Value> {
        vec![Value::Text(self.name.clone())]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        let id_text: String = row.get("team_id")?;
        let members = match row.get::<_, Option<String>>("member_ids")? {
            Some(joined) => joined
                .split(',')
                .filter(|value| !value.is_empty())
                .map(|value| parse_uuid(value, "member.member_id"))
                .collect::<RepoResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        let team = Team {
            id: parse_uuid(&id_text, "team.team_id")?,
            name: row.get("name")?,
            members,
        };
        team.validate()?;
        Ok(team)
    }

    fn managed(context: &PersistenceContext) -> &EntityMap<Self> {
        context.teams()
    }

    fn managed_mut(context: &mut PersistenceContext) -> &mut EntityMap<Self> {
        context.teams_mut()
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
