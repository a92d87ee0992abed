//! Query construction: derived method names, named queries and paging.
//!
//! # Responsibility
//! - Turn repository method contracts into SQL with positional binds.
//! - Resolve user-facing property names (sort keys, derived predicates)
//!   against an entity's property table, never against raw input.
//!
//! # Invariants
//! - Generated SQL only embeds column names from static property tables;
//!   every caller-provided value is bound as a parameter.

pub mod derived;
pub mod named;
pub mod page;

use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while building a query, before anything reaches SQLite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidMethodName(String),
    UnknownProperty(String),
    UnknownOperator { property: String, keyword: String },
    ArgumentCount { expected: usize, actual: usize },
    ArgumentType { property: String, expected: &'static str },
    UnknownNamedQuery(String),
    MissingParameter { query: &'static str, parameter: String },
    UnusedParameter { query: &'static str, parameter: String },
    InvalidPageSize(u32),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMethodName(name) => write!(f, "not a derivable query method: `{name}`"),
            Self::UnknownProperty(name) => write!(f, "unknown property `{name}`"),
            Self::UnknownOperator { property, keyword } => {
                write!(f, "unknown operator `{keyword}` for property `{property}`")
            }
            Self::ArgumentCount { expected, actual } => {
                write!(f, "query expects {expected} argument(s), got {actual}")
            }
            Self::ArgumentType { property, expected } => {
                write!(f, "argument for `{property}` must be {expected}")
            }
            Self::UnknownNamedQuery(name) => write!(f, "no named query registered as `{name}`"),
            Self::MissingParameter { query, parameter } => {
                write!(f, "named query `{query}` requires parameter `:{parameter}`")
            }
            Self::UnusedParameter { query, parameter } => {
                write!(f, "named query `{query}` has no parameter `:{parameter}`")
            }
            Self::InvalidPageSize(size) => write!(f, "page size must be at least 1, got {size}"),
        }
    }
}

impl Error for QueryError {}

/// Maps a property name used in method names and sort keys to its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property {
    pub name: &'static str,
    pub column: &'static str,
}

/// Looks up a property by exact name.
pub fn resolve_property(
    properties: &'static [Property],
    name: &str,
) -> QueryResult<&'static Property> {
    properties
        .iter()
        .find(|property| property.name == name)
        .ok_or_else(|| QueryError::UnknownProperty(name.to_string()))
}

/// One bound argument of a derived or named query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Scalar(Value),
    /// Collection argument for `IN` predicates; order is kept, matching is
    /// by set membership.
    List(Vec<Value>),
}

impl QueryArg {
    pub fn null() -> Self {
        Self::Scalar(Value::Null)
    }
}

impl From<&str> for QueryArg {
    fn from(value: &str) -> Self {
        Self::Scalar(Value::Text(value.to_string()))
    }
}

impl From<String> for QueryArg {
    fn from(value: String) -> Self {
        Self::Scalar(Value::Text(value))
    }
}

impl From<i32> for QueryArg {
    fn from(value: i32) -> Self {
        Self::Scalar(Value::Integer(i64::from(value)))
    }
}

impl From<i64> for QueryArg {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::Integer(value))
    }
}

impl From<Uuid> for QueryArg {
    fn from(value: Uuid) -> Self {
        Self::Scalar(Value::Text(value.to_string()))
    }
}

impl From<&[String]> for QueryArg {
    fn from(values: &[String]) -> Self {
        Self::List(values.iter().cloned().map(Value::Text).collect())
    }
}

impl From<Vec<String>> for QueryArg {
    fn from(values: Vec<String>) -> Self {
        Self::List(values.into_iter().map(Value::Text).collect())
    }
}

impl From<&[i32]> for QueryArg {
    fn from(values: &[i32]) -> Self {
        Self::List(
            values
                .iter()
                .map(|value| Value::Integer(i64::from(*value)))
                .collect(),
        )
    }
}
