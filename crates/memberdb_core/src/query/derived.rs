//! Query derivation from repository method names.
//!
//! # Responsibility
//! - Parse snake_case method names such as
//!   `find_by_username_and_age_greater_than` into a predicate tree.
//! - Render the predicate into a SQL `WHERE` clause with positional binds.
//!
//! # Grammar
//! `<subject>[_<modifiers>]_by_<criteria>[_order_by_<ordering>]`
//! - subject: `find | read | get | query | stream` (rows), `count`, `exists`.
//! - modifiers: `first`, `top<N>`; any other word is descriptive only
//!   (`find_list_by_…`, `find_read_only_by_…`).
//! - criteria: parts joined with `_and_`, branches joined with `_or_`.
//! - part: `<property>[_<operator>]`, equality when the operator is omitted.
//! - ordering: `<property>[_asc|_desc]` repeated.

use crate::query::page::Direction;
use crate::query::{Property, QueryArg, QueryError, QueryResult};
use once_cell::sync::Lazy;
use rusqlite::types::Value;

static METHOD_NAME_RE: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(
        r"^(find|read|get|query|stream|count|exists)((?:_[a-z0-9]+)*?)_by_([a-z0-9_]+)$",
    )
    .expect("valid derived method regex")
});
static TOP_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^top(\d+)$").expect("valid top modifier regex"));

/// What a derived query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Find,
    Count,
    Exists,
}

/// Comparison applied to one property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Like,
    StartingWith,
    EndingWith,
    Containing,
}

impl Operator {
    fn from_keyword(keyword: &str) -> Option<Self> {
        let operator = match keyword {
            "" | "is" | "equals" => Self::Equals,
            "not" | "is_not" => Self::NotEquals,
            "greater_than" | "is_greater_than" => Self::GreaterThan,
            "greater_than_equal" | "is_greater_than_equal" => Self::GreaterThanEqual,
            "less_than" | "is_less_than" => Self::LessThan,
            "less_than_equal" | "is_less_than_equal" => Self::LessThanEqual,
            "between" | "is_between" => Self::Between,
            "in" | "is_in" => Self::In,
            "not_in" | "is_not_in" => Self::NotIn,
            "is_null" | "null" => Self::IsNull,
            "is_not_null" | "not_null" => Self::IsNotNull,
            "like" | "is_like" => Self::Like,
            "starting_with" | "starts_with" => Self::StartingWith,
            "ending_with" | "ends_with" => Self::EndingWith,
            "containing" | "contains" => Self::Containing,
            _ => return None,
        };
        Some(operator)
    }

    /// Number of method arguments consumed by this operator.
    pub fn arity(self) -> usize {
        match self {
            Self::IsNull | Self::IsNotNull => 0,
            Self::Between => 2,
            _ => 1,
        }
    }
}

/// One `<property>_<operator>` segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub property: &'static Property,
    pub operator: Operator,
}

/// Parsed form of a derived query method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedQuery {
    subject: Subject,
    limit: Option<u32>,
    /// Disjunction of conjunctions.
    branches: Vec<Vec<Part>>,
    ordering: Vec<(&'static Property, Direction)>,
}

/// SQL fragments rendered from a derived query and its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// Empty, or a clause starting with ` WHERE `.
    pub where_clause: String,
    pub order_by: Vec<(&'static str, Direction)>,
    pub limit: Option<u32>,
    pub binds: Vec<Value>,
}

impl DerivedQuery {
    /// Parses `method` against the entity's property table.
    pub fn parse(method: &str, properties: &'static [Property]) -> QueryResult<Self> {
        let captures = METHOD_NAME_RE
            .captures(method)
            .ok_or_else(|| QueryError::InvalidMethodName(method.to_string()))?;

        let subject = match &captures[1] {
            "count" => Subject::Count,
            "exists" => Subject::Exists,
            _ => Subject::Find,
        };
        let limit = parse_limit(&captures[2]);

        let (criteria, ordering) = match captures[3].split_once("_order_by_") {
            Some((criteria, ordering)) => (criteria, Some(ordering)),
            None => (&captures[3], None),
        };

        let mut branches = Vec::new();
        for branch in criteria.split("_or_") {
            let parts = branch
                .split("_and_")
                .map(|part| parse_part(part, properties))
                .collect::<QueryResult<Vec<_>>>()?;
            branches.push(parts);
        }

        let ordering = match ordering {
            Some(ordering) => parse_ordering(ordering, properties)?,
            None => Vec::new(),
        };

        Ok(Self {
            subject,
            limit,
            branches,
            ordering,
        })
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn branches(&self) -> &[Vec<Part>] {
        &self.branches
    }

    /// Total number of arguments the method must be called with.
    pub fn parameter_count(&self) -> usize {
        self.branches
            .iter()
            .flatten()
            .map(|part| part.operator.arity())
            .sum()
    }

    /// Renders the predicate, consuming `args` positionally.
    pub fn render(&self, args: &[QueryArg]) -> QueryResult<RenderedQuery> {
        let expected = self.parameter_count();
        if args.len() != expected {
            return Err(QueryError::ArgumentCount {
                expected,
                actual: args.len(),
            });
        }

        let mut remaining = args.iter();
        let mut binds = Vec::new();
        let mut rendered_branches = Vec::with_capacity(self.branches.len());
        for branch in &self.branches {
            let mut conditions = Vec::with_capacity(branch.len());
            for part in branch {
                let consumed: Vec<&QueryArg> =
                    remaining.by_ref().take(part.operator.arity()).collect();
                conditions.push(render_part(part, &consumed, &mut binds)?);
            }
            rendered_branches.push(conditions.join(" AND "));
        }

        let where_clause = match rendered_branches.len() {
            0 => String::new(),
            1 => format!(" WHERE {}", rendered_branches[0]),
            _ => format!(
                " WHERE ({})",
                rendered_branches
                    .iter()
                    .map(|branch| format!("({branch})"))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            ),
        };

        Ok(RenderedQuery {
            where_clause,
            order_by: self
                .ordering
                .iter()
                .map(|(property, direction)| (property.column, *direction))
                .collect(),
            limit: self.limit,
            binds,
        })
    }
}

fn parse_limit(modifiers: &str) -> Option<u32> {
    modifiers
        .split('_')
        .filter(|word| !word.is_empty())
        .find_map(|word| {
            if word == "first" {
                return Some(1);
            }
            TOP_RE
                .captures(word)
                .and_then(|captures| captures[1].parse::<u32>().ok())
        })
}

fn parse_part(part: &str, properties: &'static [Property]) -> QueryResult<Part> {
    let mut candidates: Vec<&'static Property> = properties
        .iter()
        .filter(|property| {
            part == property.name
                || part
                    .strip_prefix(property.name)
                    .is_some_and(|rest| rest.starts_with('_'))
        })
        .collect();
    candidates.sort_by_key(|property| std::cmp::Reverse(property.name.len()));

    let mut unknown_keyword = None;
    for property in candidates {
        let keyword = part[property.name.len()..].trim_start_matches('_');
        if let Some(operator) = Operator::from_keyword(keyword) {
            return Ok(Part { property, operator });
        }
        unknown_keyword.get_or_insert((property.name, keyword));
    }

    match unknown_keyword {
        Some((property, keyword)) => Err(QueryError::UnknownOperator {
            property: property.to_string(),
            keyword: keyword.to_string(),
        }),
        None => Err(QueryError::UnknownProperty(part.to_string())),
    }
}

fn parse_ordering(
    ordering: &str,
    properties: &'static [Property],
) -> QueryResult<Vec<(&'static Property, Direction)>> {
    let mut orders = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for word in ordering.split('_') {
        let direction = match word {
            "asc" => Some(Direction::Asc),
            "desc" => Some(Direction::Desc),
            _ => None,
        };
        match direction {
            Some(direction) if !pending.is_empty() => {
                let property = crate::query::resolve_property(properties, &pending.join("_"))?;
                orders.push((property, direction));
                pending.clear();
            }
            _ => pending.push(word),
        }
    }

    if !pending.is_empty() {
        let property = crate::query::resolve_property(properties, &pending.join("_"))?;
        orders.push((property, Direction::Asc));
    }

    Ok(orders)
}

fn render_part(part: &Part, args: &[&QueryArg], binds: &mut Vec<Value>) -> QueryResult<String> {
    let column = part.property.column;
    let sql = match part.operator {
        Operator::IsNull => format!("{column} IS NULL"),
        Operator::IsNotNull => format!("{column} IS NOT NULL"),
        Operator::Equals => match scalar(part, args[0])? {
            Value::Null => format!("{column} IS NULL"),
            value => {
                binds.push(value);
                format!("{column} = ?")
            }
        },
        Operator::NotEquals => match scalar(part, args[0])? {
            Value::Null => format!("{column} IS NOT NULL"),
            value => {
                binds.push(value);
                format!("{column} <> ?")
            }
        },
        Operator::GreaterThan => compare(part, ">", args[0], binds)?,
        Operator::GreaterThanEqual => compare(part, ">=", args[0], binds)?,
        Operator::LessThan => compare(part, "<", args[0], binds)?,
        Operator::LessThanEqual => compare(part, "<=", args[0], binds)?,
        Operator::Between => {
            binds.push(scalar(part, args[0])?);
            binds.push(scalar(part, args[1])?);
            format!("{column} BETWEEN ? AND ?")
        }
        Operator::In | Operator::NotIn => {
            let values = list(part, args[0])?;
            let keyword = if part.operator == Operator::In {
                "IN"
            } else {
                "NOT IN"
            };
            let placeholders = vec!["?"; values.len()].join(", ");
            binds.extend(values);
            format!("{column} {keyword} ({placeholders})")
        }
        Operator::Like => compare(part, "LIKE", args[0], binds)?,
        Operator::StartingWith | Operator::EndingWith | Operator::Containing => {
            let escaped = escape_like(&text(part, args[0])?);
            let pattern = match part.operator {
                Operator::StartingWith => format!("{escaped}%"),
                Operator::EndingWith => format!("%{escaped}"),
                _ => format!("%{escaped}%"),
            };
            binds.push(Value::Text(pattern));
            format!("{column} LIKE ? ESCAPE '\\'")
        }
    };
    Ok(sql)
}

fn compare(
    part: &Part,
    sql_operator: &str,
    arg: &QueryArg,
    binds: &mut Vec<Value>,
) -> QueryResult<String> {
    binds.push(scalar(part, arg)?);
    Ok(format!("{} {sql_operator} ?", part.property.column))
}

fn scalar(part: &Part, arg: &QueryArg) -> QueryResult<Value> {
    match arg {
        QueryArg::Scalar(value) => Ok(value.clone()),
        QueryArg::List(_) => Err(QueryError::ArgumentType {
            property: part.property.name.to_string(),
            expected: "a single value",
        }),
    }
}

fn list(part: &Part, arg: &QueryArg) -> QueryResult<Vec<Value>> {
    match arg {
        QueryArg::List(values) => Ok(values.clone()),
        QueryArg::Scalar(_) => Err(QueryError::ArgumentType {
            property: part.property.name.to_string(),
            expected: "a list",
        }),
    }
}

fn text(part: &Part, arg: &QueryArg) -> QueryResult<String> {
    match arg {
        QueryArg::Scalar(Value::Text(value)) => Ok(value.clone()),
        _ => Err(QueryError::ArgumentType {
            property: part.property.name.to_string(),
            expected: "text",
        }),
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
