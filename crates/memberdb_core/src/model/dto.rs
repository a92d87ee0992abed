//! Flat read projections returned across the service boundary.

use crate::model::member::{Member, MemberId};
use serde::{Deserialize, Serialize};

/// Member projection joined with its team name.
///
/// Built per result row and never tracked by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDto {
    pub id: MemberId,
    pub username: String,
    /// `None` when the team was not resolved (or the member has none).
    pub team_name: Option<String>,
}

impl MemberDto {
    pub fn new(id: MemberId, username: impl Into<String>, team_name: Option<String>) -> Self {
        Self {
            id,
            username: username.into(),
            team_name,
        }
    }
}

impl From<&Member> for MemberDto {
    fn from(member: &Member) -> Self {
        Self::new(member.id, member.username.clone(), None)
    }
}
