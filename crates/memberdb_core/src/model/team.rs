//! Team entity.
//!
//! `members` is the inverse side of `Member::team_id`. It is rebuilt from
//! storage when a team is loaded and never written back.

use crate::model::member::MemberId;
use crate::model::validation::EntityValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Surrogate key of a team row (`team.team_id`).
pub type TeamId = Uuid;

/// Persistent team record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberId>,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_id(id: TeamId, name: impl Into<String>) -> Result<Self, EntityValidationError> {
        if id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        Ok(Self {
            id,
            name: name.into(),
            members: Vec::new(),
        })
    }

    /// Returns whether `member_id` is registered in this team's collection.
    pub fn has_member(&self, member_id: MemberId) -> bool {
        self.members.contains(&member_id)
    }

    pub(crate) fn add_member(&mut self, member_id: MemberId) {
        if !self.has_member(member_id) {
            self.members.push(member_id);
        }
    }

    pub(crate) fn remove_member(&mut self, member_id: MemberId) {
        self.members.retain(|id| *id != member_id);
    }

    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::EmptyTeamName);
        }
        Ok(())
    }
}

impl Display for Team {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Team(id={}, name={})", self.id, self.name)
    }
}
