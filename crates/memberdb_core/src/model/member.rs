//! Member entity.
//!
//! # Responsibility
//! - Hold member identity and attributes.
//! - Own the many-to-one reference to `Team` and keep the inverse side in sync.
//!
//! # Invariants
//! - `id` is stable and never reused for another member.
//! - `team_id = None` means the member is unassigned.

use crate::model::team::{Team, TeamId};
use crate::model::validation::EntityValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Surrogate key of a member row (`member.member_id`).
pub type MemberId = Uuid;

/// Persistent member record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    pub age: i32,
    /// Owning side of the member/team association (`member.team_id`).
    pub team_id: Option<TeamId>,
}

impl Member {
    /// Creates an unassigned member with age `0`.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_age(username, 0)
    }

    /// Creates an unassigned member.
    pub fn with_age(username: impl Into<String>, age: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            age,
            team_id: None,
        }
    }

    /// Creates a member and, when a team is given, joins it via
    /// [`Member::change_team`].
    pub fn with_team(username: impl Into<String>, age: i32, team: Option<&mut Team>) -> Self {
        let mut member = Self::with_age(username, age);
        if let Some(team) = team {
            member.change_team(team);
        }
        member
    }

    /// Creates a member with a caller-provided id.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(
        id: MemberId,
        username: impl Into<String>,
        age: i32,
    ) -> Result<Self, EntityValidationError> {
        if id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        Ok(Self {
            id,
            username: username.into(),
            age,
            team_id: None,
        })
    }

    /// Points this member at `team` and registers it in the team's collection.
    ///
    /// The previous team's collection is not visible from here; a session
    /// removes the member from it when the change is saved.
    pub fn change_team(&mut self, team: &mut Team) {
        self.team_id = Some(team.id);
        team.add_member(self.id);
    }

    /// Checks write-path invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        if self.username.trim().is_empty() {
            return Err(EntityValidationError::EmptyUsername);
        }
        if self.age < 0 {
            return Err(EntityValidationError::NegativeAge(self.age));
        }
        Ok(())
    }
}

impl Display for Member {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Member(id={}, username={}, age={})",
            self.id, self.username, self.age
        )
    }
}
