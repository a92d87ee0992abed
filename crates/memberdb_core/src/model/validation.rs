//! Write-path validation shared by member and team entities.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation errors raised before an entity reaches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// Identity must never be the nil UUID.
    NilId,
    /// `username` is empty or whitespace only.
    EmptyUsername,
    /// `age` is below zero.
    NegativeAge(i32),
    /// `name` is empty or whitespace only.
    EmptyTeamName,
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "entity id must not be nil"),
            Self::EmptyUsername => write!(f, "member username must not be empty"),
            Self::NegativeAge(age) => write!(f, "member age must not be negative, got {age}"),
            Self::EmptyTeamName => write!(f, "team name must not be empty"),
        }
    }
}

impl Error for EntityValidationError {}
