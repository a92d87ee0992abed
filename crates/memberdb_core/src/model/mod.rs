//! Domain model for members, teams and their read projections.
//!
//! # Responsibility
//! - Define the entity shapes persisted by the session layer.
//! - Keep the member/team association consistent from the owning side.
//!
//! # Invariants
//! - Every entity is identified by a stable, non-nil UUID generated at
//!   construction time.
//! - `Member::team_id` is the owning side; `Team::members` is the inverse
//!   collection and is never written to storage.

pub mod dto;
pub mod member;
pub mod team;
pub mod validation;
