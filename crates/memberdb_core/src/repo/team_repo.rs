//! Team repositories.
//!
//! `TeamJpaRepository` is a thin hand-written pass-through over the session.
//! `TeamRepository` is the generic CRUD repository for teams.
//!
//! Store errors propagate unchanged: deleting a team that members still
//! reference fails with the foreign-key violation.

use crate::model::team::{Team, TeamId};
use crate::repo::crud::SimpleRepository;
use crate::repo::error::RepoResult;
use crate::session::mapping::Entity;
use crate::session::Session;

/// Generic CRUD access to teams.
pub type TeamRepository<'s, 'conn> = SimpleRepository<'s, 'conn, Team>;

/// Hand-written team repository.
pub struct TeamJpaRepository<'s, 'conn> {
    session: &'s Session<'conn>,
}

impl<'s, 'conn> TeamJpaRepository<'s, 'conn> {
    pub fn new(session: &'s Session<'conn>) -> Self {
        Self { session }
    }

    /// Inserts `team` and starts tracking it.
    pub fn save(&self, team: &Team) -> RepoResult<Team> {
        self.session.persist(team)?;
        Ok(team.clone())
    }

    pub fn delete(&self, team: &Team) -> RepoResult<()> {
        self.session.remove::<Team>(team.id)?;
        Ok(())
    }

    pub fn find_all(&self) -> RepoResult<Vec<Team>> {
        let sql = format!("{} ORDER BY {} ASC", Team::SELECT_SQL, Team::ORDER_COLUMN);
        self.session.load_entities(&sql, &[], false)
    }

    pub fn find_by_id(&self, id: TeamId) -> RepoResult<Option<Team>> {
        self.session.find(id)
    }

    pub fn count(&self) -> RepoResult<u64> {
        self.session.query_count("SELECT COUNT(*) FROM team t", &[])
    }
}
