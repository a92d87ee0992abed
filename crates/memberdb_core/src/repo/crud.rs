//! Generic CRUD contract over the session.
//!
//! # Responsibility
//! - Provide the create/read/delete operations every entity repository shares.
//! - Route all access through the session so the identity map stays coherent.
//!
//! # Invariants
//! - `save` persists unknown entities and merges known ones.
//! - `delete` ignores missing rows; `delete_by_id` reports them as `NotFound`.

use crate::repo::error::{RepoError, RepoResult};
use crate::session::mapping::Entity;
use crate::session::Session;
use log::debug;
use rusqlite::types::Value;
use std::marker::PhantomData;
use uuid::Uuid;

/// Repository operations shared by all entity types.
pub trait CrudRepository<E: Entity> {
    /// Persists a new entity or merges state onto the managed instance.
    fn save(&self, entity: &E) -> RepoResult<E>;
    fn save_all(&self, entities: &[E]) -> RepoResult<Vec<E>>;
    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<E>>;
    /// All rows in insertion order.
    fn find_all(&self) -> RepoResult<Vec<E>>;
    fn count(&self) -> RepoResult<u64>;
    fn exists_by_id(&self, id: Uuid) -> RepoResult<bool>;
    /// Deletes the entity's row; a missing row is not an error.
    fn delete(&self, entity: &E) -> RepoResult<()>;
    fn delete_by_id(&self, id: Uuid) -> RepoResult<()>;
    /// Loads every row and deletes them one by one.
    fn delete_all(&self) -> RepoResult<()>;
}

/// Session-backed [`CrudRepository`] usable for any mapped entity.
pub struct SimpleRepository<'s, 'conn, E> {
    session: &'s Session<'conn>,
    _entity: PhantomData<E>,
}

impl<'s, 'conn, E: Entity> SimpleRepository<'s, 'conn, E> {
    pub fn new(session: &'s Session<'conn>) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &'s Session<'conn> {
        self.session
    }
}

impl<E: Entity> CrudRepository<E> for SimpleRepository<'_, '_, E> {
    fn save(&self, entity: &E) -> RepoResult<E> {
        self.session.merge(entity)
    }

    fn save_all(&self, entities: &[E]) -> RepoResult<Vec<E>> {
        entities.iter().map(|entity| self.save(entity)).collect()
    }

    fn find_by_id(&self, id: Uuid) -> RepoResult<Option<E>> {
        self.session.find(id)
    }

    fn find_all(&self) -> RepoResult<Vec<E>> {
        let sql = format!("{} ORDER BY {} ASC", E::SELECT_SQL, E::ORDER_COLUMN);
        self.session.load_entities(&sql, &[], false)
    }

    fn count(&self) -> RepoResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", E::FROM_SQL);
        self.session.query_count(&sql, &[])
    }

    fn exists_by_id(&self, id: Uuid) -> RepoResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
            E::FROM_SQL,
            E::ID_COLUMN
        );
        Ok(self
            .session
            .query_count(&sql, &[Value::Text(id.to_string())])?
            > 0)
    }

    fn delete(&self, entity: &E) -> RepoResult<()> {
        let removed = self.session.remove::<E>(entity.id())?;
        if !removed {
            debug!(
                "event=delete_missing module=repo status=ok entity={} id={}",
                E::NAME,
                entity.id()
            );
        }
        Ok(())
    }

    fn delete_by_id(&self, id: Uuid) -> RepoResult<()> {
        if self.session.remove::<E>(id)? {
            Ok(())
        } else {
            Err(RepoError::NotFound {
                entity: E::NAME,
                id,
            })
        }
    }

    fn delete_all(&self) -> RepoResult<()> {
        let all = self.find_all()?;
        for entity in &all {
            self.session.remove::<E>(entity.id())?;
        }
        debug!(
            "event=delete_all module=repo status=ok entity={} deleted={}",
            E::NAME,
            all.len()
        );
        Ok(())
    }
}
