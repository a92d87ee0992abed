//! Unit of work over one SQLite transaction.
//!
//! # Responsibility
//! - Own the transaction for a group of repository calls.
//! - Keep an identity map of loaded entities and flush their changes.
//! - Count executed statements so fetch strategies can be compared.
//!
//! # Invariants
//! - Dropping a session without `commit` rolls the transaction back.
//! - Inserts and deletes are executed immediately; updates are deferred
//!   until `flush` (explicit, before every query, or at `commit`).
//! - A row for an id that is already managed never overwrites the managed
//!   state. Set-based updates therefore need `clear` to become visible.

pub mod context;
pub mod mapping;

use crate::db::schema::{self, SchemaGap};
use crate::model::member::Member;
use crate::model::team::Team;
use crate::repo::error::{RepoError, RepoResult};
use context::PersistenceContext;
use log::{debug, info, trace};
use mapping::Entity;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, Transaction};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// Persistence context bound to one transaction.
///
/// Repositories borrow a session shared (`&Session`); all bookkeeping uses
/// interior mutability, so a session is confined to one thread.
pub struct Session<'conn> {
    tx: Transaction<'conn>,
    context: RefCell<PersistenceContext>,
    statements: Cell<u64>,
}

impl<'conn> Session<'conn> {
    /// Verifies the schema and opens a transaction on `conn`.
    pub fn begin(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_session_ready(conn)?;
        let tx = conn.transaction()?;
        debug!("event=session_begin module=session status=ok");
        Ok(Self {
            tx,
            context: RefCell::new(PersistenceContext::default()),
            statements: Cell::new(0),
        })
    }

    /// Raw connection of the running transaction.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Number of SQL statements this session has executed so far.
    pub fn statements_executed(&self) -> u64 {
        self.statements.get()
    }

    /// Number of managed instances across entity types.
    pub fn managed_count(&self) -> usize {
        self.context.borrow().len()
    }

    pub fn contains<E: Entity>(&self, id: Uuid) -> bool {
        E::managed(&self.context.borrow()).contains(id)
    }

    /// Managed state for `id`, without touching storage.
    pub fn managed_state<E: Entity>(&self, id: Uuid) -> Option<E> {
        E::managed(&self.context.borrow()).get(id).cloned()
    }

    pub fn is_read_only<E: Entity>(&self, id: Uuid) -> bool {
        E::managed(&self.context.borrow()).is_read_only(id)
    }

    /// Inserts a new entity and starts tracking it.
    ///
    /// A no-op when the id is already managed. A detached entity whose row
    /// already exists fails with the store's primary-key violation.
    pub fn persist<E: Entity>(&self, entity: &E) -> RepoResult<()> {
        entity.validate()?;
        let id = entity.id();
        if self.contains::<E>(id) {
            return Ok(());
        }

        let mut values = vec![Value::Text(id.to_string())];
        values.extend(entity.column_values());
        self.execute(E::INSERT_SQL, &values)?;

        let mut context = self.context.borrow_mut();
        E::managed_mut(&mut context).insert(entity.clone(), false);
        E::on_transition(&mut context, id, None, Some(entity));
        Ok(())
    }

    /// Copies `entity` onto its managed instance, loading it first when needed.
    ///
    /// Persists when the id is unknown to both the context and storage.
    pub fn merge<E: Entity>(&self, entity: &E) -> RepoResult<E> {
        entity.validate()?;
        let id = entity.id();
        if !self.contains::<E>(id) && self.find::<E>(id)?.is_none() {
            self.persist(entity)?;
            return Ok(entity.clone());
        }

        let mut context = self.context.borrow_mut();
        let previous = E::managed_mut(&mut context).replace(entity.clone());
        E::on_transition(&mut context, id, previous.as_ref(), Some(entity));
        Ok(entity.clone())
    }

    /// Looks up by id: identity map first, then storage.
    pub fn find<E: Entity>(&self, id: Uuid) -> RepoResult<Option<E>> {
        self.find_with(id, false)
    }

    /// Like [`Session::find`], but a freshly loaded instance is not tracked
    /// for changes.
    pub fn find_read_only<E: Entity>(&self, id: Uuid) -> RepoResult<Option<E>> {
        self.find_with(id, true)
    }

    fn find_with<E: Entity>(&self, id: Uuid, read_only: bool) -> RepoResult<Option<E>> {
        if let Some(entity) = self.managed_state::<E>(id) {
            return Ok(Some(entity));
        }
        let sql = format!("{} WHERE {} = ?1", E::SELECT_SQL, E::ID_COLUMN);
        let mut loaded = self.load_entities::<E>(&sql, &[Value::Text(id.to_string())], read_only)?;
        Ok(loaded.pop())
    }

    /// Deletes the row for `id` and stops tracking it.
    ///
    /// Returns whether a row was deleted.
    pub fn remove<E: Entity>(&self, id: Uuid) -> RepoResult<bool> {
        self.flush()?;
        let changed = self.execute(E::DELETE_SQL, &[Value::Text(id.to_string())])?;

        let mut context = self.context.borrow_mut();
        let previous = E::managed_mut(&mut context).remove(id);
        E::on_transition(&mut context, id, previous.as_ref(), None);
        Ok(changed > 0)
    }

    /// Mutates a managed instance in place; the change is flushed later.
    ///
    /// The change is applied to a copy and only kept when the result still
    /// validates and keeps its id.
    pub fn modify<E: Entity>(&self, id: Uuid, change: impl FnOnce(&mut E)) -> RepoResult<E> {
        let previous = self
            .managed_state::<E>(id)
            .ok_or(RepoError::NotManaged {
                entity: E::NAME,
                id,
            })?;

        let mut next = previous.clone();
        change(&mut next);
        if next.id() != id {
            return Err(RepoError::InvalidData(format!(
                "{} identity cannot change from {id} to {}",
                E::NAME,
                next.id()
            )));
        }
        next.validate()?;

        let mut context = self.context.borrow_mut();
        E::managed_mut(&mut context).replace(next.clone());
        E::on_transition(&mut context, id, Some(&previous), Some(&next));
        Ok(next)
    }

    /// Stops tracking `id` without touching storage.
    pub fn detach<E: Entity>(&self, id: Uuid) {
        E::managed_mut(&mut self.context.borrow_mut()).remove(id);
    }

    /// Resolves a member's team: from the identity map when it was fetched
    /// together with the member, otherwise with one extra statement.
    pub fn team_of(&self, member: &Member) -> RepoResult<Option<Team>> {
        match member.team_id {
            Some(team_id) => self.find::<Team>(team_id),
            None => Ok(None),
        }
    }

    /// Writes pending changes of tracked entities. Returns updated row count.
    pub fn flush(&self) -> RepoResult<usize> {
        let updated = self.flush_entities::<Team>()? + self.flush_entities::<Member>()?;
        if updated > 0 {
            debug!("event=session_flush module=session status=ok updated={updated}");
        }
        Ok(updated)
    }

    fn flush_entities<E: Entity>(&self) -> RepoResult<usize> {
        let dirty = E::managed(&self.context.borrow()).dirty();
        for entity in &dirty {
            entity.validate()?;
            let mut values = entity.column_values();
            values.push(Value::Text(entity.id().to_string()));
            self.execute(E::UPDATE_SQL, &values)?;
            E::managed_mut(&mut self.context.borrow_mut()).mark_clean(entity.id());
        }
        Ok(dirty.len())
    }

    /// Detaches every managed instance. Pending changes are discarded.
    pub fn clear(&self) {
        let mut context = self.context.borrow_mut();
        let dropped = context.len();
        context.clear();
        debug!("event=session_clear module=session status=ok dropped={dropped}");
    }

    /// Runs a set-based statement after flushing. The context is left as is.
    pub fn execute_update(&self, sql: &str, binds: &[Value]) -> RepoResult<usize> {
        self.flush()?;
        let affected = self.execute(sql, binds)?;
        debug!("event=bulk_update module=session status=ok affected={affected}");
        Ok(affected)
    }

    /// Runs a query and registers every decoded entity in the identity map.
    ///
    /// Rows for already-managed ids yield the managed state.
    pub fn load_entities<E: Entity>(
        &self,
        sql: &str,
        binds: &[Value],
        read_only: bool,
    ) -> RepoResult<Vec<E>> {
        let loaded = self.query_rows(sql, binds, E::from_row)?;
        Ok(loaded
            .into_iter()
            .map(|entity| self.register(entity, read_only))
            .collect())
    }

    /// Runs a query and maps rows without touching the identity map.
    pub fn query_rows<T>(
        &self,
        sql: &str,
        binds: &[Value],
        mut map_row: impl FnMut(&Row<'_>) -> RepoResult<T>,
    ) -> RepoResult<Vec<T>> {
        self.flush()?;
        let mut stmt = self.tx.prepare(sql)?;
        self.record_statement(sql);
        let mut rows = stmt.query(params_from_iter(binds.iter()))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(map_row(row)?);
        }
        Ok(items)
    }

    /// Runs a single-column integer query such as `SELECT COUNT(*) ...`.
    pub fn query_count(&self, sql: &str, binds: &[Value]) -> RepoResult<u64> {
        let counts = self.query_rows(sql, binds, |row| Ok(row.get::<_, i64>(0)?))?;
        let count = counts.into_iter().next().unwrap_or(0);
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("count query returned {count}")))
    }

    /// Tracks a loaded instance unless its id is already managed.
    ///
    /// Returns the managed state.
    pub fn register<E: Entity>(&self, loaded: E, read_only: bool) -> E {
        let mut context = self.context.borrow_mut();
        let map = E::managed_mut(&mut context);
        if let Some(existing) = map.get(loaded.id()) {
            return existing.clone();
        }
        map.insert(loaded.clone(), read_only);
        loaded
    }

    /// Flushes and commits.
    pub fn commit(self) -> RepoResult<()> {
        self.flush()?;
        self.tx.commit()?;
        info!(
            "event=session_commit module=session status=ok statements={}",
            self.statements.get()
        );
        Ok(())
    }

    /// Discards all changes made in this session.
    pub fn rollback(self) -> RepoResult<()> {
        self.tx.rollback()?;
        info!(
            "event=session_rollback module=session status=ok statements={}",
            self.statements.get()
        );
        Ok(())
    }

    fn execute(&self, sql: &str, binds: &[Value]) -> RepoResult<usize> {
        let changed = self.tx.execute(sql, params_from_iter(binds.iter()))?;
        self.record_statement(sql);
        Ok(changed)
    }

    fn record_statement(&self, sql: &str) {
        self.statements.set(self.statements.get() + 1);
        trace!("event=sql_execute module=session sql={}", sql.replace('\n', " "));
    }
}

fn ensure_session_ready(conn: &Connection) -> RepoResult<()> {
    match schema::find_gap(conn)? {
        None => Ok(()),
        Some(SchemaGap::Version { expected, actual }) => Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        }),
        Some(SchemaGap::Table(table)) => Err(RepoError::MissingRequiredTable(table)),
        Some(SchemaGap::Column { table, column }) => {
            Err(RepoError::MissingRequiredColumn { table, column })
        }
    }
}
