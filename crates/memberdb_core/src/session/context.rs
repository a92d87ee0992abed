//! Identity map and change tracking for one session.
//!
//! # Invariants
//! - At most one managed instance per entity id.
//! - A managed entry without a snapshot is read-only and never dirty.
//! - Dirtiness compares persistent column values only, so changes to the
//!   inverse `Team::members` collection never produce an UPDATE.

use crate::model::member::Member;
use crate::model::team::Team;
use crate::session::mapping::Entity;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct ManagedEntry<E> {
    entity: E,
    /// State as last loaded or flushed; `None` for read-only entries.
    snapshot: Option<E>,
}

/// Managed instances of one entity type.
#[derive(Debug, Clone)]
pub struct EntityMap<E> {
    entries: HashMap<Uuid, ManagedEntry<E>>,
}

impl<E> Default for EntityMap<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<E: Entity> EntityMap<E> {
    pub fn get(&self, id: Uuid) -> Option<&E> {
        self.entries.get(&id).map(|entry| &entry.entity)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_read_only(&self, id: Uuid) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|entry| entry.snapshot.is_none())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert(&mut self, entity: E, read_only: bool) {
        let snapshot = (!read_only).then(|| entity.clone());
        self.entries
            .insert(entity.id(), ManagedEntry { entity, snapshot });
    }

    /// Swaps the managed state, keeping the snapshot. Returns the old state.
    pub(crate) fn replace(&mut self, entity: E) -> Option<E> {
        let entry = self.entries.get_mut(&entity.id())?;
        Some(std::mem::replace(&mut entry.entity, entity))
    }

    pub(crate) fn update(&mut self, id: Uuid, change: impl FnOnce(&mut E)) {
        if let Some(entry) = self.entries.get_mut(&id) {
            change(&mut entry.entity);
        }
    }

    pub(crate) fn for_each_mut(&mut self, mut change: impl FnMut(&mut E)) {
        for entry in self.entries.values_mut() {
            change(&mut entry.entity);
        }
    }

    pub(crate) fn remove(&mut self, id: Uuid) -> Option<E> {
        self.entries.remove(&id).map(|entry| entry.entity)
    }

    /// Current state of every tracked entry whose columns differ from its snapshot.
    pub(crate) fn dirty(&self) -> Vec<E> {
        self.entries
            .values()
            .filter(|entry| {
                entry
                    .snapshot
                    .as_ref()
                    .is_some_and(|snapshot| snapshot.column_values() != entry.entity.column_values())
            })
            .map(|entry| entry.entity.clone())
            .collect()
    }

    pub(crate) fn mark_clean(&mut self, id: Uuid) {
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.snapshot.is_some() {
                entry.snapshot = Some(entry.entity.clone());
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The unit-of-work cache: one identity map per mapped entity type.
#[derive(Debug, Clone, Default)]
pub struct PersistenceContext {
    members: EntityMap<Member>,
    teams: EntityMap<Team>,
}

impl PersistenceContext {
    pub fn members(&self) -> &EntityMap<Member> {
        &self.members
    }

    pub fn teams(&self) -> &EntityMap<Team> {
        &self.teams
    }

    pub(crate) fn members_mut(&mut self) -> &mut EntityMap<Member> {
        &mut self.members
    }

    pub(crate) fn teams_mut(&mut self) -> &mut EntityMap<Team> {
        &mut self.teams
    }

    /// Number of managed instances across all entity types.
    pub fn len(&self) -> usize {
        self.members.len() + self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
        self.teams.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::PersistenceContext;
    use crate::model::member::Member;
    use crate::model::team::Team;
    use crate::session::mapping::Entity;

    #[test]
    fn column_change_marks_entry_dirty_until_clean() {
        let mut context = PersistenceContext::default();
        let member = Member::with_age("member1", 10);
        context.members_mut().insert(member.clone(), false);
        assert!(context.members().dirty().is_empty());

        context.members_mut().update(member.id, |m| m.age = 11);
        let dirty = context.members().dirty();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].age, 11);

        context.members_mut().mark_clean(member.id);
        assert!(context.members().dirty().is_empty());
    }

    #[test]
    fn read_only_entry_is_never_dirty() {
        let mut context = PersistenceContext::default();
        let member = Member::with_age("member1", 10);
        context.members_mut().insert(member.clone(), true);

        context
            .members_mut()
            .update(member.id, |m| m.username = "member2".to_string());
        assert!(context.members().is_read_only(member.id));
        assert!(context.members().dirty().is_empty());
    }

    #[test]
    fn inverse_collection_change_is_not_dirty() {
        let mut context = PersistenceContext::default();
        let team = Team::new("teamA");
        context.teams_mut().insert(team.clone(), false);

        let member = Member::with_age("member1", 10);
        context
            .teams_mut()
            .update(team.id, |t| t.add_member(member.id));
        assert!(context.teams().get(team.id).unwrap().has_member(member.id));
        assert!(context.teams().dirty().is_empty());
    }

    #[test]
    fn member_team_change_moves_member_between_managed_teams() {
        let mut context = PersistenceContext::default();
        let mut team_a = Team::new("teamA");
        let team_b = Team::new("teamB");
        let mut member = Member::with_age("member1", 10);
        member.change_team(&mut team_a);
        context.teams_mut().insert(team_a.clone(), false);
        context.teams_mut().insert(team_b.clone(), false);
        context.members_mut().insert(member.clone(), false);

        let mut moved = member.clone();
        moved.team_id = Some(team_b.id);
        Member::on_transition(&mut context, member.id, Some(&member), Some(&moved));

        assert!(!context.teams().get(team_a.id).unwrap().has_member(member.id));
        assert!(context.teams().get(team_b.id).unwrap().has_member(member.id));

        Member::on_transition(&mut context, member.id, Some(&moved), None);
        assert!(!context.teams().get(team_b.id).unwrap().has_member(member.id));
    }
}
