//! # Object Registry
//!
//! The local mirror of server-authoritative world entities.
//!
//! Entities arrive through world-sync packets and leave through drop
//! notifications or session teardown. The collection is insertion-ordered
//! and id-unique: `add` rejects a duplicate id outright, and the automatic
//! handler removes before re-adding when the wire protocol implies a
//! replace.
//!
//! The player's own entity is tracked separately: a creation-ack only
//! records the id, and the entity reference binds when a later `add`
//! carries that id. Until that add happens, [`ObjectRegistry::player_object`]
//! stays empty even if the id was already present beforehand.

use crate::protocol::data::{ObjectStatus, WorldPos};

/// Insertion-ordered, id-unique collection of known entities.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: Vec<ObjectStatus>,
    player_id: Option<u32>,
    player_bound: bool,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity. Returns false (and leaves the registry untouched)
    /// when an entity with the same id is already present.
    ///
    /// When the id matches the tracked player id, the entity becomes the
    /// player object.
    pub fn add(&mut self, entity: ObjectStatus) -> bool {
        if self.contains(entity.id()) {
            return false;
        }
        if self.player_id == Some(entity.id()) {
            self.player_bound = true;
        }
        self.objects.push(entity);
        true
    }

    /// Remove an entity by id, returning it if it was present.
    pub fn remove_by_id(&mut self, id: u32) -> Option<ObjectStatus> {
        let index = self.objects.iter().position(|o| o.id() == id)?;
        Some(self.objects.remove(index))
    }

    /// Overwrite an entity's position, returning the updated entry.
    /// Absent ids are a no-op: the server may reference entities this
    /// client already dropped.
    pub fn update_position(&mut self, id: u32, pos: WorldPos) -> Option<&ObjectStatus> {
        let entity = self.objects.iter_mut().find(|o| o.id() == id)?;
        entity.data.pos = pos;
        Some(entity)
    }

    pub fn get(&self, id: u32) -> Option<&ObjectStatus> {
        self.objects.iter().find(|o| o.id() == id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.objects.iter().any(|o| o.id() == id)
    }

    /// All known entities in insertion order.
    pub fn objects(&self) -> &[ObjectStatus] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Record the player entity id from a creation-ack. Re-announcing the
    /// id already tracked keeps an existing binding; a different id drops
    /// it until the next matching `add`.
    pub fn set_player_id(&mut self, id: u32) {
        if self.player_id != Some(id) {
            self.player_bound = false;
        }
        self.player_id = Some(id);
    }

    pub fn player_id(&self) -> Option<u32> {
        self.player_id
    }

    /// The player's entity, if its id is known, bound, and still present.
    pub fn player_object(&self) -> Option<&ObjectStatus> {
        if !self.player_bound {
            return None;
        }
        self.player_id.and_then(|id| self.get(id))
    }
}
