// Canonical id-keyed maps for every world entity.

use crate::domain::entities::{Point, Resource, ResourceId, Shot, ShotId, Tank, TankId};
use std::collections::HashMap;
use std::hash::Hash;

/// O(1) id lookup with deterministic (id-sorted) iteration for serialization.
#[derive(Debug, Clone)]
pub struct Registry<K, V> {
    entries: HashMap<K, V>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Ord + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &K) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    /// Inserts only when the id is unknown. Returns false if it was already taken.
    pub fn insert_new(&mut self, id: K, value: V) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, value);
        true
    }

    pub fn remove(&mut self, id: &K) -> Option<V> {
        self.entries.remove(id)
    }

    /// Empties the registry, returning the removed ids in ascending order.
    pub fn clear(&mut self) -> Vec<K> {
        let mut ids: Vec<K> = self.entries.drain().map(|(id, _)| id).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<K> {
        let mut ids: Vec<K> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Entries in ascending id order.
    pub fn sorted(&self) -> Vec<(&K, &V)> {
        let mut entries: Vec<(&K, &V)> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

/// The world's single source of truth: tanks, shots and field resources.
///
/// Resources held by a tank live in that tank's equipped slot, never here.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    tanks: Registry<TankId, Tank>,
    shots: Registry<ShotId, Shot>,
    resources: Registry<ResourceId, Resource>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tanks(&self) -> &Registry<TankId, Tank> {
        &self.tanks
    }

    pub fn shots(&self) -> &Registry<ShotId, Shot> {
        &self.shots
    }

    pub fn resources(&self) -> &Registry<ResourceId, Resource> {
        &self.resources
    }

    // Tanks

    /// Registers a tank under a new id. A re-announced id is ignored so clients
    /// cannot clobber authoritative health or position.
    pub fn upsert_tank(&mut self, tank: Tank) -> bool {
        self.tanks.insert_new(tank.id.clone(), tank)
    }

    pub fn tank(&self, id: &str) -> Option<&Tank> {
        self.tanks.entries.get(id)
    }

    pub fn tank_mut(&mut self, id: &str) -> Option<&mut Tank> {
        self.tanks.entries.get_mut(id)
    }

    /// Updates a tank's transform. Unknown ids are ignored.
    pub fn move_tank(&mut self, id: &str, position: Point, heading: f64) -> bool {
        match self.tank_mut(id) {
            Some(tank) => {
                tank.position = position;
                tank.heading = heading;
                true
            }
            None => false,
        }
    }

    /// Reset only. Returns the ids that were registered.
    pub fn remove_all_tanks(&mut self) -> Vec<TankId> {
        self.tanks.clear()
    }

    /// Finds the tank whose equipped slot holds `resource_id`.
    pub fn holder_of(&self, resource_id: ResourceId) -> Option<&TankId> {
        self.tanks
            .values()
            .find(|tank| tank.holds(resource_id))
            .map(|tank| &tank.id)
    }

    // Shots

    pub fn upsert_shot(&mut self, shot: Shot) -> bool {
        self.shots.insert_new(shot.id.clone(), shot)
    }

    pub fn shot(&self, id: &str) -> Option<&Shot> {
        self.shots.entries.get(id)
    }

    /// Updates a shot's position. Unknown ids are ignored.
    pub fn move_shot(&mut self, id: &str, position: Point) -> bool {
        match self.shots.entries.get_mut(id) {
            Some(shot) => {
                shot.position = position;
                true
            }
            None => false,
        }
    }

    pub fn remove_shot(&mut self, id: &str) -> Option<Shot> {
        self.shots.entries.remove(id)
    }

    pub fn remove_all_shots(&mut self) -> Vec<ShotId> {
        self.shots.clear()
    }

    // Resources

    /// Places a resource on the field. Refused when the id is already on the
    /// field or equipped by a tank.
    pub fn upsert_resource(&mut self, resource: Resource) -> bool {
        if self.holder_of(resource.id).is_some() {
            return false;
        }
        self.resources.insert_new(resource.id, resource)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    /// Lifts a resource off the field.
    pub fn take_resource(&mut self, id: ResourceId) -> Option<Resource> {
        self.resources.remove(&id)
    }

    /// True if the id is on the field or in any tank's equipped slot.
    pub fn knows_resource(&self, id: ResourceId) -> bool {
        self.resources.contains(&id) || self.holder_of(id).is_some()
    }

    pub fn remove_all_resources(&mut self) -> Vec<ResourceId> {
        self.resources.clear()
    }
}
