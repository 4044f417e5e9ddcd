//! Registry of loaded universes

use std::sync::Arc;

use dashmap::DashMap;
use isle_sdk::{TypeUniverse, UniverseId};

use crate::universe::ModuleUniverse;

/// Registry of all live module universes, by id
pub struct UniverseRegistry {
    universes: DashMap<UniverseId, Arc<ModuleUniverse>>,
}

impl UniverseRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            universes: DashMap::new(),
        }
    }

    /// Register a universe
    pub fn register(&self, universe: Arc<ModuleUniverse>) -> Arc<ModuleUniverse> {
        self.universes.insert(universe.id(), universe.clone());
        universe
    }

    /// Get a universe by ID
    pub fn get(&self, id: UniverseId) -> Option<Arc<ModuleUniverse>> {
        self.universes.get(&id).map(|entry| entry.value().clone())
    }

    /// Find a universe by name
    pub fn find(&self, name: &str) -> Option<Arc<ModuleUniverse>> {
        self.universes
            .iter()
            .find(|entry| entry.value().name() == name)
            .map(|entry| entry.value().clone())
    }

    /// Remove a universe (when its module is unloaded)
    pub fn remove(&self, id: UniverseId) -> Option<Arc<ModuleUniverse>> {
        self.universes.remove(&id).map(|(_, universe)| universe)
    }

    /// Get the number of registered universes
    pub fn len(&self) -> usize {
        self.universes.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.universes.is_empty()
    }

    /// Get all universe IDs
    pub fn all_ids(&self) -> Vec<UniverseId> {
        self.universes.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for UniverseRegistry {
    fn default() -> Self {
        Self::new()
    }
}
