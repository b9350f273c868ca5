//! Entity lifecycle collaborator
//!
//! The session decides when an entity appears or goes away; the engine that
//! owns the scene (renderer, netcode) does the actual work.

use crate::coord::WorldPos;
use serde::{Deserialize, Serialize};

/// Opaque handle to a spawned entity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

pub trait EntityLifecycle: Send {
    fn spawn_entity(&mut self, prefab: &str, position: WorldPos) -> EntityHandle;

    fn destroy_entity(&mut self, handle: EntityHandle);
}

/// Hands out handles and forgets about them
#[derive(Debug, Default)]
pub struct NullLifecycle {
    next: u64,
}

impl EntityLifecycle for NullLifecycle {
    fn spawn_entity(&mut self, _prefab: &str, _position: WorldPos) -> EntityHandle {
        self.next += 1;
        EntityHandle(self.next)
    }

    fn destroy_entity(&mut self, _handle: EntityHandle) {}
}

/// A lifecycle call, as seen by `RecordingLifecycle`
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    Spawned {
        handle: EntityHandle,
        prefab: String,
        position: WorldPos,
    },
    Destroyed(EntityHandle),
}

/// Keeps a log of every spawn and destroy, for tools and tests
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    next: u64,
    pub events: Vec<LifecycleEvent>,
}

impl RecordingLifecycle {
    pub fn spawned(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::Spawned { .. }))
            .count()
    }

    pub fn destroyed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, LifecycleEvent::Destroyed(_)))
            .count()
    }
}

impl EntityLifecycle for RecordingLifecycle {
    fn spawn_entity(&mut self, prefab: &str, position: WorldPos) -> EntityHandle {
        self.next += 1;
        let handle = EntityHandle(self.next);
        self.events.push(LifecycleEvent::Spawned {
            handle,
            prefab: prefab.to_string(),
            position,
        });
        handle
    }

    fn destroy_entity(&mut self, handle: EntityHandle) {
        self.events.push(LifecycleEvent::Destroyed(handle));
    }
}
