//! Connection registry: which live connections are cameras and which are admins.
//!
//! Two disjoint, insertion-ordered role-sets behind a single lock. The router
//! is the only writer; the status endpoint reads snapshots.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

use crate::error::RegistryError;
use crate::protocol::{ConnectionId, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: ConnectionId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// The unlocked role-sets. Only reachable through [`Registry`], either via
/// its delegating methods or inside [`Registry::transaction`].
#[derive(Debug, Default)]
pub struct RoleSets {
    cameras: Vec<RegistryEntry>,
    admins: Vec<RegistryEntry>,
    index: HashMap<ConnectionId, Role>,
}

impl RoleSets {
    pub fn register(&mut self, id: ConnectionId, role: Role) -> Result<(), RegistryError> {
        if let Some(existing) = self.index.get(&id) {
            return Err(RegistryError::AlreadyRegistered {
                existing: *existing,
            });
        }

        self.index.insert(id, role);
        self.set_mut(role).push(RegistryEntry {
            id,
            role,
            joined_at: Utc::now(),
        });
        Ok(())
    }

    pub fn unregister(&mut self, id: ConnectionId) -> Option<Role> {
        let role = self.index.remove(&id)?;
        self.set_mut(role).retain(|entry| entry.id != id);
        Some(role)
    }

    pub fn list_by_role(&self, role: Role) -> Vec<ConnectionId> {
        self.set(role).iter().map(|entry| entry.id).collect()
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.index.get(&id).copied()
    }

    pub fn entries(&self, role: Role) -> &[RegistryEntry] {
        self.set(role)
    }

    pub fn count(&self, role: Role) -> usize {
        self.set(role).len()
    }

    fn set(&self, role: Role) -> &Vec<RegistryEntry> {
        match role {
            Role::Camera => &self.cameras,
            Role::Admin => &self.admins,
        }
    }

    fn set_mut(&mut self, role: Role) -> &mut Vec<RegistryEntry> {
        match role {
            Role::Camera => &mut self.cameras,
            Role::Admin => &mut self.admins,
        }
    }
}

/// Point-in-time copy of both role-sets.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub cameras: Vec<RegistryEntry>,
    pub admins: Vec<RegistryEntry>,
}

#[derive(Debug, Default)]
pub struct Registry {
    sets: Mutex<RoleSets>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId, role: Role) -> Result<(), RegistryError> {
        self.sets.lock().register(id, role)
    }

    pub fn unregister(&self, id: ConnectionId) -> Option<Role> {
        self.sets.lock().unregister(id)
    }

    pub fn list_by_role(&self, role: Role) -> Vec<ConnectionId> {
        self.sets.lock().list_by_role(role)
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.sets.lock().role_of(id)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let sets = self.sets.lock();
        RegistrySnapshot {
            cameras: sets.entries(Role::Camera).to_vec(),
            admins: sets.entries(Role::Admin).to_vec(),
        }
    }

    /// Run `f` with exclusive access to the role-sets.
    ///
    /// `f` must not block or await; it runs with every other connection's
    /// registry access stalled.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut RoleSets) -> R) -> R {
        let mut sets = self.sets.lock();
        f(&mut sets)
    }
}
