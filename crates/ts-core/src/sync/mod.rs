//! Synchronization groups keeping variables on the same time window

use ahash::{AHashMap, AHashSet};

use crate::variable::VariableId;

/// Synchronization group identifier type
pub type SynchronizationGroupId = uuid::Uuid;

/// Registry of synchronization groups and their members.
///
/// Group lifecycle is independent of membership: removing a populated group
/// simply stops propagation for its members. A variable may belong to any
/// number of groups.
#[derive(Debug, Default)]
pub struct SynchronizationRegistry {
    groups: AHashMap<SynchronizationGroupId, AHashSet<VariableId>>,
}

impl SynchronizationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a group. Returns `false` if it already existed.
    pub fn add_group(&mut self, group: SynchronizationGroupId) -> bool {
        if self.groups.contains_key(&group) {
            return false;
        }
        self.groups.insert(group, AHashSet::new());
        true
    }

    /// Drop a group and its memberships. Returns `false` if unknown.
    pub fn remove_group(&mut self, group: SynchronizationGroupId) -> bool {
        self.groups.remove(&group).is_some()
    }

    pub fn contains_group(&self, group: SynchronizationGroupId) -> bool {
        self.groups.contains_key(&group)
    }

    /// Add `variable` to `group`. Returns `false` if the group is unknown.
    pub fn join(&mut self, variable: VariableId, group: SynchronizationGroupId) -> bool {
        match self.groups.get_mut(&group) {
            Some(members) => {
                members.insert(variable);
                true
            }
            None => false,
        }
    }

    /// Remove `variable` from every group it belongs to.
    pub fn remove_variable(&mut self, variable: VariableId) {
        for members in self.groups.values_mut() {
            members.remove(&variable);
        }
    }

    /// Every other member of every group containing `variable`.
    pub fn siblings_of(&self, variable: VariableId) -> AHashSet<VariableId> {
        let mut siblings = AHashSet::new();
        for members in self.groups.values() {
            if members.contains(&variable) {
                siblings.extend(members.iter().copied());
            }
        }
        siblings.remove(&variable);
        siblings
    }
}
