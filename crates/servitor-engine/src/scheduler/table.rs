//! Registry of live actors

use super::actor::{ActorId, Address};
use crate::script::Tag;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Every actor that has been spawned and not yet terminated.
///
/// The live count sits behind its own lock so that "did this removal take it
/// to zero" is answered exactly once.
pub struct ActorTable {
    actors: DashMap<ActorId, Address>,
    live: Mutex<usize>,
    spawned: AtomicU64,
}

impl ActorTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            actors: DashMap::new(),
            live: Mutex::new(0),
            spawned: AtomicU64::new(0),
        }
    }

    /// Register a new actor. Returns the live count after insertion.
    pub fn insert(&self, address: Address) -> usize {
        let mut live = self.live.lock();
        self.actors.insert(address.id(), address);
        self.spawned.fetch_add(1, Ordering::Relaxed);
        *live += 1;
        *live
    }

    /// Forget a terminated actor. Returns the live count after removal.
    pub fn remove(&self, id: ActorId) -> usize {
        let mut live = self.live.lock();
        if self.actors.remove(&id).is_some() {
            *live = live.saturating_sub(1);
        }
        *live
    }

    /// Remove every actor at once, leaving the live count at zero.
    pub(crate) fn drain(&self) -> Vec<Address> {
        let mut live = self.live.lock();
        let addresses: Vec<Address> = self
            .actors
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.actors.clear();
        *live = 0;
        addresses
    }

    /// Number of actors that have not terminated
    pub fn live(&self) -> usize {
        *self.live.lock()
    }

    /// Number of actors ever inserted
    pub fn spawned_total(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Look up a live actor
    pub fn get(&self, id: ActorId) -> Option<Address> {
        self.actors.get(&id).map(|entry| entry.value().clone())
    }

    /// Identifiers of every live actor, ascending
    pub fn ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<_> = self.actors.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Record `child` in `parent`'s children under `tag`
    pub fn record_child(&self, parent: &Address, tag: Tag, child: &Address) {
        parent.cell().record_child(tag, child.clone());
    }

    /// Children of a live actor by tag, ascending
    pub fn children_of(&self, id: ActorId) -> Vec<(Tag, Address)> {
        self.get(id)
            .map(|address| address.cell().children())
            .unwrap_or_default()
    }

    /// Identifier of a live actor's parent, if it was spawned by another actor
    pub fn parent_of(&self, id: ActorId) -> Option<ActorId> {
        self.get(id).and_then(|address| address.cell().parent())
    }
}

impl Default for ActorTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::actor::tests::null_address;

    #[test]
    fn test_live_count() {
        let table = ActorTable::new();
        let a = null_address();
        let b = null_address();

        assert_eq!(table.insert(a.clone()), 1);
        assert_eq!(table.insert(b.clone()), 2);
        assert_eq!(table.ids(), vec![a.id(), b.id()]);

        assert_eq!(table.remove(a.id()), 1);
        // Removing twice does not underflow
        assert_eq!(table.remove(a.id()), 1);
        assert_eq!(table.remove(b.id()), 0);

        assert_eq!(table.live(), 0);
        assert_eq!(table.spawned_total(), 2);
        assert!(table.get(a.id()).is_none());
    }

    #[test]
    fn test_children() {
        let table = ActorTable::new();
        let parent = null_address();
        let first = null_address();
        let second = null_address();
        table.insert(parent.clone());

        table.record_child(&parent, 9, &second);
        table.record_child(&parent, 7, &first);

        let children = table.children_of(parent.id());
        assert_eq!(children.len(), 2);
        assert_eq!(children[0], (7, first));
        assert_eq!(children[1], (9, second));
        assert_eq!(table.parent_of(parent.id()), None);
    }
}
