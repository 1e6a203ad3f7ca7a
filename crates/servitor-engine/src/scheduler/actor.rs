//! Actors and addresses

use super::mailbox::Mailbox;
use super::stats::Counters;
use crate::script::{ScriptActor, SuspendRequest, Tag};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Unique identifier for an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    /// Generate a new unique actor ID
    pub(crate) fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ActorId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    /// Created, first step not yet admitted
    Spawning,
    /// Has run at least once and has not terminated
    Running,
    /// A step returned the termination sentinel
    Terminated,
}

/// Scheduler-side record of one actor.
pub(crate) struct ActorCell {
    id: ActorId,
    script_id: String,
    parent: Option<ActorId>,
    mailbox: Mailbox,
    script: Mutex<Option<Box<dyn ScriptActor>>>,
    children: Mutex<FxHashMap<Tag, Address>>,
    active_steps: AtomicUsize,
}

impl ActorCell {
    pub(crate) fn id(&self) -> ActorId {
        self.id
    }

    pub(crate) fn script_id(&self) -> &str {
        &self.script_id
    }

    pub(crate) fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    pub(crate) fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub(crate) fn script(&self) -> &Mutex<Option<Box<dyn ScriptActor>>> {
        &self.script
    }

    /// Mark a step as running until the guard drops.
    pub(crate) fn enter_step<'a>(&'a self, counters: &Counters) -> StepGuard<'a> {
        let previous = self.active_steps.fetch_add(1, Ordering::AcqRel);
        if previous != 0 {
            Counters::bump(&counters.overlapping_steps);
            tracing::error!(actor = %self.id, active = previous + 1, "overlapping steps");
        }
        StepGuard { cell: self }
    }

    #[cfg(test)]
    pub(crate) fn active_steps(&self) -> usize {
        self.active_steps.load(Ordering::Acquire)
    }

    pub(crate) fn record_child(&self, tag: Tag, child: Address) {
        self.children.lock().insert(tag, child);
    }

    pub(crate) fn children(&self) -> Vec<(Tag, Address)> {
        let mut children: Vec<_> = self
            .children
            .lock()
            .iter()
            .map(|(tag, address)| (*tag, address.clone()))
            .collect();
        children.sort_by_key(|(tag, _)| *tag);
        children
    }

    /// Drop the script state and the child addresses it was holding.
    pub(crate) fn release_script(&self) {
        let script = self.script.lock().take();
        let children = std::mem::take(&mut *self.children.lock());
        drop(script);
        drop(children);
    }
}

pub(crate) struct StepGuard<'a> {
    cell: &'a ActorCell,
}

impl Drop for StepGuard<'_> {
    fn drop(&mut self) {
        self.cell.active_steps.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Shareable capability referring to an actor.
///
/// The only thing a script can do with an address is cast to it; it never
/// exposes the target's script state.
#[derive(Clone)]
pub struct Address {
    cell: Arc<ActorCell>,
}

impl Address {
    pub(crate) fn new(
        script_id: impl Into<String>,
        parent: Option<ActorId>,
        script: Box<dyn ScriptActor>,
    ) -> Self {
        Self {
            cell: Arc::new(ActorCell {
                id: ActorId::next(),
                script_id: script_id.into(),
                parent,
                mailbox: Mailbox::new(),
                script: Mutex::new(Some(script)),
                children: Mutex::new(FxHashMap::default()),
                active_steps: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn cell(&self) -> &ActorCell {
        &self.cell
    }

    /// Identifier of the actor
    pub fn id(&self) -> ActorId {
        self.cell.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ActorState {
        self.cell.mailbox.state()
    }

    /// Whether the actor has not terminated
    pub fn is_alive(&self) -> bool {
        self.state() != ActorState::Terminated
    }

    /// Build the request that sends `pattern`/`data` to this actor
    pub fn cast(&self, pattern: impl Into<String>, data: impl Into<String>) -> SuspendRequest {
        SuspendRequest::Cast {
            address: self.clone(),
            pattern: pattern.into(),
            data: data.into(),
        }
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.cell.id == other.cell.id
    }
}

impl Eq for Address {}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.cell.id)
    }
}
