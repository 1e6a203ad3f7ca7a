//! State shared by the reactor thread and every worker

use super::actor::{ActorId, Address};
use super::envelope::Envelope;
use super::queue::BoundedQueue;
use super::stats::Counters;
use super::table::ActorTable;
use crate::error::{QueueError, RuntimeResult};
use crate::script::ScriptEngine;
use std::sync::Arc;

pub(crate) struct Shared {
    /// Envelopes ready for a worker
    pub(crate) run_queue: BoundedQueue<Envelope>,

    /// Envelopes the reactor still has to register or perform
    pub(crate) pending: BoundedQueue<Envelope>,

    pub(crate) table: ActorTable,

    pub(crate) engine: Arc<dyn ScriptEngine>,

    pub(crate) counters: Counters,

    /// Interrupts the reactor's poll
    waker: mio::Waker,
}

impl Shared {
    pub(crate) fn new(
        run_queue_capacity: usize,
        pending_capacity: usize,
        engine: Arc<dyn ScriptEngine>,
        waker: mio::Waker,
    ) -> Self {
        Self {
            run_queue: BoundedQueue::new("run", run_queue_capacity),
            pending: BoundedQueue::new("pending", pending_capacity),
            table: ActorTable::new(),
            engine,
            counters: Counters::default(),
            waker,
        }
    }

    /// Put an envelope on the run queue, waiting for space if it is full.
    pub(crate) fn schedule(&self, envelope: Envelope) -> Result<(), QueueError> {
        let (target, kind) = (envelope.target().id(), envelope.kind());
        self.run_queue.push(envelope).map_err(|err| {
            tracing::debug!(actor = %target, %kind, "run queue closed, envelope dropped");
            err
        })
    }

    /// Hand an envelope to the reactor.
    pub(crate) fn submit(&self, envelope: Envelope) -> Result<(), QueueError> {
        let (target, kind) = (envelope.target().id(), envelope.kind());
        match self.pending.push(envelope) {
            Ok(()) => {
                self.wake();
                Ok(())
            }
            Err(err) => {
                tracing::debug!(actor = %target, %kind, "pending queue closed, envelope dropped");
                Err(err)
            }
        }
    }

    /// Interrupt the reactor's poll
    pub(crate) fn wake(&self) {
        if let Err(err) = self.waker.wake() {
            tracing::warn!(error = %err, "failed to wake reactor");
        }
    }

    /// Compile `script_id` and register the new actor.
    ///
    /// The actor is not scheduled; the caller enqueues its first envelope.
    pub(crate) fn spawn_actor(
        &self,
        script_id: &str,
        parent: Option<ActorId>,
    ) -> RuntimeResult<Address> {
        let script = self.engine.compile(script_id)?;
        let address = Address::new(script_id, parent, script);
        let live = self.table.insert(address.clone());
        Counters::bump(&self.counters.actors_spawned);
        match parent {
            Some(parent) => {
                tracing::debug!(actor = %address.id(), %parent, script = script_id, live, "actor spawned")
            }
            None => tracing::debug!(actor = %address.id(), script = script_id, live, "actor spawned"),
        }
        Ok(address)
    }

    /// Forget a terminated actor; wakes the reactor when none are left.
    pub(crate) fn retire_actor(&self, id: ActorId) {
        let live = self.table.remove(id);
        tracing::debug!(actor = %id, live, "actor terminated");
        if live == 0 {
            self.wake();
        }
    }

    /// Close both queues, releasing every blocked producer and consumer
    pub(crate) fn close(&self) {
        self.run_queue.close();
        self.pending.close();
        self.wake();
    }
}
