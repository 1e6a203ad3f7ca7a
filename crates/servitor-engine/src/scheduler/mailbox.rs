//! Per-actor admission
//!
//! Every envelope a worker pops passes through its target's mailbox before the
//! step runs. The first one claims the actor; anything arriving while the
//! claim is held waits in the mailbox in arrival order, and is handed over one
//! at a time as each step completes. That yields both guarantees the
//! scheduler makes about an actor: one step at a time, in order.

use super::actor::ActorState;
use super::envelope::Envelope;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Outcome of [`Mailbox::try_admit`]
#[derive(Debug)]
pub enum Admission {
    /// The caller now holds the actor and must run the step
    Admitted(Envelope),
    /// The actor is busy; the envelope waits in the mailbox
    Queued,
    /// The actor has terminated; the envelope is a dead letter
    Dead(Envelope),
}

struct MailboxState {
    state: ActorState,
    claimed: bool,
    pending: VecDeque<Envelope>,
}

/// Admission lock and pending chain of one actor.
pub struct Mailbox {
    inner: Mutex<MailboxState>,
}

impl Mailbox {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(MailboxState {
                state: ActorState::Spawning,
                claimed: false,
                pending: VecDeque::new(),
            }),
        }
    }

    /// Decide whether `envelope` runs now, waits, or is discarded.
    pub fn try_admit(&self, mut envelope: Envelope) -> Admission {
        let mut inner = self.inner.lock();
        if inner.state == ActorState::Terminated {
            return Admission::Dead(envelope);
        }
        if envelope.admitted {
            // Handed over by `release`; the claim already belongs to it
            envelope.admitted = false;
            return Admission::Admitted(envelope);
        }
        if inner.claimed {
            inner.pending.push_back(envelope);
            return Admission::Queued;
        }
        inner.claimed = true;
        if inner.state == ActorState::Spawning {
            inner.state = ActorState::Running;
        }
        Admission::Admitted(envelope)
    }

    /// Finish a step that did not terminate the actor.
    ///
    /// Returns the next waiting envelope, already admitted, for the caller to
    /// put back on the run queue; the claim passes along with it. With nothing
    /// waiting the claim is dropped.
    pub fn release(&self) -> Option<Envelope> {
        let mut inner = self.inner.lock();
        match inner.pending.pop_front() {
            Some(mut next) => {
                next.admitted = true;
                Some(next)
            }
            None => {
                inner.claimed = false;
                None
            }
        }
    }

    /// Finish the final step: mark the actor terminated and discard whatever
    /// was waiting. Returns how many envelopes were discarded.
    pub fn retire(&self) -> usize {
        let dropped = {
            let mut inner = self.inner.lock();
            inner.state = ActorState::Terminated;
            std::mem::take(&mut inner.pending)
        };
        dropped.len()
    }

    /// Current lifecycle state
    pub fn state(&self) -> ActorState {
        self.inner.lock().state
    }

    /// Whether a worker currently holds the actor
    pub fn is_claimed(&self) -> bool {
        self.inner.lock().claimed
    }

    /// Number of envelopes waiting
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }
}
