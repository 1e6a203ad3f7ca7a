//! Reactor: timers and socket readiness
//!
//! The reactor is the only consumer of the pending-operation queue and the
//! only owner of registrations. Each request envelope becomes a one-shot timer
//! or a one-shot descriptor watch; when it fires, the same envelope moves to
//! the run queue, where a worker performs the actual I/O. Spawn requests are
//! carried out right here so that a child is always registered before its
//! parent hears about it.
//!
//! The reactor never blocks on the run queue. Envelopes that are due wait in a
//! local ready list and are pushed with `try_push`; if the run queue is full,
//! the poll timeout drops to a short retry interval until space frees up.

use super::actor::Address;
use super::envelope::{Envelope, Event};
use super::shared::Shared;
use super::stats::Counters;
use crate::defaults::BACKPRESSURE_RETRY_MS;
use crate::error::QueueError;
use crate::script::Tag;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Token of the waker; descriptor tokens are the descriptor value itself.
pub(crate) const WAKE_TOKEN: Token = Token(usize::MAX);

// ============================================================================
// Timers
// ============================================================================

/// Timer entry (min-heap by deadline, ties broken by arrival)
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    envelope: Envelope,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse for min-heap
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

// ============================================================================
// Descriptor watches
// ============================================================================

/// Waiters on one descriptor, sharing a single registration.
#[derive(Default)]
struct FdWatch {
    readers: VecDeque<Envelope>,
    writers: VecDeque<Envelope>,
    registered: Option<Interest>,
}

impl FdWatch {
    fn wanted(&self) -> Option<Interest> {
        match (!self.readers.is_empty(), !self.writers.is_empty()) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }

    fn waiters(&self) -> usize {
        self.readers.len() + self.writers.len()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// Register or re-arm `fd` with the watch's current interest.
fn arm(registry: &Registry, fd: RawFd, watch: &mut FdWatch, interest: Interest) -> io::Result<()> {
    let token = Token(fd as usize);
    match watch.registered {
        None => registry.register(&mut SourceFd(&fd), token, interest)?,
        Some(_) => match registry.reregister(&mut SourceFd(&fd), token, interest) {
            Ok(()) => {}
            // The descriptor was closed and possibly reused since we last saw it
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                registry.register(&mut SourceFd(&fd), token, interest)?
            }
            Err(err) => return Err(err),
        },
    }
    watch.registered = Some(interest);
    Ok(())
}

// ============================================================================
// Reactor
// ============================================================================

/// Single-threaded event loop owned by the supervisor.
pub struct Reactor {
    shared: Arc<Shared>,
    poll: Poll,
    events: Events,
    timers: BinaryHeap<TimerEntry>,
    timer_seq: u64,
    watches: FxHashMap<RawFd, FdWatch>,
    /// Envelopes due for the run queue that did not fit yet
    ready: VecDeque<Envelope>,
}

impl Reactor {
    pub(crate) fn new(shared: Arc<Shared>, poll: Poll, poll_events: usize) -> Self {
        Self {
            shared,
            poll,
            events: Events::with_capacity(poll_events),
            timers: BinaryHeap::new(),
            timer_seq: 0,
            watches: FxHashMap::default(),
            ready: VecDeque::new(),
        }
    }

    /// Take everything off the pending-operation queue and register it.
    ///
    /// Returns the number of envelopes taken.
    pub fn drain_pending(&mut self) -> usize {
        let batch = self.shared.pending.drain();
        let count = batch.len();
        for envelope in batch {
            self.accept(envelope);
        }
        count
    }

    fn accept(&mut self, envelope: Envelope) {
        // A spawn outlives its parent; only the SpawnResult becomes a dead letter
        let spawn = matches!(envelope.event(), Event::SpawnRequest { .. });
        if !spawn && !envelope.target().is_alive() {
            Counters::bump(&self.shared.counters.dead_letters);
            tracing::debug!(
                actor = %envelope.target().id(),
                kind = %envelope.kind(),
                "request from terminated actor discarded"
            );
            return;
        }

        match envelope.event() {
            Event::WaitElapsed { delay_ms, .. } => {
                let deadline = Instant::now() + Duration::from_millis(*delay_ms);
                self.add_timer(deadline, envelope);
            }
            Event::RecvComplete { fd, .. } => {
                let fd = *fd;
                self.add_watch(fd, Direction::Read, envelope);
            }
            Event::SendComplete { fd, .. } => {
                let fd = *fd;
                self.add_watch(fd, Direction::Write, envelope);
            }
            Event::SpawnRequest { .. } => {
                let (parent, event) = envelope.into_parts();
                if let Event::SpawnRequest { script, tag } = event {
                    self.spawn_child(parent, &script, tag);
                }
            }
            Event::InitialRun
            | Event::UrlSeed { .. }
            | Event::SpawnResult { .. }
            | Event::Cast { .. } => self.ready.push_back(envelope),
        }
    }

    fn add_timer(&mut self, deadline: Instant, envelope: Envelope) {
        self.timer_seq += 1;
        tracing::trace!(actor = %envelope.target().id(), "timer armed");
        self.timers.push(TimerEntry {
            deadline,
            seq: self.timer_seq,
            envelope,
        });
    }

    fn add_watch(&mut self, fd: RawFd, direction: Direction, envelope: Envelope) {
        let actor = envelope.target().id();
        if fd < 0 {
            Counters::bump(&self.shared.counters.io_failures);
            tracing::warn!(actor = %actor, fd, "invalid descriptor, request dropped");
            return;
        }

        let watch = self.watches.entry(fd).or_default();
        match direction {
            Direction::Read => watch.readers.push_back(envelope),
            Direction::Write => watch.writers.push_back(envelope),
        }
        let Some(interest) = watch.wanted() else {
            return;
        };
        if watch.registered == Some(interest) {
            return;
        }

        if let Err(err) = arm(self.poll.registry(), fd, watch, interest) {
            let dropped = match direction {
                Direction::Read => watch.readers.pop_back(),
                Direction::Write => watch.writers.pop_back(),
            };
            drop(dropped);
            if watch.waiters() == 0 {
                self.watches.remove(&fd);
            }
            Counters::bump(&self.shared.counters.io_failures);
            tracing::warn!(actor = %actor, fd, error = %err, "failed to watch descriptor, request dropped");
        }
    }

    fn spawn_child(&mut self, parent: Address, script: &str, tag: Tag) {
        match self.shared.spawn_actor(script, Some(parent.id())) {
            Ok(child) => {
                self.shared.table.record_child(&parent, tag, &child);
                self.ready
                    .push_back(Envelope::new(child.clone(), Event::InitialRun));
                self.ready.push_back(Envelope::new(
                    parent,
                    Event::SpawnResult {
                        address: child,
                        tag,
                    },
                ));
            }
            Err(err) => {
                Counters::bump(&self.shared.counters.spawn_failures);
                tracing::error!(parent = %parent.id(), script, tag, error = %err, "spawn failed");
            }
        }
    }

    /// Move due envelopes onto the run queue without blocking.
    ///
    /// Returns the number of envelopes still waiting for space.
    pub fn flush_ready(&mut self) -> usize {
        while let Some(envelope) = self.ready.pop_front() {
            match self.shared.run_queue.try_push(envelope) {
                Ok(()) => {}
                Err(rejected) => match rejected.reason {
                    QueueError::CapacityExceeded => {
                        self.ready.push_front(rejected.item);
                        break;
                    }
                    QueueError::ShuttingDown => {
                        self.ready.clear();
                        break;
                    }
                },
            }
        }
        self.ready.len()
    }

    /// Block until a watch fires, a timer expires or the waker is signalled,
    /// then fire whatever is due.
    pub fn poll_once(&mut self) -> io::Result<()> {
        let timeout = self.next_timeout(Instant::now());
        if let Err(err) = self.poll.poll(&mut self.events, timeout) {
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }

        let fired: Vec<(RawFd, bool, bool)> = self
            .events
            .iter()
            .filter(|event| event.token() != WAKE_TOKEN)
            .map(|event| {
                let failed = event.is_error();
                (
                    event.token().0 as RawFd,
                    event.is_readable() || event.is_read_closed() || failed,
                    event.is_writable() || event.is_write_closed() || failed,
                )
            })
            .collect();
        for (fd, readable, writable) in fired {
            self.fire_watch(fd, readable, writable);
        }

        self.fire_timers(Instant::now());
        self.flush_ready();
        Ok(())
    }

    fn next_timeout(&self, now: Instant) -> Option<Duration> {
        if !self.ready.is_empty() {
            return Some(Duration::from_millis(BACKPRESSURE_RETRY_MS));
        }
        self.timers
            .peek()
            .map(|entry| entry.deadline.saturating_duration_since(now))
    }

    fn fire_watch(&mut self, fd: RawFd, readable: bool, writable: bool) {
        let Some(watch) = self.watches.get_mut(&fd) else {
            return;
        };
        if readable {
            if let Some(envelope) = watch.readers.pop_front() {
                self.ready.push_back(envelope);
            }
        }
        if writable {
            if let Some(envelope) = watch.writers.pop_front() {
                self.ready.push_back(envelope);
            }
        }

        let registry = self.poll.registry();
        match watch.wanted() {
            None => {
                if let Err(err) = registry.deregister(&mut SourceFd(&fd)) {
                    tracing::debug!(fd, error = %err, "deregister failed");
                }
                self.watches.remove(&fd);
            }
            Some(interest) => {
                // Re-arm even with unchanged interest so remaining waiters see current readiness
                if let Err(err) = arm(registry, fd, watch, interest) {
                    let dropped = watch.waiters();
                    Counters::add(&self.shared.counters.io_failures, dropped as u64);
                    tracing::warn!(fd, dropped, error = %err, "failed to re-arm descriptor, waiters dropped");
                    self.watches.remove(&fd);
                }
            }
        }
    }

    fn fire_timers(&mut self, now: Instant) {
        while let Some(entry) = self.timers.peek() {
            if entry.deadline > now {
                break;
            }
            if let Some(entry) = self.timers.pop() {
                tracing::trace!(actor = %entry.envelope.target().id(), "timer fired");
                self.ready.push_back(entry.envelope);
            }
        }
    }

    /// Number of armed timers
    pub fn timers_pending(&self) -> usize {
        self.timers.len()
    }

    /// Number of envelopes waiting on descriptors
    pub fn watchers_pending(&self) -> usize {
        self.watches.values().map(FdWatch::waiters).sum()
    }

    /// Number of due envelopes not yet on the run queue
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Drop every timer, watch and ready envelope.
    pub(crate) fn abandon(&mut self) -> usize {
        let abandoned = self.timers.len() + self.watchers_pending() + self.ready.len();
        self.timers.clear();
        let registry = self.poll.registry();
        for (fd, _) in self.watches.drain() {
            let _ = registry.deregister(&mut SourceFd(&fd));
        }
        self.ready.clear();
        abandoned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::actor::tests::null_address;

    fn timer(deadline: Instant, seq: u64) -> TimerEntry {
        TimerEntry {
            deadline,
            seq,
            envelope: Envelope::new(null_address(), Event::InitialRun),
        }
    }

    #[test]
    fn test_timer_heap_is_min_heap() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(timer(now + Duration::from_millis(30), 1));
        heap.push(timer(now + Duration::from_millis(10), 2));
        heap.push(timer(now + Duration::from_millis(20), 3));
        heap.push(timer(now + Duration::from_millis(10), 4));

        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|entry| entry.seq)).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_watch_interest_union() {
        let mut watch = FdWatch::default();
        assert_eq!(watch.wanted(), None);

        watch
            .readers
            .push_back(Envelope::new(null_address(), Event::InitialRun));
        assert_eq!(watch.wanted(), Some(Interest::READABLE));

        watch
            .writers
            .push_back(Envelope::new(null_address(), Event::InitialRun));
        assert_eq!(
            watch.wanted(),
            Some(Interest::READABLE | Interest::WRITABLE)
        );
        assert_eq!(watch.waiters(), 2);

        watch.readers.clear();
        assert_eq!(watch.wanted(), Some(Interest::WRITABLE));
    }
}
