//! Runtime counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of what a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Actors created, initial and spawned
    pub actors_spawned: u64,

    /// Script steps executed
    pub steps: u64,

    /// Envelopes discarded because their target had terminated
    pub dead_letters: u64,

    /// Steps that ended in a script error or panic
    pub script_errors: u64,

    /// Send/recv syscalls or watcher registrations that failed
    pub io_failures: u64,

    /// Spawn requests whose script failed to compile
    pub spawn_failures: u64,

    /// Steps that started while another step of the same actor was running.
    /// Always zero unless mailbox admission is broken.
    pub overlapping_steps: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) actors_spawned: AtomicU64,
    pub(crate) steps: AtomicU64,
    pub(crate) dead_letters: AtomicU64,
    pub(crate) script_errors: AtomicU64,
    pub(crate) io_failures: AtomicU64,
    pub(crate) spawn_failures: AtomicU64,
    pub(crate) overlapping_steps: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RunSummary {
        RunSummary {
            actors_spawned: self.actors_spawned.load(Ordering::Relaxed),
            steps: self.steps.load(Ordering::Relaxed),
            dead_letters: self.dead_letters.load(Ordering::Relaxed),
            script_errors: self.script_errors.load(Ordering::Relaxed),
            io_failures: self.io_failures.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            overlapping_steps: self.overlapping_steps.load(Ordering::Relaxed),
        }
    }
}
