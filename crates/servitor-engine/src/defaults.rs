//! Default constants for runtime configuration.
//!
//! Centralizes the numbers shared by `RuntimeConfig`, the supervisor and the CLI.

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 4;

/// Default capacity of the run queue (envelopes ready for a worker).
pub const DEFAULT_RUN_QUEUE_CAPACITY: usize = 4096;

/// Default capacity of the pending-operation queue (envelopes waiting for the reactor).
pub const DEFAULT_PENDING_QUEUE_CAPACITY: usize = 4096;

/// Default size of the event buffer handed to one `poll` call.
pub const DEFAULT_POLL_EVENTS: usize = 1024;

/// Seed target used when no targets are given.
pub const DEFAULT_TARGET: &str = "http://localhost/";

/// Poll timeout used while the reactor holds envelopes the run queue could not accept.
pub const BACKPRESSURE_RETRY_MS: u64 = 1;

/// Largest buffer a worker allocates for one `recv`; bigger read requests are clamped.
pub const MAX_RECV_BYTES: usize = 64 * 1024;
