//! Actor scheduler
//!
//! One reactor thread (the supervisor's) turns timers and socket readiness
//! into envelopes; a fixed worker pool executes actor steps. The two sides
//! meet in a pair of bounded queues, and each actor's mailbox guarantees its
//! steps run one at a time and in order.

mod actor;
mod envelope;
mod mailbox;
mod queue;
mod reactor;
mod shared;
mod stats;
mod supervisor;
mod sys;
mod table;
mod worker;

pub use actor::{ActorId, ActorState, Address};
pub use envelope::{Envelope, Event, EventKind};
pub use mailbox::{Admission, Mailbox};
pub use queue::{BoundedQueue, Rejected};
pub use reactor::Reactor;
pub use stats::RunSummary;
pub use supervisor::Supervisor;
pub use table::ActorTable;
pub use worker::WorkerPool;
