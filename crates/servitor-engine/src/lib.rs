//! Servitor Engine
//!
//! Scheduler core for cooperatively scheduled, scripted actors:
//! - Bounded run and pending-operation queues
//! - Per-actor mailboxes (one step at a time, in order)
//! - Worker pool executing steps in parallel
//! - A mio reactor for timers and socket readiness
//! - Supervisor driving the lifecycle from seed to shutdown
//!
//! Actor logic lives behind the [`script::ScriptEngine`] trait; this crate
//! never interprets scripts itself.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod defaults;
pub mod error;
pub mod scheduler;
pub mod script;

pub use config::{ConfigError, RuntimeConfig};
pub use error::{QueueError, RuntimeError, RuntimeResult};
pub use scheduler::{ActorId, ActorState, Address, RunSummary, Supervisor};
pub use script::{
    CompileError, Delivery, ScriptActor, ScriptEngine, ScriptError, StepResult, SuspendRequest, Tag,
};
