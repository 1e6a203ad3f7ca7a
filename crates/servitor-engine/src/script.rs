//! Script engine contract
//!
//! The scheduler never interprets actor logic itself. A [`ScriptEngine`] turns a
//! script identifier into a [`ScriptActor`]; the worker that holds an actor's
//! mailbox binds each event into it with [`ScriptActor::deliver`] and then
//! calls [`ScriptActor::resume`], which runs until the next suspension point.

use crate::scheduler::Address;
use std::os::unix::io::RawFd;

/// Correlation tag chosen by a script to match completions with requests.
pub type Tag = u32;

// ============================================================================
// Errors
// ============================================================================

/// A script could not be turned into an actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// No script exists under this identifier
    #[error("script not found: {0}")]
    NotFound(String),

    /// The script source is malformed
    #[error("{script}:{line}: {message}")]
    Syntax {
        /// Script identifier
        script: String,
        /// 1-based line number
        line: usize,
        /// What is wrong with the line
        message: String,
    },

    /// The script could not be loaded for another reason
    #[error("failed to load {script}: {message}")]
    Load {
        /// Script identifier
        script: String,
        /// Underlying failure
        message: String,
    },
}

/// A fault raised while a step was executing.
///
/// The scheduler logs it and abandons the step; the actor itself stays alive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScriptError {
    message: String,
}

impl ScriptError {
    /// Create a script error with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// Requests and deliveries
// ============================================================================

/// Something a suspended step asks the runtime to do on its behalf.
#[derive(Debug, Clone)]
pub enum SuspendRequest {
    /// Deliver `WaitElapsed` after `delay_ms` milliseconds
    StartTimer {
        /// Delay in milliseconds
        delay_ms: u64,
        /// Correlation tag echoed back
        tag: Option<Tag>,
    },

    /// Read up to `max_bytes` from `fd` once it is readable
    Read {
        /// Descriptor to read from
        fd: RawFd,
        /// Upper bound of bytes returned
        max_bytes: usize,
        /// Correlation tag echoed back
        tag: Option<Tag>,
    },

    /// Write `data` to `fd` once it is writable
    Write {
        /// Descriptor to write to
        fd: RawFd,
        /// Bytes to send
        data: Vec<u8>,
        /// Correlation tag echoed back
        tag: Option<Tag>,
    },

    /// Spawn a child actor running `script`
    Spawn {
        /// Script identifier handed to [`ScriptEngine::compile`]
        script: String,
        /// Tag under which the child's address is delivered
        tag: Tag,
    },

    /// Send a message to another actor
    Cast {
        /// Receiving actor
        address: Address,
        /// Message pattern
        pattern: String,
        /// Message body
        data: String,
    },
}

/// Outcome of one resumed step.
#[derive(Debug, Clone)]
pub enum StepResult {
    /// The actor yielded. It waits for the completions of these requests, or,
    /// when the list is empty, for whatever event arrives next.
    Suspended(Vec<SuspendRequest>),

    /// The actor finished. Final requests (typically casts) are still routed
    /// before the actor is retired.
    Terminated(Vec<SuspendRequest>),
}

impl StepResult {
    /// Yield without issuing any request
    pub fn idle() -> Self {
        StepResult::Suspended(Vec::new())
    }

    /// Terminate without issuing any request
    pub fn done() -> Self {
        StepResult::Terminated(Vec::new())
    }

    /// Whether this is the termination sentinel
    pub fn is_terminated(&self) -> bool {
        matches!(self, StepResult::Terminated(_))
    }

    /// Split into the requests and the termination flag
    pub fn into_parts(self) -> (Vec<SuspendRequest>, bool) {
        match self {
            StepResult::Suspended(requests) => (requests, false),
            StepResult::Terminated(requests) => (requests, true),
        }
    }
}

/// An event bound into the actor before it is resumed.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// First step of a freshly spawned actor
    Start,

    /// Seed target handed to an initial actor
    Url(String),

    /// A requested timer elapsed
    WaitElapsed {
        /// The delay that was requested
        delay_ms: u64,
        /// Tag from the request
        tag: Option<Tag>,
    },

    /// A requested write was performed
    Sent {
        /// Descriptor written to
        fd: RawFd,
        /// Bytes accepted by the kernel
        bytes: usize,
        /// Tag from the request
        tag: Option<Tag>,
    },

    /// A requested read was performed; empty data means end of stream
    Received {
        /// Descriptor read from
        fd: RawFd,
        /// Bytes read
        data: Vec<u8>,
        /// Tag from the request
        tag: Option<Tag>,
    },

    /// A requested child was spawned
    Spawned {
        /// Capability for the new child
        address: Address,
        /// Tag from the request
        tag: Tag,
    },

    /// Another actor cast a message to this one
    Cast {
        /// Message pattern
        pattern: String,
        /// Message body
        data: String,
    },
}

// ============================================================================
// Traits
// ============================================================================

/// Script state of one actor, owned by the scheduler but only ever touched by
/// the worker currently holding the actor's mailbox.
pub trait ScriptActor: Send {
    /// Bind an event into the actor's visible state.
    fn deliver(&mut self, delivery: Delivery);

    /// Run until the next suspension point.
    fn resume(&mut self) -> Result<StepResult, ScriptError>;
}

/// Compiles scripts into actors.
pub trait ScriptEngine: Send + Sync {
    /// Create a new actor from a script identifier.
    fn compile(&self, script_id: &str) -> Result<Box<dyn ScriptActor>, CompileError>;
}
