//! Envelopes: one event addressed to one actor

use super::actor::Address;
use crate::script::Tag;
use std::fmt;
use std::os::unix::io::RawFd;

/// Discriminant of an [`Event`], used in logs and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First step of a new actor
    InitialRun,
    /// Seed target for an initial actor
    UrlSeed,
    /// Timer request or its completion
    WaitElapsed,
    /// Write request or its completion
    SendComplete,
    /// Read request or its completion
    RecvComplete,
    /// Child spawn request
    SpawnRequest,
    /// Child spawn completion
    SpawnResult,
    /// Message from another actor
    Cast,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::InitialRun => "initial-run",
            EventKind::UrlSeed => "url-seed",
            EventKind::WaitElapsed => "wait-elapsed",
            EventKind::SendComplete => "send-complete",
            EventKind::RecvComplete => "recv-complete",
            EventKind::SpawnRequest => "spawn-request",
            EventKind::SpawnResult => "spawn-result",
            EventKind::Cast => "cast",
        };
        f.write_str(name)
    }
}

/// Payload of an envelope.
///
/// Request variants travel through the pending-operation queue to the reactor;
/// the same variant then reaches a worker once the operation is due, and the
/// worker performs the syscall before delivering the completion.
#[derive(Debug, Clone)]
pub enum Event {
    /// Run a freshly spawned actor for the first time
    InitialRun,
    /// Hand a seed target to an initial actor
    UrlSeed {
        /// Target URL
        url: String,
    },
    /// Timer elapsed
    WaitElapsed {
        /// Requested delay
        delay_ms: u64,
        /// Correlation tag
        tag: Option<Tag>,
    },
    /// Write `data` to `fd`
    SendComplete {
        /// Descriptor
        fd: RawFd,
        /// Bytes to write
        data: Vec<u8>,
        /// Correlation tag
        tag: Option<Tag>,
    },
    /// Read up to `max_bytes` from `fd`
    RecvComplete {
        /// Descriptor
        fd: RawFd,
        /// Read limit
        max_bytes: usize,
        /// Correlation tag
        tag: Option<Tag>,
    },
    /// Spawn a child running `script`; handled by the reactor only
    SpawnRequest {
        /// Script identifier
        script: String,
        /// Correlation tag
        tag: Tag,
    },
    /// A child was spawned
    SpawnResult {
        /// The child
        address: Address,
        /// Correlation tag
        tag: Tag,
    },
    /// Message from another actor
    Cast {
        /// Message pattern
        pattern: String,
        /// Message body
        data: String,
    },
}

impl Event {
    /// Kind of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InitialRun => EventKind::InitialRun,
            Event::UrlSeed { .. } => EventKind::UrlSeed,
            Event::WaitElapsed { .. } => EventKind::WaitElapsed,
            Event::SendComplete { .. } => EventKind::SendComplete,
            Event::RecvComplete { .. } => EventKind::RecvComplete,
            Event::SpawnRequest { .. } => EventKind::SpawnRequest,
            Event::SpawnResult { .. } => EventKind::SpawnResult,
            Event::Cast { .. } => EventKind::Cast,
        }
    }
}

/// An event together with the actor it is destined for.
#[derive(Debug)]
pub struct Envelope {
    target: Address,
    event: Event,
    /// Set when a mailbox hands this envelope over from its pending list; the
    /// receiving worker then already owns the actor.
    pub(crate) admitted: bool,
}

impl Envelope {
    /// Address `event` to `target`
    pub fn new(target: Address, event: Event) -> Self {
        Self {
            target,
            event,
            admitted: false,
        }
    }

    /// Receiving actor
    pub fn target(&self) -> &Address {
        &self.target
    }

    /// Carried event
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Kind of the carried event
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Split into target and event
    pub fn into_parts(self) -> (Address, Event) {
        (self.target, self.event)
    }
}
