//! Worker threads that execute actor steps
//!
//! A worker pops an envelope, passes it through the target's mailbox, performs
//! any syscall the event stands for, runs one script step, and routes the
//! step's requests. The pop and the admission happen under the run queue lock,
//! so envelopes for one actor are admitted in queue order no matter how many
//! workers race for them.

use super::actor::{ActorId, Address};
use super::envelope::{Envelope, Event};
use super::mailbox::Admission;
use super::shared::Shared;
use super::stats::Counters;
use super::sys;
use crate::error::{QueueError, RuntimeError, RuntimeResult};
use crate::script::{Delivery, ScriptError, SuspendRequest};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// Fixed set of worker threads draining the run queue.
pub struct WorkerPool {
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `count` workers. They run until the run queue is closed.
    pub(crate) fn start(shared: &Arc<Shared>, count: usize) -> RuntimeResult<Self> {
        let mut pool = Self {
            handles: Vec::with_capacity(count),
        };
        for index in 0..count {
            let state = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("servitor-worker-{}", index))
                .spawn(move || run_loop(index, state));
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    shared.close();
                    pool.join();
                    return Err(RuntimeError::WorkerSpawn { index, source });
                }
            }
        }
        Ok(pool)
    }

    /// Number of worker threads
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the pool has no threads
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit. The run queue must already be closed.
    pub(crate) fn join(&mut self) {
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::error!(thread = %name, "worker panicked");
            }
        }
    }
}

fn run_loop(index: usize, shared: Arc<Shared>) {
    tracing::debug!(worker = index, "worker started");
    loop {
        let admission = shared.run_queue.pop_with(|envelope| {
            let target = envelope.target().clone();
            target.cell().mailbox().try_admit(envelope)
        });
        match admission {
            Ok(Admission::Admitted(envelope)) => execute(&shared, envelope),
            Ok(Admission::Queued) => {}
            Ok(Admission::Dead(envelope)) => {
                Counters::bump(&shared.counters.dead_letters);
                tracing::debug!(
                    actor = %envelope.target().id(),
                    kind = %envelope.kind(),
                    "dead letter discarded"
                );
            }
            Err(_) => break,
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}

/// Run one admitted envelope, then hand the actor to its next queued envelope.
fn execute(shared: &Shared, mut envelope: Envelope) {
    loop {
        let (target, event) = envelope.into_parts();
        let id = target.id();
        let kind = event.kind();
        tracing::trace!(actor = %id, %kind, "step");

        let (requests, terminated) = run_step(shared, &target, event);

        for request in requests {
            if terminated && !routed_after_termination(&request) {
                Counters::bump(&shared.counters.dead_letters);
                tracing::debug!(actor = %id, "final-step request needs a live actor, dropped");
                continue;
            }
            route(shared, &target, request);
        }

        if terminated {
            let dropped = target.cell().mailbox().retire();
            if dropped > 0 {
                Counters::add(&shared.counters.dead_letters, dropped as u64);
                tracing::debug!(actor = %id, dropped, "pending envelopes discarded on termination");
            }
            target.cell().release_script();
            shared.retire_actor(id);
            return;
        }

        let Some(next) = target.cell().mailbox().release() else {
            return;
        };
        // The claim travels with `next`; nothing else can run this actor meanwhile
        match shared.run_queue.try_push(next) {
            Ok(()) => return,
            Err(rejected) if rejected.reason == QueueError::CapacityExceeded => {
                // A full run queue must not park the worker holding a claim
                tracing::trace!(actor = %id, "run queue full, continuing inline");
                envelope = rejected.item;
                envelope.admitted = false;
            }
            Err(_) => return,
        }
    }
}

/// Turn an event into what the script sees, doing the socket work first.
fn perform(shared: &Shared, id: ActorId, event: Event) -> Option<Delivery> {
    match event {
        Event::InitialRun => Some(Delivery::Start),
        Event::UrlSeed { url } => Some(Delivery::Url(url)),
        Event::WaitElapsed { delay_ms, tag } => Some(Delivery::WaitElapsed { delay_ms, tag }),
        Event::SendComplete { fd, data, tag } => match sys::send(fd, &data) {
            Ok(bytes) => Some(Delivery::Sent { fd, bytes, tag }),
            Err(err) => {
                Counters::bump(&shared.counters.io_failures);
                tracing::warn!(actor = %id, fd, error = %err, "send failed");
                None
            }
        },
        Event::RecvComplete { fd, max_bytes, tag } => match sys::recv(fd, max_bytes) {
            Ok(data) => Some(Delivery::Received { fd, data, tag }),
            Err(err) => {
                Counters::bump(&shared.counters.io_failures);
                tracing::warn!(actor = %id, fd, error = %err, "recv failed");
                None
            }
        },
        Event::SpawnResult { address, tag } => Some(Delivery::Spawned { address, tag }),
        Event::Cast { pattern, data } => Some(Delivery::Cast { pattern, data }),
        Event::SpawnRequest { script, tag } => {
            tracing::warn!(actor = %id, %script, tag, "spawn request reached a worker, ignored");
            None
        }
    }
}

/// Perform, deliver and resume. Errors and panics count as a step with no requests.
fn run_step(shared: &Shared, target: &Address, event: Event) -> (Vec<SuspendRequest>, bool) {
    let cell = target.cell();
    let _guard = cell.enter_step(&shared.counters);
    Counters::bump(&shared.counters.steps);

    let mut script = cell.script().lock();
    let Some(actor) = script.as_mut() else {
        tracing::debug!(actor = %cell.id(), "no script state, step skipped");
        return (Vec::new(), false);
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(delivery) = perform(shared, cell.id(), event) {
            actor.deliver(delivery);
        }
        actor.resume()
    }))
    .unwrap_or_else(|payload| Err(ScriptError::new(panic_message(payload.as_ref()))));

    match outcome {
        Ok(step) => step.into_parts(),
        Err(err) => {
            Counters::bump(&shared.counters.script_errors);
            tracing::error!(actor = %cell.id(), script = cell.script_id(), error = %err, "script error");
            (Vec::new(), false)
        }
    }
}

/// Whether a request still makes sense once its issuer has terminated.
///
/// Casts and spawns act on other actors; timers and socket waits would only
/// complete into a dead mailbox.
fn routed_after_termination(request: &SuspendRequest) -> bool {
    matches!(
        request,
        SuspendRequest::Cast { .. } | SuspendRequest::Spawn { .. }
    )
}

fn route(shared: &Shared, source: &Address, request: SuspendRequest) {
    let _ = match request {
        SuspendRequest::StartTimer { delay_ms, tag } => {
            shared.submit(Envelope::new(source.clone(), Event::WaitElapsed { delay_ms, tag }))
        }
        SuspendRequest::Read { fd, max_bytes, tag } => shared.submit(Envelope::new(
            source.clone(),
            Event::RecvComplete { fd, max_bytes, tag },
        )),
        SuspendRequest::Write { fd, data, tag } => {
            shared.submit(Envelope::new(source.clone(), Event::SendComplete { fd, data, tag }))
        }
        SuspendRequest::Spawn { script, tag } => {
            shared.submit(Envelope::new(source.clone(), Event::SpawnRequest { script, tag }))
        }
        SuspendRequest::Cast {
            address,
            pattern,
            data,
        } => {
            tracing::trace!(from = %source.id(), to = %address.id(), %pattern, "cast");
            shared.schedule(Envelope::new(address, Event::Cast { pattern, data }))
        }
    };
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("script panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("script panicked: {}", message)
    } else {
        "script panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routed_after_termination() {
        let target = crate::scheduler::actor::tests::null_address();
        assert!(routed_after_termination(&target.cast("ping", "")));
        assert!(routed_after_termination(&SuspendRequest::Spawn {
            script: "child".into(),
            tag: 1,
        }));
        assert!(!routed_after_termination(&SuspendRequest::StartTimer {
            delay_ms: 1,
            tag: None,
        }));
        assert!(!routed_after_termination(&SuspendRequest::Read {
            fd: 0,
            max_bytes: 1,
            tag: None,
        }));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "script panicked: boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bad state"));
        assert_eq!(panic_message(payload.as_ref()), "script panicked: bad state");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "script panicked");
    }
}
