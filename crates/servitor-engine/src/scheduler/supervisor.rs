//! Supervisor: runtime bootstrap, run loop and shutdown
//!
//! The supervisor owns the reactor and runs it on the caller's thread; the
//! worker pool runs beside it. A run ends once no actor is alive and nothing
//! is left on the pending-operation queue.

use super::actor::Address;
use super::envelope::{Envelope, Event};
use super::reactor::{Reactor, WAKE_TOKEN};
use super::shared::Shared;
use super::stats::RunSummary;
use super::table::ActorTable;
use super::worker::WorkerPool;
use crate::config::RuntimeConfig;
use crate::defaults::DEFAULT_TARGET;
use crate::error::RuntimeResult;
use crate::script::ScriptEngine;
use mio::{Poll, Waker};
use std::sync::Arc;

/// Runs actors from spawn to termination.
pub struct Supervisor {
    config: RuntimeConfig,
    shared: Arc<Shared>,
    reactor: Reactor,
    workers: WorkerPool,
    stopped: bool,
}

impl Supervisor {
    /// Create the poll, both queues and the actor table, and start the workers.
    pub fn new(config: RuntimeConfig, engine: Arc<dyn ScriptEngine>) -> RuntimeResult<Self> {
        config.validate()?;
        let workers = config.effective_workers();

        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        let shared = Arc::new(Shared::new(
            config.run_queue_capacity,
            config.pending_queue_capacity,
            engine,
            waker,
        ));
        let reactor = Reactor::new(shared.clone(), poll, config.poll_events);
        let workers = WorkerPool::start(&shared, workers)?;

        tracing::info!(
            workers = workers.len(),
            run_queue = config.run_queue_capacity,
            pending_queue = config.pending_queue_capacity,
            "runtime started"
        );

        Ok(Self {
            config,
            shared,
            reactor,
            workers,
            stopped: false,
        })
    }

    /// Spawn a top-level actor and schedule its first step.
    pub fn spawn(&self, script: &str) -> RuntimeResult<Address> {
        let address = self.shared.spawn_actor(script, None)?;
        self.shared
            .schedule(Envelope::new(address.clone(), Event::InitialRun))?;
        Ok(address)
    }

    /// Spawn a top-level actor for one target: its first step, then the target.
    pub fn seed(&self, script: &str, target: &str) -> RuntimeResult<Address> {
        let address = self.spawn(script)?;
        self.shared.schedule(Envelope::new(
            address.clone(),
            Event::UrlSeed {
                url: target.to_string(),
            },
        ))?;
        tracing::debug!(actor = %address.id(), target, "actor seeded");
        Ok(address)
    }

    /// Seed one actor per target, or a single actor for the default target.
    pub fn seed_all(&self, script: &str, targets: &[String]) -> RuntimeResult<Vec<Address>> {
        if targets.is_empty() {
            return Ok(vec![self.seed(script, DEFAULT_TARGET)?]);
        }
        targets
            .iter()
            .map(|target| self.seed(script, target))
            .collect()
    }

    /// Run the event loop until every actor has terminated.
    pub fn run(&mut self) -> RuntimeResult<()> {
        loop {
            self.reactor.drain_pending();
            self.reactor.flush_ready();
            if self.shared.table.live() == 0 && self.shared.pending.is_empty() {
                break;
            }
            self.reactor.poll_once()?;
        }
        tracing::debug!("all actors terminated");
        Ok(())
    }

    /// Stop the runtime: close both queues, join the workers and abandon
    /// whatever timers and watches are left. Actors that never finished are
    /// marked terminated; nothing is fired or retracted on their behalf.
    /// Idempotent.
    pub fn shutdown(&mut self) -> RunSummary {
        if !self.stopped {
            self.stopped = true;
            self.shared.close();
            self.workers.join();

            let abandoned_requests = self.reactor.abandon()
                + self.shared.run_queue.drain().len()
                + self.shared.pending.drain().len();
            let abandoned_actors = self.shared.table.drain();
            for address in &abandoned_actors {
                address.cell().mailbox().retire();
            }
            if abandoned_requests > 0 || !abandoned_actors.is_empty() {
                tracing::info!(
                    requests = abandoned_requests,
                    actors = abandoned_actors.len(),
                    "abandoned at shutdown"
                );
            }
            tracing::debug!("runtime stopped");
        }
        self.stats()
    }

    /// Seed, run until drained, shut down.
    pub fn run_to_completion(&mut self, script: &str, targets: &[String]) -> RuntimeResult<RunSummary> {
        let seeded = self.seed_all(script, targets);
        let ran = seeded.and_then(|_| self.run());
        let summary = self.shutdown();
        ran.map(|()| summary)
    }

    /// Number of actors that have not terminated
    pub fn live_actors(&self) -> usize {
        self.shared.table.live()
    }

    /// The actor registry
    pub fn table(&self) -> &ActorTable {
        &self.shared.table
    }

    /// Counters so far
    pub fn stats(&self) -> RunSummary {
        self.shared.counters.snapshot()
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// The configuration the runtime was started with
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
