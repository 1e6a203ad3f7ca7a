//! Actors running `.act` scripts
//!
//! An actor walks its directives from the top. Directives that need the
//! runtime (`wait`, `write`, `read`, `spawn`) emit a request and block the
//! actor until the matching completion is delivered; `receive` blocks until a
//! matching message is in the inbox. Casts are fire-and-forget and go out with
//! the next suspension.

use crate::directive::{ActScript, Directive, Word};
use crate::engine::Printer;
use crate::net;
use rustc_hash::FxHashMap;
use servitor_engine::{Address, Delivery, ScriptActor, ScriptError, StepResult, SuspendRequest, Tag};
use socket2::Socket;
use std::collections::VecDeque;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

/// What the actor is blocked on
#[derive(Debug, Clone, PartialEq, Eq)]
enum Blocked {
    /// The first step has not been delivered yet
    Start,
    /// Runnable
    No,
    Timer,
    Write,
    Read,
    Spawn(Tag),
    Receive(Option<String>),
}

/// One running `.act` script.
pub struct ActActor {
    script: Arc<ActScript>,
    pc: usize,
    blocked: Blocked,
    vars: FxHashMap<&'static str, String>,
    /// Casts (and the seed url) in arrival order, as (pattern, data)
    inbox: VecDeque<(String, String)>,
    children: FxHashMap<Tag, Address>,
    socket: Option<Socket>,
    printer: Printer,
}

impl ActActor {
    pub(crate) fn new(script: Arc<ActScript>, printer: Printer) -> Self {
        Self {
            script,
            pc: 0,
            blocked: Blocked::Start,
            vars: FxHashMap::default(),
            inbox: VecDeque::new(),
            children: FxHashMap::default(),
            socket: None,
            printer,
        }
    }

    fn set(&mut self, name: &'static str, value: impl ToString) {
        self.vars.insert(name, value.to_string());
    }

    fn word(&self, word: &Word) -> String {
        match word {
            Word::Text(text) => text.clone(),
            Word::Var(name) => self.vars.get(name).cloned().unwrap_or_default(),
        }
    }

    fn line(&self, words: &[Word]) -> String {
        words
            .iter()
            .map(|word| self.word(word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn fault(&self, line: usize, message: impl std::fmt::Display) -> ScriptError {
        ScriptError::new(format!("{}:{}: {}", self.script.name, line, message))
    }

    /// Take the first inbox message matching `pattern`
    fn take_message(&mut self, pattern: Option<&str>) -> bool {
        let position = self
            .inbox
            .iter()
            .position(|(p, _)| pattern.map_or(true, |wanted| p == wanted));
        match position.and_then(|index| self.inbox.remove(index)) {
            Some((pattern, data)) => {
                self.set("pattern", pattern);
                self.set("data", data);
                true
            }
            None => false,
        }
    }

    fn fd(&self, line: usize) -> Result<i32, ScriptError> {
        self.socket
            .as_ref()
            .map(|socket| socket.as_raw_fd())
            .ok_or_else(|| self.fault(line, "no open connection"))
    }

    /// Run directives until the actor has to wait or the script ends.
    fn run(&mut self) -> Result<StepResult, ScriptError> {
        let mut requests = Vec::new();
        let script = self.script.clone();

        while let Some((line, directive)) = script.directives.get(self.pc) {
            let line = *line;
            self.pc += 1;
            match directive {
                Directive::Print(words) => {
                    let text = self.line(words);
                    (self.printer)(&text);
                }
                Directive::Wait { ms, tag } => {
                    self.blocked = Blocked::Timer;
                    requests.push(SuspendRequest::StartTimer {
                        delay_ms: *ms,
                        tag: *tag,
                    });
                    return Ok(StepResult::Suspended(requests));
                }
                Directive::Connect { host, port } => {
                    let host = self.word(host);
                    let port_text = self.word(port);
                    let port: u16 = port_text
                        .parse()
                        .map_err(|_| self.fault(line, format!("invalid port `{}`", port_text)))?;
                    let socket = net::connect(&host, port)
                        .map_err(|err| self.fault(line, format!("connect {}:{}: {}", host, port, err)))?;
                    self.set("fd", socket.as_raw_fd());
                    self.socket = Some(socket);
                }
                Directive::Write(words) => {
                    let fd = self.fd(line)?;
                    self.blocked = Blocked::Write;
                    requests.push(SuspendRequest::Write {
                        fd,
                        data: self.line(words).into_bytes(),
                        tag: None,
                    });
                    return Ok(StepResult::Suspended(requests));
                }
                Directive::Read { max, tag } => {
                    let fd = self.fd(line)?;
                    self.blocked = Blocked::Read;
                    requests.push(SuspendRequest::Read {
                        fd,
                        max_bytes: *max,
                        tag: *tag,
                    });
                    return Ok(StepResult::Suspended(requests));
                }
                Directive::Close => {
                    self.socket = None;
                    self.vars.remove("fd");
                }
                Directive::Spawn { script, tag } => {
                    self.blocked = Blocked::Spawn(*tag);
                    requests.push(SuspendRequest::Spawn {
                        script: script.clone(),
                        tag: *tag,
                    });
                    return Ok(StepResult::Suspended(requests));
                }
                Directive::Cast { tag, pattern, data } => {
                    let child = self
                        .children
                        .get(tag)
                        .ok_or_else(|| self.fault(line, format!("no child with tag {}", tag)))?;
                    requests.push(child.cast(self.word(pattern), self.line(data)));
                }
                Directive::Receive(pattern) => {
                    if !self.take_message(pattern.as_deref()) {
                        self.blocked = Blocked::Receive(pattern.clone());
                        return Ok(StepResult::Suspended(requests));
                    }
                }
                Directive::Exit => return Ok(StepResult::Terminated(requests)),
            }
        }
        Ok(StepResult::Terminated(requests))
    }
}

impl ScriptActor for ActActor {
    fn deliver(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Start => {
                if self.blocked == Blocked::Start {
                    self.blocked = Blocked::No;
                }
            }
            Delivery::Url(url) => {
                if let Some((host, port)) = net::host_port(&url) {
                    self.set("host", host);
                    self.set("port", port);
                }
                self.set("url", &url);
                self.inbox.push_back(("url".to_string(), url));
            }
            Delivery::WaitElapsed { delay_ms, tag } => {
                self.set("delay", delay_ms);
                if let Some(tag) = tag {
                    self.set("tag", tag);
                }
                if self.blocked == Blocked::Timer {
                    self.blocked = Blocked::No;
                }
            }
            Delivery::Sent { bytes, tag, .. } => {
                self.set("sent", bytes);
                if let Some(tag) = tag {
                    self.set("tag", tag);
                }
                if self.blocked == Blocked::Write {
                    self.blocked = Blocked::No;
                }
            }
            Delivery::Received { data, tag, .. } => {
                self.set("data", String::from_utf8_lossy(&data));
                if let Some(tag) = tag {
                    self.set("tag", tag);
                }
                if self.blocked == Blocked::Read {
                    self.blocked = Blocked::No;
                }
            }
            Delivery::Spawned { address, tag } => {
                self.children.insert(tag, address);
                if self.blocked == Blocked::Spawn(tag) {
                    self.set("tag", tag);
                    self.blocked = Blocked::No;
                }
            }
            Delivery::Cast { pattern, data } => self.inbox.push_back((pattern, data)),
        }
    }

    fn resume(&mut self) -> Result<StepResult, ScriptError> {
        if let Blocked::Receive(pattern) = &self.blocked {
            let pattern = pattern.clone();
            if self.take_message(pattern.as_deref()) {
                self.blocked = Blocked::No;
            }
        }
        if self.blocked != Blocked::No {
            return Ok(StepResult::idle());
        }
        self.run()
    }
}
