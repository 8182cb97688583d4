#![cfg(test)]

//! Test doubles for the session's input and interrupt seams.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use prompt_grok_core::ScriptedClient;

use super::input::{InputEvent, InterruptSource, LineSource};

/// Replays queued input events, then reports end of input.
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
}

impl ScriptedInput {
    pub fn new(events: impl IntoIterator<Item = InputEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    pub fn lines(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| InputEvent::Line(l.to_string())))
    }
}

impl LineSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Result<InputEvent> {
        Ok(self.events.pop_front().unwrap_or(InputEvent::Eof))
    }
}

/// Never interrupts.
pub struct NoInterrupt;

#[async_trait]
impl InterruptSource for NoInterrupt {
    async fn interrupted(&mut self) {
        futures::future::pending::<()>().await;
    }
}

/// Never interrupts, but counts how many listeners were created.
#[derive(Default)]
pub struct CountingInterrupt {
    pub listeners: usize,
}

#[async_trait]
impl InterruptSource for CountingInterrupt {
    async fn interrupted(&mut self) {
        self.listeners += 1;
        futures::future::pending::<()>().await;
    }
}

/// Interrupts once, as soon as the client has received its `on_call`-th
/// request. Later requests are never interrupted.
pub struct InterruptOnCall {
    client: Arc<ScriptedClient>,
    on_call: usize,
    fired: bool,
}

impl InterruptOnCall {
    pub fn new(client: Arc<ScriptedClient>, on_call: usize) -> Self {
        Self {
            client,
            on_call,
            fired: false,
        }
    }
}

#[async_trait]
impl InterruptSource for InterruptOnCall {
    async fn interrupted(&mut self) {
        if self.fired {
            futures::future::pending::<()>().await;
        }
        while self.client.calls() < self.on_call {
            tokio::task::yield_now().await;
        }
        self.fired = true;
    }
}
