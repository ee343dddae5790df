use std::collections::VecDeque;

use lockstep_proto::messages::command::CommandBody;
use tracing::trace;

use crate::{error::SyncError, simulation::Simulation};

/// A command bound to the tick it executes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub body: CommandBody,
    pub target_tick: u32,
    /// Issuer-local completion handle; 0 for everyone but the issuer.
    pub callback: u8,
}

impl Command {
    pub fn new(body: CommandBody, target_tick: u32) -> Self {
        Self {
            body,
            target_tick,
            callback: 0,
        }
    }

    pub fn with_callback(mut self, callback: u8) -> Self {
        self.callback = callback;
        self
    }
}

/// FIFO of scheduled commands.
///
/// Commands sharing a target tick run in the order they were pushed.
#[derive(Debug, Default)]
pub struct CommandQueue {
    items: VecDeque<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.items.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove and return everything, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Command> + '_ {
        self.items.drain(..)
    }

    /// Apply every command targeted at `tick` to `sim`, in queue order.
    ///
    /// Returns the executed commands. A command left over from an earlier
    /// tick is a scheduling bug and is reported as [`SyncError::StaleCommand`]
    /// before anything runs.
    pub fn execute_due<S: Simulation>(
        &mut self,
        tick: u32,
        sim: &mut S,
    ) -> Result<Vec<Command>, SyncError> {
        if let Some(stale) = self.items.iter().find(|c| c.target_tick < tick) {
            return Err(SyncError::StaleCommand {
                target: stale.target_tick,
                tick,
            });
        }

        let mut executed = Vec::new();
        let mut pending = VecDeque::with_capacity(self.items.len());
        for command in self.items.drain(..) {
            if command.target_tick == tick {
                trace!(tick, op = command.body.op, issuer = command.body.issuer, "executing command");
                sim.apply_command(&command);
                executed.push(command);
            } else {
                pending.push_back(command);
            }
        }
        self.items = pending;
        Ok(executed)
    }
}
