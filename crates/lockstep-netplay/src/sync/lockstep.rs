//! Lockstep clock of a participant.
//!
//! The participant may only run ticks the authority has released. When it is
//! behind the last published frame it catches up in one go; otherwise it
//! creeps forward one tick per step until it reaches the ceiling.

use std::collections::VecDeque;

use lockstep_proto::constants::DAY_TICKS;
use lockstep_sim::SyncError;

/// Own fingerprints kept for syncs that arrive after their tick ran.
pub const FINGERPRINT_HISTORY: usize = 256;

/// Result of comparing fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCheck {
    /// Nothing was due for comparison.
    Nothing,
    /// Fingerprints matched; `first` marks the first match of the session.
    Verified { tick: u32, first: bool },
}

#[derive(Debug, Default)]
pub struct LockstepClock {
    tick: u32,
    server_frame: u32,
    ceiling: u32,
    /// Syncs for ticks not reached yet, in tick order.
    pending: VecDeque<(u32, u32)>,
    history: VecDeque<(u32, u32)>,
    synced: bool,
    last_ack_frame: u32,
}

impl LockstepClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over at a snapshot tick.
    pub fn reset(&mut self, tick: u32) {
        *self = Self {
            tick,
            server_frame: tick,
            ceiling: tick,
            ..Self::default()
        };
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn server_frame(&self) -> u32 {
        self.server_frame
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// At least one sync tick has been verified.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn on_frame(&mut self, tick: u32, ceiling: u32) {
        self.server_frame = tick;
        self.ceiling = ceiling;
    }

    /// Ticks that may run now.
    pub fn due_ticks(&self) -> u32 {
        if self.server_frame > self.tick {
            self.server_frame - self.tick
        } else if self.ceiling > self.tick {
            1
        } else {
            0
        }
    }

    /// Move to the next tick and return it.
    pub fn advance(&mut self) -> u32 {
        self.tick += 1;
        self.tick
    }

    /// Store the fingerprint sampled for the current tick and compare it if
    /// a sync for this tick is waiting.
    pub fn record(&mut self, fingerprint: u32) -> Result<SyncCheck, SyncError> {
        let tick = self.tick;
        if self.history.len() == FINGERPRINT_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back((tick, fingerprint));

        // A frame fingerprint and a sync packet may name the same tick.
        let mut check = SyncCheck::Nothing;
        while let Some(&(due, expected)) = self.pending.front() {
            if due > tick {
                break;
            }
            self.pending.pop_front();
            if due != tick {
                continue;
            }
            if let SyncCheck::Verified { first, .. } = self.verify(due, expected, fingerprint)? {
                let first = first || matches!(check, SyncCheck::Verified { first: true, .. });
                check = SyncCheck::Verified { tick, first };
            }
        }
        Ok(check)
    }

    /// Expected fingerprint for `tick` from the authority.
    ///
    /// Compared right away when the tick already ran, otherwise when it is
    /// recorded. A tick older than the kept history is not checked.
    pub fn on_sync(&mut self, tick: u32, fingerprint: u32) -> Result<SyncCheck, SyncError> {
        if tick > self.tick {
            self.pending.push_back((tick, fingerprint));
            return Ok(SyncCheck::Nothing);
        }
        match self.fingerprint_at(tick) {
            Some(actual) => self.verify(tick, fingerprint, actual),
            None => Ok(SyncCheck::Nothing),
        }
    }

    pub fn fingerprint_at(&self, tick: u32) -> Option<u32> {
        self.history
            .iter()
            .rev()
            .find(|(t, _)| *t == tick)
            .map(|&(_, fp)| fp)
    }

    /// Tick to acknowledge on a frame, at most once per day.
    pub fn ack_due(&mut self) -> Option<u32> {
        if self.synced && self.last_ack_frame < self.tick {
            self.last_ack_frame = self.tick + DAY_TICKS;
            Some(self.tick)
        } else {
            None
        }
    }

    fn verify(&mut self, tick: u32, expected: u32, actual: u32) -> Result<SyncCheck, SyncError> {
        if expected != actual {
            return Err(SyncError::DesyncDetected {
                tick,
                expected,
                actual,
            });
        }
        let first = !self.synced;
        self.synced = true;
        Ok(SyncCheck::Verified { tick, first })
    }
}
