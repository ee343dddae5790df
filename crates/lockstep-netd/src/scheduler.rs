//! Authority clock: tick, frame ceiling and sync cadence.

use lockstep_proto::constants::DAY_TICKS;

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    pub tick: u32,
    /// Furthest tick participants may run to.
    pub ceiling: u32,
    /// Fingerprint sampled after the current tick ran.
    pub fingerprint: u32,
    last_sync: u32,
}

/// What `server_tick` has to publish this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publication {
    pub frame: bool,
    pub sync: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target tick for a command scheduled now.
    pub fn next_target(&self) -> u32 {
        self.ceiling + 1
    }

    /// Raise the ceiling when the authority has reached it and decide whether
    /// a sync is due. Called once per tick after the simulation advanced.
    pub fn publish(&mut self, frame_freq: u32, sync_freq: u32) -> Publication {
        let frame = self.tick > self.ceiling;
        if frame {
            self.ceiling = self.tick + frame_freq;
        }
        let sync = self.last_sync + sync_freq < self.tick;
        if sync {
            self.last_sync = self.tick;
        }
        Publication { frame, sync }
    }
}

/// Ticks a participant is behind.
///
/// The acknowledged gap, plus however long the authority has gone without
/// an acknowledgement beyond the grace of one day and one ceiling step.
pub fn lag_ticks(tick: u32, last_frame: u32, last_frame_server: u32, frame_freq: u32) -> u32 {
    let mut lag = last_frame_server.saturating_sub(last_frame);
    let grace = last_frame_server
        .saturating_add(DAY_TICKS)
        .saturating_add(frame_freq);
    if grace < tick {
        lag = lag.saturating_add(tick - grace);
    }
    lag
}

pub fn lag_days(lag: u32) -> u32 {
    lag / DAY_TICKS
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==== ceiling ====

    #[test]
    fn ceiling_moves_when_reached() {
        let mut clock = FrameClock::new();
        clock.tick = 1;
        assert!(clock.publish(1, 100).frame);
        assert_eq!(clock.ceiling, 2);

        clock.tick = 2;
        assert!(!clock.publish(1, 100).frame);
        assert_eq!(clock.ceiling, 2);

        clock.tick = 3;
        assert!(clock.publish(1, 100).frame);
        assert_eq!(clock.ceiling, 4);
    }

    #[test]
    fn commands_target_past_the_ceiling() {
        let mut clock = FrameClock::new();
        clock.tick = 100;
        clock.ceiling = 105;
        assert_eq!(clock.next_target(), 106);
    }

    #[test]
    fn sync_follows_cadence() {
        let mut clock = FrameClock::new();
        let mut synced = Vec::new();
        for t in 1..=25 {
            clock.tick = t;
            if clock.publish(1, 10).sync {
                synced.push(t);
            }
        }
        assert_eq!(synced, vec![11, 22]);
    }

    // ==== lag ====

    #[test]
    fn fresh_ack_has_no_lag() {
        assert_eq!(lag_ticks(500, 500, 500, 1), 0);
    }

    #[test]
    fn acknowledged_gap_counts() {
        assert_eq!(lag_ticks(500, 380, 500, 1), 120);
        assert_eq!(lag_days(120), 1);
    }

    #[test]
    fn silence_counts_after_grace() {
        // No ack since tick 100; grace ends at 100 + 74 + 1.
        assert_eq!(lag_ticks(175, 100, 100, 1), 0);
        assert_eq!(lag_ticks(176, 100, 100, 1), 1);
        assert_eq!(lag_days(lag_ticks(175 + 4 * DAY_TICKS, 100, 100, 1)), 4);
    }
}
