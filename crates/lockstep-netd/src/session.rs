//! Per-connection session state on the authority.

use std::collections::VecDeque;
use std::fmt;

use lockstep_proto::{constants::SPECTATOR_ROLE, messages::join::PasswordKind};
use lockstep_sim::CommandQueue;

/// Where a connection is in its lifecycle.
///
/// Ordered: `status > Authorized` means "has a place in the game", which is
/// what most broadcasts filter on. Closed connections leave the registry, so
/// there is no closed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServerStatus {
    /// Connected, identity and password not yet accepted.
    Inactive,
    /// Welcomed. May request the snapshot.
    Authorized,
    /// Queued behind another snapshot transfer.
    MapWait,
    /// Receiving the snapshot. At most one connection at a time.
    MapSending,
    /// Snapshot fully sent, waiting for the participant to load it.
    MapDelivered,
    /// Loaded; waiting for the first acknowledgement inside the lag window.
    PreActive,
    /// Running in lockstep.
    Active,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Identity a participant is known by to everyone else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub index: u16,
    pub name: String,
    pub role: u8,
    pub unique_id: String,
}

impl IdentityRecord {
    pub fn is_spectator(&self) -> bool {
        self.role == SPECTATOR_ROLE
    }
}

#[derive(Debug)]
pub struct ServerSession {
    pub status: ServerStatus,
    pub identity: IdentityRecord,
    pub language: u8,
    /// Set once `ClientJoin` was accepted.
    pub joined: bool,
    /// Password the connection still has to answer.
    pub awaiting_password: Option<PasswordKind>,
    /// Last tick the participant acknowledged.
    pub last_frame: u32,
    /// Authority tick when `last_frame` was recorded.
    pub last_frame_server: u32,
    pub lag_warned: bool,
    /// Scheduled commands not yet sent to this participant.
    pub commands: CommandQueue,
    /// Target ticks of commands this participant issued that have not run yet.
    pub pending_targets: VecDeque<u32>,
}

impl ServerSession {
    pub fn new(index: u16) -> Self {
        Self {
            status: ServerStatus::Inactive,
            identity: IdentityRecord {
                index,
                name: String::new(),
                role: SPECTATOR_ROLE,
                unique_id: String::new(),
            },
            language: 0,
            joined: false,
            awaiting_password: None,
            last_frame: 0,
            last_frame_server: 0,
            lag_warned: false,
            commands: CommandQueue::new(),
            pending_targets: VecDeque::new(),
        }
    }

    pub fn in_game(&self) -> bool {
        self.status > ServerStatus::Authorized
    }

    /// Receives frames, syncs and commands.
    pub fn is_live(&self) -> bool {
        self.status >= ServerStatus::PreActive
    }

    /// Mark the snapshot hand-off point for lag accounting.
    pub fn mark_frame(&mut self, tick: u32) {
        self.last_frame = tick;
        self.last_frame_server = tick;
    }

    /// Forget issued commands whose target tick has been reached.
    pub fn prune_pending(&mut self, tick: u32) {
        while self.pending_targets.front().is_some_and(|&t| t <= tick) {
            self.pending_targets.pop_front();
        }
    }
}
