//! Authority configuration.

use std::net::SocketAddr;
use std::time::Duration;

use lockstep_proto::constants::{REVISION, SPECTATOR_ROLE};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Public name reported in `ServerGameInfo`.
    pub server_name: String,
    /// Clients must report the same revision, or the wildcard one.
    pub revision: String,
    /// Name the authority's own participant shows up as.
    pub host_name: String,
    /// Role the authority plays; `SPECTATOR_ROLE` for a dedicated server.
    pub host_role: u8,
    pub max_clients: usize,
    /// Ticks the ceiling is raised by each time it is reached.
    pub frame_freq: u32,
    /// Ticks between `ServerSync` packets.
    pub sync_freq: u32,
    /// Attach the fingerprint to every `ServerFrame`.
    pub sync_every_frame: bool,
    /// Ticks a PreActive participant may lag before eviction.
    pub max_join_time: u32,
    /// Lag in days above which a warning is logged once.
    pub lag_warn_days: u32,
    /// Lag in days above which an Active participant is evicted.
    pub lag_evict_days: u32,
    /// Scheduled but not yet executed commands allowed per participant.
    pub max_pending_commands: usize,
    pub tick_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3979)),
            server_name: "Lockstep Server".to_string(),
            revision: REVISION.to_string(),
            host_name: "Server".to_string(),
            host_role: SPECTATOR_ROLE,
            max_clients: 10,
            frame_freq: 1,
            sync_freq: 100,
            sync_every_frame: false,
            max_join_time: 500,
            lag_warn_days: 0,
            lag_evict_days: 3,
            max_pending_commands: 32,
            tick_interval: Duration::from_millis(30),
        }
    }
}
