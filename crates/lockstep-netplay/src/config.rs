use std::path::PathBuf;

use lockstep_proto::constants::{REVISION, SPECTATOR_ROLE};

/// Configuration for joining a lockstep server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Player name to display. The server may append a ` #n` suffix.
    pub name: String,
    /// Simulation role to play, or `SPECTATOR_ROLE`.
    pub role: u8,
    pub unique_id: String,
    /// Must match the server's unless it is the wildcard revision.
    pub revision: String,
    pub language: u8,
    /// Answer to a game password challenge.
    pub game_password: Option<String>,
    /// Answer to a company password challenge.
    pub company_password: Option<String>,
    /// Spool downloaded snapshots here instead of in memory.
    pub spool_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: "Player".into(),
            role: SPECTATOR_ROLE,
            unique_id: String::new(),
            revision: REVISION.into(),
            language: 0,
            game_password: None,
            company_password: None,
            spool_dir: None,
        }
    }
}
