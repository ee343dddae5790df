use std::fmt;

/// Participant-side session state machine.
///
/// Mirrors the authority's view of this connection, one step behind: the
/// participant learns about each transition from the packet that causes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ClientStatus {
    /// Connected, nothing asked yet; also where a failed or closed session ends.
    #[default]
    Inactive,
    /// Game info requested, connection kept open.
    RequestingInfo,
    /// Join sent, waiting for a welcome or a password challenge.
    Joining,
    /// The server asked for a password the config does not have.
    AwaitingPassword,
    /// Welcomed; the snapshot has been requested.
    Authorized,
    /// Snapshot stream in progress.
    ReceivingMap,
    /// Snapshot restored and acknowledged.
    Loaded,
    /// Announced to the other participants; catching up.
    PreActive,
    /// In sync with the authority.
    Active,
}

impl ClientStatus {
    /// True once a simulation exists locally.
    pub fn has_world(self) -> bool {
        self >= ClientStatus::Loaded
    }
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClientStatus::Inactive => "inactive",
            ClientStatus::RequestingInfo => "requesting info",
            ClientStatus::Joining => "joining",
            ClientStatus::AwaitingPassword => "awaiting password",
            ClientStatus::Authorized => "authorized",
            ClientStatus::ReceivingMap => "receiving map",
            ClientStatus::Loaded => "loaded",
            ClientStatus::PreActive => "pre-active",
            ClientStatus::Active => "active",
        };
        f.write_str(name)
    }
}

/// Another participant as announced by `ServerClientInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub index: u16,
    pub role: u8,
    pub name: String,
    pub unique_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_exists_from_loaded_on() {
        assert!(!ClientStatus::ReceivingMap.has_world());
        assert!(ClientStatus::Loaded.has_world());
        assert!(ClientStatus::Active.has_world());
    }
}
