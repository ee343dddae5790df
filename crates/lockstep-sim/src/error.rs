use lockstep_proto::{ProtoError, messages::session::ErrorCode, transport::TransportError};
use thiserror::Error;

/// Failure taxonomy shared by the authority and the participants.
///
/// Every variant is contained at the connection boundary: it ends at most one
/// session and never another participant's simulation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed or out-of-sequence traffic from the peer.
    #[error("protocol violation ({code}): {reason}")]
    ProtocolViolation { code: ErrorCode, reason: String },
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),
    /// Fingerprints differ at a sync tick. Not recoverable in place.
    #[error("desync at tick {tick}: expected {expected:#010x}, local {actual:#010x}")]
    DesyncDetected { tick: u32, expected: u32, actual: u32 },
    #[error("snapshot failure: {0}")]
    SnapshotFailure(String),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(&'static str),
    #[error("lagging {days} days behind")]
    TimedOut { days: u32 },
    /// A command outlived its target tick in a queue; a scheduling bug.
    #[error("command for tick {target} still queued at tick {tick}")]
    StaleCommand { target: u32, tick: u32 },
}

impl SyncError {
    pub fn protocol(code: ErrorCode, reason: impl Into<String>) -> Self {
        SyncError::ProtocolViolation {
            code,
            reason: reason.into(),
        }
    }

    /// Code sent across the wire when this error closes a session.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SyncError::ProtocolViolation { code, .. } => *code,
            SyncError::TransportFailure(_) => ErrorCode::ConnectionLost,
            SyncError::DesyncDetected { .. } => ErrorCode::Desync,
            SyncError::SnapshotFailure(_) => ErrorCode::SnapshotFailed,
            SyncError::CapacityExceeded(_) => ErrorCode::Full,
            SyncError::TimedOut { .. } => ErrorCode::TimedOut,
            SyncError::StaleCommand { .. } => ErrorCode::General,
        }
    }
}

impl From<ProtoError> for SyncError {
    fn from(err: ProtoError) -> Self {
        SyncError::protocol(ErrorCode::IllegalPacket, err.to_string())
    }
}
