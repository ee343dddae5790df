//! Netplay error types.

use lockstep_proto::{ProtoError, messages::session::ErrorCode, transport::TransportError};
use lockstep_sim::SyncError;
use thiserror::Error;

use crate::session::ClientStatus;

#[derive(Error, Debug)]
pub enum NetplayError {
    #[error("not connected to server")]
    NotConnected,

    #[error("cannot {action} while {status}")]
    InvalidState {
        action: &'static str,
        status: ClientStatus,
    },

    #[error("server is full")]
    ServerFull,

    #[error("banned from server")]
    Banned,

    #[error("server refused the session: {0}")]
    Refused(ErrorCode),

    #[error("connection lost: {0}")]
    ConnectionLost(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel send error")]
    ChannelSend,
}

impl NetplayError {
    /// Code reported to the server when this error ends the session.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            NetplayError::Sync(err) => err.error_code(),
            NetplayError::Protocol(_) => ErrorCode::IllegalPacket,
            NetplayError::Io(_) => ErrorCode::SnapshotFailed,
            NetplayError::InvalidState { .. } => ErrorCode::NotExpected,
            NetplayError::Refused(code) => *code,
            NetplayError::ServerFull => ErrorCode::Full,
            NetplayError::Banned => ErrorCode::Kicked,
            NetplayError::NotConnected
            | NetplayError::ConnectionLost(_)
            | NetplayError::ChannelSend => ErrorCode::ConnectionLost,
        }
    }
}
