//! Handler error types for unified error responses.

use lockstep_proto::{ProtoError, messages::session::ErrorCode};

/// Error returned by handlers. The dispatcher sends `ServerError(code)` and
/// closes the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerError {
    pub code: ErrorCode,
}

impl HandlerError {
    pub fn illegal_packet() -> Self {
        Self {
            code: ErrorCode::IllegalPacket,
        }
    }

    pub fn not_authorized() -> Self {
        Self {
            code: ErrorCode::NotAuthorized,
        }
    }

    pub fn not_expected() -> Self {
        Self {
            code: ErrorCode::NotExpected,
        }
    }

    pub fn wrong_revision() -> Self {
        Self {
            code: ErrorCode::WrongRevision,
        }
    }

    pub fn name_in_use() -> Self {
        Self {
            code: ErrorCode::NameInUse,
        }
    }

    pub fn wrong_password() -> Self {
        Self {
            code: ErrorCode::WrongPassword,
        }
    }

    pub fn player_mismatch() -> Self {
        Self {
            code: ErrorCode::PlayerMismatch,
        }
    }

    pub fn kicked() -> Self {
        Self {
            code: ErrorCode::Kicked,
        }
    }

    pub fn snapshot_failed() -> Self {
        Self {
            code: ErrorCode::SnapshotFailed,
        }
    }
}

impl From<ProtoError> for HandlerError {
    fn from(_: ProtoError) -> Self {
        Self::illegal_packet()
    }
}

/// Convenient Result type for handlers.
pub type HandlerResult = Result<(), HandlerError>;
