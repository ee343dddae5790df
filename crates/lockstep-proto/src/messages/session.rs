use strum::FromRepr;

use crate::{
    constants::QUIT_REASON_LENGTH,
    error::ProtoError,
    messages::Message,
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

/// Reason carried by `ServerError`, `ClientError` and `ServerErrorQuit`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum ErrorCode {
    General = 0,
    /// Fingerprints diverged at a sync tick.
    Desync = 1,
    /// Snapshot could not be stored, sent or loaded.
    SnapshotFailed = 2,
    /// The transport went away without a goodbye.
    ConnectionLost = 3,
    /// A packet was malformed or not recognised.
    IllegalPacket = 4,
    /// Sent something that requires authorization first.
    NotAuthorized = 5,
    /// Message is not valid in the connection's current state.
    NotExpected = 6,
    WrongRevision = 7,
    NameInUse = 8,
    WrongPassword = 9,
    /// Command issued for a role the connection does not own.
    PlayerMismatch = 10,
    Kicked = 11,
    Cheater = 12,
    Full = 13,
    /// Acknowledgements fell too far behind the authority.
    TimedOut = 14,
    /// A command was refused because the issuer's queue is full.
    CommandQueueFull = 15,
}

impl ErrorCode {
    pub fn from_wire(value: u8) -> Result<Self, ProtoError> {
        Self::from_repr(value).ok_or(ProtoError::UnknownErrorCode(value))
    }

    /// Code reported to bystanders. Joining failures are not their business.
    pub fn for_peers(self) -> Self {
        match self {
            ErrorCode::NotAuthorized | ErrorCode::NotExpected | ErrorCode::WrongRevision => {
                ErrorCode::IllegalPacket
            }
            other => other,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ErrorCode::General => "general error",
            ErrorCode::Desync => "desync detected",
            ErrorCode::SnapshotFailed => "snapshot transfer failed",
            ErrorCode::ConnectionLost => "connection lost",
            ErrorCode::IllegalPacket => "illegal packet",
            ErrorCode::NotAuthorized => "not authorized",
            ErrorCode::NotExpected => "unexpected packet",
            ErrorCode::WrongRevision => "wrong revision",
            ErrorCode::NameInUse => "name already in use",
            ErrorCode::WrongPassword => "wrong password",
            ErrorCode::PlayerMismatch => "wrong role in command",
            ErrorCode::Kicked => "kicked by server",
            ErrorCode::Cheater => "cheating attempt",
            ErrorCode::Full => "server full",
            ErrorCode::TimedOut => "timed out",
            ErrorCode::CommandQueueFull => "command queue full",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerError {
    pub code: ErrorCode,
}

impl Message for ServerError {
    const ID: MsgId = MsgId::ServerError;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.code as u8)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            code: ErrorCode::from_wire(reader.read_u8()?)?,
        })
    }
}

/// The participant hit an error and is leaving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientError {
    pub code: ErrorCode,
}

impl Message for ClientError {
    const ID: MsgId = MsgId::ClientError;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.code as u8)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            code: ErrorCode::from_wire(reader.read_u8()?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientQuit {
    pub reason: String,
}

impl Message for ClientQuit {
    const ID: MsgId = MsgId::ClientQuit;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_string(&self.reason)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            reason: reader.read_string(QUIT_REASON_LENGTH)?,
        })
    }
}

/// A participant left voluntarily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerQuit {
    pub index: u16,
    pub reason: String,
}

impl Message for ServerQuit {
    const ID: MsgId = MsgId::ServerQuit;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u16(self.index)?;
        packet.put_string(&self.reason)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            index: reader.read_u16()?,
            reason: reader.read_string(QUIT_REASON_LENGTH)?,
        })
    }
}

/// A participant was dropped because of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerErrorQuit {
    pub index: u16,
    pub code: ErrorCode,
}

impl Message for ServerErrorQuit {
    const ID: MsgId = MsgId::ServerErrorQuit;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u16(self.index)?;
        packet.put_u8(self.code as u8)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            index: reader.read_u16()?,
            code: ErrorCode::from_wire(reader.read_u8()?)?,
        })
    }
}

empty_message!(
    /// Sent instead of a welcome when no slot is free.
    ServerFull
);
empty_message!(ServerBanned);
empty_message!(ServerShutdown);
empty_message!(
    /// The authority is replacing the simulation; reconnect to follow it.
    ServerNewGame
);
