use strum::FromRepr;

use crate::{
    constants::CHAT_LENGTH,
    error::ProtoError,
    messages::Message,
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

/// Who a chat line is addressed to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum ChatDest {
    Broadcast = 0,
    /// `dest` is a participant index.
    Client = 1,
    /// `dest` is a role; everyone playing it receives the line.
    Role = 2,
}

impl ChatDest {
    fn from_wire(value: u8) -> Result<Self, ProtoError> {
        Self::from_repr(value).ok_or(ProtoError::MalformedPacket("unknown chat destination"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientChat {
    pub dest: ChatDest,
    pub dest_id: u16,
    pub message: String,
}

impl Message for ClientChat {
    const ID: MsgId = MsgId::ClientChat;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.dest as u8)?;
        packet.put_u16(self.dest_id)?;
        packet.put_string(&self.message)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            dest: ChatDest::from_wire(reader.read_u8()?)?,
            dest_id: reader.read_u16()?,
            message: reader.read_string(CHAT_LENGTH)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerChat {
    pub dest: ChatDest,
    /// Index of the speaker.
    pub from: u16,
    /// Echo of the receiver's own line.
    pub self_send: bool,
    pub message: String,
}

impl Message for ServerChat {
    const ID: MsgId = MsgId::ServerChat;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.dest as u8)?;
        packet.put_u16(self.from)?;
        packet.put_u8(self.self_send as u8)?;
        packet.put_string(&self.message)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            dest: ChatDest::from_wire(reader.read_u8()?)?,
            from: reader.read_u16()?,
            self_send: reader.read_u8()? != 0,
            message: reader.read_string(CHAT_LENGTH)?,
        })
    }
}
