use crate::{
    codec::{decode_message, encode_message},
    constants::COMMAND_TEXT_LENGTH,
    error::ProtoError,
    messages::{Message, session::ErrorCode},
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

/// Operation and parameters of one state-mutating command.
///
/// The meaning of `op` and the parameters belongs to the simulation; the
/// protocol only moves them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CommandBody {
    /// Role the command acts for.
    pub issuer: u8,
    pub op: u32,
    pub p1: u32,
    pub p2: u32,
    pub tile: u32,
    pub text: String,
}

impl CommandBody {
    /// The body exactly as every receiver decodes it, text cut to the wire
    /// limit. Fails when the body cannot be put on the wire at all.
    pub fn wire_form(&self) -> Result<Self, ProtoError> {
        let frame = encode_message(&ServerCommand {
            body: self.clone(),
            callback: 0,
            tick: 0,
        })?;
        Ok(decode_message::<ServerCommand>(&frame)?.body)
    }

    fn encode(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.issuer)?;
        packet.put_u32(self.op)?;
        packet.put_u32(self.p1)?;
        packet.put_u32(self.p2)?;
        packet.put_u32(self.tile)?;
        packet.put_string(&self.text)
    }

    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            issuer: reader.read_u8()?,
            op: reader.read_u32()?,
            p1: reader.read_u32()?,
            p2: reader.read_u32()?,
            tile: reader.read_u32()?,
            text: reader.read_string(COMMAND_TEXT_LENGTH)?,
        })
    }
}

/// A participant asks the authority to schedule a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCommand {
    pub body: CommandBody,
    pub callback: u8,
}

impl Message for ClientCommand {
    const ID: MsgId = MsgId::ClientCommand;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        self.body.encode(packet)?;
        packet.put_u8(self.callback)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            body: CommandBody::decode(reader)?,
            callback: reader.read_u8()?,
        })
    }
}

/// A scheduled command with its execution tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub body: CommandBody,
    /// Non-zero only on the copy echoed to the issuer.
    pub callback: u8,
    pub tick: u32,
}

impl Message for ServerCommand {
    const ID: MsgId = MsgId::ServerCommand;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        self.body.encode(packet)?;
        packet.put_u8(self.callback)?;
        packet.put_u32(self.tick)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            body: CommandBody::decode(reader)?,
            callback: reader.read_u8()?,
            tick: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCommandRejected {
    pub callback: u8,
    pub code: ErrorCode,
}

impl Message for ServerCommandRejected {
    const ID: MsgId = MsgId::ServerCommandRejected;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.callback)?;
        packet.put_u8(self.code as u8)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            callback: reader.read_u8()?,
            code: ErrorCode::from_wire(reader.read_u8()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_message, encode_message};

    fn body() -> CommandBody {
        CommandBody {
            issuer: 1,
            op: 0x10,
            p1: 2,
            p2: 3,
            tile: 0xFFFF_0000,
            text: "depot".into(),
        }
    }

    #[test]
    fn server_command_carries_tick_after_callback() {
        let msg = ServerCommand {
            body: body(),
            callback: 4,
            tick: 106,
        };
        let bytes = encode_message(&msg).unwrap();
        let n = bytes.len();
        assert_eq!(bytes[n - 5], 4);
        assert_eq!(&bytes[n - 4..], &106u32.to_le_bytes());
        assert_eq!(decode_message::<ServerCommand>(&bytes).unwrap(), msg);
    }

    #[test]
    fn long_text_does_not_shift_callback() {
        let mut b = body();
        b.text = "t".repeat(COMMAND_TEXT_LENGTH * 2);
        let msg = ClientCommand {
            body: b,
            callback: 9,
        };
        let decoded: ClientCommand = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert_eq!(decoded.callback, 9);
        assert_eq!(decoded.body.text.len(), COMMAND_TEXT_LENGTH - 1);
    }
}
