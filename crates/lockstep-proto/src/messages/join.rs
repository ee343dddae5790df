use strum::FromRepr;

use crate::{
    constants::{NAME_LENGTH, PASSWORD_LENGTH, REVISION_LENGTH, UNIQUE_ID_LENGTH},
    error::ProtoError,
    messages::Message,
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

empty_message!(
    /// Ask for the server's public description without joining.
    ClientGameInfo
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGameInfo {
    pub server_name: String,
    pub revision: String,
    pub clients_on: u8,
    pub max_clients: u8,
    pub use_password: bool,
    pub tick: u32,
}

impl Message for ServerGameInfo {
    const ID: MsgId = MsgId::ServerGameInfo;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_string(&self.server_name)?;
        packet.put_string(&self.revision)?;
        packet.put_u8(self.clients_on)?;
        packet.put_u8(self.max_clients)?;
        packet.put_u8(self.use_password as u8)?;
        packet.put_u32(self.tick)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            server_name: reader.read_string(NAME_LENGTH)?,
            revision: reader.read_string(REVISION_LENGTH)?,
            clients_on: reader.read_u8()?,
            max_clients: reader.read_u8()?,
            use_password: reader.read_u8()? != 0,
            tick: reader.read_u32()?,
        })
    }
}

/// First packet of a joining participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientJoin {
    pub revision: String,
    pub name: String,
    /// Requested simulation role, or `SPECTATOR_ROLE`.
    pub role: u8,
    pub language: u8,
    /// Long-lived token used to recognise the participant across reconnects.
    pub unique_id: String,
}

impl Message for ClientJoin {
    const ID: MsgId = MsgId::ClientJoin;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_string(&self.revision)?;
        packet.put_string(&self.name)?;
        packet.put_u8(self.role)?;
        packet.put_u8(self.language)?;
        packet.put_string(&self.unique_id)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            revision: reader.read_string(REVISION_LENGTH)?,
            name: reader.read_string(NAME_LENGTH)?,
            role: reader.read_u8()?,
            language: reader.read_u8()?,
            unique_id: reader.read_string(UNIQUE_ID_LENGTH)?,
        })
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum PasswordKind {
    Game = 0,
    Company = 1,
}

impl PasswordKind {
    pub fn from_wire(value: u8) -> Result<Self, ProtoError> {
        Self::from_repr(value).ok_or(ProtoError::UnknownPasswordKind(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerNeedPassword {
    pub kind: PasswordKind,
}

impl Message for ServerNeedPassword {
    const ID: MsgId = MsgId::ServerNeedPassword;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.kind as u8)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            kind: PasswordKind::from_wire(reader.read_u8()?)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPassword {
    pub kind: PasswordKind,
    pub password: String,
}

impl Message for ClientPassword {
    const ID: MsgId = MsgId::ClientPassword;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.kind as u8)?;
        packet.put_string(&self.password)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            kind: PasswordKind::from_wire(reader.read_u8()?)?,
            password: reader.read_string(PASSWORD_LENGTH)?,
        })
    }
}

/// Change the sender's display name after joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSetName {
    pub name: String,
}

impl Message for ClientSetName {
    const ID: MsgId = MsgId::ClientSetName;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_string(&self.name)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            name: reader.read_string(NAME_LENGTH)?,
        })
    }
}

/// Replace the password of the sender's role. Empty clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSetPassword {
    pub password: String,
}

impl Message for ClientSetPassword {
    const ID: MsgId = MsgId::ClientSetPassword;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_string(&self.password)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            password: reader.read_string(PASSWORD_LENGTH)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerWelcome {
    /// Identity assigned to the receiving participant.
    pub index: u16,
}

impl Message for ServerWelcome {
    const ID: MsgId = MsgId::ServerWelcome;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u16(self.index)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            index: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerClientInfo {
    pub index: u16,
    pub role: u8,
    pub name: String,
    pub unique_id: String,
}

impl Message for ServerClientInfo {
    const ID: MsgId = MsgId::ServerClientInfo;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u16(self.index)?;
        packet.put_u8(self.role)?;
        packet.put_string(&self.name)?;
        packet.put_string(&self.unique_id)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            index: reader.read_u16()?,
            role: reader.read_u8()?,
            name: reader.read_string(NAME_LENGTH)?,
            unique_id: reader.read_string(UNIQUE_ID_LENGTH)?,
        })
    }
}

/// A participant finished loading and entered the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerJoin {
    pub index: u16,
}

impl Message for ServerJoin {
    const ID: MsgId = MsgId::ServerJoin;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u16(self.index)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            index: reader.read_u16()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_message, encode_message};

    #[test]
    fn join_wire_layout() {
        let msg = ClientJoin {
            revision: "r1".into(),
            name: "ann".into(),
            role: 2,
            language: 0,
            unique_id: "u".into(),
        };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(
            &bytes[..],
            &[14, 0, MsgId::ClientJoin as u8, b'r', b'1', 0, b'a', b'n', b'n', 0, 2, 0, b'u', 0]
        );
        assert_eq!(decode_message::<ClientJoin>(&bytes).unwrap(), msg);
    }

    #[test]
    fn oversized_name_truncates_but_role_survives() {
        let msg = ClientJoin {
            revision: "r1".into(),
            name: "n".repeat(200),
            role: 7,
            language: 3,
            unique_id: "id".into(),
        };
        let decoded: ClientJoin = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert_eq!(decoded.name.len(), NAME_LENGTH - 1);
        assert_eq!(decoded.role, 7);
        assert_eq!(decoded.language, 3);
        assert_eq!(decoded.unique_id, "id");
    }

    #[test]
    fn password_kind_validated() {
        let bytes = [4u8, 0, MsgId::ServerNeedPassword as u8, 9];
        assert_eq!(
            decode_message::<ServerNeedPassword>(&bytes),
            Err(ProtoError::UnknownPasswordKind(9))
        );
    }

    #[test]
    fn set_password_is_cut_to_the_password_limit() {
        let bytes = encode_message(&ClientSetPassword {
            password: "p".repeat(40),
        })
        .unwrap();
        assert_eq!(bytes[2], 32);
        let decoded: ClientSetPassword = decode_message(&bytes).unwrap();
        assert_eq!(decoded.password.len(), PASSWORD_LENGTH - 1);

        let bytes = encode_message(&ClientSetName { name: "Ann".into() }).unwrap();
        assert_eq!(&bytes[..], &[7, 0, MsgId::ClientSetName as u8, b'A', b'n', b'n', 0]);
    }

    #[test]
    fn game_info_survives_encoding() {
        let msg = ServerGameInfo {
            server_name: "lan".into(),
            revision: "0.4".into(),
            clients_on: 3,
            max_clients: 10,
            use_password: true,
            tick: 12_345,
        };
        assert_eq!(
            decode_message::<ServerGameInfo>(&encode_message(&msg).unwrap()).unwrap(),
            msg
        );
    }
}
