use crate::{
    error::ProtoError,
    messages::Message,
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

/// Publishes the authority's tick and how far participants may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerFrame {
    pub tick: u32,
    pub ceiling: u32,
    /// Present when the authority syncs on every frame.
    pub fingerprint: Option<u32>,
}

impl Message for ServerFrame {
    const ID: MsgId = MsgId::ServerFrame;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u32(self.tick)?;
        packet.put_u32(self.ceiling)?;
        if let Some(fingerprint) = self.fingerprint {
            packet.put_u32(fingerprint)?;
        }
        Ok(())
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        let tick = reader.read_u32()?;
        let ceiling = reader.read_u32()?;
        let fingerprint = if reader.has_remaining() {
            Some(reader.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            tick,
            ceiling,
            fingerprint,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAck {
    /// Last tick the participant executed.
    pub tick: u32,
}

impl Message for ClientAck {
    const ID: MsgId = MsgId::ClientAck;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u32(self.tick)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            tick: reader.read_u32()?,
        })
    }
}

/// Fingerprint the authority sampled at `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSync {
    pub tick: u32,
    pub fingerprint: u32,
}

impl Message for ServerSync {
    const ID: MsgId = MsgId::ServerSync;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u32(self.tick)?;
        packet.put_u32(self.fingerprint)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            tick: reader.read_u32()?,
            fingerprint: reader.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_message, encode_message};

    #[test]
    fn frame_without_fingerprint() {
        let msg = ServerFrame {
            tick: 100,
            ceiling: 101,
            fingerprint: None,
        };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(bytes.len(), 11);
        assert_eq!(decode_message::<ServerFrame>(&bytes).unwrap(), msg);
    }

    #[test]
    fn frame_with_fingerprint() {
        let msg = ServerFrame {
            tick: 7,
            ceiling: 8,
            fingerprint: Some(0xDEAD_BEEF),
        };
        let bytes = encode_message(&msg).unwrap();
        assert_eq!(bytes.len(), 15);
        assert_eq!(decode_message::<ServerFrame>(&bytes).unwrap(), msg);
    }

    #[test]
    fn truncated_ack_is_malformed() {
        let bytes = [5u8, 0, MsgId::ClientAck as u8, 1, 0];
        assert!(matches!(
            decode_message::<ClientAck>(&bytes),
            Err(ProtoError::MalformedPacket(_))
        ));
    }
}
