use bytes::Bytes;

use crate::{
    error::ProtoError,
    messages::Message,
    packet::{Packet, PacketReader},
};

/// Encode a message into a finished, size-prefixed packet.
///
/// # Example
/// ```ignore
/// use lockstep_proto::codec::encode_message;
/// use lockstep_proto::messages::frame::ClientAck;
///
/// let bytes = encode_message(&ClientAck { tick: 10 })?;
/// ```
pub fn encode_message<T: Message>(msg: &T) -> Result<Bytes, ProtoError> {
    Ok(encode_packet(msg)?.finish())
}

/// Encode a message but leave the packet open for inspection.
pub fn encode_packet<T: Message>(msg: &T) -> Result<Packet, ProtoError> {
    let mut packet = Packet::new(T::ID);
    msg.encode_body(&mut packet)?;
    Ok(packet)
}

/// Decode one whole packet as `T`.
///
/// The packet's type byte must be `T::ID`.
pub fn decode_message<T: Message>(frame: &[u8]) -> Result<T, ProtoError> {
    let mut reader = PacketReader::new(frame)?;
    read_message(&mut reader)
}

/// Decode the body from a reader that has already been positioned past the header.
pub fn read_message<T: Message>(reader: &mut PacketReader<'_>) -> Result<T, ProtoError> {
    if reader.msg_type() != T::ID as u8 {
        return Err(ProtoError::MalformedPacket("message type does not match"));
    }
    T::decode_body(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        messages::frame::{ClientAck, ServerSync},
        msg_id::MsgId,
    };

    #[test]
    fn encode_then_decode_same_type() {
        let bytes = encode_message(&ClientAck { tick: 99 }).unwrap();
        assert_eq!(bytes[2], MsgId::ClientAck as u8);
        assert_eq!(decode_message::<ClientAck>(&bytes).unwrap().tick, 99);
    }

    #[test]
    fn decode_as_wrong_type_fails() {
        let bytes = encode_message(&ClientAck { tick: 99 }).unwrap();
        assert!(decode_message::<ServerSync>(&bytes).is_err());
    }
}
