use bytes::{Bytes, BytesMut};

use crate::{
    constants::{LEN_PREFIX, PACKET_HEADER_LEN, SEND_MTU},
    error::ProtoError,
};

/// Inbound reassembly buffer:
/// - keeps the bytes read so far across reads
/// - splits off one whole packet once its declared size has arrived
/// - rejects declared sizes outside `PACKET_HEADER_LEN..=SEND_MTU`
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
}

impl Framer {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(initial_capacity),
        }
    }

    /// Mutable access to the receive buffer for socket reads.
    pub fn buf_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still missing before the front packet is complete.
    ///
    /// While the prefix itself is incomplete this is the missing prefix length.
    pub fn missing(&self) -> usize {
        if self.buf.len() < LEN_PREFIX {
            return LEN_PREFIX - self.buf.len();
        }
        let declared = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
        declared.saturating_sub(self.buf.len())
    }

    /// Split off the next complete packet (prefix included), if there is one.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtoError> {
        if self.buf.len() < LEN_PREFIX {
            return Ok(None);
        }
        let declared = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
        if declared > SEND_MTU {
            return Err(ProtoError::Oversized(declared));
        }
        if declared < PACKET_HEADER_LEN {
            return Err(ProtoError::Undersized(declared));
        }
        if self.buf.len() < declared {
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(declared).freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::Framer;
    use crate::{
        codec::encode_message, error::ProtoError, messages::frame::ClientAck, msg_id::MsgId,
    };

    #[test]
    fn framer_can_decode_one_frame() {
        let mut framer = Framer::new(64);
        let bytes = encode_message(&ClientAck { tick: 5 }).unwrap();
        framer.buf_mut().extend_from_slice(&bytes);

        let frame = framer.next_frame().unwrap().unwrap();
        assert_eq!(frame[2], MsgId::ClientAck as u8);
        assert_eq!(framer.buffered(), 0);
        assert!(framer.next_frame().unwrap().is_none());
    }

    #[test]
    fn framer_waits_for_split_packet() {
        let mut framer = Framer::new(64);
        let bytes = encode_message(&ClientAck { tick: 5 }).unwrap();

        framer.buf_mut().extend_from_slice(&bytes[..1]);
        assert!(framer.next_frame().unwrap().is_none());
        assert_eq!(framer.missing(), 1);

        framer.buf_mut().extend_from_slice(&bytes[1..4]);
        assert!(framer.next_frame().unwrap().is_none());
        assert_eq!(framer.missing(), 3);

        framer.buf_mut().extend_from_slice(&bytes[4..]);
        assert_eq!(framer.next_frame().unwrap().unwrap(), bytes);
    }

    #[test]
    fn framer_splits_back_to_back_packets() {
        let mut framer = Framer::new(64);
        let a = encode_message(&ClientAck { tick: 1 }).unwrap();
        let b = encode_message(&ClientAck { tick: 2 }).unwrap();
        framer.buf_mut().extend_from_slice(&a);
        framer.buf_mut().extend_from_slice(&b[..3]);

        assert_eq!(framer.next_frame().unwrap().unwrap(), a);
        assert!(framer.next_frame().unwrap().is_none());
        framer.buf_mut().extend_from_slice(&b[3..]);
        assert_eq!(framer.next_frame().unwrap().unwrap(), b);
    }

    #[test]
    fn framer_rejects_oversized_declaration() {
        let mut framer = Framer::new(64);
        framer.buf_mut().extend_from_slice(&2000u16.to_le_bytes());
        assert_eq!(framer.next_frame(), Err(ProtoError::Oversized(2000)));
    }

    #[test]
    fn framer_rejects_header_only_prefix() {
        let mut framer = Framer::new(64);
        framer.buf_mut().extend_from_slice(&[2, 0]);
        assert_eq!(framer.next_frame(), Err(ProtoError::Undersized(2)));
    }
}
