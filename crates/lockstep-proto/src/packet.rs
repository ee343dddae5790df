use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    constants::{LEN_PREFIX, PACKET_HEADER_LEN, SEND_MTU},
    error::ProtoError,
    msg_id::MsgId,
};

/// Outbound packet under construction.
///
/// Layout: `[u16 total_size_le][u8 msg_type][payload]`. The size prefix is
/// patched in [`Packet::finish`]; after that the bytes are frozen and can be
/// queued on a connection.
#[derive(Debug, Clone)]
pub struct Packet {
    msg_id: MsgId,
    buf: BytesMut,
}

impl Packet {
    pub fn new(msg_id: MsgId) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u16_le(0);
        buf.put_u8(msg_id as u8);
        Self { msg_id, buf }
    }

    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }

    /// Current size including prefix and type byte.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == PACKET_HEADER_LEN
    }

    /// Bytes that can still be appended before hitting `SEND_MTU`.
    pub fn remaining(&self) -> usize {
        SEND_MTU.saturating_sub(self.buf.len())
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtoError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(ProtoError::BufferOverflow { needed, remaining });
        }
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), ProtoError> {
        self.ensure(1)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), ProtoError> {
        self.ensure(2)?;
        self.buf.put_u16_le(value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), ProtoError> {
        self.ensure(4)?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<(), ProtoError> {
        self.ensure(8)?;
        self.buf.put_u64_le(value);
        Ok(())
    }

    /// Appends the UTF-8 bytes of `text` followed by one NUL. No length prefix.
    pub fn put_string(&mut self, text: &str) -> Result<(), ProtoError> {
        if text.as_bytes().contains(&0) {
            return Err(ProtoError::InteriorNul);
        }
        self.ensure(text.len() + 1)?;
        self.buf.put_slice(text.as_bytes());
        self.buf.put_u8(0);
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtoError> {
        self.ensure(bytes.len())?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Copies as much of `src` as still fits and returns the number of bytes taken.
    pub fn fill_from(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.remaining());
        self.buf.put_slice(&src[..n]);
        n
    }

    /// Writes the size prefix and freezes the packet.
    pub fn finish(mut self) -> Bytes {
        // `ensure` keeps the buffer within SEND_MTU, which fits a u16.
        let size = self.buf.len() as u16;
        self.buf[..LEN_PREFIX].copy_from_slice(&size.to_le_bytes());
        self.buf.freeze()
    }
}

/// Cursor over one received packet.
///
/// Every read is bounds-checked against the declared size. A failed read
/// returns `MalformedPacket` and latches [`PacketReader::is_malformed`], which
/// the owning connection treats as a reason to close.
#[derive(Debug)]
pub struct PacketReader<'a> {
    frame: &'a [u8],
    pos: usize,
    malformed: bool,
}

impl<'a> PacketReader<'a> {
    /// `frame` must hold exactly one packet, prefix included.
    pub fn new(frame: &'a [u8]) -> Result<Self, ProtoError> {
        if frame.len() < PACKET_HEADER_LEN {
            return Err(ProtoError::Undersized(frame.len()));
        }
        let declared = u16::from_le_bytes([frame[0], frame[1]]) as usize;
        if declared != frame.len() {
            return Err(ProtoError::MalformedPacket(
                "declared size does not match frame length",
            ));
        }
        Ok(Self {
            frame,
            pos: PACKET_HEADER_LEN,
            malformed: false,
        })
    }

    pub fn msg_type(&self) -> u8 {
        self.frame[LEN_PREFIX]
    }

    pub fn msg_id(&self) -> Result<MsgId, ProtoError> {
        MsgId::from_repr(self.msg_type()).ok_or(ProtoError::UnknownMsgId(self.msg_type()))
    }

    /// Declared packet size.
    pub fn size(&self) -> usize {
        self.frame.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.frame.len() - self.pos
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.frame.len()
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtoError> {
        match self.frame.get(self.pos..self.pos + n) {
            Some(slice) => {
                self.pos += n;
                Ok(slice)
            }
            None => {
                self.malformed = true;
                Err(ProtoError::MalformedPacket(
                    "field exceeds declared packet size",
                ))
            }
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtoError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtoError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtoError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtoError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtoError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Reads a NUL-terminated string, keeping at most `max_len - 1` bytes.
    /// Truncation never splits a character; bytes that are not UTF-8 fail
    /// the read.
    ///
    /// The cursor always ends up just past the field's terminator (or at the
    /// end of the packet when there is none), no matter how many bytes were
    /// kept. Two readers with different `max_len` therefore agree on where
    /// every following field starts.
    pub fn read_string(&mut self, max_len: usize) -> Result<String, ProtoError> {
        if !self.has_remaining() {
            self.malformed = true;
            return Err(ProtoError::MalformedPacket("string field missing"));
        }
        let rest = &self.frame[self.pos..];
        let terminator = rest.iter().position(|&b| b == 0);
        let field_len = terminator.unwrap_or(rest.len());
        let kept = field_len.min(max_len.saturating_sub(1));
        let text = match std::str::from_utf8(&rest[..kept]) {
            Ok(text) => text.to_owned(),
            // The cut landed inside a multi-byte character: drop its head.
            Err(err) if kept < field_len && err.error_len().is_none() => {
                String::from_utf8_lossy(&rest[..err.valid_up_to()]).into_owned()
            }
            Err(_) => {
                self.malformed = true;
                return Err(ProtoError::MalformedPacket("string is not UTF-8"));
            }
        };

        self.pos += match terminator {
            Some(nul) => nul + 1,
            None => rest.len(),
        };
        Ok(text)
    }

    /// Consumes everything up to the declared end.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.frame[self.pos..];
        self.pos = self.frame.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_for(packet: Packet) -> (Bytes, usize) {
        let len = packet.len();
        (packet.finish(), len)
    }

    #[test]
    fn prefix_counts_itself_and_type_byte() {
        let mut p = Packet::new(MsgId::ClientAck);
        p.put_u32(0x0403_0201).unwrap();
        let bytes = p.finish();

        assert_eq!(bytes.len(), 7);
        assert_eq!(&bytes[..], &[7, 0, MsgId::ClientAck as u8, 1, 2, 3, 4]);
    }

    #[test]
    fn integers_are_little_endian() {
        let mut p = Packet::new(MsgId::ServerFrame);
        p.put_u16(0xBEEF).unwrap();
        p.put_u64(0x0102_0304_0506_0708).unwrap();
        let bytes = p.finish();

        assert_eq!(&bytes[3..5], &[0xEF, 0xBE]);
        assert_eq!(&bytes[5..13], &[8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn strings_are_nul_terminated_without_prefix() {
        let mut p = Packet::new(MsgId::ClientQuit);
        p.put_string("bye").unwrap();
        let bytes = p.finish();
        assert_eq!(&bytes[3..], b"bye\0");
    }

    #[test]
    fn overflow_is_reported_not_truncated() {
        let mut p = Packet::new(MsgId::ServerSnapshotData);
        let filler = vec![0xAA; SEND_MTU - PACKET_HEADER_LEN - 2];
        p.put_bytes(&filler).unwrap();
        p.put_u16(1).unwrap();
        assert_eq!(p.remaining(), 0);

        let err = p.put_u8(1).unwrap_err();
        assert_eq!(
            err,
            ProtoError::BufferOverflow {
                needed: 1,
                remaining: 0
            }
        );
        assert!(p.put_string("").is_err());
    }

    #[test]
    fn interior_nul_rejected() {
        let mut p = Packet::new(MsgId::ClientChat);
        assert_eq!(p.put_string("a\0b"), Err(ProtoError::InteriorNul));
    }

    #[test]
    fn fill_from_stops_at_mtu() {
        let mut p = Packet::new(MsgId::ServerSnapshotData);
        let src = vec![1u8; 4000];
        let taken = p.fill_from(&src);
        assert_eq!(taken, SEND_MTU - PACKET_HEADER_LEN);
        assert_eq!(p.finish().len(), SEND_MTU);
    }

    #[test]
    fn read_back_all_widths() {
        let mut p = Packet::new(MsgId::ServerSync);
        p.put_u8(u8::MAX).unwrap();
        p.put_u16(0).unwrap();
        p.put_u32(u32::MAX).unwrap();
        p.put_u64(42).unwrap();
        p.put_string("").unwrap();
        let (bytes, _) = reader_for(p);

        let mut r = PacketReader::new(&bytes).unwrap();
        assert_eq!(r.msg_id().unwrap(), MsgId::ServerSync);
        assert_eq!(r.read_u8().unwrap(), u8::MAX);
        assert_eq!(r.read_u16().unwrap(), 0);
        assert_eq!(r.read_u32().unwrap(), u32::MAX);
        assert_eq!(r.read_u64().unwrap(), 42);
        assert_eq!(r.read_string(8).unwrap(), "");
        assert!(!r.has_remaining());
        assert!(!r.is_malformed());
    }

    #[test]
    fn read_past_declared_size_is_malformed() {
        let mut p = Packet::new(MsgId::ClientAck);
        p.put_u16(7).unwrap();
        let (bytes, _) = reader_for(p);

        let mut r = PacketReader::new(&bytes).unwrap();
        assert!(matches!(
            r.read_u32(),
            Err(ProtoError::MalformedPacket(_))
        ));
        assert!(r.is_malformed());
        // Cursor untouched by the failed read.
        assert_eq!(r.position(), PACKET_HEADER_LEN);
    }

    #[test]
    fn declared_size_must_match_frame() {
        let bytes = [9u8, 0, MsgId::ClientAck as u8, 0, 0, 0, 0];
        assert!(matches!(
            PacketReader::new(&bytes),
            Err(ProtoError::MalformedPacket(_))
        ));
        assert_eq!(
            PacketReader::new(&[3, 0]).unwrap_err(),
            ProtoError::Undersized(2)
        );
    }

    #[test]
    fn truncated_string_keeps_cursor_aligned() {
        let mut p = Packet::new(MsgId::ClientJoin);
        p.put_string("a-rather-long-player-name").unwrap();
        p.put_u8(3).unwrap();
        let (bytes, _) = reader_for(p);

        let mut short = PacketReader::new(&bytes).unwrap();
        assert_eq!(short.read_string(5).unwrap(), "a-ra");
        assert_eq!(short.read_u8().unwrap(), 3);

        let mut long = PacketReader::new(&bytes).unwrap();
        assert_eq!(long.read_string(80).unwrap(), "a-rather-long-player-name");
        assert_eq!(long.read_u8().unwrap(), 3);
    }

    #[test]
    fn truncation_stops_at_a_character_boundary() {
        let mut p = Packet::new(MsgId::ClientChat);
        p.put_string(&"é".repeat(10)).unwrap();
        p.put_u8(7).unwrap();
        let (bytes, _) = reader_for(p);

        let mut r = PacketReader::new(&bytes).unwrap();
        let text = r.read_string(6).unwrap();
        assert_eq!(text, "éé");
        assert!(text.len() <= 5);
        assert_eq!(r.read_u8().unwrap(), 7);
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let mut p = Packet::new(MsgId::ClientChat);
        p.put_bytes(&[b'o', 0xFF, b'k', 0]).unwrap();
        let (bytes, _) = reader_for(p);

        let mut r = PacketReader::new(&bytes).unwrap();
        assert!(matches!(
            r.read_string(80),
            Err(ProtoError::MalformedPacket(_))
        ));
        assert!(r.is_malformed());
    }

    #[test]
    fn unterminated_string_runs_to_end() {
        let mut p = Packet::new(MsgId::ClientQuit);
        p.put_bytes(b"abc").unwrap();
        let (bytes, _) = reader_for(p);

        let mut r = PacketReader::new(&bytes).unwrap();
        assert_eq!(r.read_string(100).unwrap(), "abc");
        assert!(!r.has_remaining());
        assert!(r.read_string(100).is_err());
        assert!(r.is_malformed());
    }
}
