use crate::{
    error::ProtoError,
    messages::Message,
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

empty_message!(ClientGetSnapshot);
empty_message!(
    /// Destination finished loading the snapshot.
    ClientSnapshotOk
);

/// Another connection holds the snapshot; `waiting` connections are queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerWait {
    pub waiting: u8,
}

impl Message for ServerWait {
    const ID: MsgId = MsgId::ServerWait;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u8(self.waiting)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            waiting: reader.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerSnapshotBegin {
    /// Tick the snapshot was captured at.
    pub tick: u32,
    pub total_size: u32,
}

impl Message for ServerSnapshotBegin {
    const ID: MsgId = MsgId::ServerSnapshotBegin;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_u32(self.tick)?;
        packet.put_u32(self.total_size)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            tick: reader.read_u32()?,
            total_size: reader.read_u32()?,
        })
    }
}

/// Raw snapshot bytes; the chunk runs to the end of the packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSnapshotData {
    pub chunk: Vec<u8>,
}

impl ServerSnapshotData {
    /// Builds a data packet holding as much of `src` as fits.
    ///
    /// Returns the packet and the number of bytes consumed.
    pub fn fill(src: &[u8]) -> (Packet, usize) {
        let mut packet = Packet::new(MsgId::ServerSnapshotData);
        let taken = packet.fill_from(src);
        (packet, taken)
    }
}

impl Message for ServerSnapshotData {
    const ID: MsgId = MsgId::ServerSnapshotData;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        packet.put_bytes(&self.chunk)
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        Ok(Self {
            chunk: reader.read_rest().to_vec(),
        })
    }
}

/// Terminal snapshot marker carrying out-of-band seed pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerSnapshotEnd {
    pub seeds: Vec<[u32; 2]>,
}

impl Message for ServerSnapshotEnd {
    const ID: MsgId = MsgId::ServerSnapshotEnd;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError> {
        let count = u8::try_from(self.seeds.len()).map_err(|_| ProtoError::BufferOverflow {
            needed: self.seeds.len(),
            remaining: u8::MAX as usize,
        })?;
        packet.put_u8(count)?;
        for [a, b] in &self.seeds {
            packet.put_u32(*a)?;
            packet.put_u32(*b)?;
        }
        Ok(())
    }

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError> {
        let count = reader.read_u8()? as usize;
        let mut seeds = Vec::with_capacity(count);
        for _ in 0..count {
            seeds.push([reader.read_u32()?, reader.read_u32()?]);
        }
        Ok(Self { seeds })
    }
}
