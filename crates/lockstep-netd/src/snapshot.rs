//! Outgoing snapshot transfer.
//!
//! The simulation is serialized once when a transfer begins. Data packets
//! are cut from that blob in batches whose size adapts to how well the
//! destination keeps up: double after a batch that left no backlog, halve
//! (to at least one) after one that did.

use bytes::Bytes;
use lockstep_proto::{
    limits::{SNAPSHOT_INITIAL_BATCH, SNAPSHOT_MAX_BATCH},
    messages::snapshot::ServerSnapshotData,
};

use crate::registry::ConnHandle;

#[derive(Debug)]
pub struct SnapshotSource {
    dest: ConnHandle,
    tick: u32,
    blob: Bytes,
    seeds: Vec<[u32; 2]>,
    offset: usize,
    batch: usize,
}

impl SnapshotSource {
    pub fn new(dest: ConnHandle, tick: u32, blob: Vec<u8>, seeds: Vec<[u32; 2]>) -> Self {
        Self {
            dest,
            tick,
            blob: Bytes::from(blob),
            seeds,
            offset: 0,
            batch: SNAPSHOT_INITIAL_BATCH,
        }
    }

    pub fn dest(&self) -> ConnHandle {
        self.dest
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn total_size(&self) -> usize {
        self.blob.len()
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub fn seeds(&self) -> &[[u32; 2]] {
        &self.seeds
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.blob.len()
    }

    /// Up to one batch of finished data packets.
    pub fn next_batch(&mut self) -> Vec<Bytes> {
        let mut packets = Vec::with_capacity(self.batch);
        while packets.len() < self.batch && !self.is_exhausted() {
            let (packet, taken) = ServerSnapshotData::fill(&self.blob[self.offset..]);
            self.offset += taken;
            packets.push(packet.finish());
        }
        packets
    }

    /// Adjust the batch size after the destination was flushed.
    pub fn adapt(&mut self, backlog: bool) {
        self.batch = if backlog {
            (self.batch / 2).max(1)
        } else {
            (self.batch * 2).min(SNAPSHOT_MAX_BATCH)
        };
    }
}
