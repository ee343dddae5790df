//! Connection registry.
//!
//! Participants live in an arena of slots addressed by [`ConnHandle`]. A
//! handle carries the slot's generation, so a handle kept past its
//! participant's removal never resolves to whoever reuses the slot.
//! Iteration follows join order via a dense list that is compacted on every
//! removal.

use std::net::SocketAddr;

use lockstep_proto::{
    constants::FIRST_CLIENT_INDEX,
    transport::{ByteStream, Connection},
};

use crate::session::ServerSession;

/// Public identity of a remote participant. Index 1 is the authority.
pub type ParticipantId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle {
    index: u32,
    generation: u32,
}

#[cfg(test)]
impl ConnHandle {
    pub(crate) fn for_tests() -> Self {
        ConnHandle {
            index: 0,
            generation: 0,
        }
    }
}

#[derive(Debug)]
pub struct Participant<T> {
    pub peer: SocketAddr,
    pub conn: Connection<T>,
    pub session: ServerSession,
}

impl<T> Participant<T> {
    pub fn id(&self) -> ParticipantId {
        self.session.identity.index
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<Participant<T>>,
}

#[derive(Debug)]
pub struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    order: Vec<ConnHandle>,
    next_id: ParticipantId,
}

impl<T: ByteStream> Registry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            next_id: FIRST_CLIENT_INDEX,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn insert(&mut self, peer: SocketAddr, stream: T) -> ConnHandle {
        let id = self.allocate_id();
        let participant = Participant {
            peer,
            conn: Connection::new(stream),
            session: ServerSession::new(id),
        };

        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.entry = Some(participant);
                ConnHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(participant),
                });
                ConnHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.order.push(handle);
        handle
    }

    pub fn remove(&mut self, handle: ConnHandle) -> Option<Participant<T>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let participant = slot.entry.take()?;
        self.free.push(handle.index);
        self.order.retain(|h| *h != handle);
        Some(participant)
    }

    pub fn get(&self, handle: ConnHandle) -> Option<&Participant<T>> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    pub fn get_mut(&mut self, handle: ConnHandle) -> Option<&mut Participant<T>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Handles in join order. A copy, so the registry may change while the
    /// caller walks it; stale handles simply stop resolving.
    pub fn handles(&self) -> Vec<ConnHandle> {
        self.order.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnHandle, &Participant<T>)> {
        self.order
            .iter()
            .filter_map(|&h| self.get(h).map(|p| (h, p)))
    }

    pub fn find(&self, id: ParticipantId) -> Option<ConnHandle> {
        self.iter().find(|(_, p)| p.id() == id).map(|(h, _)| h)
    }

    pub fn name_taken(&self, name: &str) -> bool {
        self.iter()
            .any(|(_, p)| p.session.joined && p.session.identity.name == name)
    }

    pub fn drain(&mut self) -> Vec<Participant<T>> {
        let handles = std::mem::take(&mut self.order);
        handles
            .into_iter()
            .filter_map(|h| {
                let slot = self.slots.get_mut(h.index as usize)?;
                let participant = slot.entry.take()?;
                self.free.push(h.index);
                Some(participant)
            })
            .collect()
    }

    /// Next free identity, skipping the authority's and any still in use.
    fn allocate_id(&mut self) -> ParticipantId {
        loop {
            let id = self.next_id;
            self.next_id = match self.next_id.checked_add(1) {
                Some(next) => next,
                None => FIRST_CLIENT_INDEX,
            };
            if self.find(id).is_none() {
                return id;
            }
        }
    }
}

impl<T: ByteStream> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
