//! Non-blocking packet transport.
//!
//! A [`Connection`] wraps one [`ByteStream`] and turns it into whole packets
//! in both directions. Nothing here blocks or awaits: every call either makes
//! progress or reports [`Readiness::WouldBlock`], so a single-threaded tick
//! loop can drive any number of connections.

use std::io;

use thiserror::Error;

use crate::error::ProtoError;

pub mod connection;
pub mod memory;
pub mod tcp;

pub use connection::Connection;
pub use memory::MemoryStream;

/// A byte stream that never blocks.
///
/// `read` returns `Ok(0)` when the peer closed and `ErrorKind::WouldBlock`
/// when nothing is available yet; `write` returns `WouldBlock` when the
/// stream cannot take more bytes right now.
pub trait ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Best-effort close of the write side.
    fn shutdown(&mut self) {}
}

/// Outcome of a non-blocking transport step.
#[derive(Debug)]
pub enum Readiness<T> {
    Ready(T),
    WouldBlock,
    Error(TransportError),
}

impl<T> Readiness<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Readiness::Error(_))
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer closed the connection")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtoError),
    #[error("outbound queue full ({0} packets)")]
    QueueFull(usize),
    #[error("receive buffer exceeded {0} bytes")]
    RxOverflow(usize),
}

impl TransportError {
    /// True when the failure was caused by what the peer sent, as opposed
    /// to the stream itself going away.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            TransportError::Protocol(_) | TransportError::RxOverflow(_)
        )
    }
}
