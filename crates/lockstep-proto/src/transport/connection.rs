use std::collections::VecDeque;
use std::io::ErrorKind;

use bytes::Bytes;

use crate::{
    codec::encode_message,
    framing::Framer,
    limits::{OUTBOUND_QUEUE_LIMIT, READ_CHUNK, RX_BUFFER_LIMIT},
    messages::Message,
};

use super::{ByteStream, Readiness, TransportError};

/// One peer's packet pipe.
///
/// Outbound packets are queued FIFO and written by [`Connection::flush`];
/// a packet the stream only partly accepted resumes from the exact byte
/// offset on the next flush. Inbound bytes are reassembled by
/// [`Connection::try_receive`].
///
/// Once any call reports an error the connection is closed and every later
/// call reports `Closed`.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    outbound: VecDeque<Bytes>,
    /// Bytes of the front outbound packet already written.
    front_offset: usize,
    framer: Framer,
    closed: bool,
}

impl<S: ByteStream> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            outbound: VecDeque::new(),
            front_offset: 0,
            framer: Framer::new(READ_CHUNK),
            closed: false,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Packets waiting to be written, the partly written one included.
    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    pub fn has_backlog(&self) -> bool {
        !self.outbound.is_empty()
    }

    /// Queue a finished packet. Never touches the stream.
    pub fn send(&mut self, packet: Bytes) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.outbound.len() >= OUTBOUND_QUEUE_LIMIT {
            return Err(TransportError::QueueFull(self.outbound.len()));
        }
        self.outbound.push_back(packet);
        Ok(())
    }

    pub fn send_message<T: Message>(&mut self, msg: &T) -> Result<(), TransportError> {
        let packet = encode_message(msg)?;
        self.send(packet)
    }

    /// Write as much of the queue as the stream accepts without blocking.
    ///
    /// `Ready` means the queue is empty.
    pub fn flush(&mut self) -> Readiness<()> {
        if self.closed {
            return Readiness::Error(TransportError::Closed);
        }
        loop {
            let Some(front) = self.outbound.front() else {
                return Readiness::Ready(());
            };
            let len = front.len();
            let res = self.stream.write(&front[self.front_offset..]);
            match res {
                Ok(0) => return self.fail(TransportError::Closed),
                Ok(n) => {
                    self.front_offset += n;
                    if self.front_offset >= len {
                        self.outbound.pop_front();
                        self.front_offset = 0;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Readiness::WouldBlock,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(e.into()),
            }
        }
    }

    /// Return the next whole packet, reading from the stream if needed.
    ///
    /// `WouldBlock` means the packet in progress is still incomplete.
    pub fn try_receive(&mut self) -> Readiness<Bytes> {
        if self.closed {
            return Readiness::Error(TransportError::Closed);
        }
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.framer.next_frame() {
                Ok(Some(frame)) => return Readiness::Ready(frame),
                Ok(None) => {}
                Err(e) => return self.fail(e.into()),
            }
            if self.framer.buffered() > RX_BUFFER_LIMIT {
                return self.fail(TransportError::RxOverflow(RX_BUFFER_LIMIT));
            }

            match self.stream.read(&mut chunk) {
                Ok(0) => return self.fail(TransportError::Closed),
                Ok(n) => self.framer.buf_mut().extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Readiness::WouldBlock,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(e.into()),
            }
        }
    }

    /// Close the stream. Queued packets that were not flushed are dropped.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stream.shutdown();
        }
        self.outbound.clear();
        self.front_offset = 0;
    }

    fn fail<T>(&mut self, err: TransportError) -> Readiness<T> {
        self.close();
        Readiness::Error(err)
    }
}
