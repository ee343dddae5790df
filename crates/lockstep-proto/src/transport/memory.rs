use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::ByteStream;

#[derive(Debug)]
struct Pipe {
    data: VecDeque<u8>,
    capacity: usize,
    writer_closed: bool,
    reader_closed: bool,
}

impl Pipe {
    fn new(capacity: usize) -> Arc<Mutex<Pipe>> {
        Arc::new(Mutex::new(Pipe {
            data: VecDeque::new(),
            capacity,
            writer_closed: false,
            reader_closed: false,
        }))
    }
}

/// In-process duplex byte stream.
///
/// Each direction is a bounded pipe; a full pipe reports `WouldBlock` to the
/// writer, which makes back-pressure reproducible in tests. Dropping either
/// end closes both directions for the peer.
#[derive(Debug)]
pub struct MemoryStream {
    rx: Arc<Mutex<Pipe>>,
    tx: Arc<Mutex<Pipe>>,
}

impl MemoryStream {
    pub fn pair() -> (MemoryStream, MemoryStream) {
        Self::pair_with_capacity(usize::MAX)
    }

    /// Both directions hold at most `capacity` unread bytes.
    pub fn pair_with_capacity(capacity: usize) -> (MemoryStream, MemoryStream) {
        let a_to_b = Pipe::new(capacity);
        let b_to_a = Pipe::new(capacity);
        (
            MemoryStream {
                rx: b_to_a.clone(),
                tx: a_to_b.clone(),
            },
            MemoryStream {
                rx: a_to_b,
                tx: b_to_a,
            },
        )
    }

    /// Unread bytes waiting for this end.
    pub fn pending(&self) -> usize {
        self.rx.lock().data.len()
    }
}

impl ByteStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.rx.lock();
        if pipe.data.is_empty() {
            return if pipe.writer_closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(pipe.data.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = self.tx.lock();
        if pipe.reader_closed || pipe.writer_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let free = pipe.capacity.saturating_sub(pipe.data.len());
        if free == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(free);
        pipe.data.extend(&buf[..n]);
        Ok(n)
    }

    fn shutdown(&mut self) {
        self.tx.lock().writer_closed = true;
        self.rx.lock().reader_closed = true;
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_cross_the_pipe() {
        let (mut a, mut b) = MemoryStream::pair();
        assert_eq!(a.write(b"hello").unwrap(), 5);
        assert_eq!(b.pending(), 5);

        let mut buf = [0u8; 3];
        assert_eq!(b.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(b.read(&mut buf).unwrap(), 2);
        assert_eq!(
            b.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn bounded_pipe_pushes_back() {
        let (mut a, _b) = MemoryStream::pair_with_capacity(4);
        assert_eq!(a.write(b"abcdef").unwrap(), 4);
        assert_eq!(
            a.write(b"x").unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[test]
    fn drop_signals_eof_after_drain() {
        let (mut a, mut b) = MemoryStream::pair();
        a.write(b"z").unwrap();
        drop(a);

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 1);
        assert_eq!(b.read(&mut buf).unwrap(), 0);
        assert_eq!(
            b.write(b"late").unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
