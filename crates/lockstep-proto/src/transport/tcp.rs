use std::io;

use tokio::net::TcpStream;

use super::ByteStream;

/// Sockets are driven by the tokio reactor; `try_read`/`try_write` never
/// wait and report `WouldBlock` until the reactor marks the socket ready.
impl ByteStream for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.try_read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.try_write(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use crate::{
        codec::{decode_message, encode_message},
        messages::frame::ServerSync,
        transport::{Connection, Readiness},
    };

    #[tokio::test]
    async fn tcp_stream_carries_packets() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let client = tokio::net::TcpStream::connect(addr).await?;
        let (server, _) = listener.accept().await?;

        let mut tx = Connection::new(client);
        let mut rx = Connection::new(server);
        tx.send(encode_message(&ServerSync {
            tick: 10,
            fingerprint: 0xABCD,
        })?)?;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let _ = tx.flush();
            if let Readiness::Ready(frame) = rx.try_receive() {
                let sync: ServerSync = decode_message(&frame)?;
                assert_eq!(sync.tick, 10);
                assert_eq!(sync.fingerprint, 0xABCD);
                break;
            }
            anyhow::ensure!(tokio::time::Instant::now() < deadline, "packet never arrived");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(())
    }
}
