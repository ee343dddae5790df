use std::net::SocketAddr;

use tokio::net::TcpStream;

/// Events produced by the network layer for the server loop.
#[derive(Debug)]
pub enum InboundEvent {
    /// A new TCP connection. From here on the hub owns the stream.
    Connected { peer: SocketAddr, stream: TcpStream },
}
