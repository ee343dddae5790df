use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::inbound::InboundEvent;

/// Start a TCP listener. Accepted streams are sent to `tx`.
pub async fn run_tcp_listener(
    bind: SocketAddr,
    tx: mpsc::Sender<InboundEvent>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    run_tcp_listener_with_listener(listener, tx).await
}

/// Run the accept loop on an existing listener.
///
/// Returns once the receiving side of `tx` is gone.
pub async fn run_tcp_listener_with_listener(
    listener: TcpListener,
    tx: mpsc::Sender<InboundEvent>,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "TCP listener started");
    loop {
        let (stream, peer) = listener.accept().await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }
        debug!(%peer, "Accepted TCP connection");

        if tx
            .send(InboundEvent::Connected { peer, stream })
            .await
            .is_err()
        {
            break;
        }
    }
    debug!("TCP listener stopped");
    Ok(())
}
