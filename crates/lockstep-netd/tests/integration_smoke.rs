//! End-to-end run of the server loop over real TCP.
//!
//! - join handshake
//! - snapshot download and restore
//! - frames and acks
//! - graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use lockstep_netd::{
    ServerConfig, ServerControl, ServerHub, hub::HubEvent, net::tcp::run_tcp_listener_with_listener,
    run_server, session::ServerStatus,
};
use lockstep_proto::{
    codec::{decode_message, encode_message},
    constants::REVISION,
    framing::Framer,
    messages::{
        Message,
        frame::{ClientAck, ServerFrame},
        join::{ClientGameInfo, ClientJoin, ServerGameInfo, ServerWelcome},
        session::ServerShutdown,
        snapshot::{
            ClientGetSnapshot, ClientSnapshotOk, ServerSnapshotBegin, ServerSnapshotData,
            ServerSnapshotEnd,
        },
    },
    msg_id::MsgId,
    packet::PacketReader,
};
use lockstep_sim::{DemoWorld, Simulation, StaticCredentials};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

/// Mock test client.
struct TestClient {
    stream: TcpStream,
    framer: Framer,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            framer: Framer::new(8192),
        })
    }

    async fn send<M: Message>(&mut self, msg: &M) -> anyhow::Result<()> {
        let frame = encode_message(msg)?;
        self.stream.write_all(&frame).await?;
        Ok(())
    }

    async fn recv(&mut self) -> anyhow::Result<Bytes> {
        loop {
            if let Some(frame) = self.framer.next_frame()? {
                return Ok(frame);
            }
            let mut buf = [0u8; 4096];
            let n = timeout(Duration::from_secs(5), self.stream.read(&mut buf)).await??;
            anyhow::ensure!(n > 0, "server closed the connection");
            self.framer.buf_mut().extend_from_slice(&buf[..n]);
        }
    }

    /// Receive until a packet of type `M` arrives.
    async fn recv_until<M: Message>(&mut self) -> anyhow::Result<M> {
        loop {
            let frame = self.recv().await?;
            if PacketReader::new(&frame)?.msg_id()? == M::ID {
                return Ok(decode_message(&frame)?);
            }
        }
    }
}

struct TestServer {
    addr: SocketAddr,
    control: mpsc::Sender<ServerControl>,
    events: mpsc::UnboundedReceiver<HubEvent>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn start_server() -> anyhow::Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let _ = run_tcp_listener_with_listener(listener, tx).await;
    });

    let config = ServerConfig {
        bind: addr,
        server_name: "smoke".into(),
        tick_interval: Duration::from_millis(5),
        ..ServerConfig::default()
    };
    let hub = ServerHub::new(config, DemoWorld::new(99, 2), StaticCredentials::new());
    let (control, control_rx) = mpsc::channel(16);
    let (events_tx, events) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_server(rx, control_rx, hub, Some(events_tx)));

    Ok(TestServer {
        addr,
        control,
        events,
        task,
    })
}

#[tokio::test]
async fn game_info_query() -> anyhow::Result<()> {
    let server = start_server().await?;
    let mut client = TestClient::connect(server.addr).await?;

    client.send(&ClientGameInfo).await?;
    let info: ServerGameInfo = client.recv_until().await?;
    assert_eq!(info.server_name, "smoke");
    assert_eq!(info.revision, REVISION);
    assert_eq!(info.clients_on, 0);
    assert!(!info.use_password);

    server.control.send(ServerControl::Shutdown).await?;
    server.task.await??;
    Ok(())
}

#[tokio::test]
async fn join_download_and_play() -> anyhow::Result<()> {
    let mut server = start_server().await?;
    let mut client = TestClient::connect(server.addr).await?;

    client
        .send(&ClientJoin {
            revision: REVISION.into(),
            name: "smoke".into(),
            role: 0,
            language: 0,
            unique_id: "smoke-1".into(),
        })
        .await?;
    let welcome: ServerWelcome = client.recv_until().await?;
    assert_eq!(welcome.index, 2);

    client.send(&ClientGetSnapshot).await?;
    let begin: ServerSnapshotBegin = client.recv_until().await?;
    let mut blob = Vec::with_capacity(begin.total_size as usize);
    let seeds = loop {
        let frame = client.recv().await?;
        match PacketReader::new(&frame)?.msg_id()? {
            MsgId::ServerSnapshotData => {
                let data: ServerSnapshotData = decode_message(&frame)?;
                blob.extend_from_slice(&data.chunk);
            }
            MsgId::ServerSnapshotEnd => {
                let end: ServerSnapshotEnd = decode_message(&frame)?;
                break end.seeds;
            }
            _ => {}
        }
    };
    assert_eq!(blob.len(), begin.total_size as usize);
    let world = <DemoWorld as Simulation>::deserialize(&blob, &seeds)?;
    assert_eq!(world.tick(), begin.tick);

    client.send(&ClientSnapshotOk).await?;
    let frame: ServerFrame = client.recv_until().await?;
    assert!(frame.tick >= begin.tick);
    client.send(&ClientAck { tick: frame.tick }).await?;

    let became_active = timeout(Duration::from_secs(5), async {
        while let Some(event) = server.events.recv().await {
            if let HubEvent::ParticipantStateChanged { id: 2, status, .. } = event
                && status == ServerStatus::Active
            {
                return true;
            }
        }
        false
    })
    .await?;
    assert!(became_active);

    server.control.send(ServerControl::Shutdown).await?;
    client.recv_until::<ServerShutdown>().await?;
    server.task.await??;
    Ok(())
}
