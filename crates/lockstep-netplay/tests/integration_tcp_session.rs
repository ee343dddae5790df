//! Two participants driven by `SessionHandler` against `run_server` over TCP.

use std::time::Duration;

use lockstep_netd::{
    ServerConfig, ServerControl, ServerHub, net::tcp::run_tcp_listener_with_listener, run_server,
};
use lockstep_netplay::{
    ClientConfig, ClientEvent, ClientStatus, DisconnectReason, LeaveReason, NetplayCommand,
    NetplayError, SessionHandler, connect,
};
use lockstep_proto::messages::command::CommandBody;
use lockstep_sim::{DemoWorld, StaticCredentials};
use tokio::{
    net::TcpListener,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

const TICK: Duration = Duration::from_millis(5);

struct Participant {
    commands: mpsc::Sender<NetplayCommand>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    task: JoinHandle<Result<(), NetplayError>>,
}

impl Participant {
    async fn join(addr: std::net::SocketAddr, name: &str, role: u8) -> anyhow::Result<Self> {
        let stream = connect(addr).await?;
        let config = ClientConfig {
            name: name.into(),
            role,
            unique_id: format!("{name}-tcp"),
            ..ClientConfig::default()
        };
        let (events_tx, events) = mpsc::unbounded_channel();
        let (mut handler, commands) =
            SessionHandler::<DemoWorld>::new(stream, config, TICK, events_tx);
        let task = tokio::spawn(async move { handler.run().await });
        commands.send(NetplayCommand::Join).await?;
        Ok(Self {
            commands,
            events,
            task,
        })
    }

    /// Wait for an event matching `pred`, failing on a desync.
    async fn wait_for(
        &mut self,
        what: &str,
        pred: impl Fn(&ClientEvent) -> bool,
    ) -> anyhow::Result<ClientEvent> {
        let res = timeout(Duration::from_secs(10), async {
            while let Some(event) = self.events.recv().await {
                anyhow::ensure!(
                    !matches!(event, ClientEvent::Desync { .. }),
                    "desync while waiting for {what}: {event:?}"
                );
                if pred(&event) {
                    return Ok(event);
                }
            }
            anyhow::bail!("event stream ended before {what}")
        })
        .await;
        res?
    }
}

#[tokio::test]
async fn two_participants_play_in_lockstep() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let _ = run_tcp_listener_with_listener(listener, inbound_tx).await;
    });

    let config = ServerConfig {
        bind: addr,
        tick_interval: TICK,
        sync_every_frame: true,
        ..ServerConfig::default()
    };
    let hub = ServerHub::new(config, DemoWorld::new(77, 4), StaticCredentials::new());
    let (control, control_rx) = mpsc::channel(16);
    let server = tokio::spawn(run_server(inbound_rx, control_rx, hub, None));

    let mut ann = Participant::join(addr, "ann", 0).await?;
    ann.wait_for("ann active", |e| {
        *e == ClientEvent::StatusChanged(ClientStatus::Active)
    })
    .await?;
    let mut bob = Participant::join(addr, "bob", 1).await?;
    bob.wait_for("bob active", |e| {
        *e == ClientEvent::StatusChanged(ClientStatus::Active)
    })
    .await?;

    let body = CommandBody {
        issuer: 0,
        op: DemoWorld::OP_RENAME,
        text: "Ann & Co".into(),
        ..CommandBody::default()
    };
    ann.commands
        .send(NetplayCommand::Submit {
            body: body.clone(),
            callback: 9,
        })
        .await?;

    let executed_tick = |event: &ClientEvent| match event {
        ClientEvent::CommandExecuted { tick, .. } => Some(*tick),
        _ => None,
    };
    let on_ann = ann
        .wait_for("rename at ann", |e| {
            matches!(e, ClientEvent::CommandExecuted { command, .. }
                if command.body == body && command.callback == 9)
        })
        .await?;
    let on_bob = bob
        .wait_for("rename at bob", |e| {
            matches!(e, ClientEvent::CommandExecuted { command, .. }
                if command.body == body && command.callback == 0)
        })
        .await?;
    assert_eq!(executed_tick(&on_ann), executed_tick(&on_bob));

    // Frames carry fingerprints, so both keep verifying after the command.
    let after = executed_tick(&on_bob).unwrap_or_default();
    bob.wait_for("a later sync", |e| {
        matches!(e, ClientEvent::SyncVerified { tick } if *tick > after)
    })
    .await?;

    bob.commands
        .send(NetplayCommand::Quit("done".into()))
        .await?;
    ann.wait_for("bob leaving", |e| {
        matches!(e, ClientEvent::ParticipantLeft { reason: LeaveReason::Quit(r), .. } if r == "done")
    })
    .await?;
    bob.task.await??;

    control.send(ServerControl::Shutdown).await?;
    ann.wait_for("shutdown", |e| {
        *e == ClientEvent::Disconnected(DisconnectReason::Shutdown)
    })
    .await?;
    ann.task.await??;
    server.await??;
    Ok(())
}

#[tokio::test]
async fn wrong_revision_is_refused() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let _ = run_tcp_listener_with_listener(listener, inbound_tx).await;
    });
    let config = ServerConfig {
        bind: addr,
        tick_interval: TICK,
        ..ServerConfig::default()
    };
    let hub = ServerHub::new(config, DemoWorld::new(1, 2), StaticCredentials::new());
    let (control, control_rx) = mpsc::channel(16);
    let server = tokio::spawn(run_server(inbound_rx, control_rx, hub, None));

    let stream = connect(addr).await?;
    let config = ClientConfig {
        revision: "0.0.0-other".into(),
        ..ClientConfig::default()
    };
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let (mut handler, commands) = SessionHandler::<DemoWorld>::new(stream, config, TICK, events_tx);
    commands.send(NetplayCommand::Join).await?;

    let res = timeout(Duration::from_secs(10), handler.run()).await?;
    assert!(matches!(
        res,
        Err(NetplayError::Refused(lockstep_proto::messages::session::ErrorCode::WrongRevision))
    ));
    let mut saw_disconnect = false;
    while let Ok(event) = events.try_recv() {
        saw_disconnect |= matches!(event, ClientEvent::Disconnected(DisconnectReason::Error(_)));
    }
    assert!(saw_disconnect);
    assert_eq!(handler.session().status(), ClientStatus::Inactive);

    control.send(ServerControl::Shutdown).await?;
    server.await??;
    Ok(())
}
