//! Lockstep authority: admits participants, hands them the world snapshot,
//! then schedules and relays every command so all copies of the simulation
//! execute the same commands on the same ticks.

use std::time::Duration;

use lockstep_proto::messages::{chat::ChatDest, command::CommandBody};
use lockstep_sim::{CredentialStore, Simulation};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::hub::HubEvent;
use crate::net::inbound::InboundEvent;
use crate::registry::ParticipantId;

pub mod config;
pub mod hub;
pub mod net;
pub mod proto_dispatch;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod snapshot;

pub use config::ServerConfig;
pub use hub::{Departure, ServerHub};

/// How long shutdown waits for goodbye packets to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Requests from the embedding application to the server loop.
#[derive(Debug, Clone)]
pub enum ServerControl {
    /// Issue a command as the authority's own participant.
    Submit { body: CommandBody, callback: u8 },
    Chat {
        dest: ChatDest,
        dest_id: u16,
        message: String,
    },
    Kick(ParticipantId),
    Shutdown,
}

/// Drive `hub` until shutdown.
///
/// Every tick the loop polls all connections and then advances the
/// simulation by one tick. Hub events are forwarded to `events` when given.
/// A command found past its target tick aborts the loop with an error.
pub async fn run_server<S, C>(
    mut inbound: mpsc::Receiver<InboundEvent>,
    mut control: mpsc::Receiver<ServerControl>,
    mut hub: ServerHub<S, C, TcpStream>,
    events: Option<mpsc::UnboundedSender<HubEvent>>,
) -> anyhow::Result<()>
where
    S: Simulation,
    C: CredentialStore,
{
    let mut ticker = tokio::time::interval(hub.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut control_open = true;
    let mut inbound_open = true;

    info!(
        tick_ms = hub.config().tick_interval.as_millis() as u64,
        max_clients = hub.config().max_clients,
        "Server loop started"
    );

    loop {
        tokio::select! {
            ev = inbound.recv(), if inbound_open => match ev {
                Some(InboundEvent::Connected { peer, stream }) => {
                    hub.accept(stream, peer);
                }
                None => inbound_open = false,
            },
            cmd = control.recv(), if control_open => match cmd {
                Some(ServerControl::Submit { body, callback }) => {
                    if let Err(err) = hub.submit(body, callback) {
                        warn!(error = %err, "Authority command refused");
                    }
                }
                Some(ServerControl::Chat { dest, dest_id, message }) => {
                    hub.chat(dest, dest_id, message);
                }
                Some(ServerControl::Kick(id)) => {
                    if !hub.kick(id) {
                        warn!(client_id = id, "Kick target not found");
                    }
                }
                Some(ServerControl::Shutdown) => break,
                None => control_open = false,
            },
            _ = ticker.tick() => {
                hub.poll_network();
                hub.tick()?;
                forward_events(&mut hub, events.as_ref());
            }
        }
    }

    hub.shutdown();
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while hub.has_lingering() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
        hub.poll_lingering();
    }
    forward_events(&mut hub, events.as_ref());
    info!("Server loop stopped");
    Ok(())
}

fn forward_events<S, C>(
    hub: &mut ServerHub<S, C, TcpStream>,
    events: Option<&mpsc::UnboundedSender<HubEvent>>,
) where
    S: Simulation,
    C: CredentialStore,
{
    for event in hub.drain_events() {
        if let Some(tx) = events {
            let _ = tx.send(event);
        }
    }
}
