//! Async driver for a participant session over TCP.
//!
//! The handler owns the [`ClientSession`] and runs it on a fixed tick:
//! every tick it drains the socket, runs the released simulation ticks and
//! forwards the resulting events. Requests from the application arrive as
//! [`NetplayCommand`]s on a channel.

use std::time::Duration;

use lockstep_proto::messages::{chat::ChatDest, command::CommandBody, join::PasswordKind};
use lockstep_sim::Simulation;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    client::{ClientEvent, ClientSession},
    config::ClientConfig,
    error::NetplayError,
};

/// How long a closing session keeps trying to deliver its last packets.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum NetplayCommand {
    RequestGameInfo,
    Join,
    Password { kind: PasswordKind, password: String },
    /// Ask the server to schedule a command; `callback` comes back on the
    /// local execution event.
    Submit { body: CommandBody, callback: u8 },
    SetName(String),
    /// Replace the password of our role; empty clears it.
    SetPassword(String),
    Chat {
        dest: ChatDest,
        dest_id: u16,
        message: String,
    },
    Quit(String),
}

/// Connect to a lockstep server.
pub async fn connect(addr: impl ToSocketAddrs) -> Result<TcpStream, NetplayError> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    info!(peer = ?stream.peer_addr().ok(), "Connected to server");
    Ok(stream)
}

pub struct SessionHandler<S> {
    session: ClientSession<S, TcpStream>,
    tick_interval: Duration,
    command_rx: mpsc::Receiver<NetplayCommand>,
    event_tx: mpsc::UnboundedSender<ClientEvent>,
}

impl<S: Simulation> SessionHandler<S> {
    pub fn new(
        stream: TcpStream,
        config: ClientConfig,
        tick_interval: Duration,
        event_tx: mpsc::UnboundedSender<ClientEvent>,
    ) -> (Self, mpsc::Sender<NetplayCommand>) {
        let (tx, rx) = mpsc::channel(32);
        (
            Self {
                session: ClientSession::new(config, stream),
                tick_interval,
                command_rx: rx,
                event_tx,
            },
            tx,
        )
    }

    pub fn session(&self) -> &ClientSession<S, TcpStream> {
        &self.session
    }

    /// Run until the session ends.
    ///
    /// Returns `Ok` when the server or the application ended the session
    /// normally and the error otherwise.
    pub async fn run(&mut self) -> Result<(), NetplayError> {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        let result = loop {
            // Commands first, so a quit is not delayed by a slow tick.
            tokio::select! {
                biased;

                cmd = self.command_rx.recv(), if commands_open => match cmd {
                    Some(cmd) => {
                        if let Err(err) = self.handle_command(cmd) {
                            break Err(err);
                        }
                    }
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                },
                _ = ticker.tick() => {
                    if let Err(err) = self.session.poll() {
                        break Err(err);
                    }
                    if let Err(err) = self.session.run_ticks() {
                        break Err(err);
                    }
                }
            }
            self.forward_events();
            if !self.session.is_connected() {
                break Ok(());
            }
        };

        self.forward_events();
        self.drain_close().await;
        result
    }

    fn handle_command(&mut self, cmd: NetplayCommand) -> Result<(), NetplayError> {
        let res = match cmd {
            NetplayCommand::RequestGameInfo => self.session.request_game_info(),
            NetplayCommand::Join => self.session.join(),
            NetplayCommand::Password { kind, password } => {
                self.session.send_password(kind, &password)
            }
            NetplayCommand::Submit { body, callback } => self.session.submit(body, callback),
            NetplayCommand::SetName(name) => self.session.set_name(&name),
            NetplayCommand::SetPassword(password) => self.session.set_password(&password),
            NetplayCommand::Chat {
                dest,
                dest_id,
                message,
            } => self.session.chat(dest, dest_id, message),
            NetplayCommand::Quit(reason) => self.session.quit(&reason),
        };
        match res {
            Err(NetplayError::InvalidState { action, status }) => {
                warn!(action, %status, "Command ignored");
                Ok(())
            }
            other => other,
        }
    }

    fn forward_events(&mut self) {
        for event in self.session.drain_events() {
            let _ = self.event_tx.send(event);
        }
    }

    async fn drain_close(&mut self) {
        let deadline = Instant::now() + CLOSE_GRACE;
        while !self.session.finish_close() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let _ = tokio::time::timeout(remaining, self.session.stream().writable()).await;
        }
    }
}
