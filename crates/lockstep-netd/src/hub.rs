//! The authority.
//!
//! [`ServerHub`] owns every piece of server state: the simulation, the
//! connection registry, the frame clock, the local command queue and the
//! single live snapshot transfer. Nothing in it blocks; the owner calls
//! [`ServerHub::poll_network`] and [`ServerHub::tick`] from one loop.
//!
//! Connections that have to go are collected while walking the registry
//! and removed afterwards, so a close never invalidates an ongoing walk.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;

use lockstep_proto::{
    codec::encode_message,
    constants::{SERVER_INDEX, SPECTATOR_ROLE},
    error::ProtoError,
    limits::MAX_PACKETS_PER_POLL,
    messages::{
        Message,
        chat::{ChatDest, ServerChat},
        command::{CommandBody, ServerCommand},
        frame::{ServerFrame, ServerSync},
        join::{PasswordKind, ServerClientInfo, ServerNeedPassword, ServerWelcome},
        session::{
            ErrorCode, ServerBanned, ServerError, ServerErrorQuit, ServerFull, ServerNewGame,
            ServerQuit, ServerShutdown,
        },
        snapshot::{ServerSnapshotBegin, ServerSnapshotEnd, ServerWait},
    },
    transport::{ByteStream, Connection, Readiness, TransportError},
};
use lockstep_sim::{Command, CommandQueue, CredentialStore, Simulation, SyncError};
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::ServerConfig,
    proto_dispatch::{
        error::{HandlerError, HandlerResult},
        handlers::dispatch_packet,
    },
    registry::{ConnHandle, Participant, ParticipantId, Registry},
    scheduler::{FrameClock, lag_days, lag_ticks},
    session::{IdentityRecord, ServerSession, ServerStatus},
    snapshot::SnapshotSource,
};

/// Polls a closing connection gets to drain its last packets.
const LINGER_POLLS: u32 = 100;

/// Why a participant left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Departure {
    /// Closed without notifying the others.
    Silent,
    Quit(String),
    Error(ErrorCode),
}

impl fmt::Display for Departure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Departure::Silent => f.write_str("closed"),
            Departure::Quit(reason) => write!(f, "quit: {reason}"),
            Departure::Error(code) => write!(f, "error: {code}"),
        }
    }
}

/// Observable things that happened on the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A command ran on the authority's simulation.
    CommandReady { command: Command, tick: u32 },
    ParticipantStateChanged {
        id: ParticipantId,
        name: String,
        status: ServerStatus,
    },
    ParticipantLeft {
        id: ParticipantId,
        name: String,
        reason: Departure,
    },
    Renamed {
        id: ParticipantId,
        old: String,
        new: String,
    },
    LagWarning { id: ParticipantId, days: u32 },
    /// A participant reported that its simulation diverged.
    Desync { id: ParticipantId, tick: u32 },
    Chat {
        from: ParticipantId,
        dest: ChatDest,
        dest_id: u16,
        message: String,
    },
}

#[derive(Debug)]
struct Lingering<T> {
    conn: Connection<T>,
    polls_left: u32,
}

pub struct ServerHub<S, C, T> {
    pub(crate) config: ServerConfig,
    pub(crate) sim: S,
    pub(crate) creds: C,
    pub(crate) registry: Registry<T>,
    pub(crate) clock: FrameClock,
    local_queue: CommandQueue,
    pub(crate) transfer: Option<SnapshotSource>,
    doomed: VecDeque<(ConnHandle, Departure)>,
    lingering: Vec<Lingering<T>>,
    events: Vec<HubEvent>,
}

impl<S, C, T> ServerHub<S, C, T>
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    pub fn new(config: ServerConfig, sim: S, creds: C) -> Self {
        Self {
            config,
            sim,
            creds,
            registry: Registry::new(),
            clock: FrameClock::new(),
            local_queue: CommandQueue::new(),
            transfer: None,
            doomed: VecDeque::new(),
            lingering: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sim(&self) -> &S {
        &self.sim
    }

    pub fn tick_count(&self) -> u32 {
        self.clock.tick
    }

    pub fn ceiling(&self) -> u32 {
        self.clock.ceiling
    }

    pub fn participant_count(&self) -> usize {
        self.registry.len()
    }

    pub fn status_of(&self, id: ParticipantId) -> Option<ServerStatus> {
        let handle = self.registry.find(id)?;
        self.registry.get(handle).map(|p| p.session.status)
    }

    /// Connections currently in `status`.
    pub fn count_in(&self, status: ServerStatus) -> usize {
        self.registry
            .iter()
            .filter(|(_, p)| p.session.status == status)
            .count()
    }

    pub fn drain_events(&mut self) -> Vec<HubEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_lingering(&self) -> bool {
        !self.lingering.is_empty()
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    /// Register a freshly accepted stream.
    ///
    /// Banned peers and connections beyond `max_clients` are told why and
    /// closed without entering the registry.
    pub fn accept(&mut self, stream: T, peer: SocketAddr) -> Option<ParticipantId> {
        if self.creds.is_banned(&peer) {
            info!(%peer, "Connection rejected: banned");
            self.refuse(stream, &ServerBanned);
            return None;
        }
        if self.registry.len() >= self.config.max_clients {
            info!(
                %peer,
                max_clients = self.config.max_clients,
                "Connection rejected: server full"
            );
            self.refuse(stream, &ServerFull);
            return None;
        }

        let handle = self.registry.insert(peer, stream);
        let id = self.registry.get(handle).map(Participant::id)?;
        debug!(client_id = id, %peer, "Client connected");
        Some(id)
    }

    fn refuse<M: Message>(&mut self, stream: T, msg: &M) {
        let mut conn = Connection::new(stream);
        if conn.send_message(msg).is_ok() {
            self.linger(conn);
        } else {
            conn.close();
        }
    }

    fn linger(&mut self, conn: Connection<T>) {
        if !conn.is_closed() {
            self.lingering.push(Lingering {
                conn,
                polls_left: LINGER_POLLS,
            });
        }
    }

    /// Keep flushing closing connections until they drain or run out of polls.
    pub fn poll_lingering(&mut self) {
        self.lingering.retain_mut(|l| {
            let done = match l.conn.flush() {
                Readiness::Ready(()) | Readiness::Error(_) => true,
                Readiness::WouldBlock => {
                    l.polls_left = l.polls_left.saturating_sub(1);
                    l.polls_left == 0
                }
            };
            if done {
                l.conn.close();
            }
            !done
        });
    }

    /// Schedule a connection for removal at the end of the current step.
    pub(crate) fn doom(&mut self, handle: ConnHandle, departure: Departure) {
        self.doomed.push_back((handle, departure));
    }

    fn is_doomed(&self, handle: ConnHandle) -> bool {
        self.doomed.iter().any(|(h, _)| *h == handle)
    }

    /// Send `ServerError(code)` and close the connection.
    pub(crate) fn reject(&mut self, handle: ConnHandle, code: ErrorCode) {
        if let Some(p) = self.registry.get(handle) {
            warn!(
                client_id = p.id(),
                peer = %p.peer,
                status = ?p.session.status,
                %code,
                "Closing connection with error"
            );
        }
        self.send(handle, &ServerError { code });
        self.doom(handle, Departure::Error(code));
    }

    /// Disconnect a participant as `Kicked`.
    pub fn kick(&mut self, id: ParticipantId) -> bool {
        let Some(handle) = self.registry.find(id) else {
            return false;
        };
        self.reject(handle, ErrorCode::Kicked);
        self.reap();
        true
    }

    fn reap(&mut self) {
        while let Some((handle, departure)) = self.doomed.pop_front() {
            self.drop_participant(handle, departure);
        }
    }

    fn drop_participant(&mut self, handle: ConnHandle, departure: Departure) {
        let Some(participant) = self.registry.remove(handle) else {
            return;
        };
        let Participant {
            peer,
            conn,
            session,
        } = participant;
        let id = session.identity.index;
        let name = session.identity.name;
        self.linger(conn);

        if self.transfer.as_ref().is_some_and(|t| t.dest() == handle) {
            self.transfer = None;
            info!(client_id = id, "Snapshot transfer aborted");
        }

        if session.status > ServerStatus::Authorized {
            match &departure {
                Departure::Quit(reason) => self.broadcast(
                    &ServerQuit {
                        index: id,
                        reason: reason.clone(),
                    },
                    ServerSession::in_game,
                ),
                Departure::Error(code) => self.broadcast(
                    &ServerErrorQuit {
                        index: id,
                        code: code.for_peers(),
                    },
                    ServerSession::in_game,
                ),
                Departure::Silent => {}
            }
        }

        info!(client_id = id, %peer, name = %name, reason = %departure, "Client disconnected");
        self.events.push(HubEvent::ParticipantLeft {
            id,
            name,
            reason: departure,
        });
        self.promote_waiter();
    }

    /// Send `ServerShutdown` to everyone and close all connections.
    pub fn shutdown(&mut self) {
        info!(clients = self.registry.len(), "Shutting down");
        self.broadcast(&ServerShutdown, |_| true);
        self.close_all();
    }

    /// Send `ServerNewGame` to everyone, close them and start over on `sim`.
    pub fn new_game(&mut self, sim: S) {
        info!(clients = self.registry.len(), "Starting new game");
        self.broadcast(&ServerNewGame, |_| true);
        self.close_all();
        self.sim = sim;
        self.clock = FrameClock::new();
        self.local_queue.clear();
    }

    fn close_all(&mut self) {
        self.doomed.clear();
        self.transfer = None;
        for participant in self.registry.drain() {
            let Participant { conn, session, .. } = participant;
            self.linger(conn);
            self.events.push(HubEvent::ParticipantLeft {
                id: session.identity.index,
                name: session.identity.name,
                reason: Departure::Silent,
            });
        }
        self.poll_lingering();
    }

    // ========================================================================
    // Sending
    // ========================================================================

    pub(crate) fn send<M: Message>(&mut self, handle: ConnHandle, msg: &M) {
        let Some(p) = self.registry.get_mut(handle) else {
            return;
        };
        match p.conn.send_message(msg) {
            Ok(()) => {}
            // The packet never existed, the connection is still fine.
            Err(TransportError::Protocol(err)) => {
                error!(client_id = p.id(), error = %err, msg_id = ?M::ID, "Failed to encode packet");
            }
            Err(err) => {
                warn!(client_id = p.id(), error = %err, msg_id = ?M::ID, "Failed to queue packet");
                self.doomed
                    .push_back((handle, Departure::Error(ErrorCode::ConnectionLost)));
            }
        }
    }

    pub(crate) fn broadcast<M: Message>(&mut self, msg: &M, filter: impl Fn(&ServerSession) -> bool) {
        let packet = match encode_message(msg) {
            Ok(packet) => packet,
            Err(err) => {
                error!(error = %err, msg_id = ?M::ID, "Failed to encode broadcast");
                return;
            }
        };
        for handle in self.registry.handles() {
            let Some(p) = self.registry.get_mut(handle) else {
                continue;
            };
            if !filter(&p.session) {
                continue;
            }
            if let Err(err) = p.conn.send(packet.clone()) {
                warn!(client_id = p.id(), error = %err, msg_id = ?M::ID, "Failed to queue broadcast");
                self.doomed
                    .push_back((handle, Departure::Error(ErrorCode::ConnectionLost)));
            }
        }
    }

    fn flush_all(&mut self) {
        for handle in self.registry.handles() {
            let Some(p) = self.registry.get_mut(handle) else {
                continue;
            };
            if let Readiness::Error(err) = p.conn.flush() {
                debug!(client_id = p.id(), error = %err, "Flush failed");
                self.doomed
                    .push_back((handle, Departure::Error(ErrorCode::ConnectionLost)));
            }
        }
        self.reap();
    }

    // ========================================================================
    // Network polling
    // ========================================================================

    /// Read and handle whatever every connection has sent, then flush.
    pub fn poll_network(&mut self) {
        for handle in self.registry.handles() {
            for _ in 0..MAX_PACKETS_PER_POLL {
                let Some(p) = self.registry.get_mut(handle) else {
                    break;
                };
                match p.conn.try_receive() {
                    Readiness::Ready(frame) => {
                        if let Err(err) = dispatch_packet(self, handle, &frame) {
                            self.reject(handle, err.code);
                            break;
                        }
                        if self.is_doomed(handle) {
                            break;
                        }
                    }
                    Readiness::WouldBlock => break,
                    Readiness::Error(err) => {
                        let code = if err.is_protocol_violation() {
                            ErrorCode::IllegalPacket
                        } else {
                            ErrorCode::ConnectionLost
                        };
                        debug!(client_id = p.id(), peer = %p.peer, error = %err, "Connection failed");
                        self.doom(handle, Departure::Error(code));
                        break;
                    }
                }
            }
        }
        self.reap();
        self.flush_all();
        self.poll_lingering();
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Schedule a command issued by the authority itself.
    ///
    /// Returns the tick it will execute on everywhere. The body is cut to
    /// what participants will decode before it is queued anywhere, and a
    /// body that cannot be encoded is refused outright.
    pub fn submit(&mut self, body: CommandBody, callback: u8) -> Result<u32, ProtoError> {
        let body = body.wire_form()?;
        Ok(self.schedule(body, callback, None))
    }

    /// Queue `body` for every in-game connection and for local execution.
    ///
    /// Only the issuer sees `callback`; everyone else gets 0.
    pub(crate) fn schedule(
        &mut self,
        body: CommandBody,
        callback: u8,
        issuer: Option<ConnHandle>,
    ) -> u32 {
        let target = self.clock.next_target();
        for handle in self.registry.handles() {
            let Some(p) = self.registry.get_mut(handle) else {
                continue;
            };
            if !p.session.in_game() {
                continue;
            }
            let own = issuer == Some(handle);
            let cb = if own { callback } else { 0 };
            p.session
                .commands
                .push(Command::new(body.clone(), target).with_callback(cb));
            if own {
                p.session.pending_targets.push_back(target);
            }
        }

        debug!(
            target_tick = target,
            op = body.op,
            issuer = body.issuer,
            "Command scheduled"
        );
        let local_cb = if issuer.is_none() { callback } else { 0 };
        self.local_queue
            .push(Command::new(body, target).with_callback(local_cb));
        target
    }

    /// Send every command queued for `handle`, oldest first.
    pub(crate) fn flush_commands(&mut self, handle: ConnHandle) {
        let Some(p) = self.registry.get_mut(handle) else {
            return;
        };
        let commands: Vec<Command> = p.session.commands.drain().collect();
        for command in commands {
            self.send(
                handle,
                &ServerCommand {
                    body: command.body,
                    callback: command.callback,
                    tick: command.target_tick,
                },
            );
        }
    }

    /// Advance the authority by one tick.
    ///
    /// A command still queued past its target tick is fatal: it means the
    /// schedule itself is broken.
    pub fn tick(&mut self) -> Result<(), SyncError> {
        self.clock.tick += 1;
        let tick = self.clock.tick;

        for command in self.local_queue.execute_due(tick, &mut self.sim)? {
            self.events.push(HubEvent::CommandReady { command, tick });
        }
        self.sim.advance_tick();
        self.clock.fingerprint = self.sim.sample_fingerprint();

        self.server_tick();
        self.reap();
        self.flush_all();
        self.poll_lingering();
        Ok(())
    }

    fn server_tick(&mut self) {
        let tick = self.clock.tick;
        let publication = self
            .clock
            .publish(self.config.frame_freq, self.config.sync_freq);
        let frame = ServerFrame {
            tick,
            ceiling: self.clock.ceiling,
            fingerprint: self
                .config
                .sync_every_frame
                .then_some(self.clock.fingerprint),
        };
        let sync = ServerSync {
            tick,
            fingerprint: self.clock.fingerprint,
        };
        if publication.frame {
            trace!(tick, ceiling = self.clock.ceiling, "Publishing frame");
        }

        for handle in self.registry.handles() {
            let Some(p) = self.registry.get_mut(handle) else {
                continue;
            };
            if self.doomed.iter().any(|(h, _)| *h == handle) {
                continue;
            }
            let id = p.id();
            p.session.prune_pending(tick);

            match p.session.status {
                ServerStatus::Active => {
                    let lag = lag_ticks(
                        tick,
                        p.session.last_frame,
                        p.session.last_frame_server,
                        self.config.frame_freq,
                    );
                    let days = lag_days(lag);
                    if days > self.config.lag_evict_days {
                        warn!(client_id = id, days, tick, "Client lagging too far behind, evicting");
                        self.reject(handle, ErrorCode::TimedOut);
                        continue;
                    }
                    if days > self.config.lag_warn_days {
                        if !p.session.lag_warned {
                            p.session.lag_warned = true;
                            warn!(client_id = id, days, tick, "Client is slow");
                            self.events.push(HubEvent::LagWarning { id, days });
                        }
                    } else {
                        p.session.lag_warned = false;
                    }
                }
                ServerStatus::PreActive => {
                    let lag = lag_ticks(
                        tick,
                        p.session.last_frame,
                        p.session.last_frame_server,
                        self.config.frame_freq,
                    );
                    if lag > self.config.max_join_time {
                        warn!(client_id = id, lag, tick, "Client took too long to join");
                        self.reject(handle, ErrorCode::TimedOut);
                        continue;
                    }
                }
                _ => {}
            }

            let status = p.session.status;
            if status > ServerStatus::MapDelivered {
                self.flush_commands(handle);
            }
            if status >= ServerStatus::PreActive {
                if publication.frame {
                    self.send(handle, &frame);
                }
                if publication.sync {
                    self.send(handle, &sync);
                }
            }
            if status == ServerStatus::MapSending {
                self.send_snapshot_batch();
            }
        }
    }

    // ========================================================================
    // Join
    // ========================================================================

    pub(crate) fn session(&self, handle: ConnHandle) -> Option<&ServerSession> {
        self.registry.get(handle).map(|p| &p.session)
    }

    pub(crate) fn session_mut(&mut self, handle: ConnHandle) -> Option<&mut ServerSession> {
        self.registry.get_mut(handle).map(|p| &mut p.session)
    }

    pub(crate) fn host_identity(&self) -> IdentityRecord {
        IdentityRecord {
            index: SERVER_INDEX,
            name: self.config.host_name.clone(),
            role: self.config.host_role,
            unique_id: String::new(),
        }
    }

    /// Connections that finished authorization.
    pub(crate) fn clients_on(&self) -> u8 {
        let count = self
            .registry
            .iter()
            .filter(|(_, p)| p.session.status >= ServerStatus::Authorized)
            .count();
        count.min(u8::MAX as usize) as u8
    }

    /// `requested`, or `requested #n` for the first free `n`.
    pub(crate) fn unique_name(&self, requested: &str) -> Option<String> {
        let base = if requested.is_empty() {
            "Player"
        } else {
            requested
        };
        let taken = |name: &str| name == self.config.host_name || self.registry.name_taken(name);
        if !taken(base) {
            return Some(base.to_string());
        }
        (2..=self.config.max_clients + 1)
            .map(|n| format!("{base} #{n}"))
            .find(|name| !taken(name))
    }

    pub(crate) fn request_password(&mut self, handle: ConnHandle, kind: PasswordKind) {
        if let Some(session) = self.session_mut(handle) {
            session.awaiting_password = Some(kind);
        }
        self.send(handle, &ServerNeedPassword { kind });
    }

    /// Authorize the connection and introduce it to everyone already in game.
    pub(crate) fn welcome(&mut self, handle: ConnHandle) {
        let Some(session) = self.session_mut(handle) else {
            return;
        };
        session.status = ServerStatus::Authorized;
        session.awaiting_password = None;
        let index = session.identity.index;
        let name = session.identity.name.clone();

        self.send(handle, &ServerWelcome { index });
        let others: Vec<ServerClientInfo> = self
            .registry
            .iter()
            .filter(|(h, p)| *h != handle && p.session.in_game())
            .map(|(_, p)| client_info(&p.session.identity))
            .collect();
        for info in &others {
            self.send(handle, info);
        }
        self.send(handle, &client_info(&self.host_identity()));

        info!(client_id = index, name = %name, "Client authorized");
        self.state_changed(handle);
    }

    pub(crate) fn state_changed(&mut self, handle: ConnHandle) {
        let Some(p) = self.registry.get(handle) else {
            return;
        };
        let id = p.id();
        let status = p.session.status;
        debug!(client_id = id, ?status, "Client status changed");
        self.events.push(HubEvent::ParticipantStateChanged {
            id,
            name: p.session.identity.name.clone(),
            status,
        });
    }

    pub(crate) fn push_event(&mut self, event: HubEvent) {
        self.events.push(event);
    }

    // ========================================================================
    // Snapshot transfer
    // ========================================================================

    /// Serialize the simulation and start streaming it to `handle`.
    pub(crate) fn begin_transfer(&mut self, handle: ConnHandle) -> HandlerResult {
        let blob = match self.sim.serialize() {
            Ok(blob) => blob,
            Err(err) => {
                error!(error = %err, "Snapshot serialization failed");
                return Err(HandlerError::snapshot_failed());
            }
        };
        let total_size = u32::try_from(blob.len()).map_err(|_| HandlerError::snapshot_failed())?;
        let seeds = self.sim.side_seeds();
        let tick = self.clock.tick;
        // Everything up to `tick` is inside the snapshot; what is still
        // pending locally is not, whenever it was scheduled.
        let pending: Vec<Command> = self
            .local_queue
            .iter()
            .map(|c| c.clone().with_callback(0))
            .collect();

        let Some(session) = self.session_mut(handle) else {
            return Ok(());
        };
        session.status = ServerStatus::MapSending;
        session.mark_frame(tick);
        session.commands.clear();
        for command in pending {
            session.commands.push(command);
        }
        let id = session.identity.index;

        self.send(handle, &ServerSnapshotBegin { tick, total_size });
        self.transfer = Some(SnapshotSource::new(handle, tick, blob, seeds));
        info!(client_id = id, tick, total_size, "Snapshot transfer started");
        self.state_changed(handle);
        self.send_snapshot_batch();
        Ok(())
    }

    /// Queue the next batch of the live transfer and adapt the batch size.
    fn send_snapshot_batch(&mut self) {
        let Some(transfer) = self.transfer.as_mut() else {
            return;
        };
        let handle = transfer.dest();
        let Some(p) = self.registry.get_mut(handle) else {
            self.transfer = None;
            return;
        };

        for packet in transfer.next_batch() {
            if let Err(err) = p.conn.send(packet) {
                warn!(client_id = p.id(), error = %err, "Snapshot packet dropped");
                self.doomed
                    .push_back((handle, Departure::Error(ErrorCode::ConnectionLost)));
                return;
            }
        }

        if transfer.is_exhausted() {
            let end = ServerSnapshotEnd {
                seeds: transfer.seeds().to_vec(),
            };
            let id = p.id();
            p.session.status = ServerStatus::MapDelivered;
            self.transfer = None;
            self.send(handle, &end);
            info!(client_id = id, "Snapshot transfer finished");
            self.state_changed(handle);
            self.promote_waiter();
            return;
        }

        match p.conn.flush() {
            Readiness::Ready(()) => transfer.adapt(false),
            Readiness::WouldBlock => transfer.adapt(true),
            Readiness::Error(err) => {
                debug!(client_id = p.id(), error = %err, "Flush failed during snapshot");
                self.doomed
                    .push_back((handle, Departure::Error(ErrorCode::ConnectionLost)));
            }
        }
    }

    /// Hand the snapshot to the first waiting connection, if it is free.
    fn promote_waiter(&mut self) {
        if self.transfer.is_some() {
            return;
        }
        let waiters: Vec<ConnHandle> = self
            .registry
            .iter()
            .filter(|(h, p)| p.session.status == ServerStatus::MapWait && !self.is_doomed(*h))
            .map(|(h, _)| h)
            .collect();
        let Some((&first, rest)) = waiters.split_first() else {
            return;
        };

        if let Err(err) = self.begin_transfer(first) {
            self.reject(first, err.code);
            return;
        }
        for (ahead, &handle) in rest.iter().enumerate() {
            let waiting = (ahead + 1).min(u8::MAX as usize) as u8;
            self.send(handle, &ServerWait { waiting });
        }
    }

    // ========================================================================
    // Chat
    // ========================================================================

    /// Chat line from the authority's own participant.
    pub fn chat(&mut self, dest: ChatDest, dest_id: u16, message: String) {
        self.relay_chat(SERVER_INDEX, None, dest, dest_id, message);
    }

    pub(crate) fn relay_chat(
        &mut self,
        from: ParticipantId,
        sender: Option<ConnHandle>,
        dest: ChatDest,
        dest_id: u16,
        message: String,
    ) {
        let line = |self_send: bool| ServerChat {
            dest,
            from,
            self_send,
            message: message.clone(),
        };

        match dest {
            ChatDest::Broadcast => self.broadcast(&line(false), ServerSession::in_game),
            ChatDest::Client => {
                let target = self.registry.find(dest_id);
                if let Some(target) = target {
                    self.send(target, &line(false));
                }
                if let Some(sender) = sender
                    && target != Some(sender)
                {
                    self.send(sender, &line(true));
                }
            }
            ChatDest::Role => {
                let role = u8::try_from(dest_id).unwrap_or(SPECTATOR_ROLE);
                self.broadcast(&line(false), |s| s.in_game() && s.identity.role == role);
                if let Some(sender) = sender
                    && self
                        .session(sender)
                        .is_some_and(|s| s.identity.role != role)
                {
                    self.send(sender, &line(true));
                }
            }
        }

        debug!(from, ?dest, dest_id, "Chat relayed");
        self.events.push(HubEvent::Chat {
            from,
            dest,
            dest_id,
            message,
        });
    }
}

pub(crate) fn client_info(identity: &IdentityRecord) -> ServerClientInfo {
    ServerClientInfo {
        index: identity.index,
        role: identity.role,
        name: identity.name.clone(),
        unique_id: identity.unique_id.clone(),
    }
}
