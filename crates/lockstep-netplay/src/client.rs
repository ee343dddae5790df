//! Participant session.
//!
//! [`ClientSession`] owns one connection to the authority and the local
//! copy of the simulation. It is driven by two calls:
//!
//! - [`ClientSession::poll`] reads and handles whatever the authority sent
//! - [`ClientSession::run_ticks`] advances the simulation as far as the last
//!   frame allows, executing commands on their target tick and comparing
//!   fingerprints at sync ticks
//!
//! Commands submitted locally are only sent to the authority. They enter the
//! local queue when the authority echoes them back with a target tick, the
//! same way every other participant receives them.

use std::collections::BTreeMap;
use std::mem;

use lockstep_proto::{
    Message, MsgId,
    codec::read_message,
    limits::MAX_PACKETS_PER_POLL,
    messages::{
        chat::{ChatDest, ClientChat, ServerChat},
        command::{ClientCommand, CommandBody, ServerCommand, ServerCommandRejected},
        frame::{ClientAck, ServerFrame, ServerSync},
        join::{
            ClientGameInfo, ClientJoin, ClientPassword, ClientSetName, ClientSetPassword,
            PasswordKind, ServerClientInfo, ServerGameInfo, ServerJoin, ServerNeedPassword,
            ServerWelcome,
        },
        session::{ClientError, ClientQuit, ErrorCode, ServerError, ServerErrorQuit, ServerQuit},
        snapshot::{
            ClientGetSnapshot, ClientSnapshotOk, ServerSnapshotBegin, ServerSnapshotData,
            ServerSnapshotEnd, ServerWait,
        },
    },
    packet::PacketReader,
    transport::{ByteStream, Connection, Readiness},
};
use lockstep_sim::{Command, CommandQueue, Simulation, SyncError};
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::ClientConfig,
    error::NetplayError,
    session::{ClientStatus, RemoteParticipant},
    sync::{LockstepClock, SnapshotSink, SyncCheck, open_sink},
};

/// Why another participant left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveReason {
    Quit(String),
    Error(ErrorCode),
}

/// Why this session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Full,
    Banned,
    /// The authority closed the session with this error.
    Error(ErrorCode),
    Shutdown,
    NewGame,
    /// We quit.
    Quit,
    /// We ended the session because of this error.
    Local(ErrorCode),
    ConnectionLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    GameInfo(ServerGameInfo),
    StatusChanged(ClientStatus),
    /// A password is needed and the config has none for this kind.
    PasswordRequired(PasswordKind),
    /// Another participant is downloading; `waiting` are queued.
    SnapshotQueued { waiting: u8 },
    SnapshotLoaded { tick: u32 },
    ParticipantInfo(RemoteParticipant),
    ParticipantJoined { index: u16 },
    ParticipantLeft { index: u16, reason: LeaveReason },
    /// A command ran locally. `callback` is non-zero only for our own.
    CommandExecuted { command: Command, tick: u32 },
    CommandRejected { callback: u8, code: ErrorCode },
    Chat {
        dest: ChatDest,
        from: u16,
        self_send: bool,
        message: String,
    },
    SyncVerified { tick: u32 },
    Desync { tick: u32, expected: u32, actual: u32 },
    Disconnected(DisconnectReason),
}

#[derive(Debug)]
struct Download {
    tick: u32,
    total_size: u32,
    sink: Box<dyn SnapshotSink>,
}

#[derive(Debug)]
pub struct ClientSession<S, T> {
    config: ClientConfig,
    conn: Connection<T>,
    status: ClientStatus,
    /// Closed locally but the last packets are still being written.
    closing: bool,
    index: Option<u16>,
    world: Option<S>,
    clock: LockstepClock,
    queue: CommandQueue,
    download: Option<Download>,
    participants: BTreeMap<u16, RemoteParticipant>,
    events: Vec<ClientEvent>,
}

impl<S: Simulation, T: ByteStream> ClientSession<S, T> {
    pub fn new(config: ClientConfig, stream: T) -> Self {
        Self {
            config,
            conn: Connection::new(stream),
            status: ClientStatus::Inactive,
            closing: false,
            index: None,
            world: None,
            clock: LockstepClock::new(),
            queue: CommandQueue::new(),
            download: None,
            participants: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn status(&self) -> ClientStatus {
        self.status
    }

    /// Index the authority assigned to us.
    pub fn index(&self) -> Option<u16> {
        self.index
    }

    pub fn world(&self) -> Option<&S> {
        self.world.as_ref()
    }

    pub fn clock(&self) -> &LockstepClock {
        &self.clock
    }

    pub fn tick(&self) -> u32 {
        self.clock.tick()
    }

    pub fn fingerprint_at(&self, tick: u32) -> Option<u32> {
        self.clock.fingerprint_at(tick)
    }

    /// Commands received but not yet executed.
    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn participants(&self) -> impl Iterator<Item = &RemoteParticipant> {
        self.participants.values()
    }

    pub fn stream(&self) -> &T {
        self.conn.stream()
    }

    pub fn is_connected(&self) -> bool {
        !self.conn.is_closed() && !self.closing
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        mem::take(&mut self.events)
    }

    // ---- requests ----

    pub fn request_game_info(&mut self) -> Result<(), NetplayError> {
        self.require(self.status == ClientStatus::Inactive, "request game info")?;
        self.send(&ClientGameInfo)?;
        self.set_status(ClientStatus::RequestingInfo);
        Ok(())
    }

    pub fn join(&mut self) -> Result<(), NetplayError> {
        self.require(
            matches!(
                self.status,
                ClientStatus::Inactive | ClientStatus::RequestingInfo
            ),
            "join",
        )?;
        let hello = ClientJoin {
            revision: self.config.revision.clone(),
            name: self.config.name.clone(),
            role: self.config.role,
            language: self.config.language,
            unique_id: self.config.unique_id.clone(),
        };
        self.send(&hello)?;
        info!(name = %hello.name, role = hello.role, "Joining");
        self.set_status(ClientStatus::Joining);
        Ok(())
    }

    /// Answer a challenge the config could not answer itself.
    pub fn send_password(&mut self, kind: PasswordKind, password: &str) -> Result<(), NetplayError> {
        self.require(
            self.status == ClientStatus::AwaitingPassword,
            "send a password",
        )?;
        self.send(&ClientPassword {
            kind,
            password: password.to_string(),
        })?;
        self.set_status(ClientStatus::Joining);
        Ok(())
    }

    /// Ask the authority to schedule a command. It runs when echoed back.
    pub fn submit(&mut self, body: CommandBody, callback: u8) -> Result<(), NetplayError> {
        self.require(self.status.has_world(), "submit a command")?;
        debug!(op = body.op, issuer = body.issuer, callback, "Submitting command");
        self.send(&ClientCommand { body, callback })
    }

    pub fn chat(
        &mut self,
        dest: ChatDest,
        dest_id: u16,
        message: impl Into<String>,
    ) -> Result<(), NetplayError> {
        self.require(self.status >= ClientStatus::Authorized, "chat")?;
        self.send(&ClientChat {
            dest,
            dest_id,
            message: message.into(),
        })
    }

    /// Ask for a new display name. The authority answers with a fresh
    /// `ParticipantInfo` for our index, or ignores a name already in use.
    pub fn set_name(&mut self, name: &str) -> Result<(), NetplayError> {
        self.require(self.status >= ClientStatus::Authorized, "rename")?;
        self.send(&ClientSetName {
            name: name.to_string(),
        })
    }

    pub fn set_password(&mut self, password: &str) -> Result<(), NetplayError> {
        self.require(self.status >= ClientStatus::Authorized, "set a password")?;
        self.send(&ClientSetPassword {
            password: password.to_string(),
        })
    }

    pub fn quit(&mut self, reason: &str) -> Result<(), NetplayError> {
        if !self.is_connected() {
            return Err(NetplayError::NotConnected);
        }
        self.send(&ClientQuit {
            reason: reason.to_string(),
        })?;
        let _ = self.conn.flush();
        info!(%reason, "Leaving session");
        self.finish(DisconnectReason::Quit);
        Ok(())
    }

    // ---- driving ----

    /// Handle everything the authority sent, then flush what we queued.
    pub fn poll(&mut self) -> Result<(), NetplayError> {
        if self.closing {
            self.finish_close();
        }
        if !self.is_connected() {
            return Err(NetplayError::NotConnected);
        }

        for _ in 0..MAX_PACKETS_PER_POLL {
            match self.conn.try_receive() {
                Readiness::Ready(frame) => {
                    if let Err(err) = self.handle_packet(&frame) {
                        return Err(self.fail(err));
                    }
                    if !self.is_connected() {
                        return Ok(());
                    }
                }
                Readiness::WouldBlock => break,
                Readiness::Error(err) => {
                    warn!(%err, "Connection to server lost");
                    self.finish(DisconnectReason::ConnectionLost);
                    return Err(err.into());
                }
            }
        }
        self.flush()
    }

    /// Run every tick the last frame released. Returns how many ran.
    pub fn run_ticks(&mut self) -> Result<u32, NetplayError> {
        if !self.status.has_world() || !self.is_connected() {
            return Ok(0);
        }
        let due = self.clock.due_ticks();
        for _ in 0..due {
            if let Err(err) = self.step() {
                return Err(self.fail(err));
            }
        }
        if due > 0 {
            self.flush()?;
        }
        Ok(due)
    }

    /// Keep writing the packets queued before a local close. True once the
    /// connection is fully closed.
    pub fn finish_close(&mut self) -> bool {
        if self.closing {
            if let Readiness::WouldBlock = self.conn.flush() {
                return false;
            }
            self.conn.close();
            self.closing = false;
        }
        true
    }

    fn step(&mut self) -> Result<(), NetplayError> {
        let Some(world) = self.world.as_mut() else {
            return Ok(());
        };
        let tick = self.clock.advance();
        for command in self.queue.execute_due(tick, world)? {
            self.events.push(ClientEvent::CommandExecuted { command, tick });
        }
        world.advance_tick();
        let fingerprint = world.sample_fingerprint();
        let check = self.clock.record(fingerprint)?;
        self.after_check(check)
    }

    fn after_check(&mut self, check: SyncCheck) -> Result<(), NetplayError> {
        let SyncCheck::Verified { tick, first } = check else {
            return Ok(());
        };
        trace!(tick, "Sync verified");
        self.events.push(ClientEvent::SyncVerified { tick });
        if first {
            self.send(&ClientAck {
                tick: self.clock.tick(),
            })?;
            info!(tick, "In sync with the server");
            self.set_status(ClientStatus::Active);
        }
        Ok(())
    }

    // ---- inbound ----

    fn handle_packet(&mut self, frame: &[u8]) -> Result<(), NetplayError> {
        let mut reader = PacketReader::new(frame)?;
        let id = reader.msg_id()?;
        trace!(?id, len = frame.len(), "Received");
        if !id.is_server_message() {
            return Err(SyncError::protocol(
                ErrorCode::IllegalPacket,
                format!("{id:?} from the server"),
            )
            .into());
        }

        match id {
            MsgId::ServerFull => {
                self.finish(DisconnectReason::Full);
                Err(NetplayError::ServerFull)
            }
            MsgId::ServerBanned => {
                self.finish(DisconnectReason::Banned);
                Err(NetplayError::Banned)
            }
            MsgId::ServerError => {
                let msg: ServerError = read(&mut reader)?;
                warn!(code = %msg.code, "Server closed the session");
                self.finish(DisconnectReason::Error(msg.code));
                Err(NetplayError::Refused(msg.code))
            }
            MsgId::ServerShutdown => {
                info!("Server shut down");
                self.finish(DisconnectReason::Shutdown);
                Ok(())
            }
            MsgId::ServerNewGame => {
                info!("Server started a new game");
                self.finish(DisconnectReason::NewGame);
                Ok(())
            }
            MsgId::ServerGameInfo => self.on_game_info(read(&mut reader)?),
            MsgId::ServerNeedPassword => self.on_need_password(read(&mut reader)?),
            MsgId::ServerWelcome => self.on_welcome(read(&mut reader)?),
            MsgId::ServerClientInfo => self.on_client_info(read(&mut reader)?),
            MsgId::ServerWait => self.on_wait(read(&mut reader)?),
            MsgId::ServerSnapshotBegin => self.on_snapshot_begin(read(&mut reader)?),
            MsgId::ServerSnapshotData => self.on_snapshot_data(read(&mut reader)?),
            MsgId::ServerSnapshotEnd => self.on_snapshot_end(read(&mut reader)?),
            MsgId::ServerJoin => self.on_join(read(&mut reader)?),
            MsgId::ServerFrame => self.on_frame(read(&mut reader)?),
            MsgId::ServerSync => self.on_sync(read(&mut reader)?),
            MsgId::ServerCommand => self.on_command(read(&mut reader)?),
            MsgId::ServerCommandRejected => self.on_command_rejected(read(&mut reader)?),
            MsgId::ServerChat => self.on_chat(read(&mut reader)?),
            MsgId::ServerQuit => self.on_quit(read(&mut reader)?),
            MsgId::ServerErrorQuit => self.on_error_quit(read(&mut reader)?),
            _ => Err(SyncError::protocol(ErrorCode::IllegalPacket, format!("{id:?}")).into()),
        }
    }

    fn on_game_info(&mut self, info: ServerGameInfo) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::RequestingInfo, "game info")?;
        self.events.push(ClientEvent::GameInfo(info));
        Ok(())
    }

    fn on_need_password(&mut self, msg: ServerNeedPassword) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::Joining, "password challenge")?;
        let known = match msg.kind {
            PasswordKind::Game => self.config.game_password.clone(),
            PasswordKind::Company => self.config.company_password.clone(),
        };
        match known {
            Some(password) => self.send(&ClientPassword {
                kind: msg.kind,
                password,
            }),
            None => {
                self.set_status(ClientStatus::AwaitingPassword);
                self.events.push(ClientEvent::PasswordRequired(msg.kind));
                Ok(())
            }
        }
    }

    fn on_welcome(&mut self, msg: ServerWelcome) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::Joining, "welcome")?;
        info!(index = msg.index, "Welcomed by server");
        self.index = Some(msg.index);
        self.set_status(ClientStatus::Authorized);
        self.send(&ClientGetSnapshot)
    }

    fn on_client_info(&mut self, msg: ServerClientInfo) -> Result<(), NetplayError> {
        self.expect_state(self.status >= ClientStatus::Authorized, "client info")?;
        let participant = RemoteParticipant {
            index: msg.index,
            role: msg.role,
            name: msg.name,
            unique_id: msg.unique_id,
        };
        self.participants.insert(participant.index, participant.clone());
        self.events.push(ClientEvent::ParticipantInfo(participant));
        Ok(())
    }

    fn on_wait(&mut self, msg: ServerWait) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::Authorized, "wait")?;
        debug!(waiting = msg.waiting, "Queued for the snapshot");
        self.events.push(ClientEvent::SnapshotQueued {
            waiting: msg.waiting,
        });
        Ok(())
    }

    fn on_snapshot_begin(&mut self, msg: ServerSnapshotBegin) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::Authorized, "snapshot begin")?;
        let sink = open_sink(self.config.spool_dir.as_deref(), msg.tick, msg.total_size)
            .map_err(|e| SyncError::SnapshotFailure(format!("cannot open sink: {e}")))?;
        info!(tick = msg.tick, size = msg.total_size, "Receiving snapshot");
        self.download = Some(Download {
            tick: msg.tick,
            total_size: msg.total_size,
            sink,
        });
        self.clock.reset(msg.tick);
        self.queue.clear();
        self.set_status(ClientStatus::ReceivingMap);
        Ok(())
    }

    fn on_snapshot_data(&mut self, msg: ServerSnapshotData) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::ReceivingMap, "snapshot data")?;
        let Some(download) = self.download.as_mut() else {
            return Err(SyncError::SnapshotFailure("no transfer in progress".into()).into());
        };
        if download.sink.received() + msg.chunk.len() > download.total_size as usize {
            return Err(SyncError::SnapshotFailure("more data than announced".into()).into());
        }
        download
            .sink
            .append(&msg.chunk)
            .map_err(|e| SyncError::SnapshotFailure(format!("cannot store chunk: {e}")))?;
        Ok(())
    }

    fn on_snapshot_end(&mut self, msg: ServerSnapshotEnd) -> Result<(), NetplayError> {
        self.expect_state(self.status == ClientStatus::ReceivingMap, "snapshot end")?;
        let Some(download) = self.download.take() else {
            return Err(SyncError::SnapshotFailure("no transfer in progress".into()).into());
        };
        if download.sink.received() != download.total_size as usize {
            return Err(SyncError::SnapshotFailure(format!(
                "received {} of {} bytes",
                download.sink.received(),
                download.total_size
            ))
            .into());
        }
        let blob = download
            .sink
            .finish()
            .map_err(|e| SyncError::SnapshotFailure(format!("cannot read snapshot: {e}")))?;
        let world = S::deserialize(&blob, &msg.seeds)
            .map_err(|e| SyncError::SnapshotFailure(format!("cannot load snapshot: {e}")))?;

        // The restored state is the authority's state after this tick.
        let check = self.clock.record(world.sample_fingerprint())?;
        self.world = Some(world);
        self.send(&ClientSnapshotOk)?;
        info!(tick = download.tick, "Snapshot loaded");
        self.set_status(ClientStatus::Loaded);
        self.events.push(ClientEvent::SnapshotLoaded {
            tick: download.tick,
        });
        self.after_check(check)
    }

    fn on_join(&mut self, msg: ServerJoin) -> Result<(), NetplayError> {
        self.expect_state(self.status >= ClientStatus::Authorized, "join notice")?;
        if Some(msg.index) == self.index && self.status == ClientStatus::Loaded {
            self.set_status(ClientStatus::PreActive);
        }
        self.events
            .push(ClientEvent::ParticipantJoined { index: msg.index });
        Ok(())
    }

    fn on_frame(&mut self, msg: ServerFrame) -> Result<(), NetplayError> {
        self.expect_state(self.status.has_world(), "frame")?;
        self.clock.on_frame(msg.tick, msg.ceiling);
        if let Some(fingerprint) = msg.fingerprint {
            let check = self.clock.on_sync(msg.tick, fingerprint)?;
            self.after_check(check)?;
        }
        if let Some(tick) = self.clock.ack_due() {
            self.send(&ClientAck { tick })?;
        }
        Ok(())
    }

    fn on_sync(&mut self, msg: ServerSync) -> Result<(), NetplayError> {
        self.expect_state(self.status.has_world(), "sync")?;
        let check = self.clock.on_sync(msg.tick, msg.fingerprint)?;
        self.after_check(check)
    }

    fn on_command(&mut self, msg: ServerCommand) -> Result<(), NetplayError> {
        self.expect_state(self.status.has_world(), "command")?;
        if msg.tick <= self.clock.tick() {
            return Err(SyncError::StaleCommand {
                target: msg.tick,
                tick: self.clock.tick(),
            }
            .into());
        }
        trace!(tick = msg.tick, op = msg.body.op, callback = msg.callback, "Command queued");
        self.queue
            .push(Command::new(msg.body, msg.tick).with_callback(msg.callback));
        Ok(())
    }

    fn on_command_rejected(&mut self, msg: ServerCommandRejected) -> Result<(), NetplayError> {
        warn!(callback = msg.callback, code = %msg.code, "Command rejected");
        self.events.push(ClientEvent::CommandRejected {
            callback: msg.callback,
            code: msg.code,
        });
        Ok(())
    }

    fn on_chat(&mut self, msg: ServerChat) -> Result<(), NetplayError> {
        self.events.push(ClientEvent::Chat {
            dest: msg.dest,
            from: msg.from,
            self_send: msg.self_send,
            message: msg.message,
        });
        Ok(())
    }

    fn on_quit(&mut self, msg: ServerQuit) -> Result<(), NetplayError> {
        self.participants.remove(&msg.index);
        self.events.push(ClientEvent::ParticipantLeft {
            index: msg.index,
            reason: LeaveReason::Quit(msg.reason),
        });
        Ok(())
    }

    fn on_error_quit(&mut self, msg: ServerErrorQuit) -> Result<(), NetplayError> {
        self.participants.remove(&msg.index);
        self.events.push(ClientEvent::ParticipantLeft {
            index: msg.index,
            reason: LeaveReason::Error(msg.code),
        });
        Ok(())
    }

    // ---- plumbing ----

    fn send<M: Message>(&mut self, msg: &M) -> Result<(), NetplayError> {
        self.conn.send_message(msg)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), NetplayError> {
        match self.conn.flush() {
            Readiness::Ready(()) | Readiness::WouldBlock => Ok(()),
            Readiness::Error(err) => {
                warn!(%err, "Connection to server lost");
                self.finish(DisconnectReason::ConnectionLost);
                Err(err.into())
            }
        }
    }

    fn set_status(&mut self, status: ClientStatus) {
        if self.status != status {
            debug!(from = %self.status, to = %status, "Status changed");
            self.status = status;
            self.events.push(ClientEvent::StatusChanged(status));
        }
    }

    /// Local precondition of a request.
    fn require(&self, ok: bool, action: &'static str) -> Result<(), NetplayError> {
        if ok {
            Ok(())
        } else {
            Err(NetplayError::InvalidState {
                action,
                status: self.status,
            })
        }
    }

    /// The authority sent something the current state does not allow.
    fn expect_state(&self, ok: bool, what: &str) -> Result<(), NetplayError> {
        if ok {
            Ok(())
        } else {
            Err(SyncError::protocol(
                ErrorCode::NotExpected,
                format!("{what} while {}", self.status),
            )
            .into())
        }
    }

    /// End the session because of `err`, telling the authority why.
    fn fail(&mut self, err: NetplayError) -> NetplayError {
        if !self.is_connected() {
            return err;
        }
        let code = err.error_code();
        if let NetplayError::Sync(SyncError::DesyncDetected {
            tick,
            expected,
            actual,
        }) = &err
        {
            self.events.push(ClientEvent::Desync {
                tick: *tick,
                expected: *expected,
                actual: *actual,
            });
        }
        error!(%err, %code, "Ending session");
        let _ = self.conn.send_message(&ClientError { code });
        let _ = self.conn.flush();
        self.finish(DisconnectReason::Local(code));
        err
    }

    fn finish(&mut self, reason: DisconnectReason) {
        self.download = None;
        if self.conn.has_backlog() && !self.conn.is_closed() {
            self.closing = true;
        } else {
            self.conn.close();
        }
        self.set_status(ClientStatus::Inactive);
        self.events.push(ClientEvent::Disconnected(reason));
    }
}

fn read<M: Message>(reader: &mut PacketReader<'_>) -> Result<M, NetplayError> {
    Ok(read_message(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_proto::{
        codec::{decode_message, encode_message},
        constants::REVISION,
        messages::session::ServerShutdown,
        transport::MemoryStream,
    };
    use lockstep_sim::DemoWorld;

    type Session = ClientSession<DemoWorld, MemoryStream>;

    /// Session plus the server's end of its pipe.
    fn session(config: ClientConfig) -> (Session, Connection<MemoryStream>) {
        let (client, server) = MemoryStream::pair();
        (ClientSession::new(config, client), Connection::new(server))
    }

    fn push<M: Message>(server: &mut Connection<MemoryStream>, msg: &M) {
        server.send(encode_message(msg).unwrap()).unwrap();
        assert!(server.flush().is_ready());
    }

    fn next<M: Message>(server: &mut Connection<MemoryStream>) -> M {
        let Readiness::Ready(frame) = server.try_receive() else {
            panic!("expected a packet");
        };
        decode_message(&frame).unwrap()
    }

    fn welcomed(config: ClientConfig) -> (Session, Connection<MemoryStream>) {
        let (mut s, mut server) = session(config);
        s.join().unwrap();
        s.poll().unwrap();
        let _: ClientJoin = next(&mut server);
        push(&mut server, &ServerWelcome { index: 4 });
        s.poll().unwrap();
        let _: ClientGetSnapshot = next(&mut server);
        (s, server)
    }

    fn loaded(world: &DemoWorld, tick: u32) -> (Session, Connection<MemoryStream>) {
        let (mut s, mut server) = welcomed(ClientConfig::default());
        let blob = Simulation::serialize(world).unwrap();
        push(
            &mut server,
            &ServerSnapshotBegin {
                tick,
                total_size: blob.len() as u32,
            },
        );
        let mut offset = 0;
        while offset < blob.len() {
            let (packet, taken) = ServerSnapshotData::fill(&blob[offset..]);
            server.send(packet.finish()).unwrap();
            offset += taken;
        }
        push(
            &mut server,
            &ServerSnapshotEnd {
                seeds: world.side_seeds(),
            },
        );
        s.poll().unwrap();
        let _: ClientSnapshotOk = next(&mut server);
        (s, server)
    }

    // ==== handshake ====

    #[test]
    fn join_sends_config_identity() {
        let config = ClientConfig {
            name: "ann".into(),
            role: 2,
            unique_id: "u-1".into(),
            ..ClientConfig::default()
        };
        let (mut s, mut server) = session(config);
        s.join().unwrap();
        s.poll().unwrap();
        let hello: ClientJoin = next(&mut server);
        assert_eq!(hello.revision, REVISION);
        assert_eq!(hello.name, "ann");
        assert_eq!(hello.role, 2);
        assert_eq!(s.status(), ClientStatus::Joining);
    }

    #[test]
    fn configured_password_answers_the_challenge() {
        let config = ClientConfig {
            game_password: Some("hunter2".into()),
            ..ClientConfig::default()
        };
        let (mut s, mut server) = session(config);
        s.join().unwrap();
        push(
            &mut server,
            &ServerNeedPassword {
                kind: PasswordKind::Game,
            },
        );
        s.poll().unwrap();
        let _: ClientJoin = next(&mut server);
        let answer: ClientPassword = next(&mut server);
        assert_eq!(answer.password, "hunter2");
        assert_eq!(s.status(), ClientStatus::Joining);
    }

    #[test]
    fn missing_password_is_surfaced() {
        let (mut s, mut server) = session(ClientConfig::default());
        s.join().unwrap();
        push(
            &mut server,
            &ServerNeedPassword {
                kind: PasswordKind::Company,
            },
        );
        s.poll().unwrap();
        assert_eq!(s.status(), ClientStatus::AwaitingPassword);
        assert!(
            s.drain_events()
                .contains(&ClientEvent::PasswordRequired(PasswordKind::Company))
        );

        s.send_password(PasswordKind::Company, "pw").unwrap();
        s.poll().unwrap();
        let _: ClientJoin = next(&mut server);
        let answer: ClientPassword = next(&mut server);
        assert_eq!(answer.kind, PasswordKind::Company);
    }

    #[test]
    fn welcome_requests_the_snapshot() {
        let (s, _server) = welcomed(ClientConfig::default());
        assert_eq!(s.index(), Some(4));
        assert_eq!(s.status(), ClientStatus::Authorized);
    }

    #[test]
    fn requests_check_local_state() {
        let (mut s, _server) = session(ClientConfig::default());
        assert!(matches!(
            s.submit(CommandBody::default(), 1),
            Err(NetplayError::InvalidState { .. })
        ));
        assert!(s.is_connected());
    }

    #[test]
    fn identity_requests_wait_for_the_welcome() {
        let (mut s, _server) = session(ClientConfig::default());
        assert!(matches!(
            s.set_name("Bea"),
            Err(NetplayError::InvalidState { .. })
        ));

        let (mut s, mut server) = welcomed(ClientConfig::default());
        s.set_name("Bea").unwrap();
        s.set_password("rails").unwrap();
        s.poll().unwrap();
        let name: ClientSetName = next(&mut server);
        assert_eq!(name.name, "Bea");
        let password: ClientSetPassword = next(&mut server);
        assert_eq!(password.password, "rails");
    }

    // ==== snapshot ====

    #[test]
    fn snapshot_restores_world_and_clock() {
        let mut world = DemoWorld::new(5, 2);
        for _ in 0..12 {
            world.advance_tick();
        }
        let (s, _server) = loaded(&world, 12);
        assert_eq!(s.status(), ClientStatus::Loaded);
        assert_eq!(s.tick(), 12);
        assert_eq!(s.world().unwrap().tick(), 12);
        assert_eq!(s.fingerprint_at(12), Some(world.sample_fingerprint()));
    }

    #[test]
    fn short_snapshot_is_reported() {
        let (mut s, mut server) = welcomed(ClientConfig::default());
        push(
            &mut server,
            &ServerSnapshotBegin {
                tick: 3,
                total_size: 100,
            },
        );
        push(&mut server, &ServerSnapshotEnd { seeds: vec![] });
        let err = s.poll().unwrap_err();
        assert!(matches!(err, NetplayError::Sync(SyncError::SnapshotFailure(_))));

        let report: ClientError = next(&mut server);
        assert_eq!(report.code, ErrorCode::SnapshotFailed);
        assert!(!s.is_connected());
        assert_eq!(s.status(), ClientStatus::Inactive);
    }

    // ==== lockstep ====

    #[test]
    fn echoed_commands_run_on_their_tick() {
        let world = DemoWorld::new(5, 2);
        let (mut s, mut server) = loaded(&world, 0);
        let body = CommandBody {
            issuer: 1,
            op: DemoWorld::OP_BUILD,
            p1: 9,
            tile: 3,
            ..CommandBody::default()
        };
        push(
            &mut server,
            &ServerCommand {
                body: body.clone(),
                callback: 6,
                tick: 2,
            },
        );
        push(
            &mut server,
            &ServerFrame {
                tick: 0,
                ceiling: 2,
                fingerprint: None,
            },
        );
        s.poll().unwrap();
        assert_eq!(s.pending_commands(), 1);

        assert_eq!(s.run_ticks().unwrap(), 1);
        assert_eq!(s.pending_commands(), 1);
        assert_eq!(s.run_ticks().unwrap(), 1);
        assert_eq!(s.pending_commands(), 0);
        assert_eq!(s.run_ticks().unwrap(), 0);

        let executed: Vec<_> = s
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::CommandExecuted { command, tick } => Some((command, tick)),
                _ => None,
            })
            .collect();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].1, 2);
        assert_eq!(executed[0].0.callback, 6);
        assert!(s.world().unwrap().tile(3).unwrap() >= world.tile(3).unwrap() + 9);
    }

    #[test]
    fn command_for_a_past_tick_ends_the_session() {
        let world = DemoWorld::new(5, 2);
        let (mut s, mut server) = loaded(&world, 10);
        push(
            &mut server,
            &ServerCommand {
                body: CommandBody::default(),
                callback: 0,
                tick: 10,
            },
        );
        assert!(s.poll().is_err());
        let report: ClientError = next(&mut server);
        assert_eq!(report.code, ErrorCode::General);
    }

    #[test]
    fn first_sync_acks_and_activates() {
        let mut world = DemoWorld::new(5, 2);
        let (mut s, mut server) = loaded(&world, 0);
        push(
            &mut server,
            &ServerFrame {
                tick: 3,
                ceiling: 4,
                fingerprint: None,
            },
        );
        for _ in 0..3 {
            world.advance_tick();
        }
        push(
            &mut server,
            &ServerSync {
                tick: 3,
                fingerprint: world.sample_fingerprint(),
            },
        );
        push(&mut server, &ServerJoin { index: 4 });
        s.poll().unwrap();
        assert_eq!(s.status(), ClientStatus::PreActive);

        assert_eq!(s.run_ticks().unwrap(), 3);
        assert_eq!(s.status(), ClientStatus::Active);
        let ack: ClientAck = next(&mut server);
        assert_eq!(ack.tick, 3);
        assert!(s.drain_events().contains(&ClientEvent::SyncVerified { tick: 3 }));
    }

    #[test]
    fn wrong_fingerprint_is_a_desync() {
        let world = DemoWorld::new(5, 2);
        let (mut s, mut server) = loaded(&world, 0);
        push(
            &mut server,
            &ServerFrame {
                tick: 2,
                ceiling: 2,
                fingerprint: Some(0xDEAD_BEEF),
            },
        );
        s.poll().unwrap();
        let err = s.run_ticks().unwrap_err();
        assert!(matches!(
            err,
            NetplayError::Sync(SyncError::DesyncDetected { tick: 2, .. })
        ));

        let report: ClientError = next(&mut server);
        assert_eq!(report.code, ErrorCode::Desync);
        let events = s.drain_events();
        assert!(events.iter().any(|e| matches!(e, ClientEvent::Desync { tick: 2, .. })));
        assert!(events.contains(&ClientEvent::Disconnected(DisconnectReason::Local(
            ErrorCode::Desync
        ))));
    }

    // ==== departures ====

    #[test]
    fn server_error_ends_the_session() {
        let (mut s, mut server) = session(ClientConfig::default());
        s.join().unwrap();
        push(
            &mut server,
            &ServerError {
                code: ErrorCode::WrongRevision,
            },
        );
        assert!(matches!(
            s.poll(),
            Err(NetplayError::Refused(ErrorCode::WrongRevision))
        ));
        assert!(!s.is_connected());
        assert!(matches!(s.poll(), Err(NetplayError::NotConnected)));
    }

    #[test]
    fn shutdown_is_a_clean_end() {
        let (mut s, mut server) = welcomed(ClientConfig::default());
        push(&mut server, &ServerShutdown);
        s.poll().unwrap();
        assert!(!s.is_connected());
        assert!(
            s.drain_events()
                .contains(&ClientEvent::Disconnected(DisconnectReason::Shutdown))
        );
    }

    #[test]
    fn client_packets_from_the_server_are_illegal() {
        let (mut s, mut server) = session(ClientConfig::default());
        push(&mut server, &ClientAck { tick: 1 });
        assert!(s.poll().is_err());
        let report: ClientError = next(&mut server);
        assert_eq!(report.code, ErrorCode::IllegalPacket);
    }

    #[test]
    fn quit_says_goodbye() {
        let (mut s, mut server) = welcomed(ClientConfig::default());
        s.quit("dinner").unwrap();
        let bye: ClientQuit = next(&mut server);
        assert_eq!(bye.reason, "dinner");
        assert!(!s.is_connected());
    }
}
