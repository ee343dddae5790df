//! Snapshot request and load confirmation.

use lockstep_proto::{
    codec::read_message,
    messages::{
        frame::{ServerFrame, ServerSync},
        join::ServerJoin,
        snapshot::{ClientGetSnapshot, ClientSnapshotOk, ServerWait},
    },
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::info;

use crate::hub::{ServerHub, client_info};
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;
use crate::session::{ServerSession, ServerStatus};

/// Start a transfer, or queue behind the one already running.
pub(super) fn handle_get<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    read_message::<ClientGetSnapshot>(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    match session.status {
        ServerStatus::Inactive => return Err(HandlerError::not_authorized()),
        ServerStatus::Authorized => {}
        _ => return Err(HandlerError::not_expected()),
    }
    let id = session.identity.index;

    if hub.transfer.is_none() {
        return hub.begin_transfer(handle);
    }

    // Everyone already waiting, plus the transfer in progress.
    let ahead = hub.count_in(ServerStatus::MapWait) + 1;
    if let Some(session) = hub.session_mut(handle) {
        session.status = ServerStatus::MapWait;
    }
    let waiting = ahead.min(u8::MAX as usize) as u8;
    hub.send(handle, &ServerWait { waiting });
    info!(client_id = id, waiting, "Queued for snapshot");
    hub.state_changed(handle);
    Ok(())
}

/// The participant loaded the snapshot: catch it up and announce it.
pub(super) fn handle_ok<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    read_message::<ClientSnapshotOk>(reader)?;
    let tick = hub.clock.tick;
    let Some(session) = hub.session_mut(handle) else {
        return Ok(());
    };
    if session.status != ServerStatus::MapDelivered {
        return Err(HandlerError::not_expected());
    }
    session.status = ServerStatus::PreActive;
    session.mark_frame(tick);
    let id = session.identity.index;
    let info = client_info(&session.identity);

    hub.flush_commands(handle);
    let fingerprint = hub.clock.fingerprint;
    let frame = ServerFrame {
        tick,
        ceiling: hub.clock.ceiling,
        fingerprint: hub.config.sync_every_frame.then_some(fingerprint),
    };
    hub.send(handle, &frame);
    hub.send(handle, &ServerSync { tick, fingerprint });

    hub.broadcast(&info, ServerSession::in_game);
    hub.broadcast(&ServerJoin { index: id }, ServerSession::in_game);

    info!(client_id = id, tick, "Client loaded snapshot");
    hub.state_changed(handle);
    Ok(())
}
