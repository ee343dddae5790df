//! Voluntary departures.
//!
//! Before the snapshot was delivered nobody else knows the connection, so
//! it leaves silently.

use lockstep_proto::{
    codec::read_message,
    messages::session::{ClientError, ClientQuit, ErrorCode},
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::{info, warn};

use crate::hub::{Departure, HubEvent, ServerHub};
use crate::proto_dispatch::error::HandlerResult;
use crate::registry::ConnHandle;
use crate::session::ServerStatus;

pub(super) fn handle_quit<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    let msg: ClientQuit = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    let id = session.identity.index;
    let departure = if session.status < ServerStatus::MapDelivered {
        Departure::Silent
    } else {
        Departure::Quit(msg.reason.clone())
    };
    info!(client_id = id, reason = %msg.reason, "Client quit");
    hub.doom(handle, departure);
    Ok(())
}

pub(super) fn handle_error<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    let msg: ClientError = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    let id = session.identity.index;
    let departure = if session.status < ServerStatus::MapDelivered {
        Departure::Silent
    } else {
        Departure::Error(msg.code)
    };

    warn!(client_id = id, code = %msg.code, "Client reported an error");
    if msg.code == ErrorCode::Desync {
        let tick = hub.clock.tick;
        hub.push_event(HubEvent::Desync { id, tick });
    }
    hub.doom(handle, departure);
    Ok(())
}
