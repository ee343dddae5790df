use lockstep_proto::{
    codec::read_message, constants::DAY_TICKS, messages::frame::ClientAck, packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::{info, trace};

use crate::hub::ServerHub;
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;
use crate::session::ServerStatus;

/// Record progress. A pre-active participant becomes active once it
/// acknowledges a tick within one day of the authority.
pub(super) fn handle<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    let ack: ClientAck = read_message(reader)?;
    let tick = hub.clock.tick;
    let Some(session) = hub.session_mut(handle) else {
        return Ok(());
    };

    let promoted = match session.status {
        ServerStatus::PreActive => ack.tick.saturating_add(DAY_TICKS) >= tick,
        ServerStatus::Active => false,
        _ => return Err(HandlerError::not_expected()),
    };
    session.last_frame = ack.tick;
    session.last_frame_server = tick;
    let id = session.identity.index;
    trace!(client_id = id, ack = ack.tick, tick, "Ack");

    if promoted {
        session.status = ServerStatus::Active;
        info!(client_id = id, tick, "Client active");
        hub.state_changed(handle);
    }
    Ok(())
}
