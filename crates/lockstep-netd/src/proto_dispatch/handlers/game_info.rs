//! Pre-join server query.

use lockstep_proto::{
    codec::read_message,
    messages::join::{ClientGameInfo, ServerGameInfo},
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::debug;

use crate::hub::ServerHub;
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;
use crate::session::ServerStatus;

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
    read_message::<ClientGameInfo>(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status != ServerStatus::Inactive || session.joined {
        return Err(HandlerError::not_expected());
    }
    let id = session.identity.index;

    let info = ServerGameInfo {
        server_name: hub.config.server_name.clone(),
        revision: hub.config.revision.clone(),
        clients_on: hub.clients_on(),
        max_clients: hub.config.max_clients.min(u8::MAX as usize) as u8,
        use_password: hub.creds.game_password_required(),
        tick: hub.clock.tick,
    };
    debug!(client_id = id, clients_on = info.clients_on, "Answering game info query");
    hub.send(handle, &info);
    Ok(())
}
