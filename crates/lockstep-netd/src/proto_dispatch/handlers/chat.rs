use lockstep_proto::{
    codec::read_message, messages::chat::ClientChat, packet::PacketReader, transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};

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
    let msg: ClientChat = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status < ServerStatus::Authorized {
        return Err(HandlerError::not_authorized());
    }
    let from = session.identity.index;
    hub.relay_chat(from, Some(handle), msg.dest, msg.dest_id, msg.message);
    Ok(())
}
