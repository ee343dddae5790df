use lockstep_proto::{msg_id::MsgId, packet::PacketReader, transport::ByteStream};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::warn;

use crate::hub::ServerHub;
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;

mod ack;
mod chat;
mod command;
mod game_info;
mod identity;
mod join;
mod password;
mod quit;
mod snapshot;

/// Route one client packet to its handler.
///
/// Unknown ids, server-only ids and packets whose reads ran past the end are
/// all illegal; the caller answers them with `ServerError` and closes.
pub(crate) fn dispatch_packet<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    frame: &[u8],
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    let mut reader = PacketReader::new(frame)?;
    let msg_id = match reader.msg_id() {
        Ok(id) => id,
        Err(_) => {
            warn!(msg_type = reader.msg_type(), "Unknown message type");
            return Err(HandlerError::illegal_packet());
        }
    };

    let result = match msg_id {
        MsgId::ClientGameInfo => game_info::handle(hub, handle, &mut reader),
        MsgId::ClientJoin => join::handle(hub, handle, &mut reader),
        MsgId::ClientPassword => password::handle(hub, handle, &mut reader),
        MsgId::ClientGetSnapshot => snapshot::handle_get(hub, handle, &mut reader),
        MsgId::ClientSnapshotOk => snapshot::handle_ok(hub, handle, &mut reader),
        MsgId::ClientAck => ack::handle(hub, handle, &mut reader),
        MsgId::ClientCommand => command::handle(hub, handle, &mut reader),
        MsgId::ClientChat => chat::handle(hub, handle, &mut reader),
        MsgId::ClientQuit => quit::handle_quit(hub, handle, &mut reader),
        MsgId::ClientError => quit::handle_error(hub, handle, &mut reader),
        MsgId::ClientSetName => identity::handle_set_name(hub, handle, &mut reader),
        MsgId::ClientSetPassword => identity::handle_set_password(hub, handle, &mut reader),
        _ => {
            warn!(
                client_id = hub.session(handle).map(|s| s.identity.index),
                ?msg_id,
                payload_len = reader.remaining(),
                "Server-only message received from a client"
            );
            Err(HandlerError::illegal_packet())
        }
    };

    if reader.is_malformed() {
        return Err(HandlerError::illegal_packet());
    }
    result
}
