use lockstep_proto::{
    codec::read_message,
    messages::{
        command::{ClientCommand, ServerCommandRejected},
        session::ErrorCode,
    },
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CommandCheck, CredentialStore, Simulation};
use tracing::{debug, warn};

use crate::hub::ServerHub;
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;
use crate::session::ServerStatus;

/// Validate a participant's command and schedule it for everyone.
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
    let msg: ClientCommand = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status < ServerStatus::MapDelivered {
        return Err(HandlerError::not_expected());
    }
    let id = session.identity.index;
    let role = session.identity.role;
    let pending = session.pending_targets.len();

    match hub.sim.check_command(&msg.body) {
        CommandCheck::Allowed => {}
        CommandCheck::Invalid => {
            warn!(client_id = id, op = msg.body.op, "Invalid command");
            return Err(HandlerError::not_expected());
        }
        CommandCheck::ServerOnly => {
            warn!(client_id = id, op = msg.body.op, "Client tried a server-only command");
            return Err(HandlerError::kicked());
        }
    }
    if msg.body.issuer != role {
        warn!(client_id = id, role, issuer = msg.body.issuer, "Command issued for another role");
        return Err(HandlerError::player_mismatch());
    }

    if pending >= hub.config.max_pending_commands {
        debug!(client_id = id, pending, "Command queue full, rejecting");
        hub.send(
            handle,
            &ServerCommandRejected {
                callback: msg.callback,
                code: ErrorCode::CommandQueueFull,
            },
        );
        return Ok(());
    }

    hub.schedule(msg.body, msg.callback, Some(handle));
    Ok(())
}
