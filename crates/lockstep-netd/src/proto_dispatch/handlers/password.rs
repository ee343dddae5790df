use lockstep_proto::{
    codec::read_message,
    constants::SPECTATOR_ROLE,
    messages::join::{ClientPassword, PasswordKind},
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::{debug, warn};

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
    let msg: ClientPassword = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status != ServerStatus::Inactive || session.awaiting_password != Some(msg.kind) {
        return Err(HandlerError::not_expected());
    }
    let id = session.identity.index;
    let role = session.identity.role;

    match msg.kind {
        PasswordKind::Game => {
            if !hub.creds.verify_game_password(&msg.password) {
                warn!(client_id = id, "Wrong game password");
                return Err(HandlerError::wrong_password());
            }
            if role != SPECTATOR_ROLE && hub.creds.company_password_required(role) {
                hub.request_password(handle, PasswordKind::Company);
                return Ok(());
            }
        }
        PasswordKind::Company => {
            if !hub.creds.verify_company_password(role, &msg.password) {
                warn!(client_id = id, role, "Wrong company password");
                return Err(HandlerError::wrong_password());
            }
        }
    }

    debug!(client_id = id, kind = ?msg.kind, "Password accepted");
    hub.welcome(handle);
    Ok(())
}
