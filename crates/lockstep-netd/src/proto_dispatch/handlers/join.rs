use lockstep_proto::{
    codec::read_message,
    constants::{NOREV_STRING, SPECTATOR_ROLE},
    messages::join::{ClientJoin, PasswordKind},
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::{info, warn};

use crate::hub::ServerHub;
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;
use crate::session::ServerStatus;

/// Accept an identity, then ask for whichever password is still missing.
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
    let join: ClientJoin = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status != ServerStatus::Inactive || session.joined {
        return Err(HandlerError::not_expected());
    }
    let id = session.identity.index;

    if join.revision != NOREV_STRING && join.revision != hub.config.revision {
        warn!(
            client_id = id,
            client_revision = %join.revision,
            server_revision = %hub.config.revision,
            "Wrong revision"
        );
        return Err(HandlerError::wrong_revision());
    }

    let name = hub
        .unique_name(&join.name)
        .ok_or_else(HandlerError::name_in_use)?;
    if let Some(session) = hub.session_mut(handle) {
        session.identity.name = name.clone();
        session.identity.role = join.role;
        session.identity.unique_id = join.unique_id;
        session.language = join.language;
        session.joined = true;
    }
    info!(client_id = id, name = %name, role = join.role, "Client joining");

    if hub.creds.game_password_required() {
        hub.request_password(handle, PasswordKind::Game);
    } else if join.role != SPECTATOR_ROLE && hub.creds.company_password_required(join.role) {
        hub.request_password(handle, PasswordKind::Company);
    } else {
        hub.welcome(handle);
    }
    Ok(())
}
