use lockstep_proto::{
    codec::read_message,
    constants::SPECTATOR_ROLE,
    messages::join::{ClientSetName, ClientSetPassword},
    packet::PacketReader,
    transport::ByteStream,
};
use lockstep_sim::{CredentialStore, Simulation};
use tracing::{debug, info};

use crate::hub::{HubEvent, ServerHub, client_info};
use crate::proto_dispatch::error::{HandlerError, HandlerResult};
use crate::registry::ConnHandle;
use crate::session::ServerStatus;

/// Rename an authorized participant and tell everyone about it.
/// A name someone else already holds is ignored, never suffixed.
pub(super) fn handle_set_name<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    let msg: ClientSetName = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status < ServerStatus::Authorized {
        return Err(HandlerError::not_authorized());
    }
    let id = session.identity.index;
    if msg.name.is_empty() || msg.name == session.identity.name {
        return Ok(());
    }
    if hub.unique_name(&msg.name).as_deref() != Some(msg.name.as_str()) {
        debug!(client_id = id, name = %msg.name, "Rename refused, name in use");
        return Ok(());
    }

    let Some(session) = hub.session_mut(handle) else {
        return Ok(());
    };
    let old = std::mem::replace(&mut session.identity.name, msg.name.clone());
    let info = client_info(&session.identity);
    info!(client_id = id, %old, new = %msg.name, "Client renamed");

    hub.broadcast(&info, |s| s.status >= ServerStatus::Authorized);
    hub.push_event(HubEvent::Renamed {
        id,
        old,
        new: msg.name,
    });
    Ok(())
}

/// Replace the company password of the sender's role.
pub(super) fn handle_set_password<S, C, T>(
    hub: &mut ServerHub<S, C, T>,
    handle: ConnHandle,
    reader: &mut PacketReader<'_>,
) -> HandlerResult
where
    S: Simulation,
    C: CredentialStore,
    T: ByteStream,
{
    let msg: ClientSetPassword = read_message(reader)?;
    let Some(session) = hub.session(handle) else {
        return Ok(());
    };
    if session.status < ServerStatus::Authorized {
        return Err(HandlerError::not_authorized());
    }
    let id = session.identity.index;
    let role = session.identity.role;
    if role == SPECTATOR_ROLE {
        debug!(client_id = id, "Spectator tried to set a company password");
        return Ok(());
    }

    hub.creds.set_company_password(role, &msg.password);
    info!(
        client_id = id,
        role,
        cleared = msg.password.is_empty(),
        "Company password changed"
    );
    Ok(())
}
