use lockstep_proto::messages::command::CommandBody;

use crate::command::Command;

/// Verdict of [`Simulation::check_command`] on a command a participant asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCheck {
    Allowed,
    /// Unknown or malformed operation.
    Invalid,
    /// Only the authority itself may issue this operation.
    ServerOnly,
}

/// The deterministic world being kept in lockstep.
///
/// Every participant holds one instance. Given the same snapshot, side seeds
/// and command sequence, two instances must produce the same fingerprint on
/// every tick.
pub trait Simulation: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Full state as an opaque blob. Side seeds are not part of it.
    fn serialize(&self) -> Result<Vec<u8>, Self::Error>;

    /// Rebuild a world from a blob and the side seeds sent after it.
    fn deserialize(bytes: &[u8], seeds: &[[u32; 2]]) -> Result<Self, Self::Error>;

    /// Out-of-band seed pairs shipped at the end of a snapshot transfer.
    fn side_seeds(&self) -> Vec<[u32; 2]>;

    fn advance_tick(&mut self);

    /// Cheap digest of the deterministic state, compared at sync ticks.
    fn sample_fingerprint(&self) -> u32;

    fn apply_command(&mut self, command: &Command);

    fn check_command(&self, _body: &CommandBody) -> CommandCheck {
        CommandCheck::Allowed
    }
}
