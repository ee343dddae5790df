/// Maximum size of one packet on the wire, length prefix and type byte included.
pub const SEND_MTU: usize = 1460;

/// Length prefix size in bytes.
///
/// Every packet is framed as `[u16 total_size_le][u8 msg_type][payload]`,
/// where `total_size` counts the prefix itself and the type byte.
pub const LEN_PREFIX: usize = 2;

/// Prefix plus type byte. The smallest legal packet.
pub const PACKET_HEADER_LEN: usize = LEN_PREFIX + 1;

/// Ticks in one simulated day. Lag is accounted for in whole days.
pub const DAY_TICKS: u32 = 74;

/// Identity of the authority itself in `ServerClientInfo`.
pub const SERVER_INDEX: u16 = 1;

/// First identity handed to a remote participant.
pub const FIRST_CLIENT_INDEX: u16 = SERVER_INDEX + 1;

/// Role byte for a participant that only watches.
pub const SPECTATOR_ROLE: u8 = 0xFF;

/// Revision both sides report by default.
pub const REVISION: &str = env!("CARGO_PKG_VERSION");

/// Revision a client may send to skip the revision check.
pub const NOREV_STRING: &str = "norev000";

// String limits below include the terminating NUL.

pub const NAME_LENGTH: usize = 80;
pub const REVISION_LENGTH: usize = 15;
pub const UNIQUE_ID_LENGTH: usize = 33;
pub const PASSWORD_LENGTH: usize = 20;
pub const CHAT_LENGTH: usize = 256;
pub const QUIT_REASON_LENGTH: usize = 100;
pub const COMMAND_TEXT_LENGTH: usize = 80;
