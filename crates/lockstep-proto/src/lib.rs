//! Wire format for the lockstep sync protocol.
//!
//! Every packet is `[u16 LE total size][u8 type][payload]`, at most
//! [`constants::SEND_MTU`] bytes. [`packet`] holds the primitive writer and
//! cursor reader, [`messages`] the typed catalogue, and [`transport`] the
//! non-blocking connection that moves whole packets over a byte stream.

pub mod codec;
pub mod constants;
pub mod error;
pub mod framing;
pub mod limits;
pub mod messages;
pub mod msg_id;
pub mod packet;
pub mod transport;

pub use error::ProtoError;
pub use messages::Message;
pub use msg_id::MsgId;
