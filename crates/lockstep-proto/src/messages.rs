use crate::{
    error::ProtoError,
    msg_id::MsgId,
    packet::{Packet, PacketReader},
};

/// A typed protocol message.
///
/// Field order in `encode_body`/`decode_body` is the wire layout; both must
/// stay in lockstep with each other.
pub trait Message: Sized {
    const ID: MsgId;

    fn encode_body(&self, packet: &mut Packet) -> Result<(), ProtoError>;

    fn decode_body(reader: &mut PacketReader<'_>) -> Result<Self, ProtoError>;
}

/// Declares a message without payload.
macro_rules! empty_message {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl $crate::messages::Message for $name {
            const ID: $crate::msg_id::MsgId = $crate::msg_id::MsgId::$name;

            fn encode_body(
                &self,
                _packet: &mut $crate::packet::Packet,
            ) -> Result<(), $crate::error::ProtoError> {
                Ok(())
            }

            fn decode_body(
                _reader: &mut $crate::packet::PacketReader<'_>,
            ) -> Result<Self, $crate::error::ProtoError> {
                Ok($name)
            }
        }
    };
}

pub mod chat;
pub mod command;
pub mod frame;
pub mod join;
pub mod session;
pub mod snapshot;
