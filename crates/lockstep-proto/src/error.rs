use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Appending a field would push the packet past `SEND_MTU`.
    #[error("buffer overflow: {needed} bytes needed, {remaining} remaining")]
    BufferOverflow { needed: usize, remaining: usize },
    /// A field could not be read within the declared packet size.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),
    #[error("declared packet size {0} exceeds the MTU")]
    Oversized(usize),
    #[error("declared packet size {0} is below the packet header")]
    Undersized(usize),
    #[error("unknown msg id: {0}")]
    UnknownMsgId(u8),
    #[error("string contains an interior NUL byte")]
    InteriorNul,
    #[error("unknown error code: {0}")]
    UnknownErrorCode(u8),
    #[error("unknown password kind: {0}")]
    UnknownPasswordKind(u8),
}
