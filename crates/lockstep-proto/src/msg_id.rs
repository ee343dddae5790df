use strum::FromRepr;

/// Wire discriminant carried in the third byte of every packet.
///
/// Values are fixed; never reorder.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum MsgId {
    ServerFull = 0,
    ServerBanned = 1,
    ClientJoin = 2,
    ServerError = 3,
    ClientGameInfo = 4,
    ServerGameInfo = 5,
    ServerClientInfo = 6,
    ServerNeedPassword = 7,
    ClientPassword = 8,
    ServerWelcome = 9,
    ClientGetSnapshot = 10,
    ServerWait = 11,
    ServerSnapshotBegin = 12,
    ServerSnapshotData = 13,
    ServerSnapshotEnd = 14,
    ClientSnapshotOk = 15,
    ServerJoin = 16,
    ServerFrame = 17,
    ClientAck = 18,
    ServerSync = 19,
    ClientCommand = 20,
    ServerCommand = 21,
    ClientChat = 22,
    ServerChat = 23,
    ClientQuit = 24,
    ClientError = 25,
    ServerQuit = 26,
    ServerErrorQuit = 27,
    ServerShutdown = 28,
    ServerNewGame = 29,
    ServerCommandRejected = 30,
    ClientSetName = 31,
    ClientSetPassword = 32,
}

impl MsgId {
    /// True for packets only the authority may send.
    pub const fn is_server_message(self) -> bool {
        !matches!(
            self,
            MsgId::ClientJoin
                | MsgId::ClientGameInfo
                | MsgId::ClientPassword
                | MsgId::ClientGetSnapshot
                | MsgId::ClientSnapshotOk
                | MsgId::ClientAck
                | MsgId::ClientCommand
                | MsgId::ClientChat
                | MsgId::ClientQuit
                | MsgId::ClientError
                | MsgId::ClientSetName
                | MsgId::ClientSetPassword
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_are_stable() {
        assert_eq!(MsgId::ServerFull as u8, 0);
        assert_eq!(MsgId::ClientJoin as u8, 2);
        assert_eq!(MsgId::ServerFrame as u8, 17);
        assert_eq!(MsgId::ServerCommandRejected as u8, 30);
        assert_eq!(MsgId::from_repr(21), Some(MsgId::ServerCommand));
        assert_eq!(MsgId::ClientSetPassword as u8, 32);
        assert_eq!(MsgId::from_repr(31), Some(MsgId::ClientSetName));
        assert_eq!(MsgId::from_repr(33), None);
    }

    #[test]
    fn direction_split() {
        assert!(MsgId::ServerFrame.is_server_message());
        assert!(!MsgId::ClientAck.is_server_message());
        assert!(!MsgId::ClientCommand.is_server_message());
        assert!(MsgId::ServerCommand.is_server_message());
        assert!(!MsgId::ClientSetName.is_server_message());
        assert!(!MsgId::ClientSetPassword.is_server_message());
    }
}
