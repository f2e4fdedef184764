//! Error types for the networking module.

use thiserror::Error;

/// Errors reported by datagram socket operations.
///
/// Every failing socket call records its error as the socket's last error
/// (see [`Udp6Socket::last_error`](crate::udp6::Udp6Socket::last_error)), so
/// the type is `Copy` and comparable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketError {
    /// The operation is not permitted in the current bind, connect,
    /// shutdown or closed state.
    #[error("operation not permitted in the current socket state")]
    InvalidState,

    /// The requested local address and port are already taken.
    #[error("address already in use")]
    AddressInUse,

    /// The requested local address is not owned by any local interface.
    #[error("address not available")]
    AddressUnavailable,

    /// The socket has no peer and the operation needs one.
    #[error("socket is not connected")]
    NotConnected,

    /// The socket is already connected to a different peer.
    #[error("socket is already connected")]
    AlreadyConnected,

    /// A broadcast-class destination was used without permission.
    #[error("broadcast not permitted")]
    BroadcastNotPermitted,

    /// The datagram is larger than the transport or path MTU allows.
    #[error("message too long")]
    MessageTooLong,

    /// Duplicate multicast join, or leave of a group that was never joined.
    #[error("multicast membership conflict")]
    MulticastMembershipConflict,

    /// The operation is not supported by datagram sockets.
    #[error("operation not supported")]
    OperationNotSupported,

    /// No datagram is queued; try again once data is available.
    #[error("operation would block")]
    WouldBlock,

    /// An argument is malformed (non-multicast group, unknown interface,
    /// unspecified peer).
    #[error("invalid argument")]
    InvalidArgument,

    /// No route or egress interface exists for the destination.
    #[error("network unreachable")]
    NetworkUnreachable,

    /// The destination host could not be reached.
    #[error("host unreachable")]
    HostUnreachable,

    /// The peer reported that no socket listens on the destination port.
    #[error("connection refused")]
    ConnectionRefused,

    /// Communication with the destination is administratively prohibited.
    #[error("permission denied")]
    PermissionDenied,

    /// The peer rejected a datagram header field.
    #[error("protocol error")]
    ProtocolError,
}

impl SocketError {
    /// Whether this error is a transient condition rather than a failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock)
    }
}

/// A specialized Result type for socket operations.
pub type Result<T> = std::result::Result<T, SocketError>;
