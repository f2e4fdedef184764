//! State enumerations for UDP/IPv6 sockets.

/// Lifecycle state of a UDP/IPv6 socket.
///
/// `Connected` implies bound. `Closed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SocketState {
    /// Socket has no endpoint yet.
    #[default]
    Unbound,
    /// Socket owns an endpoint and a local address.
    Bound,
    /// Socket is bound and has a default peer.
    Connected,
    /// Socket is closed; every operation fails.
    Closed,
}

impl SocketState {
    /// Whether the socket owns an endpoint in this state.
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound | Self::Connected)
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketState::Unbound => write!(f, "Unbound"),
            SocketState::Bound => write!(f, "Bound"),
            SocketState::Connected => write!(f, "Connected"),
            SocketState::Closed => write!(f, "Closed"),
        }
    }
}

/// Half-close status. Each direction is shut independently and for good.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Shutdown {
    /// Sending has been shut down.
    pub send: bool,
    /// Receiving has been shut down.
    pub recv: bool,
}
