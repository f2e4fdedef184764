//! ICMPv6 error reports delivered to sockets.
//!
//! The stack decodes ICMPv6 messages and hands the socket a flat
//! [`IcmpReport`]. This module classifies the (type, code) pair and maps it
//! to the [`SocketError`] the application observes.

use std::net::Ipv6Addr;

use crate::error::SocketError;

/// ICMPv6 Destination Unreachable.
pub const TYPE_DESTINATION_UNREACHABLE: u8 = 1;
/// ICMPv6 Packet Too Big.
pub const TYPE_PACKET_TOO_BIG: u8 = 2;
/// ICMPv6 Time Exceeded.
pub const TYPE_TIME_EXCEEDED: u8 = 3;
/// ICMPv6 Parameter Problem.
pub const TYPE_PARAMETER_PROBLEM: u8 = 4;

/// A decoded ICMPv6 error as reported by the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IcmpReport {
    /// Address of the node that generated the error.
    pub source: Ipv6Addr,
    /// Hop limit of the ICMPv6 message.
    pub ttl: u8,
    /// ICMPv6 type.
    pub icmp_type: u8,
    /// ICMPv6 code.
    pub code: u8,
    /// Type-specific data (MTU for Packet Too Big, pointer for Parameter Problem).
    pub info: u32,
}

impl IcmpReport {
    /// Create a report.
    pub fn new(source: Ipv6Addr, ttl: u8, icmp_type: u8, code: u8, info: u32) -> Self {
        Self {
            source,
            ttl,
            icmp_type,
            code,
            info,
        }
    }

    /// Classify the (type, code) pair.
    pub fn kind(&self) -> IcmpKind {
        match self.icmp_type {
            TYPE_DESTINATION_UNREACHABLE => {
                IcmpKind::DestinationUnreachable(Unreachable::from_code(self.code))
            }
            TYPE_PACKET_TOO_BIG => IcmpKind::PacketTooBig { mtu: self.info },
            TYPE_TIME_EXCEEDED => IcmpKind::TimeExceeded {
                reassembly: self.code == 1,
            },
            TYPE_PARAMETER_PROBLEM => IcmpKind::ParameterProblem { pointer: self.info },
            icmp_type => IcmpKind::Other {
                icmp_type,
                code: self.code,
            },
        }
    }

    /// The socket error this report maps to, if any.
    pub fn error(&self) -> Option<SocketError> {
        self.kind().error()
    }
}

/// Destination Unreachable codes (RFC 4443 §3.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unreachable {
    /// Code 0: no route to destination.
    NoRoute,
    /// Code 1: communication administratively prohibited.
    AdminProhibited,
    /// Code 2: beyond scope of source address.
    BeyondScope,
    /// Code 3: address unreachable.
    Address,
    /// Code 4: port unreachable.
    Port,
    /// Code 5: source address failed ingress/egress policy.
    SourcePolicy,
    /// Code 6: reject route to destination.
    RejectRoute,
    /// Any other code.
    Unknown(u8),
}

impl Unreachable {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::NoRoute,
            1 => Self::AdminProhibited,
            2 => Self::BeyondScope,
            3 => Self::Address,
            4 => Self::Port,
            5 => Self::SourcePolicy,
            6 => Self::RejectRoute,
            other => Self::Unknown(other),
        }
    }
}

/// Classification of an ICMPv6 error message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IcmpKind {
    /// Type 1.
    DestinationUnreachable(Unreachable),
    /// Type 2, carrying the next-hop MTU.
    PacketTooBig {
        /// MTU reported by the router.
        mtu: u32,
    },
    /// Type 3. `reassembly` is set for code 1.
    TimeExceeded {
        /// Fragment reassembly time exceeded rather than hop limit.
        reassembly: bool,
    },
    /// Type 4, carrying the offending octet offset.
    ParameterProblem {
        /// Offset of the offending field.
        pointer: u32,
    },
    /// Informational or unknown types.
    Other {
        /// ICMPv6 type.
        icmp_type: u8,
        /// ICMPv6 code.
        code: u8,
    },
}

impl IcmpKind {
    /// The socket error this classification maps to, if any.
    pub fn error(&self) -> Option<SocketError> {
        match self {
            Self::DestinationUnreachable(code) => Some(match code {
                Unreachable::NoRoute | Unreachable::RejectRoute => SocketError::NetworkUnreachable,
                Unreachable::AdminProhibited | Unreachable::SourcePolicy => {
                    SocketError::PermissionDenied
                }
                Unreachable::Port => SocketError::ConnectionRefused,
                Unreachable::BeyondScope | Unreachable::Address | Unreachable::Unknown(_) => {
                    SocketError::HostUnreachable
                }
            }),
            Self::PacketTooBig { .. } => Some(SocketError::MessageTooLong),
            Self::TimeExceeded { .. } => Some(SocketError::HostUnreachable),
            Self::ParameterProblem { .. } => Some(SocketError::ProtocolError),
            Self::Other { .. } => None,
        }
    }
}
