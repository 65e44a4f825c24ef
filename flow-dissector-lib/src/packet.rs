//! Wire header views used by the dissector.
//!
//! Every header is a `repr(C, packed)` zerocopy struct, so a view is just a
//! reference into the packet bytes (or into a scratch copy when the bytes
//! straddle buffer segments, see [`crate::buffer`]).

use std::fmt;
use std::mem;

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::packet::protocol::{EtherProto, IpProto};

pub mod ether;
pub mod ipv4;
pub mod ipv6;
pub mod pppoe;
pub mod protocol;
pub mod tipc;
pub mod tunnel;

/// Why a walk over a packet failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DissectError {
    #[error("packet truncated inside {0}")]
    TruncatedPacket(&'static str),
    #[error("invalid {0}")]
    InvalidHeader(&'static str),
    #[error("unrecognized protocol: {0}")]
    UnrecognizedProtocol(UnknownProto),
}

/// A protocol number the dissector does not know how to walk past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnknownProto {
    Ether(EtherProto),
    Ip(IpProto),
    Ppp(u16),
}

impl fmt::Display for UnknownProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownProto::Ether(proto) => write!(f, "ether {}", proto),
            UnknownProto::Ip(proto) => write!(f, "ip {}", proto),
            UnknownProto::Ppp(proto) => write!(f, "ppp 0x{:04x}", proto),
        }
    }
}

pub trait PacketHeader: FromBytes + KnownLayout + Immutable + Unaligned + Sized {
    const FIXED_LEN: usize = mem::size_of::<Self>();
    const NAME: &'static str;
    type InnerType;

    /// Protocol of whatever follows this header.
    fn inner_type(&self) -> Self::InnerType;

    /// Bytes this header occupies on the wire, options included.
    #[inline]
    fn header_len(&self) -> usize {
        Self::FIXED_LEN
    }

    #[inline]
    fn is_valid(&self) -> bool {
        true
    }

    /// Splits a validated header off the front of a contiguous buffer,
    /// skipping any options it declares.
    fn from_prefix(buf: &[u8]) -> Result<(&Self, &[u8]), DissectError> {
        let (header, rest) =
            Self::ref_from_prefix(buf).map_err(|_| DissectError::TruncatedPacket(Self::NAME))?;

        if !header.is_valid() {
            return Err(DissectError::InvalidHeader(Self::NAME));
        }

        let options_len = header.header_len().saturating_sub(Self::FIXED_LEN);
        let rest = rest
            .get(options_len..)
            .ok_or(DissectError::TruncatedPacket(Self::NAME))?;

        Ok((header, rest))
    }
}
