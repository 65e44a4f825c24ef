//! Common prefix of the IPv6 hop-by-hop, routing and destination options
//! extension headers: next header and length in 8-octet units, not counting
//! the first 8 octets.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::protocol::IpProto;
use crate::packet::PacketHeader;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout, Debug, Clone, Copy)]
pub struct Ipv6ExtHeader {
    next_header: IpProto,
    hdr_ext_len: u8,
}

impl Ipv6ExtHeader {
    /// Extension header types sharing this length encoding.
    pub fn is_walkable(proto: IpProto) -> bool {
        matches!(
            proto,
            IpProto::IPV6_HOPOPT | IpProto::IPV6_ROUTE | IpProto::IPV6_OPTS
        )
    }

    #[inline]
    pub fn next_header(&self) -> IpProto {
        self.next_header
    }
}

impl PacketHeader for Ipv6ExtHeader {
    const NAME: &'static str = "Ipv6ExtHeader";
    type InnerType = IpProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.next_header
    }

    #[inline]
    fn header_len(&self) -> usize {
        (self.hdr_ext_len as usize + 1) << 3
    }
}
