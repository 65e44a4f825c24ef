//! IPv6 fixed header (RFC 8200)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version| Traffic Class |           Flow Label                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Payload Length        |  Next Header  |   Hop Limit   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                         Source Address                        +
//! |                          (128 bits)                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! +                      Destination Address                      +
//! |                          (128 bits)                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Extension headers are not part of this view; the dissector walks the ones
//! it understands through [`ext::Ipv6ExtHeader`].
//!
//! ```
//! use flow_dissector::packet::ipv6::Ipv6Header;
//! use flow_dissector::packet::PacketHeader;
//!
//! let mut packet = vec![
//!     0x6F, 0x12, 0x34, 0x56,  // version 6, TC 0xF1, flow label 0x23456
//!     0x00, 0x00,              // payload length
//!     0x11,                    // next header: UDP
//!     0x40,                    // hop limit
//! ];
//! packet.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
//! packet.extend_from_slice(&[0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
//!
//! let (ip6, _) = Ipv6Header::from_prefix(&packet).unwrap();
//! assert_eq!(ip6.flow_label(), 0x23456);
//! assert_eq!(ip6.traffic_class(), 0xF1);
//! assert_eq!(ip6.dst_ip().to_string(), "2001:db8::2");
//! ```

pub mod ext;

use std::fmt::{self, Display, Formatter};
use std::net::Ipv6Addr;

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::protocol::IpProto;
use crate::packet::PacketHeader;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Immutable, Unaligned, KnownLayout, Debug, Clone, Copy)]
pub struct Ipv6Header {
    /// version (4 bits), traffic class (8 bits), flow label (20 bits)
    ver_tc_flow: [u8; 4],
    payload_length: U16<BigEndian>,
    next_header: IpProto,
    hop_limit: u8,
    src_ip: [u8; 16],
    dst_ip: [u8; 16],
}

impl Ipv6Header {
    pub const FLOWLABEL_MASK: u32 = 0x000F_FFFF;

    #[inline]
    pub fn version(&self) -> u8 {
        self.ver_tc_flow[0] >> 4
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        (self.ver_tc_flow[0] << 4) | (self.ver_tc_flow[1] >> 4)
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        u32::from_be_bytes(self.ver_tc_flow) & Self::FLOWLABEL_MASK
    }

    /// Payload length, extension headers included, fixed header excluded.
    #[inline]
    pub fn payload_length(&self) -> usize {
        self.payload_length.get() as usize
    }

    #[inline]
    pub fn next_header(&self) -> IpProto {
        self.next_header
    }

    #[inline]
    pub fn hop_limit(&self) -> u8 {
        self.hop_limit
    }

    #[inline]
    pub fn src_ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.src_ip)
    }

    #[inline]
    pub fn dst_ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.dst_ip)
    }

    #[inline]
    pub fn src_ip_raw(&self) -> [u8; 16] {
        self.src_ip
    }

    #[inline]
    pub fn dst_ip_raw(&self) -> [u8; 16] {
        self.dst_ip
    }
}

impl PacketHeader for Ipv6Header {
    const NAME: &'static str = "Ipv6Header";
    type InnerType = IpProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.next_header
    }
}

impl Display for Ipv6Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv6 {} -> {} next={} hlim={}",
            self.src_ip(),
            self.dst_ip(),
            self.next_header,
            self.hop_limit
        )?;
        if self.flow_label() != 0 {
            write!(f, " flow=0x{:05x}", self.flow_label())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_size() {
        assert_eq!(Ipv6Header::FIXED_LEN, 40);
    }

    #[test]
    fn test_ipv6_fields() {
        let mut packet = vec![
            0x60, 0x0a, 0xbc, 0xde, // version 6, TC 0, flow label 0xabcde
            0x00, 0x08, // payload length
            0x2b, // next header: routing
            0xff, // hop limit
        ];
        packet.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01]);
        packet.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02]);
        packet.extend_from_slice(&[0u8; 8]);

        let (ip6, rest) = Ipv6Header::from_prefix(&packet).unwrap();
        assert_eq!(ip6.version(), 6);
        assert_eq!(ip6.flow_label(), 0xabcde);
        assert_eq!(ip6.next_header(), IpProto::IPV6_ROUTE);
        assert_eq!(ip6.payload_length(), 8);
        assert_eq!(ip6.hop_limit(), 255);
        assert_eq!(ip6.src_ip_raw()[15], 0x01);
        assert_eq!(rest.len(), 8);
    }

    #[test]
    fn test_ipv6_truncated() {
        let packet = [0x60u8; 39];
        assert!(Ipv6Header::from_prefix(&packet).is_err());
    }
}
