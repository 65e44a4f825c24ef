//! IPv4 header (RFC 791)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Version|  IHL  |Type of Service|          Total Length         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Identification        |Flags|      Fragment Offset    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Time to Live |    Protocol   |         Header Checksum       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Source Address                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Destination Address                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Only the IHL is validated: the dissector trusts the EtherType (or the
//! tunnel protocol) to say this is IPv4 and does not look at the version
//! nibble, total length or checksum.
//!
//! ```
//! use flow_dissector::packet::ipv4::Ipv4Header;
//! use flow_dissector::packet::protocol::IpProto;
//! use flow_dissector::packet::PacketHeader;
//! use std::net::Ipv4Addr;
//!
//! let packet = [
//!     0x46,                    // version 4, IHL 6 (24 bytes)
//!     0x00,                    // DSCP / ECN
//!     0x00, 0x20,              // total length
//!     0x00, 0x01,              // identification
//!     0x20, 0x00,              // flags: MF
//!     0x40,                    // TTL
//!     0x11,                    // protocol: UDP
//!     0x00, 0x00,              // checksum
//!     0x0A, 0x00, 0x00, 0x01,  // 10.0.0.1
//!     0x0A, 0x00, 0x00, 0x02,  // 10.0.0.2
//!     0x01, 0x01, 0x01, 0x00,  // options: NOP NOP NOP EOL
//! ];
//!
//! let (ip, rest) = Ipv4Header::from_prefix(&packet).unwrap();
//! assert_eq!(ip.header_len(), 24);
//! assert_eq!(ip.protocol(), IpProto::UDP);
//! assert_eq!(ip.src_ip(), Ipv4Addr::new(10, 0, 0, 1));
//! assert!(ip.is_fragment());
//! assert!(rest.is_empty());
//! ```

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, U16};

use crate::packet::protocol::IpProto;
use crate::packet::PacketHeader;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct Ipv4Header {
    ver_ihl: u8,
    dscp_ecn: u8,
    total_length: U16<BigEndian>,
    identification: U16<BigEndian>,
    flags_frag_offset: U16<BigEndian>,
    ttl: u8,
    protocol: IpProto,
    checksum: U16<BigEndian>,
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
}

impl Ipv4Header {
    const OFFSET_MASK: u16 = 0x1FFF;
    const MF_FLAG_MASK: u16 = 0x2000;
    const DF_FLAG_MASK: u16 = 0x4000;

    #[inline]
    pub fn version(&self) -> u8 {
        self.ver_ihl >> 4
    }

    #[inline]
    pub fn ihl(&self) -> u8 {
        self.ver_ihl & 0x0F
    }

    #[inline]
    pub fn fragment_offset(&self) -> u16 {
        self.flags_frag_offset.get() & Self::OFFSET_MASK
    }

    #[inline]
    pub fn has_dont_fragment(&self) -> bool {
        self.flags_frag_offset.get() & Self::DF_FLAG_MASK != 0
    }

    #[inline]
    pub fn has_more_fragments(&self) -> bool {
        self.flags_frag_offset.get() & Self::MF_FLAG_MASK != 0
    }

    /// Any fragment, first one included: MF set or a non-zero offset.
    #[inline]
    pub fn is_fragment(&self) -> bool {
        self.flags_frag_offset.get() & (Self::MF_FLAG_MASK | Self::OFFSET_MASK) != 0
    }

    #[inline]
    pub fn total_length(&self) -> usize {
        self.total_length.get() as usize
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    #[inline]
    pub fn protocol(&self) -> IpProto {
        self.protocol
    }

    #[inline]
    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src_ip)
    }

    #[inline]
    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst_ip)
    }

    /// Source address in network byte order.
    #[inline]
    pub fn src_ip_raw(&self) -> [u8; 4] {
        self.src_ip
    }

    /// Destination address in network byte order.
    #[inline]
    pub fn dst_ip_raw(&self) -> [u8; 4] {
        self.dst_ip
    }
}

impl PacketHeader for Ipv4Header {
    const NAME: &'static str = "Ipv4Header";
    type InnerType = IpProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.protocol
    }

    #[inline]
    fn header_len(&self) -> usize {
        self.ihl() as usize * 4
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.ihl() >= 5
    }
}

impl Display for Ipv4Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPv4 {} -> {} proto={} ttl={}",
            self.src_ip(),
            self.dst_ip(),
            self.protocol,
            self.ttl
        )?;
        if self.is_fragment() {
            write!(f, " frag_off={}", self.fragment_offset())?;
        }
        Ok(())
    }
}
