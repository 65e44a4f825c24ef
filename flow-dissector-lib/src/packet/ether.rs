//! Ethernet II and 802.1Q / 802.1AD tag headers
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Destination MAC Address                    |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                      Source MAC Address                       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           EtherType           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! A VLAN tag is four bytes: the tag control information (PCP, DEI, 12-bit
//! VLAN id) followed by the encapsulated EtherType. Unlike a plain Ethernet
//! parser, the dissector walks tags one at a time so stacked 802.1AD/802.1Q
//! tags are handled by its main loop.
//!
//! # Examples
//!
//! ```
//! use flow_dissector::packet::ether::EtherHeader;
//! use flow_dissector::packet::protocol::EtherProto;
//! use flow_dissector::packet::PacketHeader;
//!
//! let frame = [
//!     0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // destination: broadcast
//!     0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // source
//!     0x86, 0xDD,                         // EtherType: IPv6
//! ];
//!
//! let (eth, rest) = EtherHeader::from_prefix(&frame).unwrap();
//! assert_eq!(eth.proto(), EtherProto::IPV6);
//! assert_eq!(eth.source().to_string(), "00:11:22:33:44:55");
//! assert!(rest.is_empty());
//! ```

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, U16};

use crate::packet::protocol::EtherProto;
use crate::packet::PacketHeader;

pub const ETH_ALEN: usize = 6;
pub const ETH_HLEN: usize = 14;
pub const VLAN_HLEN: usize = 4;

#[repr(transparent)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
    Unaligned,
    Serialize,
    Deserialize,
)]
#[serde(into = "String")]
#[serde(try_from = "String")]
pub struct EthAddr(pub [u8; ETH_ALEN]);

impl Display for EthAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EtherError {
    #[error("invalid Ethernet address format")]
    InvalidAddressFormat,
}

impl FromStr for EthAddr {
    type Err = EtherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut addr = [0u8; ETH_ALEN];
        let mut parts = s.split(':');
        for byte in addr.iter_mut() {
            let part = parts.next().ok_or(EtherError::InvalidAddressFormat)?;
            *byte = u8::from_str_radix(part, 16).map_err(|_| EtherError::InvalidAddressFormat)?;
        }
        if parts.next().is_some() {
            return Err(EtherError::InvalidAddressFormat);
        }
        Ok(EthAddr(addr))
    }
}

impl From<EthAddr> for String {
    #[inline]
    fn from(addr: EthAddr) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for EthAddr {
    type Error = EtherError;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        EthAddr::from_str(&s)
    }
}

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct EtherHeader {
    dest: EthAddr,
    source: EthAddr,
    proto: EtherProto,
}

impl EtherHeader {
    #[inline]
    pub fn dest(&self) -> EthAddr {
        self.dest
    }

    #[inline]
    pub fn source(&self) -> EthAddr {
        self.source
    }

    #[inline]
    pub fn proto(&self) -> EtherProto {
        self.proto
    }
}

impl PacketHeader for EtherHeader {
    const NAME: &'static str = "EtherHeader";
    type InnerType = EtherProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.proto
    }
}

impl Display for EtherHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Ethernet {} -> {} proto={}", self.source, self.dest, self.proto)
    }
}

/// 802.1Q / 802.1AD tag, as found after the outer EtherType.
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct VlanHeader {
    tci: U16<BigEndian>,
    proto: EtherProto,
}

impl VlanHeader {
    pub const VID_MASK: u16 = 0x0FFF;

    #[inline]
    pub fn vlan_id(&self) -> u16 {
        self.tci.get() & Self::VID_MASK
    }

    #[inline]
    pub fn vlan_pcp(&self) -> u8 {
        (self.tci.get() >> 13) as u8
    }

    #[inline]
    pub fn vlan_dei(&self) -> bool {
        (self.tci.get() >> 12) & 0x01 != 0
    }

    #[inline]
    pub fn proto(&self) -> EtherProto {
        self.proto
    }
}

impl PacketHeader for VlanHeader {
    const NAME: &'static str = "VlanHeader";
    type InnerType = EtherProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.proto
    }
}

impl Display for VlanHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "vlan vid={} pcp={} dei={} proto={}",
            self.vlan_id(),
            self.vlan_pcp(),
            self.vlan_dei(),
            self.proto
        )
    }
}
