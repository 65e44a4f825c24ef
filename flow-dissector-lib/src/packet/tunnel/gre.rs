//! GRE header (RFC 2784, RFC 2890)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |C|R|K|S|s|Recur|A| Flags | Ver |         Protocol Type         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |      Checksum (optional)      |       Reserved1 (optional)    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Key (optional)                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Sequence Number (optional)                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Only version 0 without source routing can be walked; anything else ends
//! the dissection at the GRE header.

use std::fmt::{self, Display, Formatter};

use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::protocol::EtherProto;
use crate::packet::PacketHeader;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct GreHeader {
    flags_version: U16<BigEndian>,
    protocol_type: EtherProto,
}

impl GreHeader {
    pub const FLAG_CHECKSUM: u16 = 0x8000;
    pub const FLAG_ROUTING: u16 = 0x4000;
    pub const FLAG_KEY: u16 = 0x2000;
    pub const FLAG_SEQUENCE: u16 = 0x1000;
    pub const VERSION_MASK: u16 = 0x0007;

    /// Size of each optional field.
    pub const OPTION_LEN: usize = 4;

    #[inline]
    pub fn flags_version(&self) -> u16 {
        self.flags_version.get()
    }

    #[inline]
    pub fn version(&self) -> u8 {
        (self.flags_version() & Self::VERSION_MASK) as u8
    }

    #[inline]
    pub fn has_checksum(&self) -> bool {
        self.flags_version() & Self::FLAG_CHECKSUM != 0
    }

    #[inline]
    pub fn has_routing(&self) -> bool {
        self.flags_version() & Self::FLAG_ROUTING != 0
    }

    #[inline]
    pub fn has_key(&self) -> bool {
        self.flags_version() & Self::FLAG_KEY != 0
    }

    #[inline]
    pub fn has_sequence(&self) -> bool {
        self.flags_version() & Self::FLAG_SEQUENCE != 0
    }

    /// Plain RFC 2784/2890 GRE: version 0 and no routing information.
    #[inline]
    pub fn is_walkable(&self) -> bool {
        self.flags_version() & (Self::VERSION_MASK | Self::FLAG_ROUTING) == 0
    }

    #[inline]
    pub fn protocol_type(&self) -> EtherProto {
        self.protocol_type
    }
}

impl PacketHeader for GreHeader {
    const NAME: &'static str = "GreHeader";
    type InnerType = EtherProto;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.protocol_type
    }

    /// Base header plus checksum, key and sequence fields when flagged.
    #[inline]
    fn header_len(&self) -> usize {
        let options = [self.has_checksum(), self.has_key(), self.has_sequence()]
            .into_iter()
            .filter(|&present| present)
            .count();
        Self::FIXED_LEN + options * Self::OPTION_LEN
    }
}

impl Display for GreHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "GRE v{} proto={}", self.version(), self.protocol_type)?;
        if self.flags_version() & !Self::VERSION_MASK != 0 {
            f.write_str(" ")?;
        }
        for (set, flag) in [
            (self.has_checksum(), 'C'),
            (self.has_routing(), 'R'),
            (self.has_key(), 'K'),
            (self.has_sequence(), 'S'),
        ] {
            if set {
                write!(f, "{}", flag)?;
            }
        }
        Ok(())
    }
}

/// The optional 32-bit key field.
#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct GreKey {
    key: U32<BigEndian>,
}

impl GreKey {
    #[inline]
    pub fn key(&self) -> u32 {
        self.key.get()
    }

    /// The key as it sits on the wire.
    #[inline]
    pub fn raw(&self) -> U32<BigEndian> {
        self.key
    }
}

impl PacketHeader for GreKey {
    const NAME: &'static str = "GreKey";
    type InnerType = u32;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gre_plain() {
        let packet = [
            0x00, 0x00, // no flags, version 0
            0x08, 0x00, // protocol: IPv4
        ];
        let (gre, _) = GreHeader::from_prefix(&packet).unwrap();
        assert!(gre.is_walkable());
        assert_eq!(gre.protocol_type(), EtherProto::IPV4);
        assert_eq!(gre.header_len(), 4);
    }

    #[test]
    fn test_gre_all_options() {
        let packet = [
            0xb0, 0x00, // C, K, S
            0x65, 0x58, // protocol: transparent ethernet bridging
            0x12, 0x34, 0x00, 0x00, // checksum + reserved
            0x00, 0x00, 0x00, 0x2a, // key 42
            0x00, 0x00, 0x00, 0x07, // sequence
        ];
        let (gre, rest) = GreHeader::from_prefix(&packet).unwrap();
        assert!(gre.has_checksum() && gre.has_key() && gre.has_sequence());
        assert_eq!(gre.header_len(), 16);
        assert_eq!(gre.protocol_type(), EtherProto::TEB);
        assert!(rest.is_empty());
        assert_eq!(gre.to_string(), "GRE v0 proto=teb CKS");

        let key = GreKey::ref_from_bytes(&packet[8..12]).unwrap();
        assert_eq!(key.key(), 42);
    }

    #[test]
    fn test_gre_not_walkable() {
        // enhanced GRE (PPTP), version 1
        let packet = [0x30, 0x01, 0x88, 0x0b];
        let gre = GreHeader::ref_from_bytes(&packet[..]).unwrap();
        assert_eq!(gre.version(), 1);
        assert!(!gre.is_walkable());

        // routing present
        let packet = [0x40, 0x00, 0x08, 0x00];
        let gre = GreHeader::ref_from_bytes(&packet[..]).unwrap();
        assert!(gre.has_routing());
        assert!(!gre.is_walkable());
    }
}
