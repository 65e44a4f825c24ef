//! MPLS label stack entry (RFC 3032) and the entropy label indicator
//! (RFC 6790).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                Label                  | TC  |S|       TTL     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! When the top label is the entropy label indicator, the entry below it
//! carries the entropy label a transit router may hash on.

use std::fmt::{self, Display, Formatter};

use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::PacketHeader;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct MplsLabel {
    label_tc_s_ttl: U32<BigEndian>,
}

impl MplsLabel {
    pub const LABEL_MASK: u32 = 0xFFFFF000;
    pub const LABEL_SHIFT: u32 = 12;
    pub const TC_MASK: u32 = 0x00000E00;
    pub const TC_SHIFT: u32 = 9;
    pub const BOS_MASK: u32 = 0x00000100;
    pub const TTL_MASK: u32 = 0x000000FF;

    /// Reserved label value announcing an entropy label below.
    pub const ENTROPY_LABEL_INDICATOR: u32 = 7;

    #[inline]
    pub fn raw(&self) -> u32 {
        self.label_tc_s_ttl.get()
    }

    /// The 20-bit label value.
    #[inline]
    pub fn label(&self) -> u32 {
        (self.raw() & Self::LABEL_MASK) >> Self::LABEL_SHIFT
    }

    #[inline]
    pub fn traffic_class(&self) -> u8 {
        ((self.raw() & Self::TC_MASK) >> Self::TC_SHIFT) as u8
    }

    #[inline]
    pub fn is_bottom_of_stack(&self) -> bool {
        self.raw() & Self::BOS_MASK != 0
    }

    #[inline]
    pub fn ttl(&self) -> u8 {
        (self.raw() & Self::TTL_MASK) as u8
    }

    #[inline]
    pub fn is_entropy_label_indicator(&self) -> bool {
        self.label() == Self::ENTROPY_LABEL_INDICATOR
    }
}

impl PacketHeader for MplsLabel {
    const NAME: &'static str = "MplsLabel";
    type InnerType = u32;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.label()
    }
}

impl Display for MplsLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MPLS label={} tc={} s={} ttl={}",
            self.label(),
            self.traffic_class(),
            u8::from(self.is_bottom_of_stack()),
            self.ttl()
        )?;
        if self.is_entropy_label_indicator() {
            f.write_str(" (ELI)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mpls_fields() {
        let entry = [
            0x00, 0x3e, 0x85, 0x40, // label 1000, TC 2, S=1, TTL 64
        ];
        let label = MplsLabel::ref_from_bytes(&entry[..]).unwrap();
        assert_eq!(label.label(), 1000);
        assert_eq!(label.traffic_class(), 2);
        assert!(label.is_bottom_of_stack());
        assert_eq!(label.ttl(), 64);
        assert!(!label.is_entropy_label_indicator());
        assert_eq!(label.to_string(), "MPLS label=1000 tc=2 s=1 ttl=64");
    }

    #[test]
    fn test_mpls_eli() {
        let entry = [
            0x00, 0x00, 0x70, 0x40, // label 7 (ELI), S=0, TTL 64
        ];
        let label = MplsLabel::ref_from_bytes(&entry[..]).unwrap();
        assert_eq!(label.label(), MplsLabel::ENTROPY_LABEL_INDICATOR);
        assert!(label.is_entropy_label_indicator());
        assert!(label.to_string().ends_with("(ELI)"));
    }
}
