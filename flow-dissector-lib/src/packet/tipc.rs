//! TIPC message header, as far as the dissector reads it: three words of
//! message flags and sizes, then the originating node address.

use zerocopy::byteorder::{BigEndian, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::PacketHeader;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct TipcHeader {
    pre: [U32<BigEndian>; 3],
    srcnode: U32<BigEndian>,
}

impl TipcHeader {
    #[inline]
    pub fn version(&self) -> u8 {
        ((self.pre[0].get() >> 29) & 0x7) as u8
    }

    #[inline]
    pub fn user(&self) -> u8 {
        ((self.pre[0].get() >> 25) & 0xF) as u8
    }

    /// Originating node address.
    #[inline]
    pub fn srcnode(&self) -> u32 {
        self.srcnode.get()
    }

    /// Node address as it sits on the wire.
    #[inline]
    pub fn srcnode_raw(&self) -> U32<BigEndian> {
        self.srcnode
    }
}

impl PacketHeader for TipcHeader {
    const NAME: &'static str = "TipcHeader";
    type InnerType = u8;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.user()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tipc_header() {
        let packet = [
            0x40, 0x00, 0x00, 0x28, // version 2, user 0, size 40
            0x00, 0x00, 0x00, 0x00, // word 1
            0x00, 0x00, 0x00, 0x00, // word 2
            0x01, 0x00, 0x10, 0x05, // source node <1.1.5>
        ];
        let (tipc, _) = TipcHeader::from_prefix(&packet).unwrap();
        assert_eq!(TipcHeader::FIXED_LEN, 16);
        assert_eq!(tipc.version(), 2);
        assert_eq!(tipc.srcnode(), 0x0100_1005);
    }
}
