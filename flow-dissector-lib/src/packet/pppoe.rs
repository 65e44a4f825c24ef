//! PPPoE session stage header (RFC 2516) followed by the PPP protocol field.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  VER  | TYPE  |      CODE     |          SESSION_ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            LENGTH             |         PPP protocol          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt::{self, Display, Formatter};

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::protocol::EtherProto;
use crate::packet::PacketHeader;

pub const PPP_IP: u16 = 0x0021;
pub const PPP_IPV6: u16 = 0x0057;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout, Debug, Clone, Copy)]
pub struct PppoeSesHeader {
    ver_type: u8,
    code: u8,
    session_id: U16<BigEndian>,
    length: U16<BigEndian>,
    ppp_proto: U16<BigEndian>,
}

impl PppoeSesHeader {
    #[inline]
    pub fn version(&self) -> u8 {
        self.ver_type >> 4
    }

    #[inline]
    pub fn session_id(&self) -> u16 {
        self.session_id.get()
    }

    #[inline]
    pub fn ppp_proto(&self) -> u16 {
        self.ppp_proto.get()
    }

    /// Ethernet type equivalent of the PPP payload, if it is IP.
    #[inline]
    pub fn ether_proto(&self) -> Option<EtherProto> {
        match self.ppp_proto() {
            PPP_IP => Some(EtherProto::IPV4),
            PPP_IPV6 => Some(EtherProto::IPV6),
            _ => None,
        }
    }
}

impl PacketHeader for PppoeSesHeader {
    const NAME: &'static str = "PppoeSesHeader";
    type InnerType = u16;

    #[inline]
    fn inner_type(&self) -> Self::InnerType {
        self.ppp_proto()
    }
}

impl Display for PppoeSesHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PPPoE session=0x{:04x} ppp=0x{:04x}",
            self.session_id(),
            self.ppp_proto()
        )
    }
}
