//! Flow key identifiers and their value layouts.
//!
//! Each [`KeyId`] names one kind of information the walker can extract. Its
//! value is a small unaligned struct that callers embed in their own
//! container at an offset of their choosing (see
//! [`Dissector`](crate::flow::Dissector)). [`FlowKeys`] is the container the
//! hashing code works on.

use std::fmt::{self, Display, Formatter};
use std::mem::size_of;
use std::net::{Ipv4Addr, Ipv6Addr};

use strum::IntoStaticStr;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{transmute_mut, transmute_ref, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::packet::ether::EthAddr;
use crate::packet::protocol::{EtherProto, IpProto};
use crate::packet::PacketHeader;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum KeyId {
    Control = 0,
    Basic,
    Ipv4Addrs,
    Ipv6Addrs,
    TipcAddrs,
    Ports,
    EthAddrs,
    VlanId,
    FlowLabel,
    GreKeyId,
    MplsEntropy,
}

impl KeyId {
    pub const COUNT: usize = 11;

    pub const ALL: [KeyId; Self::COUNT] = [
        KeyId::Control,
        KeyId::Basic,
        KeyId::Ipv4Addrs,
        KeyId::Ipv6Addrs,
        KeyId::TipcAddrs,
        KeyId::Ports,
        KeyId::EthAddrs,
        KeyId::VlanId,
        KeyId::FlowLabel,
        KeyId::GreKeyId,
        KeyId::MplsEntropy,
    ];

    /// Size of the value the key writes into a container.
    pub const fn value_len(self) -> usize {
        match self {
            KeyId::Control => size_of::<KeyControl>(),
            KeyId::Basic => size_of::<KeyBasic>(),
            KeyId::Ipv4Addrs => size_of::<KeyIpv4Addrs>(),
            KeyId::Ipv6Addrs => size_of::<KeyIpv6Addrs>(),
            KeyId::TipcAddrs => size_of::<KeyTipcAddrs>(),
            KeyId::Ports => size_of::<KeyPorts>(),
            KeyId::EthAddrs => size_of::<KeyEthAddrs>(),
            KeyId::VlanId | KeyId::FlowLabel => size_of::<KeyTags>(),
            KeyId::GreKeyId | KeyId::MplsEntropy => size_of::<KeyKeyId>(),
        }
    }

    #[inline]
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl TryFrom<u16> for KeyId {
    type Error = u16;

    fn try_from(v: u16) -> Result<Self, Self::Error> {
        KeyId::ALL.get(v as usize).copied().ok_or(v)
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// A key value struct, tied to the key ids allowed to target it.
pub trait KeyValue: FromBytes + IntoBytes + KnownLayout + Immutable + Unaligned {
    fn accepts(key: KeyId) -> bool;
}

macro_rules! key_value {
    ($ty:ty => $($key:ident)|+) => {
        impl KeyValue for $ty {
            #[inline]
            fn accepts(key: KeyId) -> bool {
                matches!(key, $(KeyId::$key)|+)
            }
        }

        zeroed_default!($ty);
    };
}

// An all-zero value means "not extracted".
macro_rules! zeroed_default {
    ($ty:ty) => {
        impl Default for $ty {
            #[inline]
            fn default() -> Self {
                <$ty as zerocopy::FromZeros>::new_zeroed()
            }
        }
    };
}

/// Transport header offset and which address key is populated.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyControl {
    thoff: U16<BigEndian>,
    addr_type: U16<BigEndian>,
}

impl KeyControl {
    #[inline]
    pub fn thoff(&self) -> u16 {
        self.thoff.get()
    }

    /// Offsets past `u16::MAX` saturate.
    #[inline]
    pub fn set_thoff(&mut self, thoff: usize) {
        self.thoff.set(u16::try_from(thoff).unwrap_or(u16::MAX));
    }

    /// The address key last written, if any.
    #[inline]
    pub fn addr_type(&self) -> Option<KeyId> {
        match self.addr_type.get() {
            0 => None,
            v => KeyId::try_from(v).ok(),
        }
    }

    #[inline]
    pub fn set_addr_type(&mut self, key: KeyId) {
        self.addr_type.set(key as u16);
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBasic {
    pub n_proto: EtherProto,
    pub ip_proto: IpProto,
    pub padding: u8,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyIpv4Addrs {
    pub src: [u8; 4],
    pub dst: [u8; 4],
}

impl KeyIpv4Addrs {
    pub fn src_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src)
    }

    pub fn dst_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst)
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyIpv6Addrs {
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

impl KeyIpv6Addrs {
    pub fn src_ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.src)
    }

    pub fn dst_ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.dst)
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTipcAddrs {
    pub srcnode: U32<BigEndian>,
}

/// Transport ports, or the SPI for ESP and AH.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPorts {
    pub src: U16<BigEndian>,
    pub dst: U16<BigEndian>,
}

impl KeyPorts {
    pub fn new(src: u16, dst: u16) -> Self {
        KeyPorts { src: src.into(), dst: dst.into() }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.src.get() == 0 && self.dst.get() == 0
    }
}

impl PacketHeader for KeyPorts {
    const NAME: &'static str = "ports";
    type InnerType = ();

    fn inner_type(&self) {}
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEthAddrs {
    pub dst: EthAddr,
    pub src: EthAddr,
}

/// VLAN id and IPv6 flow label share one value struct.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTags {
    vlan_id: U16<BigEndian>,
    reserved: [u8; 2],
    flow_label: U32<BigEndian>,
}

impl KeyTags {
    #[inline]
    pub fn vlan_id(&self) -> u16 {
        self.vlan_id.get()
    }

    #[inline]
    pub fn set_vlan_id(&mut self, vlan_id: u16) {
        self.vlan_id.set(vlan_id);
    }

    #[inline]
    pub fn flow_label(&self) -> u32 {
        self.flow_label.get()
    }

    #[inline]
    pub fn set_flow_label(&mut self, label: u32) {
        self.flow_label.set(label);
    }
}

/// Tunnel key: GRE key or MPLS entropy label.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyKeyId {
    pub keyid: U32<BigEndian>,
}

key_value!(KeyControl => Control);
key_value!(KeyBasic => Basic);
key_value!(KeyIpv4Addrs => Ipv4Addrs);
key_value!(KeyIpv6Addrs => Ipv6Addrs);
key_value!(KeyTipcAddrs => TipcAddrs);
key_value!(KeyPorts => Ports);
key_value!(KeyEthAddrs => EthAddrs);
key_value!(KeyTags => VlanId | FlowLabel);
key_value!(KeyKeyId => GreKeyId | MplsEntropy);

/// Address area shared by the IPv4, IPv6 and TIPC keys; which one is live is
/// recorded in [`KeyControl::addr_type`].
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAddrs {
    v4: KeyIpv4Addrs,
    v6_tail: [u8; 24],
}

impl KeyAddrs {
    #[inline]
    pub fn v4(&self) -> &KeyIpv4Addrs {
        &self.v4
    }

    #[inline]
    pub fn v4_mut(&mut self) -> &mut KeyIpv4Addrs {
        &mut self.v4
    }

    #[inline]
    pub fn v6(&self) -> &KeyIpv6Addrs {
        transmute_ref!(self)
    }

    #[inline]
    pub fn v6_mut(&mut self) -> &mut KeyIpv6Addrs {
        transmute_mut!(self)
    }

    #[inline]
    pub fn tipc(&self) -> &KeyTipcAddrs {
        transmute_ref!(&self.v4.src)
    }
}

zeroed_default!(KeyAddrs);
zeroed_default!(FlowKeys);

/// The standard flow key container.
///
/// Everything from `basic` onwards, up to the live part of `addrs`, feeds the
/// flow hash; `addrs` must stay last.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowKeys {
    pub control: KeyControl,
    pub basic: KeyBasic,
    pub tags: KeyTags,
    pub keyid: KeyKeyId,
    pub ports: KeyPorts,
    pub addrs: KeyAddrs,
}

impl Display for FlowKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.basic.n_proto, self.basic.ip_proto)?;
        let (sport, dport) = (self.ports.src.get(), self.ports.dst.get());
        match self.control.addr_type() {
            Some(KeyId::Ipv4Addrs) => {
                let a = self.addrs.v4();
                write!(f, " {}:{} -> {}:{}", a.src_ip(), sport, a.dst_ip(), dport)?;
            }
            Some(KeyId::Ipv6Addrs) => {
                let a = self.addrs.v6();
                write!(f, " [{}]:{} -> [{}]:{}", a.src_ip(), sport, a.dst_ip(), dport)?;
            }
            Some(KeyId::TipcAddrs) => {
                write!(f, " node 0x{:08x}", self.addrs.tipc().srcnode.get())?;
            }
            _ => {}
        }
        if self.tags.vlan_id() != 0 {
            write!(f, " vlan={}", self.tags.vlan_id())?;
        }
        if self.tags.flow_label() != 0 {
            write!(f, " flowlabel=0x{:05x}", self.tags.flow_label())?;
        }
        if self.keyid.keyid.get() != 0 {
            write!(f, " keyid=0x{:x}", self.keyid.keyid.get())?;
        }
        write!(f, " thoff={}", self.control.thoff())
    }
}
