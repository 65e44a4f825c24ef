//! The protocol walker.
//!
//! Starting from a network protocol and offset, the walker alternates between
//! a network phase (keyed on the EtherType) and a transport phase (keyed on
//! the IP protocol) until it reaches a transport header, a terminal protocol
//! (TIPC, MPLS) or something it does not understand. Every step either moves
//! the offset forward or fails on a bounded read, so the loop always ends.
//!
//! ```
//! use flow_dissector::flow::{FlowKeys, Outcome, Start, FLOW_KEYS_DISSECTOR};
//! use flow_dissector::packet::protocol::IpProto;
//!
//! let packet = [
//!     0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x00, // IPv4, IHL 5
//!     0x40, 0x11, 0x00, 0x00,                         // TTL 64, UDP
//!     0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02, // 10.0.0.1 -> 10.0.0.2
//!     0x13, 0x88, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00, // UDP 5000 -> 53
//! ];
//!
//! let start = Start::raw_ip(&packet[..]).unwrap();
//! let mut keys = FlowKeys::default();
//! let outcome = FLOW_KEYS_DISSECTOR.dissect(&mut keys, &packet[..], start).unwrap();
//!
//! assert_eq!(outcome, Outcome::Transport);
//! assert_eq!(keys.basic.ip_proto, IpProto::UDP);
//! assert_eq!(keys.control.thoff(), 20);
//! assert_eq!(keys.ports.dst.get(), 53);
//! ```

use tracing::trace;
use zerocopy::{FromZeros, IntoBytes};

use crate::buffer::{read_header, PacketBuf};
use crate::flow::dissector::{Dissector, KeyContainer, FLOW_KEYS_DISSECTOR};
use crate::flow::key::{
    FlowKeys, KeyBasic, KeyControl, KeyEthAddrs, KeyId, KeyIpv4Addrs, KeyIpv6Addrs, KeyKeyId,
    KeyPorts, KeyTags, KeyTipcAddrs, KeyValue,
};
use crate::packet::ether::{EtherHeader, VlanHeader, ETH_HLEN, VLAN_HLEN};
use crate::packet::ipv4::Ipv4Header;
use crate::packet::ipv6::ext::Ipv6ExtHeader;
use crate::packet::ipv6::Ipv6Header;
use crate::packet::pppoe::PppoeSesHeader;
use crate::packet::protocol::{EtherProto, IpProto};
use crate::packet::tipc::TipcHeader;
use crate::packet::tunnel::gre::{GreHeader, GreKey};
use crate::packet::tunnel::mpls::MplsLabel;
use crate::packet::{DissectError, PacketHeader, UnknownProto};

/// FCoE encapsulation header plus the FC frame header.
pub const FCOE_HEADER_LEN: usize = 38;

/// Where the walk begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Start {
    /// Protocol of the header at `nhoff`.
    pub proto: EtherProto,
    /// Offset of the network header.
    pub nhoff: usize,
    /// Offset of the Ethernet header, when the packet has one.
    pub link: Option<usize>,
}

impl Start {
    pub fn new(proto: EtherProto, nhoff: usize) -> Self {
        Start {
            proto,
            nhoff,
            link: None,
        }
    }

    /// Packet starting with an Ethernet header.
    pub fn ethernet<B: PacketBuf + ?Sized>(buf: &B) -> Result<Self, DissectError> {
        let mut scratch = EtherHeader::new_zeroed();
        let eth = read_header(buf, 0, &mut scratch)?;
        Ok(Start {
            proto: eth.proto(),
            nhoff: ETH_HLEN,
            link: Some(0),
        })
    }

    /// Packet starting with an IP header, version taken from the first nibble.
    pub fn raw_ip<B: PacketBuf + ?Sized>(buf: &B) -> Result<Self, DissectError> {
        let mut scratch = [0u8; 1];
        let first = buf
            .header_pointer(0, &mut scratch)
            .ok_or(DissectError::TruncatedPacket("IpVersion"))?;
        match first[0] >> 4 {
            4 => Ok(Start::new(EtherProto::IPV4, 0)),
            6 => Ok(Start::new(EtherProto::IPV6, 0)),
            _ => Err(DissectError::InvalidHeader("IpVersion")),
        }
    }
}

/// How a successful walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Reached the transport layer (or a header the walker stops at, such as
    /// an IPv4 fragment or versioned GRE).
    Transport,
    /// A protocol that is the end of the walk by itself: TIPC or MPLS.
    Terminal(EtherProto),
    /// An unknown protocol inside an already walked IP header.
    Unrecognized(UnknownProto),
}

/// Offset of the port pair within the transport header, for protocols that
/// carry one.
pub fn ports_offset(ip_proto: IpProto) -> Option<usize> {
    match ip_proto {
        IpProto::TCP
        | IpProto::UDP
        | IpProto::DCCP
        | IpProto::ESP
        | IpProto::SCTP
        | IpProto::UDPLITE => Some(0),
        IpProto::AH => Some(4),
        _ => None,
    }
}

/// Offset of the transport payload, for a packet already dissected into
/// `keys`.
pub fn payload_offset<B: PacketBuf + ?Sized>(buf: &B, keys: &FlowKeys) -> usize {
    let thoff = keys.control.thoff() as usize;

    let hdr_len = match keys.basic.ip_proto {
        IpProto::TCP => {
            let mut scratch = [0u8; 1];
            match buf.header_pointer(thoff + 12, &mut scratch) {
                // data offset, in 32-bit words
                Some(doff) => usize::max(20, ((doff[0] & 0xF0) >> 2) as usize),
                None => return thoff,
            }
        }
        IpProto::UDP | IpProto::UDPLITE => 8,
        IpProto::ICMP | IpProto::IPV6_ICMP | IpProto::IGMP => 8,
        IpProto::DCCP => 16,
        IpProto::SCTP => 12,
        _ => 0,
    };

    thoff + hdr_len
}

impl FlowKeys {
    /// Dissects `buf` with [`FLOW_KEYS_DISSECTOR`].
    pub fn from_packet<B: PacketBuf + ?Sized>(buf: &B, start: Start) -> Result<Self, DissectError> {
        let mut keys = FlowKeys::default();
        FLOW_KEYS_DISSECTOR.dissect(&mut keys, buf, start)?;
        Ok(keys)
    }
}

impl<C: KeyContainer> Dissector<C> {
    /// Walks `buf` from `start`, filling the registered keys of `container`.
    ///
    /// Registered key values are cleared before the walk and again on
    /// failure. Fields of unregistered keys are never touched.
    pub fn dissect<B: PacketBuf + ?Sized>(
        &self,
        container: &mut C,
        buf: &B,
        start: Start,
    ) -> Result<Outcome, DissectError> {
        self.clear_keys(container);

        let walker = Walker {
            dissector: self,
            keys: &mut *container,
            buf,
            proto: start.proto,
            ip_proto: IpProto::default(),
            nhoff: start.nhoff,
            ip_seen: false,
            vlan_seen: false,
        };
        let result = walker.run(start.link);

        if result.is_err() {
            self.clear_keys(container);
        }
        result
    }

    fn clear_keys(&self, container: &mut C) {
        let bytes = container.as_mut_bytes();
        for key in KeyId::ALL {
            if let Some(offset) = self.offset(key) {
                if let Some(value) = bytes.get_mut(offset..offset + key.value_len()) {
                    value.fill(0);
                }
            }
        }
    }
}

enum Step {
    Network,
    Transport,
    Finish,
    Stop(Outcome),
    Unknown(UnknownProto),
}

struct Walker<'d, 'c, 'b, C, B: ?Sized> {
    dissector: &'d Dissector<C>,
    keys: &'c mut C,
    buf: &'b B,
    proto: EtherProto,
    ip_proto: IpProto,
    nhoff: usize,
    ip_seen: bool,
    vlan_seen: bool,
}

impl<C: KeyContainer, B: PacketBuf + ?Sized> Walker<'_, '_, '_, C, B> {
    fn run(mut self, link: Option<usize>) -> Result<Outcome, DissectError> {
        if let Some(link) = link {
            self.eth_addrs(link)?;
        }

        let mut step = Step::Network;
        loop {
            step = match step {
                Step::Network => self.network()?,
                Step::Transport => self.transport()?,
                Step::Finish => return self.finish(),
                Step::Stop(outcome) => return Ok(outcome),
                Step::Unknown(proto) => return self.unrecognized(proto),
            };
        }
    }

    #[inline]
    fn key<K: KeyValue>(&mut self, id: KeyId) -> Option<&mut K> {
        self.dissector.target(id, self.keys)
    }

    fn set_addr_type(&mut self, id: KeyId) {
        if let Some(control) = self.key::<KeyControl>(KeyId::Control) {
            control.set_addr_type(id);
        }
    }

    fn set_thoff(&mut self) {
        let nhoff = self.nhoff;
        if let Some(control) = self.key::<KeyControl>(KeyId::Control) {
            control.set_thoff(nhoff);
        }
    }

    fn set_basic(&mut self, with_ip_proto: bool) {
        let (proto, ip_proto) = (self.proto, self.ip_proto);
        if let Some(basic) = self.key::<KeyBasic>(KeyId::Basic) {
            basic.n_proto = proto;
            if with_ip_proto {
                basic.ip_proto = ip_proto;
            }
        }
        self.set_thoff();
    }

    fn eth_addrs(&mut self, link: usize) -> Result<(), DissectError> {
        if !self.dissector.uses_key(KeyId::EthAddrs) {
            return Ok(());
        }
        let mut scratch = EtherHeader::new_zeroed();
        let eth = read_header(self.buf, link, &mut scratch)?;
        let (dst, src) = (eth.dest(), eth.source());
        if let Some(addrs) = self.key::<KeyEthAddrs>(KeyId::EthAddrs) {
            addrs.dst = dst;
            addrs.src = src;
        }
        Ok(())
    }

    fn network(&mut self) -> Result<Step, DissectError> {
        match self.proto {
            EtherProto::IPV4 => self.ipv4(),
            EtherProto::IPV6 => self.ipv6(),
            EtherProto::VLAN_8021Q | EtherProto::VLAN_8021AD => self.vlan(),
            EtherProto::PPP_SES => self.pppoe(),
            EtherProto::TIPC => self.tipc(),
            EtherProto::MPLS_UC | EtherProto::MPLS_MC => self.mpls(),
            EtherProto::FCOE => {
                self.nhoff += FCOE_HEADER_LEN;
                Ok(Step::Unknown(UnknownProto::Ether(self.proto)))
            }
            proto => Ok(Step::Unknown(UnknownProto::Ether(proto))),
        }
    }

    fn ipv4(&mut self) -> Result<Step, DissectError> {
        let mut scratch = Ipv4Header::new_zeroed();
        let iph = read_header(self.buf, self.nhoff, &mut scratch)?;

        self.nhoff += iph.header_len();
        self.ip_proto = if iph.is_fragment() {
            IpProto::default()
        } else {
            iph.protocol()
        };
        self.ip_seen = true;

        let (src, dst) = (iph.src_ip_raw(), iph.dst_ip_raw());
        if let Some(addrs) = self.key::<KeyIpv4Addrs>(KeyId::Ipv4Addrs) {
            addrs.src = src;
            addrs.dst = dst;
            self.set_addr_type(KeyId::Ipv4Addrs);
        }
        Ok(Step::Transport)
    }

    fn ipv6(&mut self) -> Result<Step, DissectError> {
        let mut scratch = Ipv6Header::new_zeroed();
        let iph = read_header(self.buf, self.nhoff, &mut scratch)?;

        self.nhoff += Ipv6Header::FIXED_LEN;
        self.ip_proto = iph.next_header();
        self.ip_seen = true;

        let (src, dst, flow_label) = (iph.src_ip_raw(), iph.dst_ip_raw(), iph.flow_label());
        if let Some(addrs) = self.key::<KeyIpv6Addrs>(KeyId::Ipv6Addrs) {
            addrs.src = src;
            addrs.dst = dst;
            self.set_addr_type(KeyId::Ipv6Addrs);
        }
        if flow_label != 0 {
            if let Some(tags) = self.key::<KeyTags>(KeyId::FlowLabel) {
                tags.set_flow_label(flow_label);
            }
        }
        Ok(Step::Transport)
    }

    fn vlan(&mut self) -> Result<Step, DissectError> {
        let mut scratch = VlanHeader::new_zeroed();
        let vlan = read_header(self.buf, self.nhoff, &mut scratch)?;
        let (vlan_id, inner) = (vlan.vlan_id(), vlan.proto());

        // the outermost tag identifies the flow
        if !self.vlan_seen {
            self.vlan_seen = true;
            if let Some(tags) = self.key::<KeyTags>(KeyId::VlanId) {
                tags.set_vlan_id(vlan_id);
            }
        }

        self.proto = inner;
        self.nhoff += VLAN_HLEN;
        Ok(Step::Network)
    }

    fn pppoe(&mut self) -> Result<Step, DissectError> {
        let mut scratch = PppoeSesHeader::new_zeroed();
        let hdr = read_header(self.buf, self.nhoff, &mut scratch)?;
        let (ppp_proto, inner) = (hdr.ppp_proto(), hdr.ether_proto());

        self.nhoff += PppoeSesHeader::FIXED_LEN;
        match inner {
            Some(proto) => {
                self.proto = proto;
                Ok(Step::Network)
            }
            None => Ok(Step::Unknown(UnknownProto::Ppp(ppp_proto))),
        }
    }

    fn tipc(&mut self) -> Result<Step, DissectError> {
        let mut scratch = TipcHeader::new_zeroed();
        let srcnode = read_header(self.buf, self.nhoff, &mut scratch)?.srcnode_raw();

        self.set_basic(false);
        if let Some(addrs) = self.key::<KeyTipcAddrs>(KeyId::TipcAddrs) {
            addrs.srcnode = srcnode;
            self.set_addr_type(KeyId::TipcAddrs);
        }
        Ok(Step::Stop(Outcome::Terminal(EtherProto::TIPC)))
    }

    fn mpls(&mut self) -> Result<Step, DissectError> {
        let mut scratch = MplsLabel::new_zeroed();
        let top = read_header(self.buf, self.nhoff, &mut scratch)?;

        if top.is_entropy_label_indicator() {
            let mut scratch = MplsLabel::new_zeroed();
            let entropy = read_header(self.buf, self.nhoff + MplsLabel::FIXED_LEN, &mut scratch)?;
            // the 20-bit label value, not the masked wire word
            let label = entropy.label();
            if let Some(keyid) = self.key::<KeyKeyId>(KeyId::MplsEntropy) {
                keyid.keyid.set(label);
            }
            self.set_basic(true);
        }
        Ok(Step::Stop(Outcome::Terminal(self.proto)))
    }

    fn transport(&mut self) -> Result<Step, DissectError> {
        match self.ip_proto {
            IpProto::GRE => self.gre(),
            ip_proto if Ipv6ExtHeader::is_walkable(ip_proto) => {
                if self.proto != EtherProto::IPV6 {
                    return Ok(Step::Finish);
                }
                let mut scratch = Ipv6ExtHeader::new_zeroed();
                let ext = read_header(self.buf, self.nhoff, &mut scratch)?;
                self.ip_proto = ext.next_header();
                self.nhoff += ext.header_len();
                Ok(Step::Transport)
            }
            IpProto::IP_ENCAP => {
                self.proto = EtherProto::IPV4;
                Ok(Step::Network)
            }
            IpProto::IPV6 => {
                self.proto = EtherProto::IPV6;
                Ok(Step::Network)
            }
            IpProto::MPLS_IN_IP => {
                self.proto = EtherProto::MPLS_UC;
                Ok(Step::Network)
            }
            _ => Ok(Step::Finish),
        }
    }

    fn gre(&mut self) -> Result<Step, DissectError> {
        let mut scratch = GreHeader::new_zeroed();
        let gre = *read_header(self.buf, self.nhoff, &mut scratch)?;

        if !gre.is_walkable() {
            trace!(nhoff = self.nhoff, flags = gre.flags_version(), "stopping at GRE");
            return Ok(Step::Finish);
        }

        self.nhoff += GreHeader::FIXED_LEN;
        if gre.has_checksum() {
            self.nhoff += GreHeader::OPTION_LEN;
        }
        if gre.has_key() {
            let mut scratch = GreKey::new_zeroed();
            let key = read_header(self.buf, self.nhoff, &mut scratch)?.raw();
            if let Some(keyid) = self.key::<KeyKeyId>(KeyId::GreKeyId) {
                keyid.keyid = key;
            }
            self.nhoff += GreHeader::OPTION_LEN;
        }
        if gre.has_sequence() {
            self.nhoff += GreHeader::OPTION_LEN;
        }

        self.proto = gre.protocol_type();
        if self.proto == EtherProto::TEB {
            let mut scratch = EtherHeader::new_zeroed();
            self.proto = read_header(self.buf, self.nhoff, &mut scratch)?.proto();
            self.nhoff += ETH_HLEN;
        }
        Ok(Step::Network)
    }

    fn finish(mut self) -> Result<Outcome, DissectError> {
        self.set_basic(true);

        if self.dissector.uses_key(KeyId::Ports) {
            let ports = match ports_offset(self.ip_proto) {
                Some(offset) => {
                    let mut scratch = KeyPorts::new_zeroed();
                    *read_header(self.buf, self.nhoff + offset, &mut scratch)?
                }
                None => KeyPorts::default(),
            };
            if let Some(key) = self.key::<KeyPorts>(KeyId::Ports) {
                *key = ports;
            }
        }
        Ok(Outcome::Transport)
    }

    fn unrecognized(mut self, proto: UnknownProto) -> Result<Outcome, DissectError> {
        if !self.ip_seen {
            trace!(%proto, nhoff = self.nhoff, "unrecognized protocol");
            return Err(DissectError::UnrecognizedProtocol(proto));
        }
        trace!(%proto, nhoff = self.nhoff, "unrecognized protocol inside tunnel");
        self.set_basic(true);
        Ok(Outcome::Unrecognized(proto))
    }
}
