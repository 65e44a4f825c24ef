//! Link-layer and IP protocol numbers
//!
//! `EtherProto` carries Ethernet type values (IEEE 802 registry) in network
//! byte order, `IpProto` carries IPv4 protocol / IPv6 next-header values
//! (IANA registry). Both are plain newtypes, so any number can be represented;
//! the named constants are the ones the dissector dispatches on plus common
//! neighbours that show up in captures.
//!
//! # Examples
//!
//! ```
//! use flow_dissector::packet::protocol::{EtherProto, IpProto};
//!
//! assert_eq!(format!("{}", IpProto::TCP), "tcp");
//! assert_eq!(format!("{}", IpProto::IPV6_ICMP), "ipv6-icmp");
//! assert_eq!(format!("{}", EtherProto::TIPC), "tipc");
//!
//! // unnamed numbers print as hex
//! assert_eq!(format!("{}", IpProto::from(200)), "0xc8");
//!
//! let proto: EtherProto = "0x88ca".parse().unwrap();
//! assert_eq!(proto, EtherProto::TIPC);
//! assert_eq!(EtherProto::IPV6.value(), 0x86dd);
//! ```

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, U16};

crate::protocol_constants! {
    EtherProto, U16<BigEndian>, u16:
        LOOP = 0x0060;
        IPV4 = 0x0800;
        ARP = 0x0806;
        TEB = 0x6558;
        RARP = 0x8035;
        VLAN_8021Q = 0x8100;
        IPX = 0x8137;
        IPV6 = 0x86DD;
        PAUSE = 0x8808;
        SLOW = 0x8809;
        MPLS_UC = 0x8847;
        MPLS_MC = 0x8848;
        PPP_DISC = 0x8863;
        PPP_SES = 0x8864;
        PAE = 0x888E;
        AOE = 0x88A2;
        VLAN_8021AD = 0x88A8;
        TIPC = 0x88CA;
        VLAN_8021AH = 0x88E7;
        LLDP = 0x88CC;
        IEEE_1588 = 0x88F7;
        PRP = 0x88FB;
        FCOE = 0x8906;
        FIP = 0x8914;
        LOOPBACK = 0x9000;
        QINQ1 = 0x9100;
        EDSA = 0xDADA;
}

crate::protocol_constants! {
    IpProto, u8, u8:
        IPV6_HOPOPT = 0;
        ICMP = 1;
        IGMP = 2;
        IP_ENCAP = 4;
        TCP = 6;
        EGP = 8;
        UDP = 17;
        DCCP = 33;
        IPV6 = 41;
        IPV6_ROUTE = 43;
        IPV6_FRAG = 44;
        RSVP = 46;
        GRE = 47;
        ESP = 50;
        AH = 51;
        IPV6_ICMP = 58;
        IPV6_NONXT = 59;
        IPV6_OPTS = 60;
        EIGRP = 88;
        OSPF = 89;
        ETHERIP = 97;
        PIM = 103;
        L2TP = 115;
        SCTP = 132;
        IPV6_MOBILITY = 135;
        UDPLITE = 136;
        MPLS_IN_IP = 137;
        ETHERNET = 143;
        ANY = 255;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_numbers() {
        assert_eq!(EtherProto::IPV4.value(), 0x0800);
        assert_eq!(EtherProto::VLAN_8021AD.value(), 0x88A8);
        assert_eq!(EtherProto::PPP_SES.value(), 0x8864);
        assert_eq!(EtherProto::FCOE.value(), 0x8906);
        assert_eq!(IpProto::IP_ENCAP.0, 4);
        assert_eq!(IpProto::IPV6_ROUTE.0, 43);
        assert_eq!(IpProto::MPLS_IN_IP.0, 137);
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(EtherProto::default().value(), 0);
        assert_eq!(IpProto::default(), IpProto::IPV6_HOPOPT);
    }

    #[test]
    fn test_wire_order() {
        use zerocopy::IntoBytes;
        assert_eq!(EtherProto::IPV6.as_bytes(), &[0x86, 0xDD]);
        assert_eq!(EtherProto::from(0x1234).as_bytes(), &[0x12, 0x34]);
    }

    #[test]
    fn test_display() {
        assert_eq!(IpProto::UDP.to_string(), "udp");
        assert_eq!(IpProto::IPV6_ROUTE.to_string(), "ipv6-route");
        assert_eq!(IpProto::from(250).to_string(), "0xfa");
        assert_eq!(EtherProto::IPV6.to_string(), "ipv6");
        assert_eq!(EtherProto::from(0x1234).to_string(), "0x1234");
    }

    #[test]
    fn test_parse() {
        assert_eq!("gre".parse::<IpProto>(), Ok(IpProto::GRE));
        assert_eq!("0x2f".parse::<IpProto>(), Ok(IpProto::GRE));
        assert_eq!("tipc".parse::<EtherProto>(), Ok(EtherProto::TIPC));
        assert!("bogus".parse::<EtherProto>().is_err());
        assert!("0xzz".parse::<IpProto>().is_err());
    }

    #[cfg(not(feature = "protocol_names"))]
    #[test]
    fn test_serde_as_number() {
        use serde::de::value::{Error, U8Deserializer};
        use serde::Deserialize;
        let d = U8Deserializer::<Error>::new(47);
        assert_eq!(IpProto::deserialize(d), Ok(IpProto::GRE));
    }

    #[cfg(feature = "protocol_names")]
    #[test]
    fn test_serde_as_name() {
        use serde::de::value::{Error, StrDeserializer};
        use serde::Deserialize;
        let d = StrDeserializer::<Error>::new("gre");
        assert_eq!(IpProto::deserialize(d), Ok(IpProto::GRE));
        let d = StrDeserializer::<Error>::new("0x2f");
        assert_eq!(IpProto::deserialize(d), Ok(IpProto::GRE));
    }

    #[test]
    fn test_is_known() {
        assert!(IpProto::TCP.is_known());
        assert!(EtherProto::TIPC.is_known());
        assert!(!IpProto::from(200).is_known());
        assert!(!EtherProto::from(0x1234).is_known());
    }
}
