//! Direction-independent flow hashing.
//!
//! Keys are canonicalized first (lower address, then lower port, as source)
//! so both directions of a connection hash alike. The hashed bytes run from
//! `basic` through the live part of `addrs`, keyed with a process-wide
//! random seed.

use std::hash::BuildHasher;
use std::mem::{offset_of, size_of};
use std::sync::OnceLock;

use ahash::RandomState;
use tracing::debug;
use zerocopy::IntoBytes;

use crate::buffer::PacketBuf;
use crate::flow::key::{FlowKeys, KeyId, KeyIpv4Addrs, KeyIpv6Addrs, KeyTipcAddrs};
use crate::flow::walker::Start;

static HASH_SEED: OnceLock<u32> = OnceLock::new();

// fixed ahash keys, the per-process part comes from the seed
const HASH_KEYS: [u64; 3] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
];

/// The process-wide hash seed, drawn at random on first use.
pub fn hash_seed() -> u32 {
    *HASH_SEED.get_or_init(rand::random)
}

/// Installs a fixed seed. Returns false when a seed was already in place
/// (installed earlier or drawn by a previous hash).
pub fn init_hash_seed(seed: u32) -> bool {
    let installed = HASH_SEED.set(seed).is_ok();
    if installed {
        debug!(seed, "flow hash seed installed");
    } else {
        debug!(seed, current = hash_seed(), "flow hash seed already set");
    }
    installed
}

/// Hash of a packet plus whether transport ports went into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlowHash {
    pub hash: u32,
    pub l4: bool,
}

impl FlowKeys {
    /// Orders addresses (then ports, on equal addresses) so that the smaller
    /// one is the source. TIPC keys and keys without addresses are left
    /// alone.
    pub fn canonicalize(&mut self) {
        let (sport, dport) = (self.ports.src.get(), self.ports.dst.get());

        let swap = match self.control.addr_type() {
            Some(KeyId::Ipv4Addrs) => {
                let a = self.addrs.v4();
                let (src, dst) = (u32::from_be_bytes(a.src), u32::from_be_bytes(a.dst));
                dst < src || (dst == src && dport < sport)
            }
            Some(KeyId::Ipv6Addrs) => {
                let a = self.addrs.v6();
                a.dst < a.src || (a.dst == a.src && dport < sport)
            }
            _ => false,
        };

        if swap {
            match self.control.addr_type() {
                Some(KeyId::Ipv4Addrs) => {
                    let a = self.addrs.v4_mut();
                    std::mem::swap(&mut a.src, &mut a.dst);
                }
                _ => {
                    let a = self.addrs.v6_mut();
                    std::mem::swap(&mut a.src, &mut a.dst);
                }
            }
            std::mem::swap(&mut self.ports.src, &mut self.ports.dst);
        }
    }

    /// Bytes fed to the hash, taken from canonicalized keys.
    fn hash_bytes(&self) -> &[u8] {
        let live = match self.control.addr_type() {
            Some(KeyId::Ipv4Addrs) => size_of::<KeyIpv4Addrs>(),
            Some(KeyId::Ipv6Addrs) => size_of::<KeyIpv6Addrs>(),
            Some(KeyId::TipcAddrs) => size_of::<KeyTipcAddrs>(),
            _ => 0,
        };
        let start = offset_of!(FlowKeys, basic);
        let end = offset_of!(FlowKeys, addrs) + live;
        &self.as_bytes()[start..end]
    }

    /// Canonicalizes and hashes with an explicit seed. Never returns zero.
    pub fn hash_with_seed(&mut self, seed: u32) -> u32 {
        self.canonicalize();

        let state = RandomState::with_seeds(seed as u64, HASH_KEYS[0], HASH_KEYS[1], HASH_KEYS[2]);
        let h = state.hash_one(self.hash_bytes());
        match (h as u32) ^ ((h >> 32) as u32) {
            0 => 1,
            folded => folded,
        }
    }

    /// [`hash_with_seed`](Self::hash_with_seed) with the process-wide seed.
    pub fn hash(&mut self) -> u32 {
        self.hash_with_seed(hash_seed())
    }

    /// Source address folded to 32 bits: the IPv4 address, the XOR of the
    /// IPv6 address words or the TIPC node.
    pub fn u32_src(&self) -> u32 {
        match self.control.addr_type() {
            Some(KeyId::Ipv4Addrs) => u32::from_be_bytes(self.addrs.v4().src),
            Some(KeyId::Ipv6Addrs) => fold_ipv6(&self.addrs.v6().src),
            Some(KeyId::TipcAddrs) => self.addrs.tipc().srcnode.get(),
            _ => 0,
        }
    }

    /// Destination counterpart of [`u32_src`](Self::u32_src). TIPC keys have
    /// no destination.
    pub fn u32_dst(&self) -> u32 {
        match self.control.addr_type() {
            Some(KeyId::Ipv4Addrs) => u32::from_be_bytes(self.addrs.v4().dst),
            Some(KeyId::Ipv6Addrs) => fold_ipv6(&self.addrs.v6().dst),
            _ => 0,
        }
    }
}

fn fold_ipv6(addr: &[u8; 16]) -> u32 {
    addr.chunks_exact(4)
        .map(|w| u32::from_be_bytes([w[0], w[1], w[2], w[3]]))
        .fold(0, |acc, w| acc ^ w)
}

fn dissect_and_hash<B: PacketBuf + ?Sized>(buf: &B, start: Start, seed: u32) -> FlowHash {
    match FlowKeys::from_packet(buf, start) {
        Ok(mut keys) => {
            let l4 = !keys.ports.is_zero();
            FlowHash {
                hash: keys.hash_with_seed(seed),
                l4,
            }
        }
        Err(_) => FlowHash::default(),
    }
}

/// Flow hash of a packet with the process-wide seed; zero when the packet
/// cannot be dissected.
pub fn flow_hash<B: PacketBuf + ?Sized>(buf: &B, start: Start) -> FlowHash {
    dissect_and_hash(buf, start, hash_seed())
}

/// Flow hash with a caller-chosen seed, e.g. to spread flows differently per
/// queue set.
pub fn flow_hash_perturb<B: PacketBuf + ?Sized>(buf: &B, start: Start, perturb: u32) -> u32 {
    dissect_and_hash(buf, start, perturb).hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::key::KeyPorts;
    use crate::packet::protocol::{EtherProto, IpProto};

    fn v4_keys(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16) -> FlowKeys {
        let mut keys = FlowKeys::default();
        keys.basic.n_proto = EtherProto::IPV4;
        keys.basic.ip_proto = IpProto::TCP;
        keys.control.set_addr_type(KeyId::Ipv4Addrs);
        keys.control.set_thoff(34);
        keys.addrs.v4_mut().src = src;
        keys.addrs.v4_mut().dst = dst;
        keys.ports = KeyPorts::new(sport, dport);
        keys
    }

    fn v6_keys(src_last: u8, dst_last: u8, sport: u16, dport: u16) -> FlowKeys {
        let mut keys = FlowKeys::default();
        keys.basic.n_proto = EtherProto::IPV6;
        keys.basic.ip_proto = IpProto::UDP;
        keys.control.set_addr_type(KeyId::Ipv6Addrs);
        keys.addrs.v6_mut().src = [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, src_last];
        keys.addrs.v6_mut().dst = [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, dst_last];
        keys.ports = KeyPorts::new(sport, dport);
        keys
    }

    #[test]
    fn test_symmetric_ipv4() {
        let mut fwd = v4_keys([10, 0, 0, 1], [10, 0, 0, 2], 40000, 80);
        let mut rev = v4_keys([10, 0, 0, 2], [10, 0, 0, 1], 80, 40000);
        assert_eq!(fwd.hash_with_seed(7), rev.hash_with_seed(7));
        assert_eq!(fwd, rev);
    }

    #[test]
    fn test_symmetric_ipv4_high_bit() {
        // addresses differing in the top bit compare unsigned
        let mut fwd = v4_keys([200, 0, 0, 1], [10, 0, 0, 1], 1, 2);
        let mut rev = v4_keys([10, 0, 0, 1], [200, 0, 0, 1], 2, 1);
        fwd.canonicalize();
        rev.canonicalize();
        assert_eq!(fwd.addrs.v4().src, [10, 0, 0, 1]);
        assert_eq!(fwd.ports, KeyPorts::new(2, 1));
        assert_eq!(fwd, rev);
    }

    #[test]
    fn test_symmetric_ipv6_and_port_tiebreak() {
        let mut fwd = v6_keys(9, 3, 5000, 53);
        let mut rev = v6_keys(3, 9, 53, 5000);
        assert_eq!(fwd.hash_with_seed(1), rev.hash_with_seed(1));

        // same address both ways: the lower port becomes the source
        let mut keys = v6_keys(1, 1, 5000, 53);
        keys.canonicalize();
        assert_eq!(keys.ports, KeyPorts::new(53, 5000));
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let mut keys = v4_keys([192, 168, 0, 9], [192, 168, 0, 1], 443, 50000);
        keys.canonicalize();
        let once = keys;
        keys.canonicalize();
        assert_eq!(keys, once);
    }

    #[test]
    fn test_hash_stable_and_seeded() {
        let mut a = v4_keys([10, 0, 0, 1], [10, 0, 0, 2], 1, 2);
        let mut b = a;
        assert_eq!(a.hash_with_seed(42), b.hash_with_seed(42));
        assert_ne!(a.hash_with_seed(42), a.hash_with_seed(43));
    }

    #[test]
    fn test_hash_ignores_control() {
        let mut a = v4_keys([10, 0, 0, 1], [10, 0, 0, 2], 1, 2);
        let mut b = a;
        b.control.set_thoff(99);
        assert_eq!(a.hash_with_seed(5), b.hash_with_seed(5));
    }

    #[test]
    fn test_hash_never_zero() {
        for seed in 0..2000 {
            let mut keys = v4_keys([10, 0, 0, 1], [10, 0, 0, 2], 1, 2);
            assert_ne!(keys.hash_with_seed(seed), 0);
            let mut empty = FlowKeys::default();
            assert_ne!(empty.hash_with_seed(seed), 0);
        }
    }

    #[test]
    fn test_hash_bytes_cover_live_addresses() {
        let keys = v4_keys([10, 0, 0, 1], [10, 0, 0, 2], 1, 2);
        assert_eq!(keys.hash_bytes().len(), 20 + 8);

        let keys = v6_keys(1, 2, 3, 4);
        assert_eq!(keys.hash_bytes().len(), 20 + 32);

        assert_eq!(FlowKeys::default().hash_bytes().len(), 20);
    }

    #[test]
    fn test_u32_addresses() {
        let keys = v4_keys([10, 0, 0, 1], [10, 0, 0, 2], 1, 2);
        assert_eq!(keys.u32_src(), 0x0a00_0001);
        assert_eq!(keys.u32_dst(), 0x0a00_0002);

        let keys = v6_keys(0x01, 0x02, 1, 2);
        assert_eq!(keys.u32_src(), 0xfe80_0000 ^ 0x0000_0001);
        assert_eq!(keys.u32_dst(), 0xfe80_0000 ^ 0x0000_0002);

        assert_eq!(FlowKeys::default().u32_src(), 0);
    }

    #[test]
    fn test_flow_hash_packets() {
        let fwd = [
            0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x00, // IPv4
            0x40, 0x11, 0x00, 0x00, // UDP
            0x0a, 0x00, 0x00, 0x01, 0x0a, 0x00, 0x00, 0x02, // 10.0.0.1 -> 10.0.0.2
            0x13, 0x88, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00, // 5000 -> 53
        ];
        let rev = [
            0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x00, // IPv4
            0x40, 0x11, 0x00, 0x00, // UDP
            0x0a, 0x00, 0x00, 0x02, 0x0a, 0x00, 0x00, 0x01, // 10.0.0.2 -> 10.0.0.1
            0x00, 0x35, 0x13, 0x88, 0x00, 0x08, 0x00, 0x00, // 53 -> 5000
        ];
        let start = Start::new(EtherProto::IPV4, 0);

        let h1 = flow_hash(&fwd[..], start);
        let h2 = flow_hash(&rev[..], start);
        assert!(h1.l4);
        assert_ne!(h1.hash, 0);
        assert_eq!(h1, h2);

        assert_eq!(
            flow_hash_perturb(&fwd[..], start, 3),
            flow_hash_perturb(&rev[..], start, 3)
        );

        // truncated inside the ports
        assert_eq!(flow_hash(&fwd[..22], start), FlowHash::default());
    }

    #[test]
    fn test_seed_is_process_wide() {
        let first = hash_seed();
        assert_eq!(hash_seed(), first);
        assert!(!init_hash_seed(first.wrapping_add(1)));
        assert_eq!(hash_seed(), first);
    }
}
