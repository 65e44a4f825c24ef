//! Tunnel headers the dissector walks through.
//!
//! | Protocol | Module | Carried by |
//! |----------|--------|------------|
//! | [GRE](gre) | `gre` | IP protocol 47 (RFC 2784, RFC 2890) |
//! | [MPLS](mpls) | `mpls` | EtherType 0x8847/0x8848, IP protocol 137 (RFC 3032, RFC 6790) |
//!
//! IP-in-IP (protocol 4) and IPv6-in-IP (protocol 41) need no header of
//! their own: the inner IP header starts right after the outer one.

pub mod gre;
pub mod mpls;
