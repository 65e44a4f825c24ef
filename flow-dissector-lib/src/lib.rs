//! Flow key extraction and symmetric flow hashing.
//!
//! [`flow`] walks Ethernet, VLAN, PPPoE, MPLS, GRE, IPv4 and IPv6 (with
//! extension headers) down to the transport ports and writes what it finds
//! into a caller-defined key container. [`packet`] holds the zerocopy wire
//! header views it reads through, and [`buffer`] the bounded reader that
//! copes with packets split over several chunks.

#[macro_use]
mod macros;

pub mod buffer;
pub mod flow;
pub mod packet;
