//! Flow dissection: key registry, protocol walker, hashing and digests.

pub mod digest;
pub mod dissector;
pub mod hash;
pub mod key;
pub mod walker;

pub use digest::{FlowKeysDigest, FLOW_KEYS_DIGEST_LEN};
pub use dissector::{
    Dissector, DissectorError, KeyContainer, KeyDescriptor, FLOW_KEYS_BUF_DISSECTOR,
    FLOW_KEYS_DISSECTOR,
};
pub use hash::{flow_hash, flow_hash_perturb, hash_seed, init_hash_seed, FlowHash};
pub use key::{FlowKeys, KeyId};
pub use walker::{payload_offset, ports_offset, Outcome, Start};
