//! Fixed-size flow digest for use as a table key.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use zerocopy::IntoBytes;

use crate::flow::key::FlowKeys;

pub const FLOW_KEYS_DIGEST_LEN: usize = 16;

/// Protocols, ports and the first 8 bytes of the address area packed into 16
/// bytes, zero filled. For IPv6 that is the start of the source address only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct FlowKeysDigest(pub [u8; FLOW_KEYS_DIGEST_LEN]);

impl FlowKeysDigest {
    #[inline]
    pub fn as_bytes(&self) -> &[u8; FLOW_KEYS_DIGEST_LEN] {
        &self.0
    }
}

impl From<&FlowKeys> for FlowKeysDigest {
    fn from(keys: &FlowKeys) -> Self {
        let mut d = [0u8; FLOW_KEYS_DIGEST_LEN];

        d[0..2].copy_from_slice(keys.basic.n_proto.as_bytes());
        d[2] = keys.basic.ip_proto.value();
        d[4..8].copy_from_slice(keys.ports.as_bytes());
        d[8..16].copy_from_slice(keys.addrs.v4().as_bytes());

        FlowKeysDigest(d)
    }
}

impl Display for FlowKeysDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl FlowKeys {
    pub fn digest(&self) -> FlowKeysDigest {
        FlowKeysDigest::from(self)
    }
}
