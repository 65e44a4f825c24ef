//! Mapping from key ids to offsets inside a caller-defined container.

use std::marker::PhantomData;
use std::mem::{offset_of, size_of};

use thiserror::Error;
use zerocopy::{FromBytes, IntoBytes, KnownLayout};

use crate::flow::key::{FlowKeys, KeyId, KeyValue};

/// Any plain-bytes struct can hold flow keys.
pub trait KeyContainer: FromBytes + IntoBytes + KnownLayout {}

impl<T: FromBytes + IntoBytes + KnownLayout> KeyContainer for T {}

/// One requested key and where its value lives in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub key: KeyId,
    pub offset: usize,
}

impl KeyDescriptor {
    pub const fn new(key: KeyId, offset: usize) -> Self {
        KeyDescriptor { key, offset }
    }
}

/// Rejected key lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DissectorError {
    #[error("key {0} requested twice")]
    DuplicateKey(KeyId),
    #[error("key {key} at offset {offset} does not fit the container")]
    OffsetOutOfRange { key: KeyId, offset: usize },
    #[error("mandatory key {0} missing")]
    MissingKey(KeyId),
}

/// Which keys to extract and where to store them in a `C`.
pub struct Dissector<C> {
    used_keys: u32,
    offset: [u16; KeyId::COUNT],
    _container: PhantomData<fn() -> C>,
}

impl<C> Dissector<C> {
    /// Builds a dissector from a key list. `Control` and `Basic` are
    /// mandatory, every key may appear once and each value must lie inside
    /// `C`.
    pub const fn new(keys: &[KeyDescriptor]) -> Result<Self, DissectorError> {
        let mut used_keys = 0u32;
        let mut offset = [0u16; KeyId::COUNT];

        let mut i = 0;
        while i < keys.len() {
            let desc = keys[i];
            if used_keys & desc.key.bit() != 0 {
                return Err(DissectorError::DuplicateKey(desc.key));
            }
            if desc.offset > u16::MAX as usize
                || desc.offset + desc.key.value_len() > size_of::<C>()
            {
                return Err(DissectorError::OffsetOutOfRange {
                    key: desc.key,
                    offset: desc.offset,
                });
            }
            used_keys |= desc.key.bit();
            offset[desc.key as usize] = desc.offset as u16;
            i += 1;
        }

        if used_keys & KeyId::Control.bit() == 0 {
            return Err(DissectorError::MissingKey(KeyId::Control));
        }
        if used_keys & KeyId::Basic.bit() == 0 {
            return Err(DissectorError::MissingKey(KeyId::Basic));
        }

        Ok(Dissector {
            used_keys,
            offset,
            _container: PhantomData,
        })
    }

    #[inline]
    pub fn uses_key(&self, key: KeyId) -> bool {
        self.used_keys & key.bit() != 0
    }

    /// Bitset of registered keys, bit `n` for key id `n`.
    #[inline]
    pub fn used_keys(&self) -> u32 {
        self.used_keys
    }

    #[inline]
    pub fn offset(&self, key: KeyId) -> Option<usize> {
        self.uses_key(key).then(|| self.offset[key as usize] as usize)
    }
}

impl<C: KeyContainer> Dissector<C> {
    /// Mutable view of a key's value inside `container`, `None` when the key
    /// is not registered or `K` is not its value type.
    pub fn target<'c, K: KeyValue>(&self, key: KeyId, container: &'c mut C) -> Option<&'c mut K> {
        if !K::accepts(key) {
            return None;
        }
        let offset = self.offset(key)?;
        let bytes = container.as_mut_bytes().get_mut(offset..)?;
        K::mut_from_prefix(bytes).ok().map(|(value, _)| value)
    }
}

impl<C> Clone for Dissector<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Dissector<C> {}

impl<C> std::fmt::Debug for Dissector<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_map();
        for key in KeyId::ALL {
            if let Some(offset) = self.offset(key) {
                list.entry(&key, &offset);
            }
        }
        list.finish()
    }
}

const fn build(keys: &[KeyDescriptor]) -> Dissector<FlowKeys> {
    match Dissector::new(keys) {
        Ok(dissector) => dissector,
        Err(_) => panic!("invalid built-in flow key list"),
    }
}

/// Addresses, ports, tags and tunnel keys into [`FlowKeys`].
pub static FLOW_KEYS_DISSECTOR: Dissector<FlowKeys> = build(&[
    KeyDescriptor::new(KeyId::Control, offset_of!(FlowKeys, control)),
    KeyDescriptor::new(KeyId::Basic, offset_of!(FlowKeys, basic)),
    KeyDescriptor::new(KeyId::Ipv4Addrs, offset_of!(FlowKeys, addrs)),
    KeyDescriptor::new(KeyId::Ipv6Addrs, offset_of!(FlowKeys, addrs)),
    KeyDescriptor::new(KeyId::TipcAddrs, offset_of!(FlowKeys, addrs)),
    KeyDescriptor::new(KeyId::Ports, offset_of!(FlowKeys, ports)),
    KeyDescriptor::new(KeyId::VlanId, offset_of!(FlowKeys, tags)),
    KeyDescriptor::new(KeyId::FlowLabel, offset_of!(FlowKeys, tags)),
    KeyDescriptor::new(KeyId::GreKeyId, offset_of!(FlowKeys, keyid)),
]);

/// Only protocol numbers and the transport offset.
pub static FLOW_KEYS_BUF_DISSECTOR: Dissector<FlowKeys> = build(&[
    KeyDescriptor::new(KeyId::Control, offset_of!(FlowKeys, control)),
    KeyDescriptor::new(KeyId::Basic, offset_of!(FlowKeys, basic)),
]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::key::{KeyBasic, KeyControl, KeyPorts, KeyTags};
    use crate::packet::protocol::EtherProto;

    #[repr(C)]
    #[derive(FromBytes, IntoBytes, KnownLayout, zerocopy::Immutable, zerocopy::Unaligned, Default)]
    struct Small {
        basic: KeyBasic,
        control: KeyControl,
        ports: KeyPorts,
    }

    const SMALL_KEYS: [KeyDescriptor; 3] = [
        KeyDescriptor::new(KeyId::Control, offset_of!(Small, control)),
        KeyDescriptor::new(KeyId::Basic, offset_of!(Small, basic)),
        KeyDescriptor::new(KeyId::Ports, offset_of!(Small, ports)),
    ];

    #[test]
    fn test_custom_container() {
        let dissector = Dissector::<Small>::new(&SMALL_KEYS).unwrap();
        assert!(dissector.uses_key(KeyId::Ports));
        assert!(!dissector.uses_key(KeyId::Ipv4Addrs));
        assert_eq!(dissector.offset(KeyId::Control), Some(4));
        assert_eq!(dissector.offset(KeyId::Ipv6Addrs), None);
        assert_eq!(dissector.used_keys(), 0b10_0011);

        let mut small = Small::default();
        dissector
            .target::<KeyBasic>(KeyId::Basic, &mut small)
            .unwrap()
            .n_proto = EtherProto::IPV6;
        assert_eq!(small.basic.n_proto, EtherProto::IPV6);

        // wrong value type, unregistered key
        assert!(dissector.target::<KeyTags>(KeyId::Basic, &mut small).is_none());
        assert!(dissector.target::<KeyTags>(KeyId::VlanId, &mut small).is_none());
    }

    #[test]
    fn test_rejects_duplicate() {
        let keys = [
            KeyDescriptor::new(KeyId::Control, 0),
            KeyDescriptor::new(KeyId::Basic, 4),
            KeyDescriptor::new(KeyId::Control, 8),
        ];
        assert_eq!(
            Dissector::<FlowKeys>::new(&keys).err(),
            Some(DissectorError::DuplicateKey(KeyId::Control))
        );
    }

    #[test]
    fn test_rejects_out_of_range() {
        // 32 bytes of IPv6 addresses starting 8 bytes before the end
        let keys = [
            KeyDescriptor::new(KeyId::Control, 0),
            KeyDescriptor::new(KeyId::Basic, 4),
            KeyDescriptor::new(KeyId::Ipv6Addrs, size_of::<FlowKeys>() - 8),
        ];
        assert!(matches!(
            Dissector::<FlowKeys>::new(&keys),
            Err(DissectorError::OffsetOutOfRange { key: KeyId::Ipv6Addrs, .. })
        ));

        let keys = [
            KeyDescriptor::new(KeyId::Control, 70_000),
            KeyDescriptor::new(KeyId::Basic, 4),
        ];
        assert!(matches!(
            Dissector::<FlowKeys>::new(&keys),
            Err(DissectorError::OffsetOutOfRange { key: KeyId::Control, offset: 70_000 })
        ));
    }

    #[test]
    fn test_rejects_missing_mandatory() {
        let keys = [KeyDescriptor::new(KeyId::Control, 0)];
        assert_eq!(
            Dissector::<FlowKeys>::new(&keys).err(),
            Some(DissectorError::MissingKey(KeyId::Basic))
        );
        let keys = [KeyDescriptor::new(KeyId::Basic, 4)];
        assert_eq!(
            Dissector::<FlowKeys>::new(&keys).err(),
            Some(DissectorError::MissingKey(KeyId::Control))
        );
    }

    #[test]
    fn test_default_dissectors() {
        assert!(FLOW_KEYS_DISSECTOR.uses_key(KeyId::GreKeyId));
        assert!(FLOW_KEYS_DISSECTOR.uses_key(KeyId::FlowLabel));
        assert!(!FLOW_KEYS_DISSECTOR.uses_key(KeyId::EthAddrs));
        assert!(!FLOW_KEYS_DISSECTOR.uses_key(KeyId::MplsEntropy));
        assert_eq!(
            FLOW_KEYS_DISSECTOR.offset(KeyId::VlanId),
            FLOW_KEYS_DISSECTOR.offset(KeyId::FlowLabel)
        );
        assert_eq!(
            FLOW_KEYS_BUF_DISSECTOR.used_keys(),
            KeyId::Control.bit() | KeyId::Basic.bit()
        );
    }
}
