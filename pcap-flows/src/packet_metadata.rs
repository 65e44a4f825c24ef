use std::cmp::min;
use std::fmt::{self, Display};

use chrono::DateTime;
use pcap_parser::{EnhancedPacketBlock, LegacyPcapBlock, SimplePacketBlock};

const NSEC_PER_SEC: u64 = 1_000_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimestampNsec(pub u64);

impl Display for TimestampNsec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (secs, nsecs) = (self.0 / NSEC_PER_SEC, (self.0 % NSEC_PER_SEC) as u32);
        match DateTime::from_timestamp(secs as i64, nsecs) {
            Some(dt) if !f.alternate() => write!(f, "{}", dt.format("%H:%M:%S%.6f")),
            _ => write!(f, "{}.{:09}", secs, nsecs),
        }
    }
}

/// Timestamp units per second of a capture interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TsResolution(pub u64);

impl Default for TsResolution {
    fn default() -> Self {
        TsResolution::MICROS
    }
}

impl TsResolution {
    pub const MICROS: TsResolution = TsResolution(1_000_000);
    pub const NANOS: TsResolution = TsResolution(NSEC_PER_SEC);

    /// Decodes the pcapng `if_tsresol` option: the top bit selects a power
    /// of two, otherwise a power of ten. Unrepresentable values fall back to
    /// microseconds.
    pub fn from_tsresol(tsresol: u8) -> Self {
        let exp = (tsresol & 0x7f) as u32;
        let units = if tsresol & 0x80 != 0 {
            1u64.checked_shl(exp)
        } else {
            10u64.checked_pow(exp)
        };
        units.map(TsResolution).unwrap_or_default()
    }

    fn to_nsec(self, ts: u64) -> TimestampNsec {
        let secs = ts / self.0;
        let frac = (ts % self.0) as u128 * NSEC_PER_SEC as u128 / self.0 as u128;
        TimestampNsec(secs.saturating_mul(NSEC_PER_SEC).saturating_add(frac as u64))
    }
}

/// What the flow processing needs from a capture record.
pub trait PacketMetadata {
    fn caplen(&self) -> u32;
    fn data(&self) -> &[u8];
    fn timestamp(&self, resolution: TsResolution) -> TimestampNsec;
}

impl PacketMetadata for LegacyPcapBlock<'_> {
    #[inline]
    fn caplen(&self) -> u32 {
        self.caplen
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.data
    }

    // the sub-second field is in the file's resolution
    fn timestamp(&self, resolution: TsResolution) -> TimestampNsec {
        let sub = resolution.to_nsec(self.ts_usec as u64).0;
        TimestampNsec(self.ts_sec as u64 * NSEC_PER_SEC + sub)
    }
}

impl PacketMetadata for EnhancedPacketBlock<'_> {
    #[inline]
    fn caplen(&self) -> u32 {
        self.caplen
    }

    #[inline]
    fn data(&self) -> &[u8] {
        // data is padded to 32 bits
        &self.data[..min(self.caplen as usize, self.data.len())]
    }

    fn timestamp(&self, resolution: TsResolution) -> TimestampNsec {
        resolution.to_nsec(((self.ts_high as u64) << 32) | self.ts_low as u64)
    }
}

impl PacketMetadata for SimplePacketBlock<'_> {
    #[inline]
    fn caplen(&self) -> u32 {
        min(self.origlen, self.data.len() as u32)
    }

    #[inline]
    fn data(&self) -> &[u8] {
        &self.data[..self.caplen() as usize]
    }

    fn timestamp(&self, _resolution: TsResolution) -> TimestampNsec {
        TimestampNsec(0)
    }
}
