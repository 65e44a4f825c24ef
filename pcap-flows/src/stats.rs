use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use flow_dissector::flow::{FlowKeys, KeyId, Outcome};
use flow_dissector::packet::protocol::EtherProto;
use flow_dissector::packet::DissectError;
use tracing::warn;

/// Distinct flow hashes seen so far.
pub type FlowSet = HashSet<u32, ahash::RandomState>;

/// Per-reader counters, flushed into the shared [`Stats`] every
/// [`FLUSH_INTERVAL`] packets and once at the end of the capture.
#[derive(Default, Debug, Clone)]
pub struct LocalStats {
    /// Running frame number, never reset by [`flush`](Self::flush).
    pub frame_index: u64,

    pub total_packets: u64,
    pub total_bytes: u64,
    pub unsupported_link: u64,

    // dissection results
    pub dissected: u64,
    pub truncated: u64,
    pub invalid: u64,
    pub unrecognized: u64,

    pub ipv4: u64,
    pub ipv6: u64,
    pub tipc: u64,
    pub mpls: u64,
    pub l4: u64,

    pub flows: FlowSet,
}

impl LocalStats {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a successful walk.
    pub fn record(&mut self, keys: &FlowKeys, outcome: Outcome) {
        self.dissected += 1;

        match keys.control.addr_type() {
            Some(KeyId::Ipv4Addrs) => self.ipv4 += 1,
            Some(KeyId::Ipv6Addrs) => self.ipv6 += 1,
            Some(KeyId::TipcAddrs) => self.tipc += 1,
            _ => {}
        }
        match outcome {
            Outcome::Terminal(EtherProto::MPLS_UC | EtherProto::MPLS_MC) => self.mpls += 1,
            Outcome::Unrecognized(_) => self.unrecognized += 1,
            _ => {}
        }
        if !keys.ports.is_zero() {
            self.l4 += 1;
        }
    }

    pub fn record_error(&mut self, err: DissectError) {
        match err {
            DissectError::TruncatedPacket(_) => self.truncated += 1,
            DissectError::InvalidHeader(_) => self.invalid += 1,
            DissectError::UnrecognizedProtocol(_) => self.unrecognized += 1,
        }
    }

    /// Adds every local counter to `stats` and resets it.
    pub fn flush(&mut self, stats: &Stats) {
        macro_rules! flush_counter {
            ($field:ident) => {
                if self.$field > 0 {
                    stats.$field.fetch_add(self.$field, Ordering::Relaxed);
                    self.$field = 0;
                }
            };
        }

        flush_counter!(total_packets);
        flush_counter!(total_bytes);
        flush_counter!(unsupported_link);
        flush_counter!(dissected);
        flush_counter!(truncated);
        flush_counter!(invalid);
        flush_counter!(unrecognized);
        flush_counter!(ipv4);
        flush_counter!(ipv6);
        flush_counter!(tipc);
        flush_counter!(mpls);
        flush_counter!(l4);

        if !self.flows.is_empty() {
            stats.flows_locked().extend(self.flows.drain());
        }
    }

    /// True once every `interval` packets; `interval` must be a power of two.
    #[inline]
    pub fn should_flush(&self, interval: u64) -> bool {
        self.total_packets & (interval - 1) == 0
    }
}

pub const FLUSH_INTERVAL: u64 = 1024;

#[derive(Default, Debug)]
pub struct Stats {
    pub total_packets: AtomicU64,
    pub total_bytes: AtomicU64,
    pub unsupported_link: AtomicU64,

    pub dissected: AtomicU64,
    pub truncated: AtomicU64,
    pub invalid: AtomicU64,
    pub unrecognized: AtomicU64,

    pub ipv4: AtomicU64,
    pub ipv6: AtomicU64,
    pub tipc: AtomicU64,
    pub mpls: AtomicU64,
    pub l4: AtomicU64,

    pub flows: Mutex<FlowSet>,
}

impl Stats {
    #[inline]
    fn get(&self, counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// The flow set, recovered when a previous holder panicked.
    fn flows_locked(&self) -> MutexGuard<'_, FlowSet> {
        self.flows.lock().unwrap_or_else(|poisoned| {
            warn!("flow set lock poisoned, keeping its contents");
            poisoned.into_inner()
        })
    }

    pub fn distinct_flows(&self) -> usize {
        self.flows_locked().len()
    }

    pub fn total_errors(&self) -> u64 {
        self.get(&self.truncated) + self.get(&self.invalid)
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Flow Statistics ===")?;
        writeln!(f)?;

        writeln!(f, "--- General ---")?;
        writeln!(f, "Total packets processed: {}", self.get(&self.total_packets))?;
        writeln!(f, "Total bytes processed: {}", self.get(&self.total_bytes))?;
        if self.get(&self.unsupported_link) > 0 {
            writeln!(f, "Unsupported link type: {}", self.get(&self.unsupported_link))?;
        }
        writeln!(f)?;

        writeln!(f, "--- Dissection ---")?;
        writeln!(f, "Dissected: {}", self.get(&self.dissected))?;
        writeln!(f, "Errors: {}", self.total_errors())?;
        writeln!(f, "  Truncated: {}", self.get(&self.truncated))?;
        writeln!(f, "  Invalid header: {}", self.get(&self.invalid))?;
        writeln!(f, "Unrecognized protocol: {}", self.get(&self.unrecognized))?;
        writeln!(f)?;

        writeln!(f, "--- Keys ---")?;
        writeln!(f, "IPv4: {}", self.get(&self.ipv4))?;
        writeln!(f, "IPv6: {}", self.get(&self.ipv6))?;
        if self.get(&self.tipc) > 0 {
            writeln!(f, "TIPC: {}", self.get(&self.tipc))?;
        }
        if self.get(&self.mpls) > 0 {
            writeln!(f, "MPLS: {}", self.get(&self.mpls))?;
        }
        writeln!(f, "With ports: {}", self.get(&self.l4))?;
        writeln!(f, "Distinct flows: {}", self.distinct_flows())?;

        Ok(())
    }
}
