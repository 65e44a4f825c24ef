use flow_dissector::flow::{FlowKeys, Start, FLOW_KEYS_BUF_DISSECTOR, FLOW_KEYS_DISSECTOR};
use flow_dissector::packet::DissectError;
use pcap_parser::Linktype;
use tracing::trace;

use crate::packet_metadata::{PacketMetadata, TsResolution};
use crate::stats::{LocalStats, Stats, FLUSH_INTERVAL};

/// How the first header of each frame is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    RawIp,
}

impl LinkKind {
    /// Link types the dissector can start from; `None` for everything else.
    pub fn from_linktype(linktype: Linktype) -> Option<Self> {
        match linktype.0 {
            1 => Some(LinkKind::Ethernet),
            // LINKTYPE_RAW, LINKTYPE_IPV4, LINKTYPE_IPV6
            101 | 228 | 229 => Some(LinkKind::RawIp),
            _ => None,
        }
    }

    fn start(self, data: &[u8]) -> Result<Start, DissectError> {
        match self {
            LinkKind::Ethernet => Start::ethernet(data),
            LinkKind::RawIp => Start::raw_ip(data),
        }
    }
}

/// Capture interface a frame arrived on.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interface {
    pub link: Option<LinkKind>,
    pub resolution: TsResolution,
}

impl Interface {
    pub fn new(linktype: Linktype, resolution: TsResolution) -> Self {
        Interface {
            link: LinkKind::from_linktype(linktype),
            resolution,
        }
    }
}

/// Per-run options taken from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    pub dump_flows: bool,
    pub no_ports: bool,
}

/// Dissects and hashes one frame, updating the local counters.
pub fn process_packet<Pkt: PacketMetadata>(
    iface: &Interface,
    pkt: &Pkt,
    opts: ProcessOptions,
    local_stats: &mut LocalStats,
    stats: &Stats,
) {
    local_stats.frame_index += 1;
    local_stats.total_packets += 1;
    local_stats.total_bytes += pkt.caplen() as u64;

    match iface.link {
        Some(link) => dissect_frame(link, iface.resolution, pkt, opts, local_stats),
        None => local_stats.unsupported_link += 1,
    }

    if local_stats.should_flush(FLUSH_INTERVAL) {
        local_stats.flush(stats);
    }
}

fn dissect_frame<Pkt: PacketMetadata>(
    link: LinkKind,
    resolution: TsResolution,
    pkt: &Pkt,
    opts: ProcessOptions,
    local_stats: &mut LocalStats,
) {
    let data = pkt.data();
    let dissector = if opts.no_ports {
        &FLOW_KEYS_BUF_DISSECTOR
    } else {
        &FLOW_KEYS_DISSECTOR
    };

    let mut keys = FlowKeys::default();
    let result = link
        .start(data)
        .and_then(|start| dissector.dissect(&mut keys, data, start));

    match result {
        Ok(outcome) => {
            local_stats.record(&keys, outcome);
            let hash = keys.hash();
            local_stats.flows.insert(hash);

            if opts.dump_flows {
                println!(
                    "{:>7}  {}  {:08x}  {}  {}",
                    local_stats.frame_index,
                    pkt.timestamp(resolution),
                    hash,
                    keys.digest(),
                    keys
                );
            }
        }
        Err(err) => {
            trace!(packet = local_stats.frame_index, %err, "dissection failed");
            local_stats.record_error(err);
            if opts.dump_flows {
                println!("{:>7}  {}  {}", local_stats.frame_index, pkt.timestamp(resolution), err);
            }
        }
    }
}
