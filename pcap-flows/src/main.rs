use clap::Parser;
use flow_dissector::flow::init_hash_seed;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::packet_metadata::TsResolution;
use crate::process::{Interface, ProcessOptions};

mod packet_metadata;
mod process;
mod stats;

#[derive(Parser, Debug)]
#[command(name = "pcap-flows")]
#[command(about = "Dissect a capture into flow keys and symmetric flow hashes", long_about = None)]
struct Args {
    /// Path to the PCAP or PCAPNG file to read
    #[arg(short, long, value_name = "FILE")]
    pcap: PathBuf,

    /// print one line per packet: hash, digest and flow keys
    #[arg(short, long)]
    dump_flows: bool,

    /// print statistics at the end
    #[arg(short, long)]
    stats: bool,

    /// fixed hash seed, for hashes comparable across runs
    #[arg(long, value_name = "SEED")]
    seed: Option<u32>,

    /// only extract protocol numbers, not addresses and ports
    #[arg(long)]
    no_ports: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if let Some(seed) = args.seed {
        init_hash_seed(seed);
    }

    let opts = ProcessOptions {
        dump_flows: args.dump_flows,
        no_ports: args.no_ports,
    };
    let stats = stats::Stats::default();

    info!("Reading capture: {:?}", args.pcap);
    if let Err(e) = process_pcap(&args.pcap, opts, &stats) {
        error!("Failed to process capture: {}", e);
        std::process::exit(1);
    }
    if args.stats {
        println!("{stats}");
    }
    info!("Capture processing completed");
}

fn open(path: &Path) -> Result<File, String> {
    File::open(path).map_err(|e| format!("cannot open {:?}: {}", path, e))
}

fn process_pcap(path: &Path, opts: ProcessOptions, stats: &stats::Stats) -> Result<(), String> {
    let mut local_stats = stats::LocalStats::new();
    let start = std::time::Instant::now();

    match PcapNGReader::new(65536, open(path)?) {
        Ok(reader) => {
            info!("Detected PCAPNG format");
            read_pcapng(reader, opts, &mut local_stats, stats)?;
        }
        Err(_) => {
            let reader = LegacyPcapReader::new(65536, open(path)?)
                .map_err(|e| format!("Failed to create PCAP reader: {:?}", e))?;
            read_legacy(reader, opts, &mut local_stats, stats)?;
        }
    }

    local_stats.flush(stats);

    let packets = stats.total_packets.load(std::sync::atomic::Ordering::Relaxed);
    info!(
        "Total packets processed: {}, {:.3}M pkt/sec",
        packets,
        (packets as f64 / start.elapsed().as_secs_f64()) / 1_000_000.0
    );
    Ok(())
}

fn read_pcapng(
    mut reader: PcapNGReader<File>,
    opts: ProcessOptions,
    local_stats: &mut stats::LocalStats,
    stats: &stats::Stats,
) -> Result<(), String> {
    let mut interfaces: Vec<Interface> = Vec::new();

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                        let iface = interfaces.get(epb.if_id as usize).copied().unwrap_or_default();
                        process::process_packet(&iface, &epb, opts, local_stats, stats);
                    }
                    PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                        let iface = interfaces.first().copied().unwrap_or_default();
                        process::process_packet(&iface, &spb, opts, local_stats, stats);
                    }
                    PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                        debug!("PCAPNG section header");
                        interfaces.clear();
                    }
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        let iface = Interface::new(idb.linktype, TsResolution::from_tsresol(idb.if_tsresol));
                        if iface.link.is_none() {
                            warn!("interface {} has unsupported link type {:?}", interfaces.len(), idb.linktype);
                        }
                        interfaces.push(iface);
                    }
                    _ => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| format!("Error reading PCAPNG: {:?}", e))?;
            }
            Err(e) => return Err(format!("Error reading PCAPNG: {:?}", e)),
        }
    }
    Ok(())
}

fn read_legacy(
    mut reader: LegacyPcapReader<File>,
    opts: ProcessOptions,
    local_stats: &mut stats::LocalStats,
    stats: &stats::Stats,
) -> Result<(), String> {
    let mut iface = Interface::default();

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::Legacy(packet) => {
                        process::process_packet(&iface, &packet, opts, local_stats, stats);
                    }
                    PcapBlockOwned::LegacyHeader(header) => {
                        let resolution = if header.is_nanosecond_precision() {
                            TsResolution::NANOS
                        } else {
                            TsResolution::MICROS
                        };
                        iface = Interface::new(header.network, resolution);
                        if iface.link.is_none() {
                            warn!("unsupported link type {:?}", header.network);
                        }
                    }
                    _ => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader
                    .refill()
                    .map_err(|e| format!("Error reading PCAP: {:?}", e))?;
            }
            Err(e) => return Err(format!("Error reading PCAP: {:?}", e)),
        }
    }
    Ok(())
}
