use std::time::Duration;

use clap::Parser;
use log::info;

mod relay;

use relay::{Relay, RelaySettings};

// Ethernet + IPv4 framing charged against the link, on top of the payload.
const OVERHEAD: usize = 18 + 20;

/// Drives producers through a DeliveryQueue into a rate-limited link.
#[derive(Parser, Debug)]
#[command(name = "net_queue", version, about)]
struct Args {
    /// Backlog bound for producers that do not track completions.
    #[arg(long, default_value_t = net_queue::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Link rate in megabits per second.
    #[arg(long, default_value_t = 6.9)]
    rate_mbps: f64,

    /// Link burst in KiB.
    #[arg(long, default_value_t = 290.0)]
    burst_kib: f64,

    /// Number of producing endpoints.
    #[arg(long, default_value_t = 4)]
    producers: usize,

    /// How many of the producers register completion callbacks.
    #[arg(long, default_value_t = 2)]
    tracked: usize,

    /// Packets a tracked producer may have buffered before it pauses.
    #[arg(long, default_value_t = 64)]
    window: usize,

    /// Bytes per packet, header included.
    #[arg(long, default_value_t = 1280)]
    packet_size: usize,

    /// Run time in seconds.
    #[arg(long, default_value_t = 5)]
    duration_secs: u64,

    /// Milliseconds between monitor reports.
    #[arg(long, default_value_t = 1000)]
    report_ms: u64,
}

fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity
    env_logger::init();
    let args = Args::parse();

    let settings = RelaySettings {
        capacity: args.capacity,
        rate_bytes_per_sec: args.rate_mbps * 1000.0 * 1000.0 / 8.0,
        burst_bytes: args.burst_kib * 1024.0,
        overhead: OVERHEAD,
        producers: args.producers,
        tracked: args.tracked.min(args.producers),
        window: args.window,
        packet_size: args.packet_size,
        report_interval: Duration::from_millis(args.report_ms),
    };
    info!("starting relay: {:?}", settings);

    let summary = Relay::new(&settings)?.run(Duration::from_secs(args.duration_secs));
    println!(
        "delivered {} | failed {} | dropped {} | purged {} | completions {} | reports {}",
        summary.stats.delivered,
        summary.stats.failed,
        summary.stats.dropped,
        summary.purged,
        summary.completions,
        summary.reports
    );
    Ok(())
}
