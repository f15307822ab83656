use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use xdpmeter::cli::Cli;
use xdpmeter::config::CollectorConfig;
use xdpmeter::ebpf::record::StatsRecord;
use xdpmeter::ebpf::source::{self, StatsSource};
use xdpmeter::error::{SourceError, XdpMeterError};
use xdpmeter::metrics::{OtlpExporter, StatsCollector};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting xdpmeter v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CollectorConfig::from_cli(&cli)?;
    let source = source::build(&config);

    probe_source(source.as_ref()).await?;

    let exporter = OtlpExporter::new(&config.endpoint, config.export_interval)
        .context("failed to set up the OTLP metrics pipeline")?;

    let collector = StatsCollector::new(source, exporter.stats(), config.sample_interval);
    collector.run().await?;

    exporter
        .shutdown()
        .context("failed to flush metrics on shutdown")?;

    info!("xdpmeter stopped");
    Ok(())
}

/// Read the map once before entering the loop.
///
/// An unresolvable map is fatal, there is nothing to monitor. Any other
/// failure only warns: the producer may simply not be loaded yet, and the
/// loop retries every tick.
async fn probe_source(source: &dyn StatsSource) -> anyhow::Result<()> {
    match source.fetch().await {
        Ok(raw) => match StatsRecord::decode(&raw) {
            Ok(record) => {
                if record == StatsRecord::default() {
                    warn!("map is empty; make sure the XDP program is loaded and attached");
                }
                info!(
                    "initial stats from {}: {} packets, {} bytes",
                    source.describe(),
                    record.total_packets,
                    record.total_bytes
                );
                Ok(())
            }
            Err(e) => {
                warn!("initial decode failed ({}); will keep retrying every tick", e);
                Ok(())
            }
        },
        Err(e @ SourceError::NotFound(_)) => {
            Err(XdpMeterError::from(e)).context("cannot resolve the stats map")
        }
        Err(e) => {
            warn!("initial read failed ({}); will keep retrying every tick", e);
            Ok(())
        }
    }
}
