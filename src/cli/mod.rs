use crate::config::DumpFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xdpmeter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Export XDP packet statistics to OpenTelemetry", long_about = None)]
pub struct Cli {
    #[arg(long, help = "BPF map id (from 'bpftool map list')")]
    pub map_id: Option<u32>,

    #[arg(long, default_value = "stats_map", help = "BPF map name")]
    pub map_name: String,

    #[arg(long, help = "Path to a map pinned under bpffs (overrides id and name)")]
    pub pinned: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value = "json",
        help = "bpftool dump representation to consume"
    )]
    pub format: DumpFormat,

    #[arg(
        long,
        default_value = "http://localhost:4317",
        help = "OpenTelemetry collector gRPC endpoint"
    )]
    pub otel_endpoint: String,

    #[arg(short, long, default_value_t = 10, help = "Export interval in seconds")]
    pub interval: u64,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}
