use crate::ebpf::record::StatsRecord;
use crate::Result;
use opentelemetry::metrics::{Meter, Unit};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

/// Latest sample as seen by the OTLP instrument callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishedStats {
    pub record: StatsRecord,
    pub rate: f64,
}

/// Shared cell between the collector (single writer) and the periodic
/// metric reader. The lock is held only long enough to copy the value.
pub type SharedStats = Arc<RwLock<PublishedStats>>;

/// OTLP metrics pipeline and the instruments observing the shared cell.
///
/// Export cadence is owned by the SDK's periodic reader and is independent
/// of how often the collector refreshes the cell; export failures are
/// logged by the SDK and never reach the collector.
pub struct OtlpExporter {
    provider: SdkMeterProvider,
    stats: SharedStats,
}

impl OtlpExporter {
    pub fn new(endpoint: &str, export_interval: Duration) -> Result<Self> {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        let provider = opentelemetry_otlp::new_pipeline()
            .metrics(opentelemetry_sdk::runtime::Tokio)
            .with_exporter(exporter)
            .with_resource(Resource::new(vec![
                KeyValue::new("service.name", "xdpmeter"),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                KeyValue::new("deployment.environment", "demo"),
            ]))
            .with_period(export_interval)
            .build()?;

        global::set_meter_provider(provider.clone());

        let stats: SharedStats = Arc::new(RwLock::new(PublishedStats::default()));
        let meter = global::meter("xdpmeter");
        register_instruments(&meter, &stats);

        info!(
            "OTLP metrics pipeline ready (endpoint: {}, export every {:?})",
            endpoint, export_interval
        );

        Ok(Self { provider, stats })
    }

    /// Handle for the collector to publish fresh samples into.
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// Flush pending metrics and tear the pipeline down.
    pub fn shutdown(self) -> Result<()> {
        self.provider.shutdown()?;
        Ok(())
    }
}

fn register_instruments(meter: &Meter, stats: &SharedStats) {
    packet_counter(
        meter,
        "xdp.packets.total",
        "Total packets processed by XDP",
        stats,
        |r| r.total_packets,
    );
    packet_counter(meter, "xdp.packets.icmp", "ICMP packets", stats, |r| {
        r.icmp_packets
    });
    packet_counter(meter, "xdp.packets.tcp", "TCP packets", stats, |r| {
        r.tcp_packets
    });
    packet_counter(meter, "xdp.packets.udp", "UDP packets", stats, |r| {
        r.udp_packets
    });
    packet_counter(
        meter,
        "xdp.packets.other",
        "Other protocol packets",
        stats,
        |r| r.other_packets,
    );
    packet_counter(meter, "xdp.packets.ipv4", "IPv4 packets", stats, |r| {
        r.ipv4_packets
    });
    packet_counter(meter, "xdp.packets.ipv6", "IPv6 packets", stats, |r| {
        r.ipv6_packets
    });

    let shared = stats.clone();
    meter
        .u64_observable_counter("xdp.bytes.total")
        .with_unit(Unit::new("bytes"))
        .with_description("Total bytes processed by XDP")
        .with_callback(move |observer| {
            if let Ok(stats) = shared.read() {
                observer.observe(stats.record.total_bytes, &[]);
            }
        })
        .init();

    let shared = stats.clone();
    meter
        .f64_observable_gauge("xdp.packets.rate")
        .with_unit(Unit::new("packets/sec"))
        .with_description("Packet processing rate")
        .with_callback(move |observer| {
            if let Ok(stats) = shared.read() {
                observer.observe(stats.rate, &[]);
            }
        })
        .init();
}

fn packet_counter(
    meter: &Meter,
    name: &'static str,
    description: &'static str,
    stats: &SharedStats,
    field: fn(&StatsRecord) -> u64,
) {
    let shared = stats.clone();
    meter
        .u64_observable_counter(name)
        .with_unit(Unit::new("packets"))
        .with_description(description)
        .with_callback(move |observer| {
            if let Ok(stats) = shared.read() {
                observer.observe(field(&stats.record), &[]);
            }
        })
        .init();
}
