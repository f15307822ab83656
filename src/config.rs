use crate::cli::Cli;
use crate::ebpf::source::MapRef;
use crate::error::XdpMeterError;
use crate::Result;
use std::time::Duration;

/// Fixed cadence at which the collector samples the map. Export runs on its
/// own, usually coarser, interval.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Which bpftool dump representation the source consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DumpFormat {
    /// `bpftool map dump -j`, preferring the BTF-formatted value object.
    Json,
    /// Plain `bpftool map dump` with the `value:` hex listing.
    Text,
}

/// Immutable runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub target: MapRef,
    pub format: DumpFormat,
    pub endpoint: String,
    pub export_interval: Duration,
    pub sample_interval: Duration,
}

impl CollectorConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.interval == 0 {
            return Err(XdpMeterError::Config(
                "export interval must be at least 1 second".to_string(),
            ));
        }

        if cli.pinned.is_none() && cli.map_id.is_none() && cli.map_name.is_empty() {
            return Err(XdpMeterError::Config(
                "a map id, map name or pinned path is required".to_string(),
            ));
        }

        // A pinned path wins over an explicit id, which wins over the name.
        let target = if let Some(path) = &cli.pinned {
            MapRef::Pinned(path.clone())
        } else if let Some(id) = cli.map_id {
            MapRef::Id(id)
        } else {
            MapRef::Name(cli.map_name.clone())
        };

        Ok(Self {
            target,
            format: cli.format,
            endpoint: cli.otel_endpoint.clone(),
            export_interval: Duration::from_secs(cli.interval),
            sample_interval: SAMPLE_INTERVAL,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base_cli() -> Cli {
        Cli {
            map_id: None,
            map_name: "stats_map".to_string(),
            pinned: None,
            format: DumpFormat::Json,
            otel_endpoint: "http://localhost:4317".to_string(),
            interval: 10,
            verbose: false,
        }
    }

    #[test]
    fn defaults_resolve_to_name_lookup() {
        let config = CollectorConfig::from_cli(&base_cli()).unwrap();
        assert_eq!(config.target, MapRef::Name("stats_map".to_string()));
        assert_eq!(config.export_interval, Duration::from_secs(10));
        assert_eq!(config.sample_interval, SAMPLE_INTERVAL);
    }

    #[test]
    fn explicit_id_wins_over_name() {
        let mut cli = base_cli();
        cli.map_id = Some(42);
        let config = CollectorConfig::from_cli(&cli).unwrap();
        assert_eq!(config.target, MapRef::Id(42));
    }

    #[test]
    fn pinned_path_wins_over_id_and_name() {
        let mut cli = base_cli();
        cli.map_id = Some(42);
        cli.pinned = Some(PathBuf::from("/sys/fs/bpf/stats_map"));
        let config = CollectorConfig::from_cli(&cli).unwrap();
        assert_eq!(
            config.target,
            MapRef::Pinned(PathBuf::from("/sys/fs/bpf/stats_map"))
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cli = base_cli();
        cli.interval = 0;
        assert!(matches!(
            CollectorConfig::from_cli(&cli),
            Err(XdpMeterError::Config(_))
        ));
    }

    #[test]
    fn missing_identity_is_rejected() {
        let mut cli = base_cli();
        cli.map_name = String::new();
        assert!(matches!(
            CollectorConfig::from_cli(&cli),
            Err(XdpMeterError::Config(_))
        ));
    }
}
