use crate::config::{CollectorConfig, DumpFormat};
use crate::error::SourceError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::bpftool::{self, Bpftool};
use super::record::RECORD_SIZE;

static ZERO_RECORD: [u8; RECORD_SIZE] = [0; RECORD_SIZE];

/// How the stats map is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapRef {
    /// Numeric map id as shown by `bpftool map list`.
    Id(u32),
    /// Map name, resolved to an id on every fetch so the producer can be
    /// reloaded (new id) without restarting the exporter.
    Name(String),
    /// Path to a map pinned under bpffs, e.g. `/sys/fs/bpf/stats_map`.
    Pinned(PathBuf),
}

impl std::fmt::Display for MapRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapRef::Id(id) => write!(f, "id {}", id),
            MapRef::Name(name) => write!(f, "name {}", name),
            MapRef::Pinned(path) => write!(f, "pinned {}", path.display()),
        }
    }
}

/// Supplies the raw bytes of the current counter record, with no
/// interpretation of their contents.
#[async_trait]
pub trait StatsSource: Send + Sync {
    async fn fetch(&self) -> Result<Bytes, SourceError>;

    /// Human-readable identity of the underlying map, for logging.
    fn describe(&self) -> String;
}

/// Construct the source variant selected by the configuration.
pub fn build(config: &CollectorConfig) -> Box<dyn StatsSource> {
    // The fetch subprocess gets at most one sampling tick to finish.
    let timeout = config.sample_interval;
    match config.format {
        DumpFormat::Json => Box::new(JsonDumpSource::new(config.target.clone(), timeout)),
        DumpFormat::Text => Box::new(TextDumpSource::new(config.target.clone(), timeout)),
    }
}

/// Reads the map through `bpftool map dump -j`.
pub struct JsonDumpSource {
    target: MapRef,
    bpftool: Bpftool,
}

impl JsonDumpSource {
    pub fn new(target: MapRef, timeout: Duration) -> Self {
        Self {
            target,
            bpftool: Bpftool::new(timeout),
        }
    }

    pub fn with_bpftool(target: MapRef, bpftool: Bpftool) -> Self {
        Self { target, bpftool }
    }
}

#[async_trait]
impl StatsSource for JsonDumpSource {
    async fn fetch(&self) -> Result<Bytes, SourceError> {
        let stdout = dump(&self.bpftool, &self.target, &["-j"]).await?;
        match bpftool::parse_json_dump(&stdout)? {
            Some(bytes) => Ok(Bytes::from(bytes)),
            None => Ok(Bytes::from_static(&ZERO_RECORD)),
        }
    }

    fn describe(&self) -> String {
        format!("map {} (json dump)", self.target)
    }
}

/// Reads the map through plain-text `bpftool map dump`.
pub struct TextDumpSource {
    target: MapRef,
    bpftool: Bpftool,
}

impl TextDumpSource {
    pub fn new(target: MapRef, timeout: Duration) -> Self {
        Self {
            target,
            bpftool: Bpftool::new(timeout),
        }
    }

    pub fn with_bpftool(target: MapRef, bpftool: Bpftool) -> Self {
        Self { target, bpftool }
    }
}

#[async_trait]
impl StatsSource for TextDumpSource {
    async fn fetch(&self) -> Result<Bytes, SourceError> {
        let stdout = dump(&self.bpftool, &self.target, &[]).await?;
        match bpftool::parse_text_dump(&stdout)? {
            Some(bytes) => Ok(Bytes::from(bytes)),
            None => Ok(Bytes::from_static(&ZERO_RECORD)),
        }
    }

    fn describe(&self) -> String {
        format!("map {} (text dump)", self.target)
    }
}

/// Run `bpftool map dump` against the resolved target.
async fn dump(
    bpftool: &Bpftool,
    target: &MapRef,
    extra_args: &[&str],
) -> Result<String, SourceError> {
    let mut args: Vec<String> = vec!["map".to_string(), "dump".to_string()];
    args.extend(resolve(bpftool, target).await?);
    args.extend(extra_args.iter().map(|a| a.to_string()));

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    bpftool.run("map dump", &args).await
}

/// Resolve the target to concrete `bpftool map dump` arguments.
///
/// A name is looked up in `bpftool map list` on every call; a map that has
/// vanished surfaces as `NotFound` until the producer brings it back.
async fn resolve(bpftool: &Bpftool, target: &MapRef) -> Result<Vec<String>, SourceError> {
    match target {
        MapRef::Id(id) => Ok(vec!["id".to_string(), id.to_string()]),
        MapRef::Pinned(path) => Ok(vec!["pinned".to_string(), path.display().to_string()]),
        MapRef::Name(name) => {
            let listing = bpftool.run("map list", &["map", "list"]).await?;
            match bpftool::find_map_id(&listing, name)? {
                Some(id) => {
                    debug!("resolved map '{}' to id {}", name, id);
                    Ok(vec!["id".to_string(), id.to_string()])
                }
                None => Err(SourceError::NotFound(name.clone())),
            }
        }
    }
}
