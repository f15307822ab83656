//! bpftool invocation and output parsing.
//!
//! Dump output comes in two shapes: a plain-text form with a `value:` marker
//! followed by hex byte pairs, and a JSON form (`-j`) that carries a
//! BTF-formatted `value` object when type information is available. Both
//! collapse to the same raw byte sequence consumed by the record decoder.

use crate::error::SourceError;
use serde::Deserialize;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::record::StatsRecord;

/// Thin wrapper around the `bpftool` binary.
///
/// Every invocation is bounded by a timeout so a wedged tool cannot stall
/// the sampling tick indefinitely.
pub struct Bpftool {
    program: String,
    timeout: Duration,
}

impl Bpftool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "bpftool".to_string(),
            timeout,
        }
    }

    /// Use a different executable, e.g. a test shim.
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Run bpftool with the given arguments and return captured stdout.
    pub async fn run(&self, operation: &'static str, args: &[&str]) -> Result<String, SourceError> {
        debug!("running {} {}", self.program, args.join(" "));

        let invocation = Command::new(&self.program).args(args).output();
        let output = tokio::time::timeout(self.timeout, invocation)
            .await
            .map_err(|_| SourceError::ToolFailure {
                operation,
                detail: format!("timed out after {:?}", self.timeout),
            })?
            .map_err(|e| SourceError::ToolFailure {
                operation,
                detail: e.to_string(),
            })?;

        check_status(operation, &output)?;

        String::from_utf8(output.stdout)
            .map_err(|e| SourceError::MalformedOutput(format!("stdout is not UTF-8: {e}")))
    }
}

fn check_status(operation: &'static str, output: &Output) -> Result<(), SourceError> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(SourceError::ToolFailure {
        operation,
        detail: format!("{}: {}", output.status, stderr.trim()),
    })
}

/// Find a map id in `bpftool map list` output by map name.
///
/// Lines look like `123: array  name stats_map  flags 0x0`; the id is the
/// leading ordinal up to the colon.
pub fn find_map_id(listing: &str, name: &str) -> Result<Option<u32>, SourceError> {
    for line in listing.lines() {
        if !line.contains(name) {
            continue;
        }

        let (id, _) = line.split_once(':').ok_or_else(|| {
            SourceError::MalformedOutput(format!("map list line without an id: {line:?}"))
        })?;
        let id = id.trim().parse::<u32>().map_err(|_| {
            SourceError::MalformedOutput(format!("map list id is not numeric: {line:?}"))
        })?;

        return Ok(Some(id));
    }

    Ok(None)
}

/// Extract the value bytes from a plain-text `bpftool map dump`.
///
/// Returns `Ok(None)` when the dump holds no entry, which happens right
/// after the map is created. bpftool wraps long values onto continuation
/// lines, so hex pairs are collected from the `value:` marker until the
/// first token that is not one.
pub fn parse_text_dump(dump: &str) -> Result<Option<Vec<u8>>, SourceError> {
    let Some(marker) = dump.find("value:") else {
        return Ok(None);
    };

    let mut bytes = Vec::new();
    for token in dump[marker + "value:".len()..].split_whitespace() {
        if token.len() != 2 {
            break;
        }
        match u8::from_str_radix(token, 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => break,
        }
    }

    if bytes.is_empty() {
        return Err(SourceError::MalformedOutput(
            "value marker with no hex payload".to_string(),
        ));
    }

    Ok(Some(bytes))
}

#[derive(Debug, Deserialize)]
struct DumpEntry {
    #[serde(default)]
    formatted: Option<FormattedEntry>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FormattedEntry {
    #[serde(default)]
    value: Option<serde_json::Value>,
}

/// The BTF-formatted value object, field names as declared by the producer.
#[derive(Debug, Deserialize)]
struct RecordFields {
    total_packets: u64,
    total_bytes: u64,
    icmp_packets: u64,
    tcp_packets: u64,
    udp_packets: u64,
    other_packets: u64,
    ipv4_packets: u64,
    ipv6_packets: u64,
}

impl From<RecordFields> for StatsRecord {
    fn from(fields: RecordFields) -> Self {
        Self {
            total_packets: fields.total_packets,
            total_bytes: fields.total_bytes,
            icmp_packets: fields.icmp_packets,
            tcp_packets: fields.tcp_packets,
            udp_packets: fields.udp_packets,
            other_packets: fields.other_packets,
            ipv4_packets: fields.ipv4_packets,
            ipv6_packets: fields.ipv6_packets,
        }
    }
}

/// Extract the value bytes from a `bpftool map dump -j` document.
///
/// Prefers the BTF-formatted value object (re-encoded into the record
/// layout); falls back to the raw hex-string array emitted when no BTF is
/// available. `Ok(None)` for an empty map.
pub fn parse_json_dump(dump: &str) -> Result<Option<Vec<u8>>, SourceError> {
    let entries: Vec<DumpEntry> = serde_json::from_str(dump)
        .map_err(|e| SourceError::MalformedOutput(format!("bad JSON from bpftool: {e}")))?;

    let Some(entry) = entries.into_iter().next() else {
        return Ok(None);
    };

    let payload = entry.formatted.and_then(|f| f.value).or(entry.value);
    let Some(payload) = payload else {
        return Err(SourceError::MalformedOutput(
            "dump entry without a value payload".to_string(),
        ));
    };

    match payload {
        serde_json::Value::Object(_) => {
            let fields: RecordFields = serde_json::from_value(payload).map_err(|e| {
                SourceError::MalformedOutput(format!("unexpected value object: {e}"))
            })?;
            Ok(Some(StatsRecord::from(fields).encode().to_vec()))
        }
        serde_json::Value::Array(items) => {
            let mut bytes = Vec::with_capacity(items.len());
            for item in items {
                let serde_json::Value::String(hex) = item else {
                    return Err(SourceError::MalformedOutput(format!(
                        "value array holds a non-string element: {item}"
                    )));
                };
                let byte = u8::from_str_radix(hex.trim_start_matches("0x"), 16).map_err(|_| {
                    SourceError::MalformedOutput(format!("value array holds a non-byte: {hex:?}"))
                })?;
                bytes.push(byte);
            }
            Ok(Some(bytes))
        }
        other => Err(SourceError::MalformedOutput(format!(
            "value payload is neither object nor array: {other}"
        ))),
    }
}
