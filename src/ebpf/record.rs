use crate::error::DecodeError;
use std::time::SystemTime;

/// Byte length of the counter record: eight u64 fields, little-endian.
pub const RECORD_SIZE: usize = 64;

/// Cumulative packet statistics as laid out in the `stats_map` value.
///
/// Field order matches the kernel-side struct byte for byte. Counters are
/// monotonically non-decreasing within one producer lifetime; they drop back
/// to zero when the XDP program is reloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRecord {
    pub total_packets: u64,
    pub total_bytes: u64,
    pub icmp_packets: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub other_packets: u64,
    pub ipv4_packets: u64,
    pub ipv6_packets: u64,
}

impl StatsRecord {
    /// Decode a record from raw map value bytes.
    ///
    /// Bytes beyond the eight known fields are ignored so a newer producer
    /// can append fields without breaking older readers. An all-zero record
    /// is valid and means no traffic has been observed yet.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < RECORD_SIZE {
            return Err(DecodeError::TooShort { len: bytes.len() });
        }

        Ok(Self {
            total_packets: word(bytes, 0),
            total_bytes: word(bytes, 1),
            icmp_packets: word(bytes, 2),
            tcp_packets: word(bytes, 3),
            udp_packets: word(bytes, 4),
            other_packets: word(bytes, 5),
            ipv4_packets: word(bytes, 6),
            ipv6_packets: word(bytes, 7),
        })
    }

    /// Encode back into the map value layout.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let fields = [
            self.total_packets,
            self.total_bytes,
            self.icmp_packets,
            self.tcp_packets,
            self.udp_packets,
            self.other_packets,
            self.ipv4_packets,
            self.ipv6_packets,
        ];

        let mut buf = [0u8; RECORD_SIZE];
        for (i, field) in fields.into_iter().enumerate() {
            buf[i * 8..(i + 1) * 8].copy_from_slice(&field.to_le_bytes());
        }
        buf
    }

    /// Whether `total_packets` covers the per-protocol and per-IP-version
    /// sums. A breakdown exceeding the total points at torn or stale map
    /// data; callers log it and keep going.
    pub fn consistent(&self) -> bool {
        let by_protocol = self.icmp_packets as u128
            + self.tcp_packets as u128
            + self.udp_packets as u128
            + self.other_packets as u128;
        let by_version = self.ipv4_packets as u128 + self.ipv6_packets as u128;
        let total = self.total_packets as u128;

        total >= by_protocol && total >= by_version
    }
}

fn word(bytes: &[u8], idx: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[idx * 8..(idx + 1) * 8]);
    u64::from_le_bytes(buf)
}

/// One timestamped observation of the counter record.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub record: StatsRecord,
    pub taken_at: SystemTime,
}

impl Snapshot {
    pub fn now(record: StatsRecord) -> Self {
        Self {
            record,
            taken_at: SystemTime::now(),
        }
    }

    pub fn at(record: StatsRecord, taken_at: SystemTime) -> Self {
        Self { record, taken_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> StatsRecord {
        StatsRecord {
            total_packets: 1000,
            total_bytes: 1_500_000,
            icmp_packets: 10,
            tcp_packets: 700,
            udp_packets: 250,
            other_packets: 40,
            ipv4_packets: 980,
            ipv6_packets: 20,
        }
    }

    #[test]
    fn decode_round_trips_encode() {
        let record = sample_record();
        assert_eq!(StatsRecord::decode(&record.encode()), Ok(record));
    }

    #[test]
    fn decode_reads_little_endian_in_field_order() {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0] = 0x01; // total_packets = 1
        bytes[8] = 0xff;
        bytes[9] = 0x01; // total_bytes = 0x1ff
        bytes[56] = 0x02; // ipv6_packets = 2

        let record = StatsRecord::decode(&bytes).unwrap();
        assert_eq!(record.total_packets, 1);
        assert_eq!(record.total_bytes, 0x1ff);
        assert_eq!(record.ipv6_packets, 2);
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(
            StatsRecord::decode(&[]),
            Err(DecodeError::TooShort { len: 0 })
        );
        assert_eq!(
            StatsRecord::decode(&[0u8; 63]),
            Err(DecodeError::TooShort { len: 63 })
        );
    }

    #[test]
    fn exactly_sixty_four_bytes_decodes() {
        assert!(StatsRecord::decode(&[0u8; RECORD_SIZE]).is_ok());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let record = sample_record();
        let mut bytes = record.encode().to_vec();
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);
        assert_eq!(StatsRecord::decode(&bytes), Ok(record));
    }

    #[test]
    fn all_zero_record_is_valid() {
        let record = StatsRecord::decode(&[0u8; RECORD_SIZE]).unwrap();
        assert_eq!(record, StatsRecord::default());
        assert!(record.consistent());
    }

    #[test]
    fn breakdown_exceeding_total_is_flagged() {
        let mut record = sample_record();
        assert!(record.consistent());

        record.tcp_packets = record.total_packets + 1;
        assert!(!record.consistent());

        record = sample_record();
        record.ipv4_packets = u64::MAX;
        record.ipv6_packets = u64::MAX;
        assert!(!record.consistent());
    }
}
