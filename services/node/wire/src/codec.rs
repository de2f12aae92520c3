//! Packet classification and convenience frame builders.
//!
//! Classification trusts nothing beyond the sync marker (and, for the
//! command family, the code byte) so it can run before any record decoder.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ack::AckKind;
use crate::command::{write_fixed, CommandCode, COMMAND_RECORD_SIZE, COMMAND_SYNC};
use crate::legacy::{LEGACY_RECORD_SIZE, LEGACY_SYNC};
use crate::telemetry::TELEMETRY_SYNC;
use crate::WireError;

/// Length of the header some base-station transports prepend to a frame
pub const FOREIGN_HEADER_LEN: usize = 4;

/// Application record family identified by its sync marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    /// First-generation single-sensor record
    LegacyTelemetry,
    /// Multi-value telemetry record
    Telemetry,
    /// Command request
    Command,
    /// Ack or nack reply
    Ack,
}

/// Classify `buf` by its sync marker.
pub fn detect(buf: &[u8]) -> Result<PacketType, WireError> {
    if buf.len() < 2 {
        return Err(WireError::Incomplete {
            need: 2,
            have: buf.len(),
        });
    }

    match u16::from_le_bytes([buf[0], buf[1]]) {
        LEGACY_SYNC if buf.len() >= LEGACY_RECORD_SIZE => Ok(PacketType::LegacyTelemetry),
        TELEMETRY_SYNC => Ok(PacketType::Telemetry),
        COMMAND_SYNC => {
            let is_reply = buf
                .get(2)
                .and_then(|&code| CommandCode::try_from(code).ok())
                .is_some_and(CommandCode::is_reply);
            if is_reply {
                Ok(PacketType::Ack)
            } else {
                Ok(PacketType::Command)
            }
        }
        _ => Err(WireError::Unrecognized),
    }
}

/// Classify `buf`, retrying past a foreign transport header.
///
/// Returns the packet type together with the slice where the record starts.
pub fn locate(buf: &[u8]) -> Result<(PacketType, &[u8]), WireError> {
    match detect(buf) {
        Ok(packet_type) => Ok((packet_type, buf)),
        Err(err) if buf.len() > FOREIGN_HEADER_LEN => {
            let inner = &buf[FOREIGN_HEADER_LEN..];
            let packet_type = detect(inner).map_err(|_| err)?;
            debug!(?packet_type, "Skipped foreign transport header");
            Ok((packet_type, inner))
        }
        Err(err) => Err(err),
    }
}

/// Encode a payload-less acknowledgment.
pub fn build_ack(
    kind: AckKind,
    responder_id: u8,
    sequence: u8,
    status: u8,
) -> [u8; COMMAND_RECORD_SIZE] {
    let mut out = [0u8; COMMAND_RECORD_SIZE];
    write_fixed(&mut out, kind.code(), responder_id, sequence, [status, 0], &[]);
    out
}

/// Encode the enrolment frame a node broadcasts at start-up.
pub fn build_announce(node_id: u8) -> [u8; COMMAND_RECORD_SIZE] {
    let mut out = [0u8; COMMAND_RECORD_SIZE];
    write_fixed(
        &mut out,
        CommandCode::SensorAnnounce as u8,
        node_id,
        0,
        [0, 0],
        &[],
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::{AckRecord, STATUS_FAILED, STATUS_OK};
    use crate::command::CommandRecord;
    use crate::telemetry::{TelemetryHeader, TelemetryRecord};

    #[test]
    fn test_detect_markers() {
        let telemetry = TelemetryRecord::new(TelemetryHeader::default())
            .to_vec()
            .unwrap();
        assert_eq!(detect(&telemetry).unwrap(), PacketType::Telemetry);

        let command = CommandRecord::new(CommandCode::Ping, 2, 1, Vec::new())
            .unwrap()
            .to_bytes()
            .unwrap();
        assert_eq!(detect(&command).unwrap(), PacketType::Command);

        let ack = build_ack(AckKind::Nack, 2, 1, STATUS_FAILED);
        assert_eq!(detect(&ack).unwrap(), PacketType::Ack);

        let mut legacy = vec![0u8; LEGACY_RECORD_SIZE];
        legacy[..2].copy_from_slice(&LEGACY_SYNC.to_le_bytes());
        assert_eq!(detect(&legacy).unwrap(), PacketType::LegacyTelemetry);
    }

    #[test]
    fn test_detect_failures() {
        assert!(matches!(
            detect(&[0xCD]),
            Err(WireError::Incomplete { need: 2, have: 1 })
        ));
        assert_eq!(detect(&[0x00, 0x00, 0x00]), Err(WireError::Unrecognized));
        // legacy marker without a full record
        assert_eq!(detect(&[0x34, 0x12, 0x01]), Err(WireError::Unrecognized));
    }

    #[test]
    fn test_detect_command_marker_only() {
        assert_eq!(detect(&[0xEF, 0xCD]).unwrap(), PacketType::Command);
        assert_eq!(detect(&[0xEF, 0xCD, 0xA0]).unwrap(), PacketType::Ack);
    }

    #[test]
    fn test_locate_skips_foreign_header() {
        let ack = build_ack(AckKind::Ack, 4, 9, STATUS_OK);
        let mut framed = vec![0xFF, 0xFF, 0x00, 0x00];
        framed.extend_from_slice(&ack);

        let (packet_type, record) = locate(&framed).unwrap();
        assert_eq!(packet_type, PacketType::Ack);
        assert_eq!(record.len(), COMMAND_RECORD_SIZE);
        assert_eq!(AckRecord::decode(record).unwrap().sequence, 9);
    }

    #[test]
    fn test_locate_prefers_offset_zero() {
        let ack = build_ack(AckKind::Ack, 4, 9, STATUS_OK);
        let (packet_type, record) = locate(&ack).unwrap();
        assert_eq!(packet_type, PacketType::Ack);
        assert_eq!(record.as_ptr(), ack.as_ptr());
    }

    #[test]
    fn test_locate_reports_original_error() {
        assert_eq!(locate(&[0u8; 10]), Err(WireError::Unrecognized));
        assert_eq!(locate(&[0u8; 4]), Err(WireError::Unrecognized));
    }

    #[test]
    fn test_build_ack() {
        let bytes = build_ack(AckKind::Ack, 7, 33, STATUS_OK);
        let ack = AckRecord::decode(&bytes).unwrap();
        assert_eq!(ack, AckRecord::ok(7, 33));
        assert!(ack.payload.is_empty());
    }

    #[test]
    fn test_build_announce() {
        let bytes = build_announce(12);
        let command = CommandRecord::decode(&bytes).unwrap();
        assert_eq!(command.command().unwrap(), CommandCode::SensorAnnounce);
        assert_eq!(command.target_id, 12);
        assert_eq!(command.sequence, 0);
        assert!(command.payload.is_empty());
    }
}
