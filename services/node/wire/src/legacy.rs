//! Single-sensor telemetry from first-generation nodes. Decode only.

use bytes::Buf;
use serde::{Deserialize, Serialize};

use crate::WireError;

/// Sync marker of the legacy telemetry record
pub const LEGACY_SYNC: u16 = 0x1234;

/// Legacy record size; it carries no checksum
pub const LEGACY_RECORD_SIZE: usize = 19;

/// Fixed-field reading from a legacy node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegacyTelemetry {
    /// Sending sensor
    pub sensor_id: u8,
    /// Network id
    pub network_id: u16,
    /// Temperature, °C
    pub temperature: f32,
    /// Relative humidity, %
    pub humidity: f32,
    /// Battery level, %
    pub battery_percent: u8,
    /// Received signal strength, dBm
    pub rssi: i8,
    /// Signal-to-noise ratio, dB
    pub snr: f32,
}

impl LegacyTelemetry {
    /// Decode from the front of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < LEGACY_RECORD_SIZE {
            return Err(WireError::Incomplete {
                need: LEGACY_RECORD_SIZE,
                have: buf.len(),
            });
        }

        let mut buf = buf;
        let sync = buf.get_u16_le();
        if sync != LEGACY_SYNC {
            return Err(WireError::Sync(sync));
        }

        Ok(Self {
            sensor_id: buf.get_u8(),
            network_id: buf.get_u16_le(),
            temperature: buf.get_f32_le(),
            humidity: buf.get_f32_le(),
            battery_percent: buf.get_u8(),
            rssi: buf.get_i8(),
            snr: buf.get_f32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut raw = Vec::with_capacity(LEGACY_RECORD_SIZE);
        raw.extend_from_slice(&LEGACY_SYNC.to_le_bytes());
        raw.push(4);
        raw.extend_from_slice(&1u16.to_le_bytes());
        raw.extend_from_slice(&21.25f32.to_le_bytes());
        raw.extend_from_slice(&48.5f32.to_le_bytes());
        raw.push(90);
        raw.push((-97i8) as u8);
        raw.extend_from_slice(&7.5f32.to_le_bytes());
        raw
    }

    #[test]
    fn test_decode() {
        let raw = sample();
        assert_eq!(raw.len(), LEGACY_RECORD_SIZE);

        let reading = LegacyTelemetry::decode(&raw).unwrap();
        assert_eq!(reading.sensor_id, 4);
        assert_eq!(reading.network_id, 1);
        assert_eq!(reading.temperature, 21.25);
        assert_eq!(reading.humidity, 48.5);
        assert_eq!(reading.battery_percent, 90);
        assert_eq!(reading.rssi, -97);
        assert_eq!(reading.snr, 7.5);
    }

    #[test]
    fn test_short_and_wrong_sync() {
        let raw = sample();
        assert!(matches!(
            LegacyTelemetry::decode(&raw[..18]),
            Err(WireError::Incomplete { need: 19, have: 18 })
        ));

        let mut raw = raw;
        raw[0] = 0;
        assert_eq!(LegacyTelemetry::decode(&raw), Err(WireError::Sync(0x1200)));
    }
}
