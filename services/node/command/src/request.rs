//! Typed view of command payloads.
//!
//! Parsing validates everything up front so that applying a command never
//! has to back out of a half-done mutation.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use lss_storage::{BatteryThresholds, RadioParams, TemperatureThresholds};
use lss_wire::{CommandCode, CommandRecord, WireError, LOCATION_LEN, ZONE_LEN};

use crate::error::CommandError;

/// Shortest accepted telemetry interval, ms
pub const MIN_INTERVAL_MS: u32 = 1_000;

/// Longest accepted telemetry interval, ms (one hour)
pub const MAX_INTERVAL_MS: u32 = 3_600_000;

/// A validated command
#[derive(Debug, Clone, PartialEq)]
pub enum NodeCommand {
    /// Liveness check
    Ping,
    /// Configuration query
    GetConfig,
    /// New telemetry interval in ms
    SetInterval(u32),
    /// New location and, when present, zone
    SetLocation {
        /// Location label
        location: String,
        /// Zone label
        zone: Option<String>,
    },
    /// New temperature band
    SetTempThresholds(TemperatureThresholds),
    /// New battery alarm levels
    SetBatteryThresholds(BatteryThresholds),
    /// Mesh mode on or off
    SetMesh(bool),
    /// Restart request
    Restart,
    /// Factory reset request
    FactoryReset,
    /// Radio parameters for the next boot
    SetLoraParams(RadioParams),
    /// Clock synchronisation (time sync and base welcome)
    TimeSync {
        /// Unix epoch, UTC
        epoch: u32,
        /// Local offset from UTC in minutes
        tz_offset_minutes: i16,
    },
}

impl NodeCommand {
    /// Validate `record` into a command
    pub fn parse(record: &CommandRecord) -> Result<Self, CommandError> {
        let code = record.command().map_err(|e| match e {
            WireError::Code(code) => CommandError::UnknownCode(code),
            _ => CommandError::UnknownCode(record.code),
        })?;
        Self::from_payload(code, &record.payload)
    }

    /// Validate a payload for `code`
    pub fn from_payload(code: CommandCode, payload: &[u8]) -> Result<Self, CommandError> {
        let mut buf = payload;
        let command = match code {
            CommandCode::Ping => NodeCommand::Ping,
            CommandCode::GetConfig => NodeCommand::GetConfig,
            CommandCode::SetInterval => {
                require(payload, 4)?;
                let interval = buf.get_u32_le();
                if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval) {
                    return Err(CommandError::OutOfRange {
                        field: "telemetry interval",
                        value: interval as i64,
                    });
                }
                NodeCommand::SetInterval(interval)
            }
            CommandCode::SetLocation => parse_location(payload)?,
            CommandCode::SetTempThresholds => {
                require(payload, 8)?;
                NodeCommand::SetTempThresholds(TemperatureThresholds {
                    low: buf.get_f32_le(),
                    high: buf.get_f32_le(),
                })
            }
            CommandCode::SetBatteryThresholds => {
                require(payload, 8)?;
                NodeCommand::SetBatteryThresholds(BatteryThresholds {
                    low: buf.get_f32_le(),
                    critical: buf.get_f32_le(),
                })
            }
            CommandCode::SetMeshConfig => {
                require(payload, 1)?;
                NodeCommand::SetMesh(buf.get_u8() != 0)
            }
            CommandCode::Restart => NodeCommand::Restart,
            CommandCode::FactoryReset => NodeCommand::FactoryReset,
            CommandCode::SetLoraParams => {
                require(payload, 7)?;
                // frequency, spreading factor, one unused byte, tx power
                NodeCommand::SetLoraParams(RadioParams {
                    frequency_mhz: buf.get_f32_le(),
                    spreading_factor: payload[4],
                    tx_power_dbm: payload[6],
                })
            }
            CommandCode::TimeSync | CommandCode::BaseWelcome => {
                require(payload, 6)?;
                NodeCommand::TimeSync {
                    epoch: buf.get_u32_le(),
                    tz_offset_minutes: buf.get_i16_le(),
                }
            }
            CommandCode::SensorAnnounce | CommandCode::Ack | CommandCode::Nack => {
                return Err(CommandError::NotAccepted(code as u8));
            }
        };
        Ok(command)
    }

    /// Wire code for this command
    pub fn code(&self) -> CommandCode {
        match self {
            NodeCommand::Ping => CommandCode::Ping,
            NodeCommand::GetConfig => CommandCode::GetConfig,
            NodeCommand::SetInterval(_) => CommandCode::SetInterval,
            NodeCommand::SetLocation { .. } => CommandCode::SetLocation,
            NodeCommand::SetTempThresholds(_) => CommandCode::SetTempThresholds,
            NodeCommand::SetBatteryThresholds(_) => CommandCode::SetBatteryThresholds,
            NodeCommand::SetMesh(_) => CommandCode::SetMeshConfig,
            NodeCommand::Restart => CommandCode::Restart,
            NodeCommand::FactoryReset => CommandCode::FactoryReset,
            NodeCommand::SetLoraParams(_) => CommandCode::SetLoraParams,
            NodeCommand::TimeSync { .. } => CommandCode::TimeSync,
        }
    }

    /// Encode the payload the way the base station does
    pub fn encode_payload(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            NodeCommand::Ping
            | NodeCommand::GetConfig
            | NodeCommand::Restart
            | NodeCommand::FactoryReset => {}
            NodeCommand::SetInterval(ms) => buf.put_u32_le(*ms),
            NodeCommand::SetLocation { location, zone } => {
                put_terminated(&mut buf, location, LOCATION_LEN);
                if let Some(zone) = zone {
                    put_terminated(&mut buf, zone, ZONE_LEN);
                }
            }
            NodeCommand::SetTempThresholds(t) => {
                buf.put_f32_le(t.low);
                buf.put_f32_le(t.high);
            }
            NodeCommand::SetBatteryThresholds(b) => {
                buf.put_f32_le(b.low);
                buf.put_f32_le(b.critical);
            }
            NodeCommand::SetMesh(enabled) => buf.put_u8(u8::from(*enabled)),
            NodeCommand::SetLoraParams(radio) => {
                buf.put_f32_le(radio.frequency_mhz);
                buf.put_u8(radio.spreading_factor);
                buf.put_u8(0);
                buf.put_u8(radio.tx_power_dbm);
            }
            NodeCommand::TimeSync {
                epoch,
                tz_offset_minutes,
            } => {
                buf.put_u32_le(*epoch);
                buf.put_i16_le(*tz_offset_minutes);
            }
        }
        buf.freeze()
    }

    /// Build the command record addressed to `target_id`
    pub fn to_record(&self, target_id: u8, sequence: u8) -> Result<CommandRecord, WireError> {
        CommandRecord::new(self.code(), target_id, sequence, self.encode_payload())
    }
}

fn require(payload: &[u8], need: usize) -> Result<(), CommandError> {
    if payload.len() < need {
        return Err(CommandError::PayloadTooShort {
            need,
            have: payload.len(),
        });
    }
    Ok(())
}

fn parse_location(payload: &[u8]) -> Result<NodeCommand, CommandError> {
    require(payload, 1)?;
    let (location, used) = take_terminated(payload, LOCATION_LEN, "location")?;

    let rest = &payload[used..];
    let zone = if rest.is_empty() {
        None
    } else {
        Some(take_terminated(rest, ZONE_LEN, "zone")?.0)
    };

    Ok(NodeCommand::SetLocation { location, zone })
}

/// Read a null-terminated string of at most `width` bytes including the
/// terminator, returning it with the number of bytes consumed.
fn take_terminated(
    buf: &[u8],
    width: usize,
    field: &'static str,
) -> Result<(String, usize), CommandError> {
    let window = &buf[..buf.len().min(width)];
    let end = window
        .iter()
        .position(|&b| b == 0)
        .ok_or(CommandError::Unterminated { field, width })?;
    let text = String::from_utf8_lossy(&window[..end]).into_owned();
    Ok((text, end + 1))
}

fn put_terminated(buf: &mut BytesMut, s: &str, width: usize) {
    let mut len = s.len().min(width - 1);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    buf.put_slice(&s.as_bytes()[..len]);
    buf.put_u8(0);
}
