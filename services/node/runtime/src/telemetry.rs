//! Telemetry assembly from the node's sensors.

use lss_storage::NodeConfig;
use lss_wire::{PowerState, TelemetryHeader, TelemetryRecord, MAX_VALUES};
use tracing::{debug, warn};

use crate::sensor::{battery_percent, BatteryMonitor, Sensor};

/// Reading reported when the battery cannot be measured
const UNKNOWN_BATTERY_PERCENT: u8 = 0;

/// Collects readings from every ready sensor into one telemetry record
pub struct TelemetryAssembler {
    sensors: Vec<Box<dyn Sensor>>,
    battery: Box<dyn BatteryMonitor>,
    charging: bool,
}

impl TelemetryAssembler {
    /// Assembler over `sensors`, reporting charge from `battery`
    pub fn new(sensors: Vec<Box<dyn Sensor>>, battery: Box<dyn BatteryMonitor>) -> Self {
        Self {
            sensors,
            battery,
            charging: false,
        }
    }

    /// Initialise every sensor, returning how many became ready.
    ///
    /// A sensor that fails to start stays in the list but is never read.
    pub fn begin_all(&mut self) -> usize {
        let mut ready = 0;
        for sensor in &mut self.sensors {
            match sensor.begin() {
                Ok(()) => {
                    debug!(sensor = sensor.name(), "Sensor ready");
                    ready += 1;
                }
                Err(e) => warn!(sensor = sensor.name(), "Sensor failed to start: {}", e),
            }
        }
        ready
    }

    /// Number of attached sensors
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Mark whether external power is charging the battery
    pub fn set_charging(&mut self, charging: bool) {
        self.charging = charging;
    }

    /// Read all ready sensors and build a record.
    ///
    /// Values are appended in sensor order until the record is full; a
    /// sensor whose read fails contributes nothing this round.
    pub fn assemble(
        &mut self,
        config: &NodeConfig,
        last_command_seq: u8,
        ack_status: u8,
    ) -> TelemetryRecord {
        let battery = match self.battery.millivolts() {
            Ok(mv) => battery_percent(mv),
            Err(e) => {
                warn!("Battery read failed: {}", e);
                UNKNOWN_BATTERY_PERCENT
            }
        };

        let mut power_state = PowerState::empty();
        power_state.set(PowerState::CHARGING, self.charging);

        let mut record = TelemetryRecord::new(TelemetryHeader {
            network_id: config.network_id,
            sender_id: config.node_id,
            battery_percent: battery,
            power_state,
            last_command_seq,
            ack_status,
            location: config.location.clone(),
            zone: config.zone.clone(),
        });

        'sensors: for sensor in self.sensors.iter_mut().filter(|s| s.is_ready()) {
            if let Err(e) = sensor.read() {
                warn!(sensor = sensor.name(), "Sensor read failed: {}", e);
                continue;
            }
            for value in sensor.values() {
                if record.push(value).is_err() {
                    debug!(max = MAX_VALUES, "Telemetry record full, dropping remaining values");
                    break 'sensors;
                }
            }
        }

        record
    }
}

impl std::fmt::Debug for TelemetryAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sensors.iter().map(|s| s.name()).collect();
        f.debug_struct("TelemetryAssembler")
            .field("sensors", &names)
            .field("charging", &self.charging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::{FixedBattery, FixedInput, FixedSensor, ThermistorSensor};
    use lss_wire::{SensorValue, ValueKind};

    fn values(n: usize) -> Vec<SensorValue> {
        (0..n)
            .map(|i| SensorValue::new(ValueKind::Temperature, i as f32))
            .collect()
    }

    #[test]
    fn test_only_ready_sensors_report() {
        let sensors: Vec<Box<dyn Sensor>> = vec![
            Box::new(FixedSensor::new("a", values(2))),
            Box::new(FixedSensor::new("b", values(3))),
        ];
        let mut assembler = TelemetryAssembler::new(sensors, Box::new(FixedBattery(3600.0)));

        let record = assembler.assemble(&NodeConfig::default(), 0, 0);
        assert!(record.values.is_empty());

        assert_eq!(assembler.begin_all(), 2);
        let record = assembler.assemble(&NodeConfig::default(), 7, 1);
        assert_eq!(record.values.len(), 5);
        assert_eq!(record.header.battery_percent, 50);
        assert_eq!(record.header.last_command_seq, 7);
        assert_eq!(record.header.ack_status, 1);
        assert_eq!(record.header.location, "Unknown");
    }

    #[test]
    fn test_values_capped() {
        let sensors: Vec<Box<dyn Sensor>> = vec![
            Box::new(FixedSensor::new("a", values(10))),
            Box::new(FixedSensor::new("b", values(10))),
        ];
        let mut assembler = TelemetryAssembler::new(sensors, Box::new(FixedBattery(4200.0)));
        assembler.begin_all();

        let record = assembler.assemble(&NodeConfig::default(), 0, 0);
        assert_eq!(record.values.len(), MAX_VALUES);
        // first sensor's values come first
        assert_eq!(record.values[9].value, 9.0);
        assert_eq!(record.values[10].value, 0.0);
    }

    #[test]
    fn test_failed_read_is_skipped() {
        let sensors: Vec<Box<dyn Sensor>> = vec![
            Box::new(ThermistorSensor::new(FixedInput(0))),
            Box::new(FixedSensor::new("ok", values(1))),
        ];
        let mut assembler = TelemetryAssembler::new(sensors, Box::new(FixedBattery(4200.0)));
        assembler.begin_all();

        let record = assembler.assemble(&NodeConfig::default(), 0, 0);
        assert_eq!(record.values.len(), 1);
        assert_eq!(record.values[0].kind, ValueKind::Temperature);
    }

    #[test]
    fn test_charging_flag() {
        let mut assembler = TelemetryAssembler::new(Vec::new(), Box::new(FixedBattery(4000.0)));
        assembler.set_charging(true);
        let record = assembler.assemble(&NodeConfig::default(), 0, 0);
        assert!(record.header.power_state.contains(PowerState::CHARGING));
    }
}
