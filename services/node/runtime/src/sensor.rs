//! Sensor capability interface and ADC-backed drivers.
//!
//! Drivers are otherwise unrelated structs sharing the [`Sensor`] capability:
//! initialise, take a reading, report zero or more typed values.

use lss_wire::{SensorValue, ValueKind};
use tracing::debug;

use crate::error::SensorError;

/// Full-scale reading of the 12-bit ADC
pub const ADC_FULL_SCALE: f32 = 4095.0;

/// Analog input channel
pub trait AnalogInput: Send {
    /// Raw ADC reading, 0..=4095
    fn read_raw(&mut self) -> Result<i32, SensorError>;
}

/// Constant analog reading, for simulations and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedInput(pub i32);

impl AnalogInput for FixedInput {
    fn read_raw(&mut self) -> Result<i32, SensorError> {
        Ok(self.0)
    }
}

/// A sensor driver
pub trait Sensor: Send {
    /// Human-readable driver name
    fn name(&self) -> &str;

    /// Initialise the hardware; the sensor is ready afterwards on success
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Whether `begin` succeeded
    fn is_ready(&self) -> bool;

    /// Take a measurement. Cached values are kept on failure.
    fn read(&mut self) -> Result<(), SensorError>;

    /// Most recent values
    fn values(&self) -> Vec<SensorValue>;
}

/// NTC thermistor in a voltage divider, B-parameter equation
#[derive(Debug)]
pub struct ThermistorSensor<A> {
    input: A,
    r_fixed: f32,
    r_nominal: f32,
    t_nominal: f32,
    b_coefficient: f32,
    temperature: f32,
    ready: bool,
}

impl<A: AnalogInput> ThermistorSensor<A> {
    /// 10 kΩ divider, 10 kΩ at 25 °C, B = 3950
    pub fn new(input: A) -> Self {
        Self::with_parameters(input, 10_000.0, 10_000.0, 25.0, 3950.0)
    }

    /// Thermistor with explicit divider and curve parameters
    pub fn with_parameters(
        input: A,
        r_fixed: f32,
        r_nominal: f32,
        t_nominal: f32,
        b_coefficient: f32,
    ) -> Self {
        Self {
            input,
            r_fixed,
            r_nominal,
            t_nominal,
            b_coefficient,
            temperature: 0.0,
            ready: false,
        }
    }

    /// Convert a raw reading to °C.
    ///
    /// Readings at either rail mean an open or shorted divider and are
    /// rejected, as is anything the curve cannot map to a finite value.
    pub fn temperature_from_raw(&self, raw: i32) -> Result<f32, SensorError> {
        if raw <= 0 || raw as f32 >= ADC_FULL_SCALE {
            return Err(SensorError::InvalidReading(raw));
        }
        let resistance = self.r_fixed * (ADC_FULL_SCALE / raw as f32 - 1.0);
        let inv_t = (resistance / self.r_nominal).ln() / self.b_coefficient
            + 1.0 / (self.t_nominal + 273.15);
        let celsius = 1.0 / inv_t - 273.15;
        if !celsius.is_finite() {
            return Err(SensorError::InvalidReading(raw));
        }
        Ok(celsius)
    }
}

impl<A: AnalogInput> Sensor for ThermistorSensor<A> {
    fn name(&self) -> &str {
        "Thermistor"
    }

    fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn read(&mut self) -> Result<(), SensorError> {
        let raw = self.input.read_raw()?;
        self.temperature = self.temperature_from_raw(raw)?;
        Ok(())
    }

    fn values(&self) -> Vec<SensorValue> {
        vec![SensorValue::new(
            ValueKind::ThermistorTemperature,
            self.temperature,
        )]
    }
}

/// Capacitive or resistive soil probe calibrated between dry and wet readings
#[derive(Debug)]
pub struct SoilMoistureSensor<A> {
    input: A,
    dry_raw: i32,
    wet_raw: i32,
    moisture: f32,
    ready: bool,
}

impl<A: AnalogInput> SoilMoistureSensor<A> {
    /// Default calibration: dry 3500, wet 1500
    pub fn new(input: A) -> Self {
        Self::with_calibration(input, 3500, 1500)
    }

    /// Probe with explicit calibration points
    pub fn with_calibration(input: A, dry_raw: i32, wet_raw: i32) -> Self {
        Self {
            input,
            dry_raw,
            wet_raw,
            moisture: 0.0,
            ready: false,
        }
    }

    /// Convert a raw reading to percent, clamped to 0..=100.
    ///
    /// With equal calibration points the probe degenerates to a threshold:
    /// readings below it are 100 %, everything else 0 %.
    pub fn moisture_from_raw(&self, raw: i32) -> f32 {
        let span = self.dry_raw as f32 - self.wet_raw as f32;
        if span == 0.0 {
            return if raw < self.dry_raw { 100.0 } else { 0.0 };
        }
        let pct = 100.0 * (self.dry_raw as f32 - raw as f32) / span;
        pct.clamp(0.0, 100.0)
    }
}

impl<A: AnalogInput> Sensor for SoilMoistureSensor<A> {
    fn name(&self) -> &str {
        "SoilMoisture"
    }

    fn begin(&mut self) -> Result<(), SensorError> {
        if self.dry_raw == self.wet_raw {
            return Err(SensorError::Backend(
                "dry and wet calibration points are equal".to_string(),
            ));
        }
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn read(&mut self) -> Result<(), SensorError> {
        let raw = self.input.read_raw()?;
        self.moisture = self.moisture_from_raw(raw);
        Ok(())
    }

    fn values(&self) -> Vec<SensorValue> {
        vec![SensorValue::new(ValueKind::Moisture, self.moisture)]
    }
}

/// Sensor reporting preset values, for simulated nodes
#[derive(Debug, Clone)]
pub struct FixedSensor {
    name: String,
    values: Vec<SensorValue>,
    ready: bool,
}

impl FixedSensor {
    /// Sensor named `name` always reporting `values`
    pub fn new(name: impl Into<String>, values: Vec<SensorValue>) -> Self {
        Self {
            name: name.into(),
            values,
            ready: false,
        }
    }
}

impl Sensor for FixedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin(&mut self) -> Result<(), SensorError> {
        self.ready = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn read(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn values(&self) -> Vec<SensorValue> {
        self.values.clone()
    }
}

/// Battery voltage source
pub trait BatteryMonitor: Send {
    /// Battery voltage in millivolts
    fn millivolts(&mut self) -> Result<f32, SensorError>;
}

/// Battery sensed through a resistor divider on an ADC channel
#[derive(Debug)]
pub struct AdcBattery<A> {
    input: A,
    divider_ratio: f32,
    reference_mv: f32,
}

impl<A: AnalogInput> AdcBattery<A> {
    /// 390 kΩ / 100 kΩ divider (x4.9) against a 3.3 V reference
    pub fn new(input: A) -> Self {
        Self {
            input,
            divider_ratio: 4.9,
            reference_mv: 3300.0,
        }
    }
}

impl<A: AnalogInput> BatteryMonitor for AdcBattery<A> {
    fn millivolts(&mut self) -> Result<f32, SensorError> {
        let raw = self.input.read_raw()?;
        Ok(raw as f32 / ADC_FULL_SCALE * self.reference_mv * self.divider_ratio)
    }
}

/// Battery at a constant voltage
#[derive(Debug, Clone, Copy)]
pub struct FixedBattery(pub f32);

impl BatteryMonitor for FixedBattery {
    fn millivolts(&mut self) -> Result<f32, SensorError> {
        Ok(self.0)
    }
}

const BATTERY_EMPTY_MV: f32 = 3000.0;
const BATTERY_FULL_MV: f32 = 4200.0;

/// Linear charge estimate: 3.0 V is empty, 4.2 V is full
pub fn battery_percent(millivolts: f32) -> u8 {
    let pct = 100.0 * (millivolts - BATTERY_EMPTY_MV) / (BATTERY_FULL_MV - BATTERY_EMPTY_MV);
    let pct = pct.clamp(0.0, 100.0) as u8;
    debug!(millivolts, pct, "Battery level");
    pct
}
