//! Analog sensor: thermistors, pressure transducers, potentiometers.

use alloc::format;
use alloc::string::String;

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use super::{DeviceCore, DeviceKind, DeviceState, Sensor, SensorValue};
use crate::config::{AnalogConfig, SensorMode, Thermistor, ANALOG_MAX_VALUE};
use crate::traits::AnalogInput;

/// Samples in the moving average.
pub const SMOOTHING_WINDOW: usize = 5;

/// Reading reported when a thermistor is open or shorted.
pub const THERMISTOR_FAULT: f32 = -999.0;

const KELVIN_OFFSET: f32 = 273.15;
const KELVIN_25C: f32 = 298.15;

/// Beta-equation temperature in °C for a raw reading, or
/// [`THERMISTOR_FAULT`] at either end of the scale.
///
/// ```
/// use rs_ramps::config::Thermistor;
/// use rs_ramps::devices::analog::{thermistor_celsius, THERMISTOR_FAULT};
///
/// let t = Thermistor::default();
/// assert_eq!(thermistor_celsius(0.0, &t), THERMISTOR_FAULT);
/// assert_eq!(thermistor_celsius(1023.0, &t), THERMISTOR_FAULT);
///
/// // R = R25 puts the divider at 25 °C
/// let raw = 1023.0 / (1.0 + t.r25_ohms / t.pullup_ohms);
/// assert!((thermistor_celsius(raw, &t) - 25.0).abs() < 0.1);
/// ```
pub fn thermistor_celsius(raw: f32, t: &Thermistor) -> f32 {
    let full_scale = ANALOG_MAX_VALUE as f32;
    if raw <= 0.0 || raw >= full_scale {
        return THERMISTOR_FAULT;
    }
    let resistance = t.pullup_ohms * (full_scale / raw - 1.0);
    let inv_t = 1.0 / KELVIN_25C + (resistance / t.r25_ohms).ln() / t.beta;
    1.0 / inv_t - KELVIN_OFFSET
}

/// An analog sensor.
///
/// # Example
///
/// ```rust
/// use rs_ramps::config::{AnalogConfig, SensorMode};
/// use rs_ramps::devices::{AnalogSensor, Sensor};
/// use rs_ramps::hal::MockAdc;
///
/// let adc = MockAdc::new().with_value(1023);
/// let cfg = AnalogConfig::new("PRESSURE")
///     .with_mode(SensorMode::Voltage)
///     .with_smoothing(false);
/// let mut pressure = AnalogSensor::new(&cfg, adc.clone());
///
/// assert!((pressure.read_value(0) - 5.0).abs() < 0.001);
/// ```
#[derive(Debug)]
pub struct AnalogSensor<A: AnalogInput> {
    core: DeviceCore,
    reading: SensorValue,
    adc: A,
    mode: SensorMode,
    vref: f32,
    smoothing: bool,
    samples: [f32; SMOOTHING_WINDOW],
    sample_count: usize,
    next_sample: usize,
    last_raw: u16,
}

impl<A: AnalogInput> AnalogSensor<A> {
    /// Sensor with an empty smoothing window.
    pub fn new(cfg: &AnalogConfig, adc: A) -> Self {
        Self {
            core: DeviceCore::new(cfg.name.clone(), DeviceKind::Analog, DeviceState::Idle, true),
            reading: SensorValue::new(cfg.threshold),
            adc,
            mode: cfg.mode,
            vref: cfg.vref,
            smoothing: cfg.smoothing,
            samples: [0.0; SMOOTHING_WINDOW],
            sample_count: 0,
            next_sample: 0,
            last_raw: 0,
        }
    }

    /// Shared identity and lifecycle.
    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// Conversion mode.
    pub fn mode(&self) -> SensorMode {
        self.mode
    }

    /// Change the conversion mode.
    pub fn set_mode(&mut self, mode: SensorMode) {
        self.mode = mode;
    }

    /// Last raw ADC count.
    pub fn raw(&self) -> u16 {
        self.last_raw
    }

    /// Last raw count as volts.
    pub fn voltage(&self) -> f32 {
        self.last_raw as f32 / ANALOG_MAX_VALUE as f32 * self.vref
    }

    /// Record the update time. Sampling happens in
    /// [`read_value`](Sensor::read_value).
    pub fn update(&mut self, now_ms: u64) {
        self.core.touch(now_ms);
    }

    /// Clear the smoothing window and readings.
    pub fn reset(&mut self, now_ms: u64) {
        let threshold = self.reading.threshold;
        self.reading = SensorValue::new(threshold);
        self.samples = [0.0; SMOOTHING_WINDOW];
        self.sample_count = 0;
        self.next_sample = 0;
        self.last_raw = 0;
        self.core.set_state(DeviceState::Idle);
        self.core.touch(now_ms);
    }

    /// Device status line.
    pub fn status(&self) -> String {
        let mut status = self.core.status();
        status.push_str(&format!(
            ", Value: {:.2}, Mode: {}",
            self.reading.current,
            self.mode.as_str()
        ));
        status
    }

    fn smooth(&mut self, raw: f32) -> f32 {
        if !self.smoothing {
            return raw;
        }
        self.samples[self.next_sample] = raw;
        self.next_sample = (self.next_sample + 1) % SMOOTHING_WINDOW;
        if self.sample_count < SMOOTHING_WINDOW {
            self.sample_count += 1;
        }
        let sum: f32 = self.samples[..self.sample_count].iter().sum();
        sum / self.sample_count as f32
    }

    fn convert(&self, raw: f32) -> f32 {
        match self.mode {
            SensorMode::Raw => raw,
            SensorMode::Voltage => raw / ANALOG_MAX_VALUE as f32 * self.vref,
            SensorMode::Thermistor(t) => thermistor_celsius(raw, &t),
            SensorMode::Linear { scale, offset } => raw * scale + offset,
        }
    }
}

impl<A: AnalogInput> Sensor for AnalogSensor<A> {
    fn reading(&self) -> &SensorValue {
        &self.reading
    }

    fn reading_mut(&mut self) -> &mut SensorValue {
        &mut self.reading
    }

    fn read_value(&mut self, now_ms: u64) -> f32 {
        self.last_raw = self.adc.read().min(ANALOG_MAX_VALUE);
        let smoothed = self.smooth(self.last_raw as f32);
        let value = self.convert(smoothed);
        self.reading.record(value);

        let fault = matches!(self.mode, SensorMode::Thermistor(_)) && value == THERMISTOR_FAULT;
        self.core.set_state(if fault {
            DeviceState::Error
        } else {
            DeviceState::Idle
        });
        self.core.touch(now_ms);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockAdc;

    fn sensor(cfg: AnalogConfig, raw: u16) -> (AnalogSensor<MockAdc>, MockAdc) {
        let adc = MockAdc::new().with_value(raw);
        (AnalogSensor::new(&cfg, adc.clone()), adc)
    }

    #[test]
    fn raw_mode_passes_counts_through() {
        let (mut s, _) = sensor(AnalogConfig::new("POT").with_smoothing(false), 700);
        assert_eq!(s.read_value(0), 700.0);
        assert_eq!(s.raw(), 700);
    }

    #[test]
    fn smoothing_averages_last_five() {
        let (mut s, adc) = sensor(AnalogConfig::new("POT"), 100);
        assert_eq!(s.read_value(0), 100.0);
        adc.set(200);
        assert_eq!(s.read_value(1), 150.0);
        for t in 2..10 {
            s.read_value(t);
        }
        // window is now all 200s
        assert_eq!(s.read_value(10), 200.0);
    }

    #[test]
    fn linear_mode_scales() {
        let cfg = AnalogConfig::new("LOAD")
            .with_smoothing(false)
            .with_mode(SensorMode::Linear {
                scale: 0.5,
                offset: -10.0,
            });
        let (mut s, _) = sensor(cfg, 100);
        assert_eq!(s.read_value(0), 40.0);
    }

    #[test]
    fn thermistor_fault_sets_error_state() {
        let cfg = AnalogConfig::new("TEMP")
            .with_smoothing(false)
            .with_mode(SensorMode::Thermistor(Thermistor::default()));
        let (mut s, adc) = sensor(cfg, 0);
        assert_eq!(s.read_value(0), THERMISTOR_FAULT);
        assert_eq!(s.core().state(), DeviceState::Error);

        adc.set(512);
        let celsius = s.read_value(1);
        assert!(celsius > 100.0 && celsius < 250.0);
        assert_eq!(s.core().state(), DeviceState::Idle);
    }

    #[test]
    fn hotter_means_lower_counts() {
        let t = Thermistor::default();
        assert!(thermistor_celsius(100.0, &t) > thermistor_celsius(900.0, &t));
    }

    #[test]
    fn update_does_not_sample() {
        let (mut s, _) = sensor(AnalogConfig::new("POT"), 300);
        s.update(5);
        assert!(!s.has_new_data());
        assert_eq!(s.core().last_update_ms(), 5);
    }

    #[test]
    fn status_shows_mode() {
        let cfg = AnalogConfig::new("PRESSURE")
            .with_mode(SensorMode::Voltage)
            .with_smoothing(false);
        let (mut s, _) = sensor(cfg, 0);
        s.read_value(0);
        assert_eq!(
            s.status(),
            "Name: PRESSURE, Type: AnalogSensor, State: IDLE, Enabled: YES, Value: 0.00, Mode: VOLTAGE"
        );
    }
}
