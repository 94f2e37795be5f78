//! Board configuration: protocol framing, device table, and timing tunables.
//!
//! Uses `heapless` strings and vectors so the whole table can live in a
//! `static` on a microcontroller while remaining ergonomic on desktop.
//!
//! # Example
//!
//! ```rust
//! use rs_ramps::config::{Axis, Config, DeviceTable, StepperConfig, SwitchConfig};
//!
//! // Reference board: three axes, two servos, three outputs, ...
//! let config = Config::default();
//! assert_eq!(config.devices.steppers.len(), 3);
//!
//! // Or a minimal single-axis rig
//! let devices = DeviceTable::empty()
//!     .with_stepper(StepperConfig::new("X").with_axis(Axis::X).with_home_switch("X_MIN"))
//!     .with_switch(SwitchConfig::new("X_MIN"));
//! let config = Config::default().with_devices(devices);
//! assert_eq!(config.devices.len(), 2);
//! ```

use heapless::String as HString;
use heapless::Vec as HVec;

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

/// Maximum length for device names.
pub const MAX_SHORT_STRING: usize = 32;

/// Type alias for device names and other short config strings.
pub type ShortString = HString<MAX_SHORT_STRING>;

/// Stepper driver slots on the board (X, Y, Z, E0, E1).
pub const MAX_STEPPERS: usize = 5;
/// Servo headers on the board.
pub const MAX_SERVOS: usize = 4;
/// MOSFET power outputs on the board.
pub const MAX_OUTPUTS: usize = 3;
/// End-stop inputs on the board (min and max per axis).
pub const MAX_SWITCHES: usize = 6;
/// Thermistor/analog inputs on the board.
pub const MAX_ANALOG: usize = 3;

/// Full-scale reading of the 10-bit ADC.
pub const ANALOG_MAX_VALUE: u16 = 1023;

// ============================================================================
// Helper for creating heapless strings
// ============================================================================

/// Create a ShortString from a &str, truncating if too long
pub fn short_string(s: &str) -> ShortString {
    let mut hs = ShortString::new();
    for c in s.chars() {
        if hs.push(c).is_err() {
            break;
        }
    }
    hs
}

// ============================================================================
// Main Config
// ============================================================================

/// Complete controller configuration
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Line framing and acknowledgement behaviour
    pub protocol: ProtocolConfig,
    /// Which notifications are pushed to the host
    pub events: EventConfig,
    /// Homing parameters
    pub calibration: CalibrationConfig,
    /// Devices present on the board
    pub devices: DeviceTable,
}

impl Config {
    /// Set protocol configuration
    pub fn with_protocol(mut self, protocol: ProtocolConfig) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set event configuration
    pub fn with_events(mut self, events: EventConfig) -> Self {
        self.events = events;
        self
    }

    /// Set calibration configuration
    pub fn with_calibration(mut self, calibration: CalibrationConfig) -> Self {
        self.calibration = calibration;
        self
    }

    /// Replace the device table
    pub fn with_devices(mut self, devices: DeviceTable) -> Self {
        self.devices = devices;
        self
    }
}

// ============================================================================
// Protocol Config
// ============================================================================

/// Command line framing
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProtocolConfig {
    /// Optional leading marker stripped from each command (`>`)
    pub start_marker: char,
    /// Whether the start marker is recognised at all
    pub use_start_marker: bool,
    /// Field separator
    pub delimiter: char,
    /// Byte that terminates a command line
    pub terminator: u8,
    /// Idle time after which a partial line is discarded
    pub timeout_ms: u64,
    /// Send `OK` acknowledgements for writes that carry no value
    pub ack_mode: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            start_marker: '>',
            use_start_marker: true,
            delimiter: ' ',
            terminator: b'\n',
            timeout_ms: 1000,
            ack_mode: true,
        }
    }
}

impl ProtocolConfig {
    /// Set the partial-line timeout
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Enable or disable acknowledgements
    pub fn with_ack_mode(mut self, ack: bool) -> Self {
        self.ack_mode = ack;
        self
    }

    /// Set the start marker, or disable it with `None`
    pub fn with_start_marker(mut self, marker: Option<char>) -> Self {
        match marker {
            Some(c) => {
                self.start_marker = c;
                self.use_start_marker = true;
            }
            None => self.use_start_marker = false,
        }
        self
    }
}

// ============================================================================
// Event Config
// ============================================================================

/// Unsolicited notifications
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventConfig {
    /// Push `<switch> state 1|0 EVENT` on debounced changes
    pub report_switch_events: bool,
    /// Announce `SERVICE <name> STARTED`
    pub notify_service_start: bool,
    /// Announce `SERVICE <name> DONE|FAILED`
    pub notify_service_done: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            report_switch_events: true,
            notify_service_start: true,
            notify_service_done: true,
        }
    }
}

impl EventConfig {
    /// Enable or disable switch events
    pub fn with_switch_events(mut self, enabled: bool) -> Self {
        self.report_switch_events = enabled;
        self
    }

    /// Enable or disable service start/done notices
    pub fn with_service_notices(mut self, start: bool, done: bool) -> Self {
        self.notify_service_start = start;
        self.notify_service_done = done;
        self
    }
}

// ============================================================================
// Calibration Config
// ============================================================================

/// Homing parameters
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationConfig {
    /// Seek speed toward the home switch in steps per second
    pub speed_steps_per_s: f32,
    /// Bound on each homing phase
    pub timeout_ms: u64,
    /// Distance moved away from the switch after it triggers
    pub backoff_steps: i64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            speed_steps_per_s: 100.0,
            timeout_ms: 30_000,
            backoff_steps: 5,
        }
    }
}

impl CalibrationConfig {
    /// Set the seek speed
    pub fn with_speed_steps_per_s(mut self, speed: f32) -> Self {
        self.speed_steps_per_s = speed.abs();
        self
    }

    /// Set the phase timeout
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the back-off distance
    pub fn with_backoff_steps(mut self, steps: i64) -> Self {
        self.backoff_steps = steps;
        self
    }
}

// ============================================================================
// Device Table
// ============================================================================

/// Homing axis a stepper belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl Axis {
    /// All homing axes, in `CALIBRATE_ALL` order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Single-letter name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }

    /// Parse an axis letter, case-insensitive.
    ///
    /// ```
    /// use rs_ramps::config::Axis;
    ///
    /// assert_eq!(Axis::from_text("x"), Some(Axis::X));
    /// assert_eq!(Axis::from_text(" Z "), Some(Axis::Z));
    /// assert_eq!(Axis::from_text("E0"), None);
    /// ```
    pub fn from_text(s: &str) -> Option<Self> {
        match s.trim() {
            "X" | "x" => Some(Axis::X),
            "Y" | "y" => Some(Axis::Y),
            "Z" | "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Stepper axis configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepperConfig {
    /// Device name used on the wire
    pub name: ShortString,
    /// Full steps times microstepping per revolution
    pub steps_per_rev: u32,
    /// Speed limit in steps per second
    pub max_speed: f32,
    /// Acceleration in steps per second squared
    pub acceleration: f32,
    /// Homing axis, if this stepper can be calibrated
    pub axis: Option<Axis>,
    /// Name of the limit switch used for homing
    pub home_switch: Option<ShortString>,
}

impl StepperConfig {
    /// Stepper with 200 x 16 microsteps, 1000 steps/s and 500 steps/s².
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            steps_per_rev: 200 * 16,
            max_speed: 1000.0,
            acceleration: 500.0,
            axis: None,
            home_switch: None,
        }
    }

    /// Set steps per revolution
    pub fn with_steps_per_rev(mut self, steps: u32) -> Self {
        self.steps_per_rev = steps.max(1);
        self
    }

    /// Set the speed limit in steps per second
    pub fn with_max_speed(mut self, steps_per_s: f32) -> Self {
        self.max_speed = steps_per_s.abs();
        self
    }

    /// Set acceleration in steps per second squared
    pub fn with_acceleration(mut self, steps_per_s2: f32) -> Self {
        self.acceleration = steps_per_s2.abs();
        self
    }

    /// Assign a homing axis
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axis = Some(axis);
        self
    }

    /// Name the home limit switch
    pub fn with_home_switch(mut self, switch: &str) -> Self {
        self.home_switch = Some(short_string(switch));
        self
    }
}

/// Hobby servo configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServoConfig {
    /// Device name used on the wire
    pub name: ShortString,
    /// Lower travel limit in degrees
    pub min_angle: f32,
    /// Upper travel limit in degrees
    pub max_angle: f32,
    /// Default sweep speed in radians per second
    pub speed: f32,
}

impl ServoConfig {
    /// Servo with 0-180° travel at 1 rad/s.
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            min_angle: 0.0,
            max_angle: 180.0,
            speed: 1.0,
        }
    }

    /// Set travel limits in degrees
    pub fn with_limits(mut self, min_angle: f32, max_angle: f32) -> Self {
        self.min_angle = min_angle;
        self.max_angle = max_angle;
        self
    }

    /// Set the default sweep speed in radians per second
    pub fn with_speed(mut self, rad_per_s: f32) -> Self {
        self.speed = rad_per_s.abs();
        self
    }
}

/// MOSFET power output configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputConfig {
    /// Device name used on the wire
    pub name: ShortString,
    /// Pin supports PWM; otherwise duty collapses to on/off
    pub pwm: bool,
    /// Fastest fade in full-scale per second
    pub max_velocity: f32,
}

impl OutputConfig {
    /// PWM-capable output fading at most full scale per second.
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            pwm: true,
            max_velocity: 1.0,
        }
    }

    /// Mark the output as PWM capable or digital only
    pub fn with_pwm(mut self, pwm: bool) -> Self {
        self.pwm = pwm;
        self
    }
}

/// Limit switch configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwitchConfig {
    /// Device name used on the wire
    pub name: ShortString,
    /// Switch reads low when triggered
    pub inverted: bool,
    /// Enable the input pull-up
    pub pullup: bool,
    /// Time a raw level must hold before it is accepted
    pub debounce_ms: u64,
}

impl SwitchConfig {
    /// Non-inverted switch with pull-up and 50 ms debounce.
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            inverted: false,
            pullup: true,
            debounce_ms: 50,
        }
    }

    /// Set inversion
    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// Enable or disable the pull-up
    pub fn with_pullup(mut self, pullup: bool) -> Self {
        self.pullup = pullup;
        self
    }

    /// Set the debounce interval
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }
}

/// Beta-equation thermistor parameters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Thermistor {
    /// Pull-up resistor in ohms
    pub pullup_ohms: f32,
    /// Resistance at 25 °C in ohms
    pub r25_ohms: f32,
    /// Beta coefficient
    pub beta: f32,
}

impl Default for Thermistor {
    fn default() -> Self {
        Self {
            pullup_ohms: 4700.0,
            r25_ohms: 100_000.0,
            beta: 3950.0,
        }
    }
}

/// How raw ADC counts are converted
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorMode {
    /// ADC counts, 0-1023
    #[default]
    Raw,
    /// Volts against the reference voltage
    Voltage,
    /// Degrees Celsius from a thermistor divider
    Thermistor(Thermistor),
    /// `raw * scale + offset`
    Linear {
        /// Multiplier applied to the raw reading
        scale: f32,
        /// Offset added after scaling
        offset: f32,
    },
}

impl SensorMode {
    /// Upper-case mode name for status lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SensorMode::Raw => "RAW",
            SensorMode::Voltage => "VOLTAGE",
            SensorMode::Thermistor(_) => "THERMISTOR",
            SensorMode::Linear { .. } => "LINEAR",
        }
    }
}

/// Analog sensor configuration
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalogConfig {
    /// Device name used on the wire
    pub name: ShortString,
    /// Conversion applied to each reading
    pub mode: SensorMode,
    /// ADC reference voltage
    pub vref: f32,
    /// Average the last few samples
    pub smoothing: bool,
    /// Minimum change considered significant
    pub threshold: f32,
}

impl AnalogConfig {
    /// Raw-mode sensor with smoothing on a 5 V reference.
    pub fn new(name: &str) -> Self {
        Self {
            name: short_string(name),
            mode: SensorMode::Raw,
            vref: 5.0,
            smoothing: true,
            threshold: 512.0,
        }
    }

    /// Set the conversion mode
    pub fn with_mode(mut self, mode: SensorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the reference voltage
    pub fn with_vref(mut self, vref: f32) -> Self {
        self.vref = vref;
        self
    }

    /// Enable or disable smoothing
    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Set the change threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.abs();
        self
    }
}

/// Every device on the board, grouped by kind.
///
/// Entries beyond a kind's capacity are dropped.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceTable {
    /// Stepper axes
    pub steppers: HVec<StepperConfig, MAX_STEPPERS>,
    /// Servo motors
    pub servos: HVec<ServoConfig, MAX_SERVOS>,
    /// MOSFET outputs
    pub outputs: HVec<OutputConfig, MAX_OUTPUTS>,
    /// Limit switches
    pub switches: HVec<SwitchConfig, MAX_SWITCHES>,
    /// Analog sensors
    pub analog: HVec<AnalogConfig, MAX_ANALOG>,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::empty()
            .with_stepper(
                StepperConfig::new("X")
                    .with_axis(Axis::X)
                    .with_home_switch("X_MIN"),
            )
            .with_stepper(
                StepperConfig::new("Y")
                    .with_axis(Axis::Y)
                    .with_home_switch("Y_MIN"),
            )
            .with_stepper(
                StepperConfig::new("Z")
                    .with_axis(Axis::Z)
                    .with_home_switch("Z_MIN")
                    .with_max_speed(500.0),
            )
            .with_servo(ServoConfig::new("GRIPPER"))
            .with_servo(ServoConfig::new("CAMERA"))
            .with_output(OutputConfig::new("LIGHT"))
            .with_output(OutputConfig::new("FAN"))
            .with_output(OutputConfig::new("PUMP"))
            .with_switch(SwitchConfig::new("X_MIN"))
            .with_switch(SwitchConfig::new("Y_MIN"))
            .with_switch(SwitchConfig::new("Z_MIN"))
            .with_analog(
                AnalogConfig::new("TEMP").with_mode(SensorMode::Thermistor(Thermistor::default())),
            )
            .with_analog(AnalogConfig::new("PRESSURE").with_mode(SensorMode::Voltage))
    }
}

impl DeviceTable {
    /// A board with no devices.
    pub fn empty() -> Self {
        Self {
            steppers: HVec::new(),
            servos: HVec::new(),
            outputs: HVec::new(),
            switches: HVec::new(),
            analog: HVec::new(),
        }
    }

    /// Add a stepper axis
    pub fn with_stepper(mut self, cfg: StepperConfig) -> Self {
        let _ = self.steppers.push(cfg);
        self
    }

    /// Add a servo
    pub fn with_servo(mut self, cfg: ServoConfig) -> Self {
        let _ = self.servos.push(cfg);
        self
    }

    /// Add a power output
    pub fn with_output(mut self, cfg: OutputConfig) -> Self {
        let _ = self.outputs.push(cfg);
        self
    }

    /// Add a limit switch
    pub fn with_switch(mut self, cfg: SwitchConfig) -> Self {
        let _ = self.switches.push(cfg);
        self
    }

    /// Add an analog sensor
    pub fn with_analog(mut self, cfg: AnalogConfig) -> Self {
        let _ = self.analog.push(cfg);
        self
    }

    /// Total number of devices.
    pub fn len(&self) -> usize {
        self.steppers.len()
            + self.servos.len()
            + self.outputs.len()
            + self.switches.len()
            + self.analog.len()
    }

    /// True if the table holds no devices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.protocol.start_marker, '>');
        assert_eq!(config.protocol.timeout_ms, 1000);
        assert!(config.protocol.ack_mode);
        assert_eq!(config.calibration.timeout_ms, 30_000);
        assert_eq!(config.calibration.backoff_steps, 5);
        assert!(config.events.report_switch_events);
    }

    #[test]
    fn default_board_layout() {
        let table = DeviceTable::default();
        assert_eq!(table.steppers.len(), 3);
        assert_eq!(table.servos.len(), 2);
        assert_eq!(table.outputs.len(), 3);
        assert_eq!(table.switches.len(), 3);
        assert_eq!(table.analog.len(), 2);
        assert_eq!(table.len(), 13);

        let z = &table.steppers[2];
        assert_eq!(z.axis, Some(Axis::Z));
        assert_eq!(z.home_switch.as_deref(), Some("Z_MIN"));
        assert_eq!(z.max_speed, 500.0);
    }

    #[test]
    fn short_string_truncation() {
        let long_input = "a".repeat(100);
        let s = short_string(&long_input);
        assert_eq!(s.len(), MAX_SHORT_STRING);
    }

    #[test]
    fn short_string_respects_char_boundaries() {
        let input = "é".repeat(40);
        let s = short_string(&input);
        assert!(s.len() <= MAX_SHORT_STRING);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn table_capacity_is_enforced() {
        let mut table = DeviceTable::empty();
        for i in 0..10 {
            table = table.with_output(OutputConfig::new(&alloc::format!("OUT{i}")));
        }
        assert_eq!(table.outputs.len(), MAX_OUTPUTS);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_protocol(ProtocolConfig::default().with_ack_mode(false).with_start_marker(None))
            .with_calibration(CalibrationConfig::default().with_timeout_ms(5_000))
            .with_devices(DeviceTable::empty());

        assert!(!config.protocol.ack_mode);
        assert!(!config.protocol.use_start_marker);
        assert_eq!(config.calibration.timeout_ms, 5_000);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn stepper_builder_sanitises_values() {
        let cfg = StepperConfig::new("E0")
            .with_steps_per_rev(0)
            .with_max_speed(-800.0);
        assert_eq!(cfg.steps_per_rev, 1);
        assert_eq!(cfg.max_speed, 800.0);
    }

    #[test]
    fn sensor_mode_names() {
        assert_eq!(SensorMode::Raw.as_str(), "RAW");
        assert_eq!(
            SensorMode::Thermistor(Thermistor::default()).as_str(),
            "THERMISTOR"
        );
        assert_eq!(
            SensorMode::Linear {
                scale: 1.0,
                offset: 0.0
            }
            .as_str(),
            "LINEAR"
        );
    }
}
