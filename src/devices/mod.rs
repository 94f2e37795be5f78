//! Device model: the closed set of device kinds on the board.
//!
//! Every device shares a [`DeviceCore`] (name, kind, lifecycle state,
//! enabled flag, last update time). Actuators additionally carry an
//! [`ActuatorState`] and implement [`Actuator`]; sensors carry a
//! [`SensorValue`] and implement [`Sensor`].
//!
//! The [`Device`] enum ties the concrete kinds to one [`Board`]'s driver
//! types, so the controller can own all devices in a single `Vec`.
//!
//! # Lifecycle
//!
//! ```text
//!            enable()              set_* / on
//! Disabled ───────────► Idle ◄──────────────► Active
//!     ▲                  │  stop() / target reached
//!     └──── disable() ───┘
//! ```
//!
//! `Calibrating` is entered only by homing; `Error` only by a sensor
//! reading that cannot be converted.

use alloc::format;
use alloc::string::String;

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::config::ShortString;
use crate::error::ErrorCode;
use crate::traits::Board;

pub mod analog;
pub mod output;
pub mod servo;
pub mod stepper;
pub mod switch;

pub use analog::AnalogSensor;
pub use output::Output;
pub use servo::Servo;
pub use stepper::Stepper;
pub use switch::LimitSwitch;

// ============================================================================
// Kind and State
// ============================================================================

/// The kind of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceKind {
    /// Stepper axis
    Stepper,
    /// Hobby servo
    Servo,
    /// MOSFET power output
    Output,
    /// Limit switch
    Switch,
    /// Analog sensor
    Analog,
}

impl DeviceKind {
    /// Type name shown in status lines and the device list.
    pub const fn type_name(&self) -> &'static str {
        match self {
            DeviceKind::Stepper => "StepperMotor",
            DeviceKind::Servo => "ServoMotor",
            DeviceKind::Output => "MosfetOutput",
            DeviceKind::Switch => "EndSwitch",
            DeviceKind::Analog => "AnalogSensor",
        }
    }

    /// Comma-separated interfaces advertised in the device list.
    pub const fn interfaces(&self) -> &'static str {
        match self {
            DeviceKind::Stepper => "position,velocity,stop,reset",
            DeviceKind::Servo => "position,velocity,stop,reset,enable,disable",
            DeviceKind::Output => "position,velocity,state,ON,OFF,stop,reset",
            DeviceKind::Switch => "read,state,value,status",
            DeviceKind::Analog => "read,value,raw,voltage,status",
        }
    }

    /// Usage hint following `>NAME ` in the device list.
    pub const fn usage(&self) -> &'static str {
        match self {
            DeviceKind::Stepper => {
                "enable | position <rad> | velocity <rad/s> | acceleration <rad/s²> | zero | stop"
            }
            DeviceKind::Servo => "position <rad> | velocity <rad/s> | stop",
            DeviceKind::Output => "ON | OFF | position <0-1> | velocity <change/s>",
            DeviceKind::Switch => "read | state?",
            DeviceKind::Analog => "read | value?",
        }
    }

    /// Steppers, servos and outputs.
    pub const fn is_actuator(&self) -> bool {
        matches!(
            self,
            DeviceKind::Stepper | DeviceKind::Servo | DeviceKind::Output
        )
    }

    /// Switches and analog sensors.
    pub const fn is_sensor(&self) -> bool {
        !self.is_actuator()
    }
}

/// Lifecycle state of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceState {
    /// Ready, not moving
    #[default]
    Idle,
    /// Moving, fading, or output on
    Active,
    /// Reading or driver fault
    Error,
    /// Homing in progress
    Calibrating,
    /// Must be enabled before accepting motion
    Disabled,
}

impl DeviceState {
    /// Upper-case name used on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Idle => "IDLE",
            DeviceState::Active => "ACTIVE",
            DeviceState::Error => "ERROR",
            DeviceState::Calibrating => "CALIBRATING",
            DeviceState::Disabled => "DISABLED",
        }
    }
}

// ============================================================================
// Shared State
// ============================================================================

/// Identity and lifecycle shared by every device.
#[derive(Clone, Debug)]
pub struct DeviceCore {
    name: ShortString,
    kind: DeviceKind,
    state: DeviceState,
    enabled: bool,
    last_update_ms: u64,
}

impl DeviceCore {
    /// New core in `state`.
    pub fn new(name: ShortString, kind: DeviceKind, state: DeviceState, enabled: bool) -> Self {
        Self {
            name,
            kind,
            state,
            enabled,
            last_update_ms: 0,
        }
    }

    /// Device name, case-sensitive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device kind.
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Set the lifecycle state.
    pub fn set_state(&mut self, state: DeviceState) {
        self.state = state;
    }

    /// Whether the device accepts motion and output commands.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Time of the last update.
    pub fn last_update_ms(&self) -> u64 {
        self.last_update_ms
    }

    /// Record an update at `now_ms`.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_update_ms = now_ms;
    }

    /// `Name: X, Type: T, State: S, Enabled: YES|NO`
    pub fn status(&self) -> String {
        format!(
            "Name: {}, Type: {}, State: {}, Enabled: {}",
            self.name,
            self.kind.type_name(),
            self.state.as_str(),
            if self.enabled { "YES" } else { "NO" }
        )
    }
}

/// Position and velocity bookkeeping for actuators.
///
/// Units are radians for steppers and servos and normalized duty (0-1)
/// for outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorState {
    /// Where the actuator is now
    pub current_position: f32,
    /// Where it is heading
    pub target_position: f32,
    /// How fast it is moving now
    pub current_velocity: f32,
    /// Commanded velocity in continuous mode
    pub target_velocity: f32,
    /// Velocity limit
    pub max_velocity: f32,
    /// Acceleration limit
    pub acceleration: f32,
}

impl ActuatorState {
    /// Zero position and velocity, keeping the limits.
    pub fn clear_motion(&mut self) {
        self.current_position = 0.0;
        self.target_position = 0.0;
        self.current_velocity = 0.0;
        self.target_velocity = 0.0;
    }

    /// `, Pos: a/b, Vel: c/d, MaxVel: e`
    pub fn status_suffix(&self) -> String {
        format!(
            ", Pos: {:.2}/{:.2}, Vel: {:.2}/{:.2}, MaxVel: {:.2}",
            self.current_position,
            self.target_position,
            self.current_velocity,
            self.target_velocity,
            self.max_velocity
        )
    }
}

/// Latest reading of a sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorValue {
    /// Most recent reading
    pub current: f32,
    /// Reading before that
    pub previous: f32,
    /// Change considered significant
    pub threshold: f32,
    /// Set by a new reading, cleared by the consumer
    pub new_data: bool,
}

impl SensorValue {
    /// No readings yet.
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.abs(),
            ..Self::default()
        }
    }

    /// Store a reading.
    pub fn record(&mut self, value: f32) {
        self.previous = self.current;
        self.current = value;
        self.new_data = true;
    }

    /// Whether the last reading moved by more than the threshold.
    ///
    /// ```
    /// use rs_ramps::devices::SensorValue;
    ///
    /// let mut v = SensorValue::new(10.0);
    /// v.record(5.0);
    /// assert!(!v.has_significant_change());
    /// v.record(20.0);
    /// assert!(v.has_significant_change());
    /// ```
    pub fn has_significant_change(&self) -> bool {
        (self.current - self.previous).abs() > self.threshold
    }

    /// `, Value: v (NEW), Threshold: t`
    pub fn status_suffix(&self) -> String {
        format!(
            ", Value: {:.2}{}, Threshold: {:.2}",
            self.current,
            if self.new_data { " (NEW)" } else { "" },
            self.threshold
        )
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

/// Devices that move: steppers, servos and outputs.
///
/// Write operations fail with [`ErrorCode::InvalidParam`] while the device
/// is disabled and leave its state unchanged.
pub trait Actuator {
    /// Position and velocity bookkeeping.
    fn motion(&self) -> &ActuatorState;

    /// Move to an absolute position.
    fn set_position(&mut self, position: f32, now_ms: u64) -> Result<(), ErrorCode>;

    /// Move continuously at `velocity` (clamped to the limit).
    fn set_velocity(&mut self, velocity: f32, now_ms: u64) -> Result<(), ErrorCode>;

    /// Cancel any target or velocity.
    fn stop(&mut self);

    /// Enable the device.
    fn enable(&mut self);

    /// Stop and disable the device.
    fn disable(&mut self);

    /// Set the acceleration limit.
    fn set_acceleration(&mut self, acceleration: f32);

    /// Current position.
    fn position(&self) -> f32 {
        self.motion().current_position
    }

    /// Current velocity.
    fn velocity(&self) -> f32 {
        self.motion().current_velocity
    }

    /// Acceleration limit.
    fn acceleration(&self) -> f32 {
        self.motion().acceleration
    }
}

/// Devices that read: switches and analog sensors.
pub trait Sensor {
    /// Latest reading.
    fn reading(&self) -> &SensorValue;

    /// Mutable access to the latest reading.
    fn reading_mut(&mut self) -> &mut SensorValue;

    /// Take a fresh sample and return the converted value.
    fn read_value(&mut self, now_ms: u64) -> f32;

    /// Last value without sampling.
    fn value(&self) -> f32 {
        self.reading().current
    }

    /// Whether a reading arrived since the last [`clear_new_data`](Self::clear_new_data).
    fn has_new_data(&self) -> bool {
        self.reading().new_data
    }

    /// Acknowledge the latest reading.
    fn clear_new_data(&mut self) {
        self.reading_mut().new_data = false;
    }

    /// Set the change threshold (absolute value is stored).
    fn set_threshold(&mut self, threshold: f32) {
        self.reading_mut().threshold = threshold.abs();
    }

    /// Whether the last reading moved by more than the threshold.
    fn has_significant_change(&self) -> bool {
        self.reading().has_significant_change()
    }
}

// ============================================================================
// Device Enum
// ============================================================================

/// One device on a board `B`.
pub enum Device<B: Board> {
    /// Stepper axis
    Stepper(Stepper<B::Motion>),
    /// Hobby servo
    Servo(Servo<B::Servo>),
    /// MOSFET output
    Output(Output<B::Pwm>),
    /// Limit switch
    Switch(LimitSwitch<B::Input>),
    /// Analog sensor
    Analog(AnalogSensor<B::Adc>),
}

macro_rules! each_device {
    ($dev:expr, $d:ident => $body:expr) => {
        match $dev {
            Device::Stepper($d) => $body,
            Device::Servo($d) => $body,
            Device::Output($d) => $body,
            Device::Switch($d) => $body,
            Device::Analog($d) => $body,
        }
    };
}

impl<B: Board> Device<B> {
    /// Shared identity and lifecycle.
    pub fn core(&self) -> &DeviceCore {
        each_device!(self, d => d.core())
    }

    /// Device name.
    pub fn name(&self) -> &str {
        self.core().name()
    }

    /// Device kind.
    pub fn kind(&self) -> DeviceKind {
        self.core().kind()
    }

    /// Lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.core().state()
    }

    /// Enabled flag.
    pub fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    /// Advance the device to `now_ms`.
    pub fn update(&mut self, now_ms: u64) {
        each_device!(self, d => d.update(now_ms))
    }

    /// Return to the power-on state.
    pub fn reset(&mut self, now_ms: u64) {
        each_device!(self, d => d.reset(now_ms))
    }

    /// One-line status.
    pub fn status(&self) -> String {
        each_device!(self, d => d.status())
    }

    /// Actuator view, for steppers, servos and outputs.
    pub fn as_actuator(&self) -> Option<&dyn Actuator> {
        match self {
            Device::Stepper(d) => Some(d as &dyn Actuator),
            Device::Servo(d) => Some(d as &dyn Actuator),
            Device::Output(d) => Some(d as &dyn Actuator),
            _ => None,
        }
    }

    /// Mutable actuator view.
    pub fn as_actuator_mut(&mut self) -> Option<&mut dyn Actuator> {
        match self {
            Device::Stepper(d) => Some(d as &mut dyn Actuator),
            Device::Servo(d) => Some(d as &mut dyn Actuator),
            Device::Output(d) => Some(d as &mut dyn Actuator),
            _ => None,
        }
    }

    /// Sensor view, for switches and analog sensors.
    pub fn as_sensor(&self) -> Option<&dyn Sensor> {
        match self {
            Device::Switch(d) => Some(d as &dyn Sensor),
            Device::Analog(d) => Some(d as &dyn Sensor),
            _ => None,
        }
    }

    /// Mutable sensor view.
    pub fn as_sensor_mut(&mut self) -> Option<&mut dyn Sensor> {
        match self {
            Device::Switch(d) => Some(d as &mut dyn Sensor),
            Device::Analog(d) => Some(d as &mut dyn Sensor),
            _ => None,
        }
    }

    /// The stepper, if this is one.
    pub fn as_stepper(&self) -> Option<&Stepper<B::Motion>> {
        match self {
            Device::Stepper(d) => Some(d),
            _ => None,
        }
    }

    /// Mutable stepper.
    pub fn as_stepper_mut(&mut self) -> Option<&mut Stepper<B::Motion>> {
        match self {
            Device::Stepper(d) => Some(d),
            _ => None,
        }
    }

    /// The servo, if this is one.
    pub fn as_servo(&self) -> Option<&Servo<B::Servo>> {
        match self {
            Device::Servo(d) => Some(d),
            _ => None,
        }
    }

    /// The output, if this is one.
    pub fn as_output(&self) -> Option<&Output<B::Pwm>> {
        match self {
            Device::Output(d) => Some(d),
            _ => None,
        }
    }

    /// Mutable output.
    pub fn as_output_mut(&mut self) -> Option<&mut Output<B::Pwm>> {
        match self {
            Device::Output(d) => Some(d),
            _ => None,
        }
    }

    /// The switch, if this is one.
    pub fn as_switch(&self) -> Option<&LimitSwitch<B::Input>> {
        match self {
            Device::Switch(d) => Some(d),
            _ => None,
        }
    }

    /// Mutable switch.
    pub fn as_switch_mut(&mut self) -> Option<&mut LimitSwitch<B::Input>> {
        match self {
            Device::Switch(d) => Some(d),
            _ => None,
        }
    }

    /// The analog sensor, if this is one.
    pub fn as_analog(&self) -> Option<&AnalogSensor<B::Adc>> {
        match self {
            Device::Analog(d) => Some(d),
            _ => None,
        }
    }

    /// Plain-data copy of the device's state.
    pub fn snapshot(&self) -> DeviceSnapshot {
        let core = self.core();
        let motion = self.as_actuator().map(|a| *a.motion());
        let value = self.as_sensor().map(|s| s.value());
        DeviceSnapshot {
            name: core.name.clone(),
            kind: core.kind(),
            state: core.state(),
            enabled: core.is_enabled(),
            position: motion.map(|m| m.current_position),
            velocity: motion.map(|m| m.current_velocity),
            value,
        }
    }
}

/// Serializable view of one device.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceSnapshot {
    /// Device name
    pub name: ShortString,
    /// Device kind
    pub kind: DeviceKind,
    /// Lifecycle state
    pub state: DeviceState,
    /// Enabled flag
    pub enabled: bool,
    /// Actuator position
    pub position: Option<f32>,
    /// Actuator velocity
    pub velocity: Option<f32>,
    /// Sensor value
    pub value: Option<f32>,
}
