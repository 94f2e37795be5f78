//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for all hardware and transport traits,
//! enabling development and testing on desktop without a board attached.
//!
//! Pin mocks are cheap handles over shared cells: cloning one gives a
//! second handle to the same pin, so a test can keep a handle while the
//! controller owns the other.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`SimStepper`] | [`MotionDriver`] | Kinematic stepper with acceleration |
//! | [`MockServo`] | [`ServoDriver`] | Records attach state and last angle |
//! | [`MockPwm`] | [`PwmPin`] | Records last duty cycle |
//! | [`MockInput`] | [`DigitalInput`] | Settable pin level |
//! | [`MockAdc`] | [`AnalogInput`] | Settable conversion result |
//! | [`MockClock`] | [`Clock`] | Controllable time source |
//! | [`MockSerial`] | [`SerialPort`] | Scripted input, captured output |
//! | [`MockBoard`] | [`Board`] | Hands out the mocks above by device name |
//!
//! # Example
//!
//! ```rust
//! use rs_ramps::{Command, Config, Controller};
//! use rs_ramps::hal::MockBoard;
//!
//! let mut board = MockBoard::new();
//! let mut controller = Controller::new(&Config::default(), &mut board);
//!
//! let fan = board.pwm("FAN").unwrap();
//! let reply = controller.dispatch(&"FAN ON".parse::<Command>().unwrap(), 0);
//! assert_eq!(reply.encode(), "FAN state ON OK");
//! assert_eq!(fan.duty(), 255);
//! ```
//!
//! [`MotionDriver`]: crate::traits::MotionDriver
//! [`ServoDriver`]: crate::traits::ServoDriver
//! [`PwmPin`]: crate::traits::PwmPin
//! [`DigitalInput`]: crate::traits::DigitalInput
//! [`AnalogInput`]: crate::traits::AnalogInput
//! [`Clock`]: crate::traits::Clock
//! [`SerialPort`]: crate::traits::SerialPort
//! [`Board`]: crate::traits::Board

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;

use crate::config::{
    AnalogConfig, OutputConfig, ServoConfig, ShortString, StepperConfig, SwitchConfig,
};
use crate::motion::Ramp;
use crate::traits::{
    AnalogInput, Board, Clock, DigitalInput, MotionDriver, PwmPin, SerialPort, ServoDriver,
};

// ============================================================================
// Hardware Mocks
// ============================================================================

/// Simulated stepper driver.
///
/// Integrates a [`Ramp`] profile on every [`run`](MotionDriver::run) call,
/// so positions evolve with time the way a real AccelStepper-driven axis
/// would.
///
/// # Example
///
/// ```rust
/// use rs_ramps::hal::SimStepper;
/// use rs_ramps::traits::MotionDriver;
///
/// let mut stepper = SimStepper::new();
/// stepper.set_max_speed(100.0);
/// stepper.set_acceleration(0.0);
/// stepper.move_to(-10);
///
/// stepper.run(0);
/// assert!(stepper.run(50));
/// assert_eq!(stepper.current_position(), -5);
/// assert!(!stepper.run(100));
/// assert_eq!(stepper.current_position(), -10);
/// ```
#[derive(Debug, Default, Clone)]
pub struct SimStepper {
    ramp: Ramp,
    /// Level of the enable line.
    pub enabled: bool,
    /// Number of `run` calls.
    pub run_count: usize,
}

impl SimStepper {
    /// Creates a stepper at position 0 with a 1 step/s limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current target in steps.
    pub fn target_position(&self) -> i64 {
        self.ramp.target_position()
    }

    /// Configured speed limit in steps per second.
    pub fn max_speed(&self) -> f32 {
        self.ramp.max_speed()
    }
}

impl MotionDriver for SimStepper {
    fn move_to(&mut self, target: i64) {
        self.ramp.move_to(target);
    }

    fn set_max_speed(&mut self, steps_per_s: f32) {
        self.ramp.set_max_speed(steps_per_s);
    }

    fn set_acceleration(&mut self, steps_per_s2: f32) {
        self.ramp.set_acceleration(steps_per_s2);
    }

    fn set_current_position(&mut self, position: i64) {
        self.ramp.set_current_position(position);
    }

    fn current_position(&self) -> i64 {
        self.ramp.current_position()
    }

    fn distance_to_go(&self) -> i64 {
        self.ramp.distance_to_go()
    }

    fn speed(&self) -> f32 {
        self.ramp.speed()
    }

    fn stop(&mut self) {
        self.ramp.stop();
    }

    fn stop_now(&mut self) {
        self.ramp.stop_now();
    }

    fn run(&mut self, now_ms: u64) -> bool {
        self.run_count += 1;
        self.ramp.advance(now_ms);
        self.ramp.is_running()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Mock servo output.
///
/// # Example
///
/// ```rust
/// use rs_ramps::hal::MockServo;
/// use rs_ramps::traits::ServoDriver;
///
/// let servo = MockServo::new();
/// let mut driver = servo.clone();
/// driver.attach();
/// driver.write_angle(45);
///
/// assert!(servo.is_attached());
/// assert_eq!(servo.angle(), 45);
/// assert_eq!(servo.write_count(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockServo {
    attached: Rc<Cell<bool>>,
    angle: Rc<Cell<u8>>,
    writes: Rc<Cell<usize>>,
}

impl MockServo {
    /// Creates a detached servo at 0°.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether pulses are being generated.
    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    /// Last commanded angle in degrees.
    pub fn angle(&self) -> u8 {
        self.angle.get()
    }

    /// Number of `write_angle` calls.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl ServoDriver for MockServo {
    fn attach(&mut self) {
        self.attached.set(true);
    }

    fn detach(&mut self) {
        self.attached.set(false);
    }

    fn write_angle(&mut self, degrees: u8) {
        self.angle.set(degrees);
        self.writes.set(self.writes.get() + 1);
    }
}

/// Mock power output pin.
#[derive(Debug, Default, Clone)]
pub struct MockPwm {
    duty: Rc<Cell<u8>>,
}

impl MockPwm {
    /// Creates a pin at duty 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written duty cycle.
    pub fn duty(&self) -> u8 {
        self.duty.get()
    }
}

impl PwmPin for MockPwm {
    fn write_duty(&mut self, duty: u8) {
        self.duty.set(duty);
    }
}

/// Mock digital input.
///
/// # Example
///
/// ```rust
/// use rs_ramps::hal::MockInput;
/// use rs_ramps::traits::DigitalInput;
///
/// let pin = MockInput::new();
/// let mut reader = pin.clone();
/// assert!(!reader.is_high());
///
/// pin.set_high();
/// assert!(reader.is_high());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockInput {
    level: Rc<Cell<bool>>,
}

impl MockInput {
    /// Creates a pin reading low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the pin high.
    pub fn set_high(&self) {
        self.level.set(true);
    }

    /// Drive the pin low.
    pub fn set_low(&self) {
        self.level.set(false);
    }

    /// Drive the pin to `high`.
    pub fn set(&self, high: bool) {
        self.level.set(high);
    }

    /// Current level.
    pub fn level(&self) -> bool {
        self.level.get()
    }
}

impl DigitalInput for MockInput {
    fn is_high(&mut self) -> bool {
        self.level.get()
    }
}

/// Mock ADC channel.
#[derive(Debug, Default, Clone)]
pub struct MockAdc {
    value: Rc<Cell<u16>>,
}

impl MockAdc {
    /// Creates a channel reading 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel with an initial reading.
    pub fn with_value(self, raw: u16) -> Self {
        self.value.set(raw);
        self
    }

    /// Set the next conversion result.
    pub fn set(&self, raw: u16) {
        self.value.set(raw);
    }
}

impl AnalogInput for MockAdc {
    fn read(&mut self) -> u16 {
        self.value.get()
    }
}

/// Mock clock for testing.
///
/// Time only moves when told to, except in auto-advance mode where every
/// read moves it forward by a fixed step. Auto-advance lets blocking
/// helpers such as
/// [`Controller::calibrate_blocking`](crate::Controller::calibrate_blocking)
/// run to completion in a test.
///
/// # Example
///
/// ```rust
/// use rs_ramps::hal::MockClock;
/// use rs_ramps::traits::Clock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
///
/// let ticking = MockClock::new().with_auto_advance(10);
/// assert_eq!(ticking.now_ms(), 0);
/// assert_eq!(ticking.now_ms(), 10);
/// ```
#[derive(Debug, Default)]
pub struct MockClock {
    current_ms: Cell<u64>,
    auto_step_ms: u64,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `step_ms` after every read.
    pub fn with_auto_advance(mut self, step_ms: u64) -> Self {
        self.auto_step_ms = step_ms;
        self
    }

    /// Sets the current time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.current_ms.set(ms);
    }

    /// Advances time by the specified milliseconds.
    pub fn advance(&self, ms: u64) {
        self.current_ms.set(self.current_ms.get() + ms);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        let now = self.current_ms.get();
        self.current_ms.set(now + self.auto_step_ms);
        now
    }
}

// ============================================================================
// Transport Mocks
// ============================================================================

/// Mock serial link.
///
/// # Example
///
/// ```rust
/// use rs_ramps::hal::MockSerial;
/// use rs_ramps::traits::SerialPort;
///
/// let mut serial = MockSerial::new();
/// serial.push_input("PING\n");
/// assert_eq!(serial.read_byte(), Some(b'P'));
///
/// serial.write_line("PONG");
/// assert_eq!(serial.take_output(), vec!["PONG".to_string()]);
/// assert!(serial.take_output().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MockSerial {
    input: VecDeque<u8>,
    /// Lines written so far.
    pub output: Vec<String>,
}

impl MockSerial {
    /// Creates an idle link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if sent by the host.
    pub fn push_input(&mut self, text: &str) {
        self.input.extend(text.bytes());
    }

    /// Queue raw bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Bytes not yet read.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Drain written lines.
    pub fn take_output(&mut self) -> Vec<String> {
        core::mem::take(&mut self.output)
    }
}

impl SerialPort for MockSerial {
    fn read_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write_line(&mut self, line: &str) {
        self.output.push(String::from(line));
    }
}

// ============================================================================
// Board
// ============================================================================

/// Simulated board.
///
/// Every driver handed to the controller is also remembered by device name,
/// so tests can press switches, set ADC readings, and inspect outputs.
#[derive(Debug, Default)]
pub struct MockBoard {
    servos: Vec<(ShortString, MockServo)>,
    pwms: Vec<(ShortString, MockPwm)>,
    inputs: Vec<(ShortString, MockInput)>,
    adcs: Vec<(ShortString, MockAdc)>,
    /// Initial reading for newly created ADC channels.
    pub default_adc: u16,
}

fn find<T: Clone>(list: &[(ShortString, T)], name: &str) -> Option<T> {
    list.iter()
        .find(|(n, _)| n.as_str() == name)
        .map(|(_, h)| h.clone())
}

impl MockBoard {
    /// Creates a board with ADC channels reading mid-scale.
    pub fn new() -> Self {
        Self {
            default_adc: 512,
            ..Self::default()
        }
    }

    /// Handle to the servo created for `name`.
    pub fn servo(&self, name: &str) -> Option<MockServo> {
        find(&self.servos, name)
    }

    /// Handle to the output pin created for `name`.
    pub fn pwm(&self, name: &str) -> Option<MockPwm> {
        find(&self.pwms, name)
    }

    /// Handle to the switch input created for `name`.
    pub fn input(&self, name: &str) -> Option<MockInput> {
        find(&self.inputs, name)
    }

    /// Handle to the ADC channel created for `name`.
    pub fn adc(&self, name: &str) -> Option<MockAdc> {
        find(&self.adcs, name)
    }
}

impl Board for MockBoard {
    type Motion = SimStepper;
    type Servo = MockServo;
    type Pwm = MockPwm;
    type Input = MockInput;
    type Adc = MockAdc;

    fn stepper_driver(&mut self, _cfg: &StepperConfig) -> SimStepper {
        SimStepper::new()
    }

    fn servo_driver(&mut self, cfg: &ServoConfig) -> MockServo {
        let servo = MockServo::new();
        self.servos.push((cfg.name.clone(), servo.clone()));
        servo
    }

    fn output_pin(&mut self, cfg: &OutputConfig) -> MockPwm {
        let pwm = MockPwm::new();
        self.pwms.push((cfg.name.clone(), pwm.clone()));
        pwm
    }

    fn switch_input(&mut self, cfg: &SwitchConfig) -> MockInput {
        let input = MockInput::new();
        // an open switch on a pulled-up line idles high
        if cfg.pullup && cfg.inverted {
            input.set_high();
        }
        self.inputs.push((cfg.name.clone(), input.clone()));
        input
    }

    fn analog_input(&mut self, cfg: &AnalogConfig) -> MockAdc {
        let adc = MockAdc::new().with_value(self.default_adc);
        self.adcs.push((cfg.name.clone(), adc.clone()));
        adc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceTable;

    #[test]
    fn board_remembers_handles_by_name() {
        let mut board = MockBoard::new();
        let table = DeviceTable::default();
        for cfg in &table.outputs {
            board.output_pin(cfg);
        }
        for cfg in &table.switches {
            board.switch_input(cfg);
        }

        assert!(board.pwm("FAN").is_some());
        assert!(board.input("X_MIN").is_some());
        assert!(board.pwm("GHOST").is_none());
        assert!(board.servo("FAN").is_none());
    }

    #[test]
    fn handles_share_state() {
        let mut board = MockBoard::new();
        let mut pin = board.output_pin(&OutputConfig::new("LIGHT"));
        pin.write_duty(128);
        assert_eq!(board.pwm("LIGHT").unwrap().duty(), 128);
    }

    #[test]
    fn inverted_pullup_switch_idles_high() {
        let mut board = MockBoard::new();
        let mut open = board.switch_input(&SwitchConfig::new("A").with_inverted(true));
        let mut plain = board.switch_input(&SwitchConfig::new("B"));
        assert!(open.is_high());
        assert!(!plain.is_high());
    }

    #[test]
    fn adc_starts_at_board_default() {
        let mut board = MockBoard::new();
        board.default_adc = 300;
        let mut adc = board.analog_input(&AnalogConfig::new("TEMP"));
        assert_eq!(adc.read(), 300);
        board.adc("TEMP").unwrap().set(10);
        assert_eq!(adc.read(), 10);
    }

    #[test]
    fn sim_stepper_records_enable_line() {
        let mut stepper = SimStepper::new();
        assert!(!stepper.enabled);
        stepper.set_enabled(true);
        assert!(stepper.enabled);
    }

    #[test]
    fn clock_auto_advance() {
        let clock = MockClock::new().with_auto_advance(5);
        clock.set(100);
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(clock.now_ms(), 105);
        clock.advance(1000);
        assert_eq!(clock.now_ms(), 1110);
    }
}
