//! Hardware abstraction traits for motion drivers, pins, and time.
//!
//! This module defines the boundary between the controller core and the
//! board. Everything below these traits (step pulse timing, servo pulse
//! generation, ADC sampling, pin muxing) is the platform's job.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`MotionDriver`] | Accelerated step/dir motion generator |
//! | [`ServoDriver`] | Hobby servo pulse output |
//! | [`PwmPin`] | 8-bit PWM or digital power output |
//! | [`DigitalInput`] | End-stop input |
//! | [`AnalogInput`] | 10-bit ADC channel |
//! | [`Clock`] | Millisecond time source |
//! | [`Board`] | Factory bundling the driver types of one board |
//!
//! Driver calls are infallible: the board either performs them or the
//! fault surfaces through readings (a switch that never triggers, a
//! thermistor out of range).
//!
//! # Example
//!
//! ```rust
//! use rs_ramps::traits::MotionDriver;
//! use rs_ramps::hal::SimStepper;
//!
//! let mut driver = SimStepper::new();
//! driver.set_max_speed(1000.0);
//! driver.set_acceleration(500.0);
//! driver.move_to(200);
//!
//! for t in 0..=3000 {
//!     driver.run(t);
//! }
//! assert_eq!(driver.current_position(), 200);
//! ```

use crate::config::{AnalogConfig, OutputConfig, ServoConfig, StepperConfig, SwitchConfig};

/// Accelerated stepper motion generator.
///
/// Modelled on the AccelStepper API: targets are absolute step counts,
/// speeds are steps per second, and [`run`](Self::run) must be called
/// often to advance the profile.
pub trait MotionDriver {
    /// Set an absolute target in steps.
    fn move_to(&mut self, target: i64);

    /// Set the speed limit in steps per second.
    fn set_max_speed(&mut self, steps_per_s: f32);

    /// Set acceleration in steps per second squared.
    fn set_acceleration(&mut self, steps_per_s2: f32);

    /// Redefine the current position without moving. Clears any target.
    fn set_current_position(&mut self, position: i64);

    /// Current position in steps.
    fn current_position(&self) -> i64;

    /// Steps remaining to the target (signed).
    fn distance_to_go(&self) -> i64;

    /// Current signed speed in steps per second.
    fn speed(&self) -> f32;

    /// Decelerate to a stop as quickly as acceleration allows.
    fn stop(&mut self);

    /// Stop on the spot without deceleration.
    fn stop_now(&mut self);

    /// Advance the profile to `now_ms`. Returns true while still moving.
    fn run(&mut self, now_ms: u64) -> bool;

    /// Drive the enable line.
    fn set_enabled(&mut self, enabled: bool);
}

/// Hobby servo output.
pub trait ServoDriver {
    /// Start generating pulses.
    fn attach(&mut self);

    /// Stop generating pulses; the servo goes limp.
    fn detach(&mut self);

    /// Command an angle in whole degrees (0-180).
    fn write_angle(&mut self, degrees: u8);
}

/// Power output pin.
pub trait PwmPin {
    /// Write a duty cycle, 0 = off, 255 = fully on.
    fn write_duty(&mut self, duty: u8);
}

/// Digital input pin.
pub trait DigitalInput {
    /// Electrical level of the pin.
    fn is_high(&mut self) -> bool;
}

/// Analog input channel.
pub trait AnalogInput {
    /// Raw conversion, 0 to [`ANALOG_MAX_VALUE`](crate::config::ANALOG_MAX_VALUE).
    fn read(&mut self) -> u16;
}

/// Time source trait.
///
/// The controller never reads time itself; callers pass `now_ms` into
/// every time-dependent method, typically from a `Clock`.
///
/// # Example
///
/// ```rust
/// use rs_ramps::traits::Clock;
/// use rs_ramps::hal::MockClock;
///
/// let clock = MockClock::new();
/// assert_eq!(clock.now_ms(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
pub trait Clock {
    /// Returns current time in milliseconds since an arbitrary epoch.
    ///
    /// Must be monotonically increasing.
    fn now_ms(&self) -> u64;
}

/// A board: one driver type per device kind, plus constructors from the
/// device table.
///
/// [`Controller::new`](crate::Controller::new) asks the board for a
/// driver for every configured device, in table order.
pub trait Board {
    /// Stepper motion generator
    type Motion: MotionDriver;
    /// Servo output
    type Servo: ServoDriver;
    /// Power output
    type Pwm: PwmPin;
    /// Limit switch input
    type Input: DigitalInput;
    /// Analog channel
    type Adc: AnalogInput;

    /// Driver for a stepper axis.
    fn stepper_driver(&mut self, cfg: &StepperConfig) -> Self::Motion;
    /// Driver for a servo.
    fn servo_driver(&mut self, cfg: &ServoConfig) -> Self::Servo;
    /// Pin for a power output.
    fn output_pin(&mut self, cfg: &OutputConfig) -> Self::Pwm;
    /// Pin for a limit switch.
    fn switch_input(&mut self, cfg: &SwitchConfig) -> Self::Input;
    /// Channel for an analog sensor.
    fn analog_input(&mut self, cfg: &AnalogConfig) -> Self::Adc;
}
