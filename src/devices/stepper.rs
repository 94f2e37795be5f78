//! Stepper axis driven through a [`MotionDriver`].
//!
//! Positions are radians, converted to steps with
//! `steps_per_unit = steps_per_rev / 2π`. Position mode and velocity mode
//! are exclusive: a non-zero velocity aims the driver at a far-away target
//! in the velocity's direction and holds the speed until told otherwise.

use alloc::string::String;
use core::f32::consts::TAU;

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use super::{Actuator, ActuatorState, DeviceCore, DeviceKind, DeviceState};
use crate::config::{Axis, ShortString, StepperConfig};
use crate::error::ErrorCode;
use crate::traits::MotionDriver;

/// Step target used to emulate continuous rotation.
pub const CONTINUOUS_TARGET_STEPS: i64 = i32::MAX as i64;

/// A stepper axis.
///
/// Starts disabled with the driver's enable line off.
///
/// # Example
///
/// ```rust
/// use rs_ramps::config::StepperConfig;
/// use rs_ramps::devices::{Actuator, DeviceState, Stepper};
/// use rs_ramps::hal::SimStepper;
///
/// let mut x = Stepper::new(&StepperConfig::new("X"), SimStepper::new());
/// assert!(x.set_position(1.0, 0).is_err());
///
/// x.enable();
/// x.set_position(1.0, 0).unwrap();
/// assert_eq!(x.core().state(), DeviceState::Active);
///
/// for t in 0..=10_000 {
///     x.update(t);
/// }
/// assert!(x.is_at_target());
/// assert!((x.position() - 1.0).abs() < 0.01);
/// ```
#[derive(Debug)]
pub struct Stepper<M: MotionDriver> {
    core: DeviceCore,
    motion: ActuatorState,
    driver: M,
    steps_per_unit: f32,
    velocity_mode: bool,
    axis: Option<Axis>,
    home_switch: Option<ShortString>,
}

impl<M: MotionDriver> Stepper<M> {
    /// Configure `driver` from `cfg` and start disabled.
    pub fn new(cfg: &StepperConfig, mut driver: M) -> Self {
        let steps_per_unit = cfg.steps_per_rev.max(1) as f32 / TAU;
        driver.set_max_speed(cfg.max_speed);
        driver.set_acceleration(cfg.acceleration);
        driver.set_enabled(false);

        Self {
            core: DeviceCore::new(
                cfg.name.clone(),
                DeviceKind::Stepper,
                DeviceState::Disabled,
                false,
            ),
            motion: ActuatorState {
                max_velocity: cfg.max_speed / steps_per_unit,
                acceleration: cfg.acceleration / steps_per_unit,
                ..ActuatorState::default()
            },
            driver,
            steps_per_unit,
            velocity_mode: false,
            axis: cfg.axis,
            home_switch: cfg.home_switch.clone(),
        }
    }

    /// Shared identity and lifecycle.
    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// The motion driver.
    pub fn driver(&self) -> &M {
        &self.driver
    }

    /// Steps per radian.
    pub fn steps_per_unit(&self) -> f32 {
        self.steps_per_unit
    }

    /// Homing axis from the configuration.
    pub fn axis(&self) -> Option<Axis> {
        self.axis
    }

    /// Home switch name from the configuration.
    pub fn home_switch(&self) -> Option<&str> {
        self.home_switch.as_deref()
    }

    /// Whether a non-zero velocity is being held.
    pub fn is_velocity_mode(&self) -> bool {
        self.velocity_mode
    }

    /// Driver position in steps.
    pub fn position_steps(&self) -> i64 {
        self.driver.current_position()
    }

    /// Whether the driver still has distance or speed.
    pub fn is_moving(&self) -> bool {
        self.driver.distance_to_go() != 0 || self.driver.speed() != 0.0
    }

    /// Steps to radians, truncating toward zero in the step domain.
    pub fn steps_to_units(&self, steps: i64) -> f32 {
        steps as f32 / self.steps_per_unit
    }

    /// Radians to whole steps, truncating toward zero.
    ///
    /// The result is clamped to [`CONTINUOUS_TARGET_STEPS`] either way.
    pub fn units_to_steps(&self, units: f32) -> i64 {
        ((units * self.steps_per_unit) as i64)
            .clamp(-CONTINUOUS_TARGET_STEPS, CONTINUOUS_TARGET_STEPS)
    }

    /// Whether the axis has arrived.
    ///
    /// In velocity mode this means the driver speed matches the commanded
    /// velocity.
    pub fn is_at_target(&self) -> bool {
        if self.velocity_mode {
            (self.motion.current_velocity - self.motion.target_velocity).abs() < 0.1
        } else {
            self.driver.distance_to_go() == 0
        }
    }

    /// Set the velocity limit in rad/s.
    pub fn set_max_velocity(&mut self, max_velocity: f32) {
        self.motion.max_velocity = max_velocity.abs();
        self.driver
            .set_max_speed(self.motion.max_velocity * self.steps_per_unit);
    }

    /// Declare the current position to be zero.
    pub fn set_zero(&mut self) {
        self.driver.set_current_position(0);
        self.motion.current_position = 0.0;
        self.motion.target_position = 0.0;
    }

    /// Move to an absolute step position.
    pub fn move_to_steps(&mut self, steps: i64) -> Result<(), ErrorCode> {
        if !self.core.is_enabled() {
            return Err(ErrorCode::InvalidParam);
        }
        self.velocity_mode = false;
        self.motion.target_velocity = 0.0;
        self.driver
            .set_max_speed(self.motion.max_velocity * self.steps_per_unit);
        self.driver.move_to(steps);
        self.motion.target_position = self.steps_to_units(steps);
        self.mark_active();
        Ok(())
    }

    /// Halt without deceleration.
    pub fn emergency_stop(&mut self) {
        self.driver.stop_now();
        self.velocity_mode = false;
        self.motion.current_velocity = 0.0;
        self.motion.target_velocity = 0.0;
        self.motion.current_position = self.steps_to_units(self.driver.current_position());
        self.motion.target_position = self.motion.current_position;
        if self.core.state() == DeviceState::Active {
            self.core.set_state(DeviceState::Idle);
        }
    }

    /// Enter homing: enable the axis and mark it calibrating.
    pub fn begin_calibration(&mut self) {
        self.enable();
        self.core.set_state(DeviceState::Calibrating);
    }

    /// Leave homing.
    pub fn end_calibration(&mut self) {
        if self.core.state() == DeviceState::Calibrating {
            self.core.set_state(DeviceState::Idle);
        }
    }

    /// Advance the driver and refresh position, velocity and state.
    pub fn update(&mut self, now_ms: u64) {
        self.driver.run(now_ms);
        self.motion.current_position = self.steps_to_units(self.driver.current_position());
        self.motion.current_velocity = self.driver.speed() / self.steps_per_unit;

        if matches!(self.core.state(), DeviceState::Idle | DeviceState::Active) {
            let busy = if self.velocity_mode {
                self.motion.target_velocity != 0.0 || self.driver.speed() != 0.0
            } else {
                self.driver.distance_to_go() != 0
            };
            self.core.set_state(if busy {
                DeviceState::Active
            } else {
                DeviceState::Idle
            });
        }
        self.core.touch(now_ms);
    }

    /// Zero the axis and disable it.
    pub fn reset(&mut self, now_ms: u64) {
        self.driver.stop_now();
        self.driver.set_current_position(0);
        self.driver.set_enabled(false);
        self.velocity_mode = false;
        self.motion.clear_motion();
        self.core.set_enabled(false);
        self.core.set_state(DeviceState::Disabled);
        self.core.touch(now_ms);
    }

    /// Device status line.
    pub fn status(&self) -> String {
        let mut status = self.core.status();
        status.push_str(&self.motion.status_suffix());
        status
    }

    fn mark_active(&mut self) {
        if self.core.state() != DeviceState::Calibrating {
            self.core.set_state(DeviceState::Active);
        }
    }
}

impl<M: MotionDriver> Actuator for Stepper<M> {
    fn motion(&self) -> &ActuatorState {
        &self.motion
    }

    fn set_position(&mut self, position: f32, _now_ms: u64) -> Result<(), ErrorCode> {
        let steps = self.units_to_steps(position);
        self.move_to_steps(steps)?;
        self.motion.target_position = position;
        Ok(())
    }

    fn set_velocity(&mut self, velocity: f32, _now_ms: u64) -> Result<(), ErrorCode> {
        if !self.core.is_enabled() {
            return Err(ErrorCode::InvalidParam);
        }
        let max = self.motion.max_velocity;
        let velocity = velocity.clamp(-max, max);
        self.motion.target_velocity = velocity;
        self.velocity_mode = true;

        if velocity == 0.0 {
            self.driver.stop();
        } else {
            self.driver
                .set_max_speed(velocity.abs() * self.steps_per_unit);
            self.driver.move_to(if velocity > 0.0 {
                CONTINUOUS_TARGET_STEPS
            } else {
                -CONTINUOUS_TARGET_STEPS
            });
            self.mark_active();
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.driver.stop();
        self.velocity_mode = false;
        self.motion.target_velocity = 0.0;
        let target = self.driver.current_position() + self.driver.distance_to_go();
        self.motion.target_position = self.steps_to_units(target);
        if self.core.state() == DeviceState::Active {
            self.core.set_state(DeviceState::Idle);
        }
    }

    fn enable(&mut self) {
        self.driver.set_enabled(true);
        self.core.set_enabled(true);
        if self.core.state() == DeviceState::Disabled {
            self.core.set_state(DeviceState::Idle);
        }
    }

    fn disable(&mut self) {
        self.stop();
        self.driver.set_enabled(false);
        self.core.set_enabled(false);
        self.core.set_state(DeviceState::Disabled);
    }

    fn set_acceleration(&mut self, acceleration: f32) {
        self.motion.acceleration = acceleration.abs();
        self.driver
            .set_acceleration(self.motion.acceleration * self.steps_per_unit);
    }
}
