//! Hobby servo with timed, linear moves.
//!
//! Angles are kept in degrees internally and exposed in radians. A move
//! is scheduled from the current angle to the target at the sweep speed;
//! [`Servo::update`] interpolates and writes the angle until it arrives.

use alloc::string::String;

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use super::{Actuator, ActuatorState, DeviceCore, DeviceKind, DeviceState};
use crate::config::ServoConfig;
use crate::error::ErrorCode;
use crate::traits::ServoDriver;

/// Mechanical travel of a hobby servo in degrees.
pub const SERVO_TRAVEL_DEG: f32 = 180.0;

#[derive(Debug, Clone, Copy)]
struct Sweep {
    from: f32,
    to: f32,
    start_ms: u64,
    duration_ms: u64,
}

/// A servo motor.
///
/// Starts centred between its limits, attached and enabled.
///
/// # Example
///
/// ```rust
/// use rs_ramps::config::ServoConfig;
/// use rs_ramps::devices::{Actuator, Servo};
/// use rs_ramps::hal::MockServo;
///
/// let pulses = MockServo::new();
/// let mut gripper = Servo::new(&ServoConfig::new("GRIPPER"), pulses.clone());
/// assert_eq!(pulses.angle(), 90);
///
/// // 90° at the default 1 rad/s takes about 1.57 s
/// gripper.set_position(0.0, 0).unwrap();
/// gripper.update(785);
/// assert!((pulses.angle() as i32 - 45).abs() <= 1);
/// gripper.update(1600);
/// assert_eq!(pulses.angle(), 0);
/// ```
#[derive(Debug)]
pub struct Servo<S: ServoDriver> {
    core: DeviceCore,
    motion: ActuatorState,
    driver: S,
    min_angle: f32,
    max_angle: f32,
    default_speed: f32,
    speed: f32,
    angle: f32,
    sweep: Option<Sweep>,
}

impl<S: ServoDriver> Servo<S> {
    /// Attach `driver` and centre the servo.
    pub fn new(cfg: &ServoConfig, mut driver: S) -> Self {
        let default_speed = cfg.speed.abs().to_degrees();
        driver.attach();
        let mut servo = Self {
            core: DeviceCore::new(cfg.name.clone(), DeviceKind::Servo, DeviceState::Idle, true),
            motion: ActuatorState {
                max_velocity: cfg.speed.abs(),
                ..ActuatorState::default()
            },
            driver,
            min_angle: 0.0,
            max_angle: SERVO_TRAVEL_DEG,
            default_speed,
            speed: default_speed,
            angle: 0.0,
            sweep: None,
        };
        servo.set_angle_limits(cfg.min_angle, cfg.max_angle);
        servo.jump_to(servo.center());
        servo
    }

    /// Shared identity and lifecycle.
    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// Current angle in degrees.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Travel limits in degrees.
    pub fn angle_limits(&self) -> (f32, f32) {
        (self.min_angle, self.max_angle)
    }

    /// Sweep speed in degrees per second.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Whether a sweep is in progress.
    pub fn is_moving(&self) -> bool {
        self.sweep.is_some()
    }

    /// Set travel limits, clamped to the servo's range and put in order.
    pub fn set_angle_limits(&mut self, min_angle: f32, max_angle: f32) {
        let a = min_angle.clamp(0.0, SERVO_TRAVEL_DEG);
        let b = max_angle.clamp(0.0, SERVO_TRAVEL_DEG);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.min_angle = lo;
        self.max_angle = hi;
    }

    /// Advance the sweep and write the angle.
    pub fn update(&mut self, now_ms: u64) {
        if let Some(sweep) = self.sweep {
            let elapsed = now_ms.saturating_sub(sweep.start_ms);
            if elapsed >= sweep.duration_ms {
                self.sweep = None;
                self.angle = sweep.to;
                self.motion.current_velocity = 0.0;
                if self.core.state() == DeviceState::Active {
                    self.core.set_state(DeviceState::Idle);
                }
            } else {
                let t = elapsed as f32 / sweep.duration_ms as f32;
                self.angle = sweep.from + (sweep.to - sweep.from) * t;
            }
            self.write_angle();
            self.motion.current_position = self.angle.to_radians();
        }
        self.core.touch(now_ms);
    }

    /// Recentre, restore the default speed and enable.
    pub fn reset(&mut self, now_ms: u64) {
        self.sweep = None;
        self.speed = self.default_speed;
        self.motion.clear_motion();
        if !self.core.is_enabled() {
            self.driver.attach();
            self.core.set_enabled(true);
        }
        self.jump_to(self.center());
        self.core.set_state(DeviceState::Idle);
        self.core.touch(now_ms);
    }

    /// Device status line.
    pub fn status(&self) -> String {
        let mut status = self.core.status();
        status.push_str(&self.motion.status_suffix());
        status
    }

    fn center(&self) -> f32 {
        (self.min_angle + self.max_angle) / 2.0
    }

    fn jump_to(&mut self, degrees: f32) {
        self.angle = degrees;
        self.motion.current_position = degrees.to_radians();
        self.motion.target_position = self.motion.current_position;
        self.write_angle();
    }

    fn write_angle(&mut self) {
        let degrees = self.angle.clamp(0.0, SERVO_TRAVEL_DEG) as u8;
        self.driver.write_angle(degrees);
    }

    fn sweep_to(&mut self, degrees: f32, now_ms: u64) {
        let target = degrees.clamp(self.min_angle, self.max_angle);
        self.motion.target_position = target.to_radians();

        let delta = target - self.angle;
        let duration_ms = if self.speed > 0.0 {
            (delta.abs() / self.speed * 1000.0) as u64
        } else {
            0
        };

        if duration_ms == 0 {
            self.sweep = None;
            self.jump_to(target);
            self.motion.current_velocity = 0.0;
            if self.core.state() == DeviceState::Active {
                self.core.set_state(DeviceState::Idle);
            }
            return;
        }

        self.sweep = Some(Sweep {
            from: self.angle,
            to: target,
            start_ms: now_ms,
            duration_ms,
        });
        let direction = if delta > 0.0 { 1.0 } else { -1.0 };
        self.motion.current_velocity = direction * self.speed.to_radians();
        self.core.set_state(DeviceState::Active);
    }
}

impl<S: ServoDriver> Actuator for Servo<S> {
    fn motion(&self) -> &ActuatorState {
        &self.motion
    }

    fn set_position(&mut self, position: f32, now_ms: u64) -> Result<(), ErrorCode> {
        if !self.core.is_enabled() {
            return Err(ErrorCode::InvalidParam);
        }
        self.motion.target_velocity = 0.0;
        self.sweep_to(position.to_degrees(), now_ms);
        Ok(())
    }

    fn set_velocity(&mut self, velocity: f32, now_ms: u64) -> Result<(), ErrorCode> {
        if !self.core.is_enabled() {
            return Err(ErrorCode::InvalidParam);
        }
        if velocity == 0.0 {
            self.stop();
            return Ok(());
        }
        self.speed = velocity.abs().to_degrees();
        self.motion.target_velocity = velocity;
        let limit = if velocity > 0.0 {
            self.max_angle
        } else {
            self.min_angle
        };
        self.sweep_to(limit, now_ms);
        Ok(())
    }

    fn stop(&mut self) {
        self.sweep = None;
        self.motion.target_position = self.motion.current_position;
        self.motion.current_velocity = 0.0;
        self.motion.target_velocity = 0.0;
        if self.core.state() == DeviceState::Active {
            self.core.set_state(DeviceState::Idle);
        }
    }

    fn enable(&mut self) {
        self.driver.attach();
        self.core.set_enabled(true);
        if self.core.state() == DeviceState::Disabled {
            self.core.set_state(DeviceState::Idle);
        }
    }

    fn disable(&mut self) {
        self.stop();
        self.driver.detach();
        self.core.set_enabled(false);
        self.core.set_state(DeviceState::Disabled);
    }

    fn set_acceleration(&mut self, acceleration: f32) {
        self.motion.acceleration = acceleration.abs();
    }
}
