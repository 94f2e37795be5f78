//! MOSFET power output (heater, fan, light, pump).
//!
//! Position is the duty cycle normalized to 0-1. Writes take effect on the
//! pin immediately; a velocity fades the duty linearly from
//! [`Output::update`] until it saturates.

use alloc::format;
use alloc::string::String;

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use super::{Actuator, ActuatorState, DeviceCore, DeviceKind, DeviceState};
use crate::config::OutputConfig;
use crate::error::ErrorCode;
use crate::traits::PwmPin;

/// Full-scale duty.
pub const DUTY_MAX: u8 = 255;

/// Convert a normalized level to a duty cycle, truncating.
pub fn level_to_duty(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * DUTY_MAX as f32) as u8
}

/// A power output.
///
/// # Example
///
/// ```rust
/// use rs_ramps::config::OutputConfig;
/// use rs_ramps::devices::{Actuator, Output};
/// use rs_ramps::hal::MockPwm;
///
/// let pin = MockPwm::new();
/// let mut fan = Output::new(&OutputConfig::new("FAN"), pin.clone());
///
/// fan.set_position(0.5, 0).unwrap();
/// assert_eq!(pin.duty(), 127);
///
/// // fade to full at 0.5 per second
/// fan.set_velocity(0.5, 0).unwrap();
/// fan.update(1200);
/// assert_eq!(pin.duty(), 255);
/// assert_eq!(fan.motion().target_velocity, 0.0);
/// ```
#[derive(Debug)]
pub struct Output<P: PwmPin> {
    core: DeviceCore,
    motion: ActuatorState,
    pin: P,
    pwm: bool,
    duty: u8,
    last_fade_ms: u64,
}

impl<P: PwmPin> Output<P> {
    /// Drive `pin` low and enable the output.
    pub fn new(cfg: &OutputConfig, mut pin: P) -> Self {
        pin.write_duty(0);
        Self {
            core: DeviceCore::new(cfg.name.clone(), DeviceKind::Output, DeviceState::Idle, true),
            motion: ActuatorState {
                max_velocity: cfg.max_velocity.abs(),
                ..ActuatorState::default()
            },
            pin,
            pwm: cfg.pwm,
            duty: 0,
            last_fade_ms: 0,
        }
    }

    /// Shared identity and lifecycle.
    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// Duty cycle last written to the pin.
    pub fn duty(&self) -> u8 {
        self.duty
    }

    /// Whether the output is driven at all.
    pub fn is_on(&self) -> bool {
        self.duty > 0
    }

    /// Whether the pin supports intermediate duty cycles.
    pub fn supports_pwm(&self) -> bool {
        self.pwm
    }

    /// Write a duty cycle, cancelling any fade.
    pub fn set_pwm(&mut self, duty: u8) -> Result<(), ErrorCode> {
        if !self.core.is_enabled() {
            return Err(ErrorCode::InvalidParam);
        }
        self.clear_fade();
        self.write(duty);
        let level = self.duty as f32 / DUTY_MAX as f32;
        self.motion.current_position = level;
        self.motion.target_position = level;
        Ok(())
    }

    /// Full on.
    pub fn turn_on(&mut self) -> Result<(), ErrorCode> {
        self.set_pwm(DUTY_MAX)
    }

    /// Off.
    pub fn turn_off(&mut self) -> Result<(), ErrorCode> {
        self.set_pwm(0)
    }

    /// Advance a fade.
    pub fn update(&mut self, now_ms: u64) {
        if self.core.is_enabled() && self.motion.target_velocity != 0.0 {
            let dt = now_ms.saturating_sub(self.last_fade_ms) as f32 / 1000.0;
            let velocity = self.motion.target_velocity;
            let level = (self.motion.current_position + velocity * dt).clamp(0.0, 1.0);
            if (velocity > 0.0 && level >= 1.0) || (velocity < 0.0 && level <= 0.0) {
                self.clear_fade();
            }
            self.motion.current_position = level;
            self.write(level_to_duty(level));
        }
        self.last_fade_ms = now_ms;
        self.core.touch(now_ms);
    }

    /// Switch off and enable.
    pub fn reset(&mut self, now_ms: u64) {
        self.core.set_enabled(true);
        self.clear_fade();
        self.write(0);
        self.motion.clear_motion();
        self.core.set_state(DeviceState::Idle);
        self.last_fade_ms = now_ms;
        self.core.touch(now_ms);
    }

    /// Device status line.
    pub fn status(&self) -> String {
        let mut status = self.core.status();
        if self.is_on() {
            let percent = self.duty as u32 * 100 / DUTY_MAX as u32;
            status.push_str(&format!(", Output: ON ({percent}%)"));
        } else {
            status.push_str(", Output: OFF");
        }
        if self.pwm {
            status.push_str(&format!(", PWM: {}/{}", self.duty, DUTY_MAX));
        }
        status
    }

    fn clear_fade(&mut self) {
        self.motion.target_velocity = 0.0;
        self.motion.current_velocity = 0.0;
    }

    fn write(&mut self, duty: u8) {
        let duty = if self.pwm || duty == 0 || duty == DUTY_MAX {
            duty
        } else if duty > 127 {
            DUTY_MAX
        } else {
            0
        };
        self.duty = duty;
        self.pin.write_duty(duty);
        if self.core.state() != DeviceState::Disabled {
            let fading = self.motion.target_velocity != 0.0;
            self.core.set_state(if duty > 0 || fading {
                DeviceState::Active
            } else {
                DeviceState::Idle
            });
        }
    }
}

impl<P: PwmPin> Actuator for Output<P> {
    fn motion(&self) -> &ActuatorState {
        &self.motion
    }

    fn set_position(&mut self, position: f32, _now_ms: u64) -> Result<(), ErrorCode> {
        self.set_pwm(level_to_duty(position))?;
        self.motion.target_position = position.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_velocity(&mut self, velocity: f32, now_ms: u64) -> Result<(), ErrorCode> {
        if !self.core.is_enabled() {
            return Err(ErrorCode::InvalidParam);
        }
        let max = self.motion.max_velocity;
        let velocity = velocity.clamp(-max, max);
        self.motion.target_velocity = velocity;
        self.motion.current_velocity = velocity;
        self.motion.target_position = if velocity > 0.0 {
            1.0
        } else if velocity < 0.0 {
            0.0
        } else {
            self.motion.current_position
        };
        self.last_fade_ms = now_ms;
        if velocity != 0.0 {
            self.core.set_state(DeviceState::Active);
        }
        Ok(())
    }

    /// Cancel any fade and switch off, whether enabled or not.
    fn stop(&mut self) {
        self.clear_fade();
        self.write(0);
        self.motion.current_position = 0.0;
        self.motion.target_position = 0.0;
    }

    fn enable(&mut self) {
        self.core.set_enabled(true);
        if self.core.state() == DeviceState::Disabled {
            self.core.set_state(DeviceState::Idle);
        }
    }

    fn disable(&mut self) {
        self.stop();
        self.core.set_enabled(false);
        self.core.set_state(DeviceState::Disabled);
    }

    fn set_acceleration(&mut self, acceleration: f32) {
        self.motion.acceleration = acceleration.abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockPwm;

    fn output(pwm: bool) -> (Output<MockPwm>, MockPwm) {
        let pin = MockPwm::new();
        let out = Output::new(&OutputConfig::new("LIGHT").with_pwm(pwm), pin.clone());
        (out, pin)
    }

    #[test]
    fn on_off_write_immediately() {
        let (mut out, pin) = output(true);
        out.turn_on().unwrap();
        assert_eq!(pin.duty(), 255);
        assert_eq!(out.position(), 1.0);
        assert_eq!(out.core().state(), DeviceState::Active);

        out.turn_off().unwrap();
        assert_eq!(pin.duty(), 0);
        assert_eq!(out.core().state(), DeviceState::Idle);
    }

    #[test]
    fn position_is_clamped() {
        let (mut out, pin) = output(true);
        out.set_position(3.0, 0).unwrap();
        assert_eq!(pin.duty(), 255);
        out.set_position(-1.0, 0).unwrap();
        assert_eq!(pin.duty(), 0);
    }

    #[test]
    fn digital_output_collapses_duty() {
        let (mut out, pin) = output(false);
        out.set_pwm(128).unwrap();
        assert_eq!(pin.duty(), 255);
        out.set_pwm(127).unwrap();
        assert_eq!(pin.duty(), 0);
        assert_eq!(out.status(), "Name: LIGHT, Type: MosfetOutput, State: IDLE, Enabled: YES, Output: OFF");
    }

    #[test]
    fn fade_down_saturates_and_clears_velocity() {
        let (mut out, pin) = output(true);
        out.turn_on().unwrap();
        out.set_velocity(-10.0, 0).unwrap();
        // clamped to the 1.0/s limit
        assert_eq!(out.motion().target_velocity, -1.0);

        out.update(500);
        assert_eq!(pin.duty(), 127);
        out.update(1000);
        assert_eq!(pin.duty(), 0);
        assert_eq!(out.motion().target_velocity, 0.0);
        assert_eq!(out.core().state(), DeviceState::Idle);
    }

    #[test]
    fn disabled_output_rejects_writes_but_stops() {
        let (mut out, pin) = output(true);
        out.turn_on().unwrap();
        out.disable();
        assert_eq!(pin.duty(), 0);
        assert_eq!(out.turn_on(), Err(ErrorCode::InvalidParam));
        assert_eq!(out.set_velocity(0.5, 0), Err(ErrorCode::InvalidParam));
        out.stop();
        assert_eq!(out.core().state(), DeviceState::Disabled);
    }

    #[test]
    fn status_shows_percent_and_pwm() {
        let (mut out, _) = output(true);
        out.set_pwm(128).unwrap();
        assert_eq!(
            out.status(),
            "Name: LIGHT, Type: MosfetOutput, State: ACTIVE, Enabled: YES, Output: ON (50%), PWM: 128/255"
        );
    }

    #[test]
    fn reset_switches_off_and_enables() {
        let (mut out, pin) = output(true);
        out.turn_on().unwrap();
        out.disable();
        out.reset(10);
        assert!(out.core().is_enabled());
        assert_eq!(pin.duty(), 0);
        assert_eq!(out.core().state(), DeviceState::Idle);
    }
}
