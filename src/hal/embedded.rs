//! Adapters from `embedded-hal` 1.0 pin traits to the board traits.
//!
//! These let a real board assemble its [`Board`](crate::traits::Board)
//! implementation from HAL pins:
//!
//! | Adapter | Wraps | Implements |
//! |---------|-------|------------|
//! | [`HalInput`] | `InputPin` | [`DigitalInput`] |
//! | [`HalPwm`] | `SetDutyCycle` | [`PwmPin`] |
//! | [`HalSwitchedOutput`] | `OutputPin` | [`PwmPin`] (on when duty > 0) |
//! | [`PwmServo`] | `SetDutyCycle` at 50 Hz | [`ServoDriver`] |
//! | [`StepDir`] | step, dir, enable `OutputPin`s | [`MotionDriver`] |
//! | [`FnAdc`] | `FnMut() -> u16` | [`AnalogInput`] |
//!
//! Pin errors are dropped: the board traits are infallible, and a pin
//! that fails shows up as a device that does not move or read.
//!
//! `embedded-hal` has no ADC trait, so [`FnAdc`] takes a closure around
//! whatever the HAL offers.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;

use crate::motion::Ramp;
use crate::traits::{AnalogInput, DigitalInput, MotionDriver, PwmPin, ServoDriver};

/// Shortest servo pulse, at 0 degrees.
pub const SERVO_MIN_PULSE_US: u16 = 544;
/// Longest servo pulse, at 180 degrees.
pub const SERVO_MAX_PULSE_US: u16 = 2400;
/// Servo frame period at 50 Hz.
pub const SERVO_PERIOD_US: u16 = 20_000;

// ============================================================================
// Inputs
// ============================================================================

/// End-stop input.
pub struct HalInput<P: InputPin> {
    pin: P,
}

impl<P: InputPin> HalInput<P> {
    /// Wrap `pin`.
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Give back the pin.
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: InputPin> DigitalInput for HalInput<P> {
    fn is_high(&mut self) -> bool {
        self.pin.is_high().unwrap_or(false)
    }
}

/// ADC channel read through a closure.
pub struct FnAdc<F: FnMut() -> u16> {
    read: F,
}

impl<F: FnMut() -> u16> FnAdc<F> {
    /// Wrap a single-sample read.
    pub fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F: FnMut() -> u16> AnalogInput for FnAdc<F> {
    fn read(&mut self) -> u16 {
        (self.read)()
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// PWM-capable MOSFET output.
pub struct HalPwm<P: SetDutyCycle> {
    pin: P,
}

impl<P: SetDutyCycle> HalPwm<P> {
    /// Wrap `pin`, starting off.
    pub fn new(mut pin: P) -> Self {
        pin.set_duty_cycle_fully_off().ok();
        Self { pin }
    }

    /// Give back the pin.
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: SetDutyCycle> PwmPin for HalPwm<P> {
    fn write_duty(&mut self, duty: u8) {
        self.pin.set_duty_cycle_fraction(u16::from(duty), 255).ok();
    }
}

/// Output on a plain digital pin; any non-zero duty switches it on.
pub struct HalSwitchedOutput<P: OutputPin> {
    pin: P,
}

impl<P: OutputPin> HalSwitchedOutput<P> {
    /// Wrap `pin`, starting low.
    pub fn new(mut pin: P) -> Self {
        pin.set_low().ok();
        Self { pin }
    }

    /// Give back the pin.
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> PwmPin for HalSwitchedOutput<P> {
    fn write_duty(&mut self, duty: u8) {
        if duty > 0 {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
    }
}

/// Pulse width for `degrees`, clamped to 180.
///
/// ```
/// use rs_ramps::hal::embedded::servo_pulse_us;
///
/// assert_eq!(servo_pulse_us(0), 544);
/// assert_eq!(servo_pulse_us(90), 1472);
/// assert_eq!(servo_pulse_us(200), 2400);
/// ```
pub fn servo_pulse_us(degrees: u8) -> u16 {
    let degrees = u32::from(degrees.min(180));
    let span = u32::from(SERVO_MAX_PULSE_US - SERVO_MIN_PULSE_US);
    SERVO_MIN_PULSE_US + (span * degrees / 180) as u16
}

/// Hobby servo on a 50 Hz PWM channel.
pub struct PwmServo<P: SetDutyCycle> {
    pin: P,
    attached: bool,
}

impl<P: SetDutyCycle> PwmServo<P> {
    /// Wrap a channel already configured for a 20 ms period.
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            attached: false,
        }
    }

    /// Whether pulses are being generated.
    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

impl<P: SetDutyCycle> ServoDriver for PwmServo<P> {
    fn attach(&mut self) {
        self.attached = true;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.pin.set_duty_cycle_fully_off().ok();
    }

    fn write_angle(&mut self, degrees: u8) {
        if self.attached {
            self.pin
                .set_duty_cycle_fraction(servo_pulse_us(degrees), SERVO_PERIOD_US)
                .ok();
        }
    }
}

// ============================================================================
// Stepper
// ============================================================================

/// Step/direction/enable stepper driver (A4988, DRV8825).
///
/// Motion follows a [`Ramp`]; each [`run`](MotionDriver::run) emits one
/// step pulse per step the profile advanced since the last call. The enable
/// line is active low, as on RAMPS boards.
pub struct StepDir<S: OutputPin, D: OutputPin, E: OutputPin> {
    step: S,
    dir: D,
    enable: E,
    ramp: Ramp,
    forward: bool,
}

impl<S: OutputPin, D: OutputPin, E: OutputPin> StepDir<S, D, E> {
    /// Wrap the three pins, starting disabled.
    pub fn new(mut step: S, mut dir: D, mut enable: E) -> Self {
        step.set_low().ok();
        dir.set_high().ok();
        enable.set_high().ok();
        Self {
            step,
            dir,
            enable,
            ramp: Ramp::default(),
            forward: true,
        }
    }

    /// Give back the pins.
    pub fn free(self) -> (S, D, E) {
        (self.step, self.dir, self.enable)
    }

    fn pulse(&mut self, steps: i64) {
        let forward = steps > 0;
        if forward != self.forward {
            if forward {
                self.dir.set_high().ok();
            } else {
                self.dir.set_low().ok();
            }
            self.forward = forward;
        }
        for _ in 0..steps.unsigned_abs() {
            self.step.set_high().ok();
            self.step.set_low().ok();
        }
    }
}

impl<S: OutputPin, D: OutputPin, E: OutputPin> MotionDriver for StepDir<S, D, E> {
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
        let before = self.ramp.current_position();
        self.ramp.advance(now_ms);
        let moved = self.ramp.current_position() - before;
        if moved != 0 {
            self.pulse(moved);
        }
        self.ramp.is_running()
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enable.set_low().ok();
        } else {
            self.enable.set_high().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType as DigitalErrorType;
    use embedded_hal::pwm::ErrorType as PwmErrorType;

    #[derive(Default)]
    struct FakePin {
        high: bool,
        rising_edges: u32,
    }

    impl DigitalErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            if !self.high {
                self.rising_edges += 1;
            }
            self.high = true;
            Ok(())
        }
    }

    impl InputPin for FakePin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    #[derive(Default)]
    struct FakePwm {
        duty: u16,
    }

    impl PwmErrorType for FakePwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            20_000
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
            self.duty = duty;
            Ok(())
        }
    }

    // =========================================================================
    // Pin Adapter Tests
    // =========================================================================

    #[test]
    fn input_reads_level() {
        let mut input = HalInput::new(FakePin {
            high: true,
            ..FakePin::default()
        });
        assert!(input.is_high());
    }

    #[test]
    fn pwm_scales_duty() {
        let mut out = HalPwm::new(FakePwm::default());
        out.write_duty(255);
        assert_eq!(out.pin.duty, 20_000);
        out.write_duty(0);
        assert_eq!(out.free().duty, 0);
    }

    #[test]
    fn switched_output_thresholds_duty() {
        let mut out = HalSwitchedOutput::new(FakePin::default());
        out.write_duty(1);
        assert!(out.pin.high);
        out.write_duty(0);
        assert!(!out.free().high);
    }

    #[test]
    fn servo_pulses_only_when_attached() {
        let mut servo = PwmServo::new(FakePwm::default());
        servo.write_angle(90);
        assert_eq!(servo.pin.duty, 0);
        servo.attach();
        servo.write_angle(90);
        // 1472 us of 20000 us on a 20000-count channel
        assert_eq!(servo.pin.duty, 1472);
        servo.detach();
        assert_eq!(servo.pin.duty, 0);
    }

    #[test]
    fn closure_adc() {
        let mut sample = 100;
        let mut adc = FnAdc::new(|| {
            sample += 1;
            sample
        });
        assert_eq!(adc.read(), 101);
        assert_eq!(adc.read(), 102);
    }

    // =========================================================================
    // Step/Dir Tests
    // =========================================================================

    #[test]
    fn step_dir_pulses_each_step() {
        let mut driver = StepDir::new(FakePin::default(), FakePin::default(), FakePin::default());
        driver.set_enabled(true);
        driver.set_max_speed(1000.0);
        driver.set_acceleration(0.0);
        driver.move_to(-25);

        let mut t = 0;
        while driver.run(t) {
            t += 1;
        }

        assert_eq!(driver.current_position(), -25);
        let (step, dir, enable) = driver.free();
        assert_eq!(step.rising_edges, 25);
        assert!(!dir.high);
        assert!(!enable.high);
    }
}
