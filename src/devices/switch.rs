//! Debounced limit switch.

use alloc::string::String;

use super::{DeviceCore, DeviceKind, DeviceState, Sensor, SensorValue};
use crate::config::SwitchConfig;
use crate::traits::DigitalInput;

/// Value above which a switch reads as pressed.
pub const SWITCH_THRESHOLD: f32 = 0.5;

/// An end-stop switch.
///
/// The raw level is XOR'd with the inversion flag. A raw change must hold
/// for longer than the debounce interval before the debounced state flips
/// and a state change is flagged.
///
/// # Example
///
/// ```rust
/// use rs_ramps::config::SwitchConfig;
/// use rs_ramps::devices::LimitSwitch;
/// use rs_ramps::hal::MockInput;
///
/// let pin = MockInput::new();
/// let mut x_min = LimitSwitch::new(&SwitchConfig::new("X_MIN"), pin.clone(), 0);
///
/// pin.set_high();
/// x_min.update(10);
/// x_min.update(60); // held exactly 50 ms: not yet
/// assert!(!x_min.is_pressed());
///
/// x_min.update(61);
/// assert!(x_min.is_pressed());
/// assert_eq!(x_min.take_state_change(), Some(true));
/// assert_eq!(x_min.take_state_change(), None);
/// ```
#[derive(Debug)]
pub struct LimitSwitch<I: DigitalInput> {
    core: DeviceCore,
    reading: SensorValue,
    input: I,
    inverted: bool,
    debounce_ms: u64,
    stable: bool,
    pending: bool,
    last_transition_ms: u64,
    changed: bool,
}

impl<I: DigitalInput> LimitSwitch<I> {
    /// Sample the input once to seed the debounced state.
    pub fn new(cfg: &SwitchConfig, input: I, now_ms: u64) -> Self {
        let mut switch = Self {
            core: DeviceCore::new(cfg.name.clone(), DeviceKind::Switch, DeviceState::Idle, true),
            reading: SensorValue::new(SWITCH_THRESHOLD),
            input,
            inverted: cfg.inverted,
            debounce_ms: cfg.debounce_ms,
            stable: false,
            pending: false,
            last_transition_ms: now_ms,
            changed: false,
        };
        switch.seed(now_ms);
        switch
    }

    /// Shared identity and lifecycle.
    pub fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// Debounced state.
    pub fn is_pressed(&self) -> bool {
        self.reading.current > SWITCH_THRESHOLD
    }

    /// Whether the input is inverted.
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Undebounced level after inversion.
    pub fn raw_state(&mut self) -> bool {
        self.input.is_high() != self.inverted
    }

    /// Returns the new state once per debounced change.
    pub fn take_state_change(&mut self) -> Option<bool> {
        if self.changed {
            self.changed = false;
            Some(self.stable)
        } else {
            None
        }
    }

    /// Sample the input and run the debounce filter.
    pub fn update(&mut self, now_ms: u64) {
        let raw = self.raw_state();
        if raw != self.pending {
            self.pending = raw;
            self.last_transition_ms = now_ms;
        }
        if self.pending != self.stable
            && now_ms.saturating_sub(self.last_transition_ms) > self.debounce_ms
        {
            self.stable = self.pending;
            self.changed = true;
            self.reading.record(if self.stable { 1.0 } else { 0.0 });
            self.core.set_state(if self.stable {
                DeviceState::Active
            } else {
                DeviceState::Idle
            });
        }
        self.core.touch(now_ms);
    }

    /// Re-seed from the current input level.
    pub fn reset(&mut self, now_ms: u64) {
        self.reading = SensorValue::new(SWITCH_THRESHOLD);
        self.changed = false;
        self.seed(now_ms);
    }

    /// Device status line.
    pub fn status(&self) -> String {
        let mut status = self.core.status();
        status.push_str(", Switch: ");
        status.push_str(if self.is_pressed() { "TRIGGERED" } else { "OPEN" });
        if self.inverted {
            status.push_str(" (inverted)");
        }
        status
    }

    fn seed(&mut self, now_ms: u64) {
        let raw = self.raw_state();
        self.stable = raw;
        self.pending = raw;
        self.last_transition_ms = now_ms;
        self.reading.current = if raw { 1.0 } else { 0.0 };
        self.reading.previous = self.reading.current;
        self.core.set_state(if raw {
            DeviceState::Active
        } else {
            DeviceState::Idle
        });
        self.core.touch(now_ms);
    }
}

impl<I: DigitalInput> Sensor for LimitSwitch<I> {
    fn reading(&self) -> &SensorValue {
        &self.reading
    }

    fn reading_mut(&mut self) -> &mut SensorValue {
        &mut self.reading
    }

    fn read_value(&mut self, now_ms: u64) -> f32 {
        self.update(now_ms);
        self.reading.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockInput;

    fn switch(cfg: SwitchConfig) -> (LimitSwitch<MockInput>, MockInput) {
        let pin = MockInput::new();
        let sw = LimitSwitch::new(&cfg, pin.clone(), 0);
        (sw, pin)
    }

    // =========================================================================
    // Debounce Tests
    // =========================================================================

    #[test]
    fn fast_toggles_report_nothing() {
        let (mut sw, pin) = switch(SwitchConfig::new("X_MIN"));
        for t in 0..500u64 {
            // flip every 20 ms
            pin.set((t / 20) % 2 == 1);
            sw.update(t);
        }
        assert!(!sw.is_pressed());
        assert_eq!(sw.take_state_change(), None);
    }

    #[test]
    fn stable_toggle_reports_once() {
        let (mut sw, pin) = switch(SwitchConfig::new("X_MIN"));
        pin.set_high();
        let mut changes = 0;
        for t in 0..300 {
            sw.update(t);
            if sw.take_state_change().is_some() {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
        assert!(sw.is_pressed());
        assert_eq!(sw.core().state(), DeviceState::Active);
    }

    #[test]
    fn inverted_switch_reads_low_as_pressed() {
        let (mut sw, pin) = switch(SwitchConfig::new("Y_MIN").with_inverted(true));
        // low at construction means pressed
        assert!(sw.is_pressed());
        pin.set_high();
        sw.update(0);
        sw.update(51);
        assert!(!sw.is_pressed());
        assert!(sw.status().ends_with("Switch: OPEN (inverted)"));
    }

    #[test]
    fn zero_debounce_accepts_after_one_ms() {
        let (mut sw, pin) = switch(SwitchConfig::new("Z_MIN").with_debounce_ms(0));
        pin.set_high();
        sw.update(5);
        assert!(!sw.is_pressed());
        sw.update(6);
        assert!(sw.is_pressed());
    }

    // =========================================================================
    // Sensor Tests
    // =========================================================================

    #[test]
    fn read_value_forces_update() {
        let (mut sw, pin) = switch(SwitchConfig::new("X_MIN"));
        pin.set_high();
        assert_eq!(sw.read_value(1), 0.0);
        assert_eq!(sw.read_value(100), 1.0);
        assert!(sw.has_new_data());
        sw.clear_new_data();
        assert!(!sw.has_new_data());
    }

    #[test]
    fn status_reports_trigger() {
        let (mut sw, pin) = switch(SwitchConfig::new("X_MIN"));
        pin.set_high();
        sw.update(1);
        sw.update(100);
        assert_eq!(
            sw.status(),
            "Name: X_MIN, Type: EndSwitch, State: ACTIVE, Enabled: YES, Switch: TRIGGERED"
        );
    }

    #[test]
    fn reset_reseeds_from_pin() {
        let (mut sw, pin) = switch(SwitchConfig::new("X_MIN"));
        pin.set_high();
        sw.reset(10);
        assert!(sw.is_pressed());
        assert_eq!(sw.take_state_change(), None);
    }
}
