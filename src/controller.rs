//! Controller: owns the devices and turns commands into replies.
//!
//! This module provides [`Controller`], the central component that
//! resolves command names, enforces the emergency stop, runs service
//! macros and calibration, and collects unsolicited events.
//!
//! # Overview
//!
//! The controller:
//! - Builds every configured device from a [`Board`]
//! - Dispatches each [`Command`] to a device, a bulk group, or itself
//! - Advances devices and calibration from [`update`](Controller::update)
//! - Queues switch and service events for the transport to drain
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
//! let enable: Command = "X enable".parse().unwrap();
//! assert_eq!(controller.dispatch(&enable, 0).encode(), "X enable OK");
//!
//! let mv: Command = "X position 1.5".parse().unwrap();
//! assert_eq!(controller.dispatch(&mv, 0).encode(), "X position 1.5 OK");
//!
//! // Main loop: call update() every tick
//! for t in 0..5000 {
//!     controller.update(t);
//! }
//!
//! let q: Command = "X position?".parse().unwrap();
//! assert_eq!(controller.dispatch(&q, 5000).encode(), "X position 1.500");
//! ```
//!
//! # Emergency Stop
//!
//! ```rust
//! use rs_ramps::{Command, Config, Controller};
//! use rs_ramps::hal::MockBoard;
//!
//! let mut board = MockBoard::new();
//! let mut controller = Controller::new(&Config::default(), &mut board);
//!
//! controller.emergency_stop_all();
//! let reply = controller.dispatch(&"FAN ON".parse::<Command>().unwrap(), 0);
//! assert_eq!(reply.encode(), "ERROR: Emergency stop active");
//!
//! controller.dispatch(&"RESET".parse::<Command>().unwrap(), 0);
//! assert!(!controller.is_emergency_stopped());
//! ```

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::calibration::{Calibration, CalibrationFailure, CalibrationTarget};
use crate::command::{BulkGroup, Command, CommandKind, SERVICE_DEVICE, SYSTEM_DEVICE};
use crate::config::{Axis, CalibrationConfig, Config, EventConfig};
use crate::devices::{
    Actuator, AnalogSensor, Device, DeviceKind, DeviceSnapshot, LimitSwitch, Output, Sensor, Servo,
    Stepper,
};
use crate::error::ErrorCode;
use crate::reply::Reply;
use crate::traits::{Board, Clock};

/// Events kept before the oldest is dropped.
pub const MAX_PENDING_EVENTS: usize = 32;

const BULK_HINT: &str = "Bulk commands: >STEPPERS velocity 0 | >SERVOS position 0 | >OUTPUTS OFF";
const SYSTEM_HINT: &str = "System: >CONTROLLER STATUS | PING | ESTOP";

/// The motion and IO controller.
///
/// # Type Parameter
///
/// - `B`: The board supplying drivers ([`Board`] trait)
///
/// # Thread Safety
///
/// The controller is driven from a single loop and is not shared. The
/// transport owns it through an [`Interface`](crate::Interface) or calls
/// [`dispatch`](Self::dispatch) and [`update`](Self::update) directly.
pub struct Controller<B: Board> {
    devices: Vec<Device<B>>,
    events_cfg: EventConfig,
    calibration_cfg: CalibrationConfig,
    emergency_stop: bool,
    calibration: Option<Calibration>,
    events: VecDeque<Reply>,
}

impl<B: Board> Controller<B> {
    /// Build every device in the table from `board`.
    ///
    /// Devices are kept in table order: steppers, servos, outputs,
    /// switches, analog sensors.
    pub fn new(config: &Config, board: &mut B) -> Self {
        let table = &config.devices;
        let mut devices = Vec::with_capacity(table.len());

        for cfg in table.steppers.iter() {
            devices.push(Device::Stepper(Stepper::new(cfg, board.stepper_driver(cfg))));
        }
        for cfg in table.servos.iter() {
            devices.push(Device::Servo(Servo::new(cfg, board.servo_driver(cfg))));
        }
        for cfg in table.outputs.iter() {
            devices.push(Device::Output(Output::new(cfg, board.output_pin(cfg))));
        }
        for cfg in table.switches.iter() {
            devices.push(Device::Switch(LimitSwitch::new(cfg, board.switch_input(cfg), 0)));
        }
        for cfg in table.analog.iter() {
            devices.push(Device::Analog(AnalogSensor::new(cfg, board.analog_input(cfg))));
        }

        info!("controller ready with {} devices", devices.len());
        Self {
            devices,
            events_cfg: config.events.clone(),
            calibration_cfg: config.calibration.clone(),
            emergency_stop: false,
            calibration: None,
            events: VecDeque::new(),
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Execute one command. Every command produces exactly one reply.
    pub fn dispatch(&mut self, cmd: &Command, now_ms: u64) -> Reply {
        if self.emergency_stop && cmd.kind != CommandKind::Reset {
            return Reply::error("", ErrorCode::DeviceBusy, "Emergency stop active");
        }

        if self.calibration.is_some() && !cmd.is_system() && !is_service_estop(cmd) {
            return Reply::error(&cmd.name, ErrorCode::DeviceBusy, "Calibration in progress");
        }

        if cmd.is_system() {
            return self.system_command(cmd, now_ms);
        }

        if cmd.kind == CommandKind::Service {
            return self.service_command(cmd, now_ms);
        }

        if let Some(group) = cmd.group() {
            return self.bulk_command(group, cmd, now_ms);
        }

        match self.index_of(&cmd.name) {
            Some(index) => self.device_command(index, cmd, now_ms),
            None => Reply::error(&cmd.name, ErrorCode::UnknownDevice, "Unknown device"),
        }
    }

    fn system_command(&mut self, cmd: &Command, now_ms: u64) -> Reply {
        match cmd.kind {
            CommandKind::List => Reply::info(&self.device_list()),
            CommandKind::Status => Reply::info(&self.system_status(now_ms)),
            CommandKind::Ping => Reply::info("PONG"),
            CommandKind::Estop => {
                self.emergency_stop_all();
                Reply::ok(SYSTEM_DEVICE, "ESTOP")
            }
            CommandKind::Reset => {
                self.reset_emergency_stop();
                Reply::ok(SYSTEM_DEVICE, "reset")
            }
            CommandKind::Service => self.service_command(cmd, now_ms),
            _ => Reply::error(
                SYSTEM_DEVICE,
                ErrorCode::UnknownCommand,
                "Unknown system command",
            ),
        }
    }

    fn service_command(&mut self, cmd: &Command, now_ms: u64) -> Reply {
        let mut service = String::from(cmd.value.as_str());
        service.make_ascii_uppercase();

        if let Some(target) = CalibrationTarget::from_service(&service) {
            return match self.start_calibration(target) {
                Ok(()) if self.events_cfg.notify_service_start => service_notice(&service, "STARTED"),
                Ok(()) => Reply::ok(SERVICE_DEVICE, &service),
                Err(failure) => Reply::error(SERVICE_DEVICE, failure.code(), "Calibration in progress"),
            };
        }

        match service.as_str() {
            "FULL_STATUS" => {
                self.announce_start(&service);
                let text = format!("{}\n{}", self.system_status(now_ms), self.device_list());
                Reply::info(&text)
            }
            "ESTOP" => {
                self.announce_start(&service);
                self.emergency_stop_all();
                if self.events_cfg.notify_service_done {
                    service_notice(&service, "DONE")
                } else {
                    Reply::ok(SERVICE_DEVICE, &service)
                }
            }
            _ => Reply::error(
                SERVICE_DEVICE,
                ErrorCode::UnknownCommand,
                &format!("Unknown service: {service}"),
            ),
        }
    }

    fn bulk_command(&mut self, group: BulkGroup, cmd: &Command, now_ms: u64) -> Reply {
        let members: Vec<usize> = self
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| group.includes(d.kind()))
            .map(|(i, _)| i)
            .collect();

        if members.is_empty() {
            return Reply::error(&cmd.name, ErrorCode::UnknownDevice, "Unknown group");
        }

        for index in members {
            let reply = self.device_command(index, cmd, now_ms);
            if reply.is_error() {
                debug!("{} member {}: {}", group.as_str(), self.devices[index].name(), reply);
            }
        }
        Reply::ok(&cmd.name, &cmd.interface)
    }

    fn device_command(&mut self, index: usize, cmd: &Command, now_ms: u64) -> Reply {
        let device = &mut self.devices[index];
        let name = String::from(device.name());

        match cmd.kind {
            CommandKind::Status => return Reply::info(&device.status()),
            CommandKind::Reset => {
                device.reset(now_ms);
                return Reply::ok(&name, "reset");
            }
            _ => {}
        }

        if device.kind().is_actuator() {
            actuator_command(device, &name, cmd, now_ms)
        } else {
            sensor_command(device, &name, cmd, now_ms)
        }
    }

    // ========================================================================
    // Update Loop
    // ========================================================================

    /// Advance every device, queue switch events and step calibration.
    ///
    /// Does nothing while the emergency stop is latched.
    pub fn update(&mut self, now_ms: u64) {
        let _ = self.advance(now_ms);
    }

    fn advance(&mut self, now_ms: u64) -> Option<Result<(), CalibrationFailure>> {
        if self.emergency_stop {
            return None;
        }

        for device in self.devices.iter_mut() {
            device.update(now_ms);
        }

        let report = self.events_cfg.report_switch_events;
        let mut changes: Vec<Reply> = Vec::new();
        for device in self.devices.iter_mut() {
            if let Device::Switch(switch) = device {
                if let Some(pressed) = switch.take_state_change() {
                    debug!("switch {} {}", switch.core().name(), if pressed { "closed" } else { "opened" });
                    if report {
                        changes.push(Reply::event(
                            switch.core().name(),
                            "state",
                            if pressed { "1" } else { "0" },
                        ));
                    }
                }
            }
        }
        for event in changes {
            self.push_event(event);
        }

        let outcome = self
            .calibration
            .as_mut()
            .and_then(|cal| cal.step(&mut self.devices, now_ms));
        if let Some(result) = outcome {
            if let Some(cal) = self.calibration.take() {
                self.finish_calibration(cal.target(), result);
            }
        }
        outcome
    }

    // ========================================================================
    // Emergency Stop
    // ========================================================================

    /// Latch the emergency stop: halt steppers immediately, hold servos,
    /// switch outputs off, and abort any calibration.
    pub fn emergency_stop_all(&mut self) {
        self.emergency_stop = true;

        if let Some(mut cal) = self.calibration.take() {
            cal.abort(&mut self.devices);
            self.finish_calibration(cal.target(), Err(CalibrationFailure::Aborted));
        }

        for device in self.devices.iter_mut() {
            match device {
                Device::Stepper(stepper) => stepper.emergency_stop(),
                Device::Servo(servo) => servo.stop(),
                Device::Output(output) => output.stop(),
                Device::Switch(_) | Device::Analog(_) => {}
            }
        }
        warn!("emergency stop latched");
    }

    /// Clear the latch. Devices stay where the stop left them.
    pub fn reset_emergency_stop(&mut self) {
        if self.emergency_stop {
            info!("emergency stop cleared");
        }
        self.emergency_stop = false;
    }

    /// Whether the emergency stop is latched.
    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop
    }

    // ========================================================================
    // Calibration
    // ========================================================================

    /// Start homing in the background. Progress happens in
    /// [`update`](Self::update); completion queues a service notice.
    pub fn start_calibration(&mut self, target: CalibrationTarget) -> Result<(), CalibrationFailure> {
        if self.emergency_stop || self.calibration.is_some() {
            return Err(CalibrationFailure::Busy);
        }
        info!("calibration {} started", target);
        self.calibration = Some(Calibration::new(target, &self.calibration_cfg));
        Ok(())
    }

    /// Run a calibration to completion, reading time from `clock`.
    ///
    /// Devices keep updating while this runs. The clock must advance or a
    /// missing switch will never time out.
    ///
    /// ```rust
    /// use rs_ramps::{Config, Controller};
    /// use rs_ramps::calibration::{CalibrationFailure, CalibrationTarget};
    /// use rs_ramps::config::{Axis, CalibrationConfig};
    /// use rs_ramps::hal::{MockBoard, MockClock};
    ///
    /// let config = Config::default()
    ///     .with_calibration(CalibrationConfig::default().with_timeout_ms(100));
    /// let mut board = MockBoard::new();
    /// let mut controller = Controller::new(&config, &mut board);
    ///
    /// // the X_MIN switch never closes
    /// let clock = MockClock::new().with_auto_advance(1);
    /// let result = controller.calibrate_blocking(CalibrationTarget::Axis(Axis::X), &clock);
    /// assert_eq!(result, Err(CalibrationFailure::Timeout(Axis::X)));
    /// ```
    pub fn calibrate_blocking<C: Clock>(
        &mut self,
        target: CalibrationTarget,
        clock: &C,
    ) -> Result<(), CalibrationFailure> {
        self.start_calibration(target)?;
        loop {
            let now = clock.now_ms();
            if let Some(outcome) = self.advance(now) {
                return outcome;
            }
        }
    }

    /// Home one axis to completion.
    pub fn calibrate_axis<C: Clock>(&mut self, axis: Axis, clock: &C) -> Result<(), CalibrationFailure> {
        self.calibrate_blocking(CalibrationTarget::Axis(axis), clock)
    }

    /// The running calibration, if any.
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Whether a calibration is running.
    pub fn is_calibrating(&self) -> bool {
        self.calibration.is_some()
    }

    fn finish_calibration(&mut self, target: CalibrationTarget, result: Result<(), CalibrationFailure>) {
        if self.events_cfg.notify_service_done {
            let outcome = if result.is_ok() { "DONE" } else { "FAILED" };
            self.push_event(service_notice(target.service_name(), outcome));
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Next queued event.
    pub fn pop_event(&mut self) -> Option<Reply> {
        self.events.pop_front()
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = Reply> + '_ {
        self.events.drain(..)
    }

    /// Number of queued events.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    fn push_event(&mut self, event: Reply) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            warn!("event queue full, dropping oldest");
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn announce_start(&mut self, service: &str) {
        if self.events_cfg.notify_service_start {
            self.push_event(service_notice(service, "STARTED"));
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All devices in table order.
    pub fn devices(&self) -> &[Device<B>] {
        &self.devices
    }

    /// Look up a device by exact name.
    pub fn device(&self, name: &str) -> Option<&Device<B>> {
        self.devices.iter().find(|d| d.name() == name)
    }

    /// Mutable lookup by exact name.
    pub fn device_mut(&mut self, name: &str) -> Option<&mut Device<B>> {
        self.devices.iter_mut().find(|d| d.name() == name)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.name() == name)
    }

    fn count(&self, kind: DeviceKind) -> usize {
        self.devices.iter().filter(|d| d.kind() == kind).count()
    }

    /// Device listing with usage hints.
    pub fn device_list(&self) -> String {
        let mut list = String::from("=== DEVICE LIST ===\n");
        for device in &self.devices {
            let kind = device.kind();
            list.push_str(&format!(
                "- {} ({}): interfaces [{}]\n  Commands: >{} {}\n",
                device.name(),
                kind.type_name(),
                kind.interfaces(),
                device.name(),
                kind.usage()
            ));
        }
        list.push('\n');
        list.push_str(BULK_HINT);
        list.push('\n');
        list.push_str(SYSTEM_HINT);
        list.push('\n');
        list
    }

    /// System status block.
    pub fn system_status(&self, now_ms: u64) -> String {
        let mut status = format!(
            "=== SYSTEM STATUS ===\nController: INITIALIZED, E-Stop: {}\nDevices: {} steppers, {} servos, {} outputs, {} switches, {} analog sensors\nUptime: {} seconds",
            if self.emergency_stop { "ACTIVE" } else { "INACTIVE" },
            self.count(DeviceKind::Stepper),
            self.count(DeviceKind::Servo),
            self.count(DeviceKind::Output),
            self.count(DeviceKind::Switch),
            self.count(DeviceKind::Analog),
            now_ms / 1000
        );
        if let Some(cal) = &self.calibration {
            status.push_str(&format!("\nCalibration: {}", cal.target()));
        }
        status
    }

    /// Full state snapshot.
    pub fn state(&self, now_ms: u64) -> ControllerState {
        ControllerState {
            emergency_stop: self.emergency_stop,
            calibrating: self.calibration.as_ref().map(|c| c.target()),
            uptime_s: now_ms / 1000,
            devices: self.devices.iter().map(|d| d.snapshot()).collect(),
        }
    }
}

fn is_service_estop(cmd: &Command) -> bool {
    cmd.kind == CommandKind::Service && cmd.value.eq_ignore_ascii_case("ESTOP")
}

fn service_notice(service: &str, outcome: &str) -> Reply {
    Reply::info(&format!("{SERVICE_DEVICE} {service} {outcome}"))
}

fn fixed3(value: f32) -> String {
    format!("{value:.3}")
}

fn fixed2(value: f32) -> String {
    format!("{value:.2}")
}

fn actuator_command<B: Board>(
    device: &mut Device<B>,
    name: &str,
    cmd: &Command,
    now_ms: u64,
) -> Reply {
    match cmd.kind {
        CommandKind::On | CommandKind::Off | CommandKind::State => {
            return output_command(device, name, cmd);
        }
        _ => {}
    }

    let zero_stepper = matches!(cmd.interface.as_str(), "zero" | "setzero");
    if cmd.kind == CommandKind::Unknown && zero_stepper {
        return match device.as_stepper_mut() {
            Some(stepper) => {
                stepper.set_zero();
                Reply::ok(name, "zero")
            }
            None => unknown_command(name, cmd),
        };
    }

    let Some(actuator) = device.as_actuator_mut() else {
        return unknown_command(name, cmd);
    };

    match cmd.kind {
        CommandKind::Position => {
            if cmd.query {
                return Reply::value(name, "position", &fixed3(actuator.position()));
            }
            match actuator.set_position(cmd.numeric_value(), now_ms) {
                Ok(()) => Reply::ok(name, "position").with_value(&cmd.value),
                Err(code) => Reply::error(name, code, "Failed to set position"),
            }
        }
        CommandKind::Velocity => {
            if cmd.query {
                return Reply::value(name, "velocity", &fixed3(actuator.velocity()));
            }
            match actuator.set_velocity(cmd.numeric_value(), now_ms) {
                Ok(()) => Reply::ok(name, "velocity").with_value(&cmd.value),
                Err(code) => Reply::error(name, code, "Failed to set velocity"),
            }
        }
        CommandKind::Stop => {
            actuator.stop();
            Reply::ok(name, "stop")
        }
        CommandKind::Enable => {
            actuator.enable();
            Reply::ok(name, "enable")
        }
        CommandKind::Disable => {
            actuator.disable();
            Reply::ok(name, "disable")
        }
        CommandKind::Unknown if matches!(cmd.interface.as_str(), "acceleration" | "accel") => {
            if cmd.query {
                Reply::value(name, "acceleration", &fixed3(actuator.acceleration()))
            } else {
                actuator.set_acceleration(cmd.numeric_value());
                Reply::ok(name, "acceleration").with_value(&cmd.value)
            }
        }
        _ => unknown_command(name, cmd),
    }
}

fn output_command<B: Board>(device: &mut Device<B>, name: &str, cmd: &Command) -> Reply {
    let Some(output) = device.as_output_mut() else {
        return match cmd.kind {
            CommandKind::On => Reply::error(name, ErrorCode::UnknownCommand, "ON not supported"),
            CommandKind::Off => Reply::error(name, ErrorCode::UnknownCommand, "OFF not supported"),
            _ => unknown_command(name, cmd),
        };
    };

    let turn_on = match cmd.kind {
        CommandKind::On => true,
        CommandKind::Off => false,
        _ if cmd.query || cmd.value.is_empty() => {
            let state = if output.is_on() { "ON" } else { "OFF" };
            return Reply::value(name, "state", state);
        }
        _ => cmd.numeric_value() != 0.0,
    };

    let (result, label) = if turn_on {
        (output.turn_on(), "ON")
    } else {
        (output.turn_off(), "OFF")
    };
    match result {
        Ok(()) => Reply::ok(name, "state").with_value(label),
        Err(code) => Reply::error(name, code, "Failed to set state"),
    }
}

fn sensor_command<B: Board>(
    device: &mut Device<B>,
    name: &str,
    cmd: &Command,
    now_ms: u64,
) -> Reply {
    if cmd.kind == CommandKind::State {
        if let Some(switch) = device.as_switch() {
            return Reply::value(name, "state", if switch.is_pressed() { "1" } else { "0" });
        }
    }

    let Some(sensor) = device.as_sensor_mut() else {
        return unknown_command(name, cmd);
    };

    match (cmd.kind, cmd.interface.as_str()) {
        (CommandKind::Get, _) | (CommandKind::Unknown, "value") => {
            Reply::value(name, "value", &fixed2(sensor.read_value(now_ms)))
        }
        (CommandKind::State, _) => Reply::value(name, "value", &fixed2(sensor.value())),
        (CommandKind::Unknown, "raw" | "voltage") => {
            sensor.read_value(now_ms);
            match device.as_analog() {
                Some(analog) if cmd.interface.as_str() == "raw" => {
                    Reply::value(name, "raw", &format!("{}", analog.raw()))
                }
                Some(analog) => Reply::value(name, "voltage", &fixed2(analog.voltage())),
                None => Reply::error(name, ErrorCode::UnknownCommand, "Unknown sensor command"),
            }
        }
        _ => Reply::error(name, ErrorCode::UnknownCommand, "Unknown sensor command"),
    }
}

fn unknown_command(name: &str, cmd: &Command) -> Reply {
    Reply::error(
        name,
        ErrorCode::UnknownCommand,
        &format!("Unknown command: {}", cmd.interface),
    )
}

/// Full controller snapshot for hosts and tests.
///
/// ```rust
/// use rs_ramps::{Config, Controller};
/// use rs_ramps::hal::MockBoard;
///
/// let mut board = MockBoard::new();
/// let controller = Controller::new(&Config::default(), &mut board);
///
/// let state = controller.state(61_000);
/// assert_eq!(state.uptime_s, 61);
/// assert_eq!(state.devices.len(), 13);
/// assert!(!state.emergency_stop);
/// ```
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerState {
    /// Emergency stop latched.
    pub emergency_stop: bool,
    /// Calibration in progress, if any.
    pub calibrating: Option<CalibrationTarget>,
    /// Seconds since start.
    pub uptime_s: u64,
    /// Every device in table order.
    pub devices: Vec<DeviceSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockBoard;

    fn controller() -> (Controller<MockBoard>, MockBoard) {
        let mut board = MockBoard::new();
        let controller = Controller::new(&Config::default(), &mut board);
        (controller, board)
    }

    fn send(c: &mut Controller<MockBoard>, line: &str) -> String {
        let cmd: Command = line.parse().unwrap();
        c.dispatch(&cmd, 0).encode()
    }

    // =========================================================================
    // System Tests
    // =========================================================================

    #[test]
    fn ping_and_list() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "PING"), "PONG");
        let list = send(&mut c, "LIST");
        assert!(list.starts_with("=== DEVICE LIST ===\n- X (StepperMotor): interfaces [position,velocity,stop,reset]\n"));
        assert!(list.contains("- FAN (MosfetOutput)"));
        assert!(list.ends_with("System: >CONTROLLER STATUS | PING | ESTOP\n"));
    }

    #[test]
    fn status_counts_devices() {
        let (c, _) = controller();
        let status = c.system_status(12_345);
        assert!(status.contains("E-Stop: INACTIVE"));
        assert!(status.contains("3 steppers, 2 servos, 3 outputs, 3 switches, 2 analog sensors"));
        assert!(status.ends_with("Uptime: 12 seconds"));
    }

    #[test]
    fn controller_name_reaches_system_handler() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "CONTROLLER PING"), "PONG");
        assert_eq!(
            send(&mut c, "CONTROLLER frobnicate"),
            "ERROR: Unknown system command (CONTROLLER)"
        );
    }

    // =========================================================================
    // Device Tests
    // =========================================================================

    #[test]
    fn unknown_device_and_command() {
        let (mut c, _) = controller();
        let ghost = c.dispatch(&"GHOST position 1".parse().unwrap(), 0);
        assert_eq!(ghost.error, Some(ErrorCode::UnknownDevice));
        let frob = c.dispatch(&"X frobnicate".parse().unwrap(), 0);
        assert_eq!(frob.error, Some(ErrorCode::UnknownCommand));
        assert_eq!(frob.encode(), "ERROR: Unknown command: frobnicate (X)");
    }

    #[test]
    fn disabled_stepper_rejects_position() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "X position 1"), "ERROR: Failed to set position (X)");
    }

    #[test]
    fn acceleration_fallback() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "Y accel 2.5"), "Y acceleration 2.5 OK");
        assert_eq!(send(&mut c, "Y acceleration?"), "Y acceleration 2.500");
    }

    #[test]
    fn zero_is_stepper_only() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "Z zero"), "Z zero OK");
        assert_eq!(
            send(&mut c, "GRIPPER zero"),
            "ERROR: Unknown command: zero (GRIPPER)"
        );
    }

    #[test]
    fn on_off_only_for_outputs() {
        let (mut c, board) = controller();
        assert_eq!(send(&mut c, "LIGHT ON"), "LIGHT state ON OK");
        assert_eq!(board.pwm("LIGHT").unwrap().duty(), 255);
        assert_eq!(send(&mut c, "LIGHT state?"), "LIGHT state ON");
        assert_eq!(send(&mut c, "X ON"), "ERROR: ON not supported (X)");
    }

    #[test]
    fn sensor_reads() {
        let (mut c, board) = controller();
        board.adc("PRESSURE").unwrap().set(1023);
        assert_eq!(send(&mut c, "PRESSURE read"), "PRESSURE value 5.00");
        assert_eq!(send(&mut c, "PRESSURE raw"), "PRESSURE raw 1023");
        assert_eq!(send(&mut c, "X_MIN state?"), "X_MIN state 0");
        assert_eq!(
            send(&mut c, "TEMP position 1"),
            "ERROR: Unknown sensor command (TEMP)"
        );
    }

    #[test]
    fn every_device_answers_status_and_reset() {
        let (mut c, _) = controller();
        assert!(send(&mut c, "TEMP status").starts_with("Name: TEMP, Type: AnalogSensor"));
        assert_eq!(send(&mut c, "GRIPPER reset"), "GRIPPER reset OK");
    }

    // =========================================================================
    // Bulk Tests
    // =========================================================================

    #[test]
    fn bulk_outputs_off() {
        let (mut c, board) = controller();
        send(&mut c, "FAN ON");
        send(&mut c, "PUMP ON");
        assert_eq!(send(&mut c, "OUTPUTS OFF"), "OUTPUTS off OK");
        for name in ["LIGHT", "FAN", "PUMP"] {
            assert_eq!(board.pwm(name).unwrap().duty(), 0);
        }
    }

    #[test]
    fn bulk_swallows_member_failures() {
        let (mut c, _) = controller();
        // steppers start disabled, so every member fails
        assert_eq!(send(&mut c, "STEPPERS position 1"), "STEPPERS position OK");
    }

    #[test]
    fn empty_group_is_unknown() {
        let mut board = MockBoard::new();
        let config = Config::default().with_devices(crate::config::DeviceTable::empty());
        let mut c = Controller::new(&config, &mut board);
        let reply = c.dispatch(&"SERVOS stop".parse().unwrap(), 0);
        assert_eq!(reply.encode(), "ERROR: Unknown group (SERVOS)");
    }

    // =========================================================================
    // Service Tests
    // =========================================================================

    #[test]
    fn unknown_service() {
        let (mut c, _) = controller();
        assert_eq!(
            send(&mut c, "SERVICE dance"),
            "ERROR: Unknown service: DANCE (SERVICE)"
        );
        assert_eq!(c.pending_events(), 0);
    }

    #[test]
    fn full_status_announces_start() {
        let (mut c, _) = controller();
        let text = send(&mut c, "SERVICE full_status");
        assert!(text.starts_with("=== SYSTEM STATUS ==="));
        assert!(text.contains("=== DEVICE LIST ==="));
        assert_eq!(c.pop_event().unwrap().encode(), "SERVICE FULL_STATUS STARTED");
    }

    #[test]
    fn service_estop_latches() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "SERVICE ESTOP"), "SERVICE ESTOP DONE");
        assert!(c.is_emergency_stopped());
    }

    #[test]
    fn calibration_blocks_device_commands() {
        let (mut c, _) = controller();
        assert_eq!(send(&mut c, "SERVICE CALIBRATE_X"), "SERVICE CALIBRATE_X STARTED");
        assert!(c.is_calibrating());
        assert_eq!(send(&mut c, "FAN ON"), "ERROR: Calibration in progress (FAN)");
        assert_eq!(send(&mut c, "PING"), "PONG");
        assert_eq!(
            send(&mut c, "SERVICE CALIBRATE_Y"),
            "ERROR: Calibration in progress (SERVICE)"
        );
        assert_eq!(send(&mut c, "SERVICE ESTOP"), "SERVICE ESTOP DONE");
        assert!(!c.is_calibrating());
        let events: Vec<String> = c.drain_events().map(|e| e.encode()).collect();
        assert_eq!(
            events,
            ["SERVICE ESTOP STARTED", "SERVICE CALIBRATE_X FAILED"]
        );
    }

    #[test]
    fn silent_service_notices() {
        let mut board = MockBoard::new();
        let config = Config::default()
            .with_events(EventConfig::default().with_service_notices(false, false));
        let mut c = Controller::new(&config, &mut board);
        assert_eq!(send(&mut c, "SERVICE CALIBRATE_Z"), "SERVICE CALIBRATE_Z OK");
        assert_eq!(send(&mut c, "SERVICE ESTOP"), "SERVICE ESTOP OK");
        assert_eq!(c.pending_events(), 0);
    }

    // =========================================================================
    // Update Tests
    // =========================================================================

    #[test]
    fn switch_change_queues_one_event() {
        let (mut c, board) = controller();
        board.input("Y_MIN").unwrap().set_high();
        for t in 0..200 {
            c.update(t);
        }
        let events: Vec<String> = c.drain_events().map(|e| e.encode()).collect();
        assert_eq!(events, ["Y_MIN state 1 EVENT"]);
    }

    #[test]
    fn switch_events_can_be_disabled() {
        let mut board = MockBoard::new();
        let config = Config::default().with_events(EventConfig::default().with_switch_events(false));
        let mut c = Controller::new(&config, &mut board);
        board.input("X_MIN").unwrap().set_high();
        for t in 0..200 {
            c.update(t);
        }
        assert_eq!(c.pending_events(), 0);
        assert!(c.device("X_MIN").unwrap().as_switch().unwrap().is_pressed());
    }

    #[test]
    fn event_queue_is_bounded() {
        let (mut c, board) = controller();
        let pin = board.input("Z_MIN").unwrap();
        let mut t = 0;
        for i in 0..(MAX_PENDING_EVENTS + 5) {
            pin.set(i % 2 == 0);
            for _ in 0..60 {
                c.update(t);
                t += 1;
            }
        }
        assert_eq!(c.pending_events(), MAX_PENDING_EVENTS);
    }

    #[test]
    fn estop_freezes_updates() {
        let (mut c, board) = controller();
        c.emergency_stop_all();
        board.input("X_MIN").unwrap().set_high();
        for t in 0..200 {
            c.update(t);
        }
        assert_eq!(c.pending_events(), 0);
        assert_eq!(
            c.dispatch(&"X_MIN reset".parse().unwrap(), 200).encode(),
            "X_MIN reset OK"
        );
    }

    #[test]
    fn snapshot_lists_devices() {
        let (c, _) = controller();
        let state = c.state(0);
        assert_eq!(state.devices[0].name.as_str(), "X");
        assert_eq!(state.devices[0].kind, DeviceKind::Stepper);
        assert!(state.devices[12].value.is_some());
        assert_eq!(state.calibrating, None);
    }
}
