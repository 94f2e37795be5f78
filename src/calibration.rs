//! Axis homing as a stepped state machine.
//!
//! A [`Calibration`] drives one axis at a time toward its home switch,
//! backs off a few steps once the switch closes, and zeroes the axis. The
//! controller calls [`Calibration::step`] from its update loop after the
//! devices have been advanced, so switch debouncing and stepper motion
//! keep running while homing is in progress.
//!
//! ```text
//! Pending ──▶ Seeking ──(switch)──▶ BackingOff ──(stopped)──▶ Pending (next axis)
//!               │                        │                        │
//!               └──(timeout)──▶ Failed ◀─┘                        └──(none left)──▶ Done
//! ```

use core::fmt;

use heapless::Vec as HVec;
use log::{debug, info, warn};

use crate::config::{Axis, CalibrationConfig};
use crate::devices::{Actuator, Device};
use crate::error::ErrorCode;
use crate::traits::Board;

// ============================================================================
// Target
// ============================================================================

/// Which axes to home.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CalibrationTarget {
    /// A single axis
    Axis(Axis),
    /// X, then Y, then Z; stops at the first failure
    All,
}

impl CalibrationTarget {
    /// Map a service name (`CALIBRATE_X` ... `CALIBRATE_ALL`).
    ///
    /// ```
    /// use rs_ramps::calibration::CalibrationTarget;
    /// use rs_ramps::config::Axis;
    ///
    /// assert_eq!(
    ///     CalibrationTarget::from_service("CALIBRATE_Y"),
    ///     Some(CalibrationTarget::Axis(Axis::Y))
    /// );
    /// assert_eq!(CalibrationTarget::from_service("FULL_STATUS"), None);
    /// ```
    pub fn from_service(name: &str) -> Option<Self> {
        match name.strip_prefix("CALIBRATE_")? {
            "ALL" => Some(CalibrationTarget::All),
            axis => Axis::from_text(axis).map(CalibrationTarget::Axis),
        }
    }

    /// Service name that starts this target.
    pub const fn service_name(&self) -> &'static str {
        match self {
            CalibrationTarget::Axis(Axis::X) => "CALIBRATE_X",
            CalibrationTarget::Axis(Axis::Y) => "CALIBRATE_Y",
            CalibrationTarget::Axis(Axis::Z) => "CALIBRATE_Z",
            CalibrationTarget::All => "CALIBRATE_ALL",
        }
    }

    fn axes(&self) -> HVec<Axis, 3> {
        match self {
            CalibrationTarget::Axis(axis) => HVec::from_slice(&[*axis]).unwrap_or_default(),
            CalibrationTarget::All => HVec::from_slice(&Axis::ALL).unwrap_or_default(),
        }
    }
}

impl fmt::Display for CalibrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

// ============================================================================
// Failure
// ============================================================================

/// Why homing stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CalibrationFailure {
    /// No stepper is configured for the axis
    UnknownAxis(Axis),
    /// The axis names no home switch, or the switch does not exist
    NoHomeSwitch(Axis),
    /// The switch did not close, or the back-off did not finish, in time
    Timeout(Axis),
    /// Cancelled by an emergency stop
    Aborted,
    /// Another calibration is already running, or the e-stop is latched
    Busy,
}

impl CalibrationFailure {
    /// Matching protocol error code.
    pub const fn code(&self) -> ErrorCode {
        match self {
            CalibrationFailure::UnknownAxis(_) | CalibrationFailure::NoHomeSwitch(_) => {
                ErrorCode::UnknownDevice
            }
            CalibrationFailure::Timeout(_) => ErrorCode::Timeout,
            CalibrationFailure::Aborted | CalibrationFailure::Busy => ErrorCode::DeviceBusy,
        }
    }
}

impl fmt::Display for CalibrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationFailure::UnknownAxis(a) => write!(f, "no stepper for axis {}", a.as_str()),
            CalibrationFailure::NoHomeSwitch(a) => {
                write!(f, "no home switch for axis {}", a.as_str())
            }
            CalibrationFailure::Timeout(a) => write!(f, "axis {} timed out", a.as_str()),
            CalibrationFailure::Aborted => f.write_str("aborted"),
            CalibrationFailure::Busy => f.write_str("controller busy"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CalibrationFailure {}

// ============================================================================
// State Machine
// ============================================================================

/// Where the homing sequence is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationPhase {
    /// Between axes
    Pending,
    /// Driving toward the switch
    Seeking {
        /// Device index of the stepper
        stepper: usize,
        /// Device index of the home switch
        switch: usize,
    },
    /// Moving off the closed switch
    BackingOff {
        /// Device index of the stepper
        stepper: usize,
    },
    /// Every axis homed
    Done,
    /// Stopped early
    Failed(CalibrationFailure),
}

/// A homing run over one or more axes.
#[derive(Clone, Debug)]
pub struct Calibration {
    target: CalibrationTarget,
    axes: HVec<Axis, 3>,
    next: usize,
    axis: Option<Axis>,
    phase: CalibrationPhase,
    phase_start_ms: u64,
    settings: CalibrationConfig,
}

impl Calibration {
    /// A run that has not touched any device yet. The first
    /// [`step`](Self::step) resolves the first axis.
    pub fn new(target: CalibrationTarget, settings: &CalibrationConfig) -> Self {
        Self {
            target,
            axes: target.axes(),
            next: 0,
            axis: None,
            phase: CalibrationPhase::Pending,
            phase_start_ms: 0,
            settings: settings.clone(),
        }
    }

    /// What is being homed.
    pub fn target(&self) -> CalibrationTarget {
        self.target
    }

    /// Current phase.
    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Axis being homed right now.
    pub fn current_axis(&self) -> Option<Axis> {
        self.axis
    }

    /// Whether the run has finished, either way.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.phase,
            CalibrationPhase::Done | CalibrationPhase::Failed(_)
        )
    }

    /// Advance the run. Returns the outcome once finished.
    pub fn step<B: Board>(
        &mut self,
        devices: &mut [Device<B>],
        now_ms: u64,
    ) -> Option<Result<(), CalibrationFailure>> {
        match self.phase {
            CalibrationPhase::Pending => {
                let Some(&axis) = self.axes.get(self.next) else {
                    info!("calibration {} done", self.target);
                    self.phase = CalibrationPhase::Done;
                    return Some(Ok(()));
                };
                self.next += 1;
                self.axis = Some(axis);
                if let Err(failure) = self.begin_axis(devices, axis, now_ms) {
                    return Some(self.fail(failure));
                }
                None
            }
            CalibrationPhase::Seeking { stepper, switch } => {
                let pressed = devices[switch].as_switch().is_some_and(|s| s.is_pressed());
                let Some(axis_stepper) = devices[stepper].as_stepper_mut() else {
                    return Some(self.fail(CalibrationFailure::Aborted));
                };

                if pressed {
                    axis_stepper.emergency_stop();
                    let backoff = axis_stepper.position_steps() + self.settings.backoff_steps;
                    if axis_stepper.move_to_steps(backoff).is_err() {
                        axis_stepper.end_calibration();
                        return Some(self.fail(CalibrationFailure::Aborted));
                    }
                    debug!("home switch closed, backing off to step {}", backoff);
                    self.enter(CalibrationPhase::BackingOff { stepper }, now_ms);
                } else if self.timed_out(now_ms) {
                    axis_stepper.emergency_stop();
                    axis_stepper.end_calibration();
                    return Some(self.fail(self.timeout_failure()));
                }
                None
            }
            CalibrationPhase::BackingOff { stepper } => {
                let Some(axis_stepper) = devices[stepper].as_stepper_mut() else {
                    return Some(self.fail(CalibrationFailure::Aborted));
                };
                if !axis_stepper.is_moving() {
                    axis_stepper.set_zero();
                    axis_stepper.end_calibration();
                    if let Some(axis) = self.axis {
                        info!("axis {} homed", axis.as_str());
                    }
                    self.enter(CalibrationPhase::Pending, now_ms);
                } else if self.timed_out(now_ms) {
                    axis_stepper.emergency_stop();
                    axis_stepper.end_calibration();
                    return Some(self.fail(self.timeout_failure()));
                }
                None
            }
            CalibrationPhase::Done => Some(Ok(())),
            CalibrationPhase::Failed(failure) => Some(Err(failure)),
        }
    }

    /// Cancel the run, halting the axis in motion.
    pub fn abort<B: Board>(&mut self, devices: &mut [Device<B>]) {
        let stepper = match self.phase {
            CalibrationPhase::Seeking { stepper, .. } | CalibrationPhase::BackingOff { stepper } => {
                Some(stepper)
            }
            _ => None,
        };
        if let Some(axis_stepper) = stepper.and_then(|i| devices[i].as_stepper_mut()) {
            axis_stepper.emergency_stop();
            axis_stepper.end_calibration();
        }
        if !self.is_finished() {
            let _ = self.fail(CalibrationFailure::Aborted);
        }
    }

    fn begin_axis<B: Board>(
        &mut self,
        devices: &mut [Device<B>],
        axis: Axis,
        now_ms: u64,
    ) -> Result<(), CalibrationFailure> {
        let stepper = devices
            .iter()
            .position(|d| d.as_stepper().is_some_and(|s| s.axis() == Some(axis)))
            .ok_or(CalibrationFailure::UnknownAxis(axis))?;

        let switch = devices[stepper]
            .as_stepper()
            .and_then(|s| s.home_switch())
            .and_then(|name| {
                devices
                    .iter()
                    .position(|d| d.as_switch().is_some() && d.name() == name)
            })
            .ok_or(CalibrationFailure::NoHomeSwitch(axis))?;

        let settings = &self.settings;
        let axis_stepper = devices[stepper]
            .as_stepper_mut()
            .ok_or(CalibrationFailure::UnknownAxis(axis))?;
        axis_stepper.begin_calibration();
        let velocity = -settings.speed_steps_per_s / axis_stepper.steps_per_unit();
        if axis_stepper.set_velocity(velocity, now_ms).is_err() {
            axis_stepper.end_calibration();
            return Err(CalibrationFailure::Aborted);
        }

        info!("homing axis {} toward {}", axis.as_str(), devices[switch].name());
        self.enter(CalibrationPhase::Seeking { stepper, switch }, now_ms);
        Ok(())
    }

    fn enter(&mut self, phase: CalibrationPhase, now_ms: u64) {
        self.phase = phase;
        self.phase_start_ms = now_ms;
    }

    fn timed_out(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.phase_start_ms) > self.settings.timeout_ms
    }

    fn timeout_failure(&self) -> CalibrationFailure {
        match self.axis {
            Some(axis) => CalibrationFailure::Timeout(axis),
            None => CalibrationFailure::Aborted,
        }
    }

    fn fail(&mut self, failure: CalibrationFailure) -> Result<(), CalibrationFailure> {
        warn!("calibration {} failed: {}", self.target, failure);
        self.phase = CalibrationPhase::Failed(failure);
        Err(failure)
    }
}
