//! # rs-ramps
//!
//! Motion and IO controller core for RAMPS-style boards, driven by a
//! line-oriented text protocol over a serial link.
//!
//! ## Features
//!
//! - **Text protocol**: `>X position 1.57`, `>FAN ON`, `>TEMP read`, bulk groups
//!   and system commands, one reply per command
//! - **Device model**: steppers, servos, MOSFET outputs, limit switches and
//!   analog sensors behind a closed enum with actuator/sensor capability traits
//! - **Emergency stop**: latched, rejecting every command but reset
//! - **Homing**: a stepped calibration state machine with timeouts
//! - **Hardware abstraction**: traits for drivers and pins, a simulated board for
//!   testing, and `embedded-hal` adapters for real targets
//!
//! ## Architecture
//!
//! The crate is structured to allow testing on desktop without hardware:
//!
//! - `command` / `reply` - The wire protocol
//! - `devices` - Device kinds and their state machines
//! - `controller` - Dispatch, emergency stop, events
//! - `calibration` - Axis homing
//! - `interface` - Line buffering between a serial port and the controller
//! - `hal` - Concrete implementations (mock board, embedded-hal adapters)
//!
//! ## Example
//!
//! ```rust
//! use rs_ramps::{Command, Config, Controller, ReplyStatus};
//! use rs_ramps::hal::MockBoard;
//!
//! // Build the reference board against simulated hardware
//! let mut board = MockBoard::new();
//! let mut controller = Controller::new(&Config::default(), &mut board);
//!
//! let reply = controller.dispatch(&">FAN ON".parse::<Command>().unwrap(), 0);
//! assert_eq!(reply.encode(), "FAN state ON OK");
//!
//! let reply = controller.dispatch(&">GHOST stop".parse::<Command>().unwrap(), 0);
//! assert_eq!(reply.status, ReplyStatus::Error);
//!
//! // Update in your main loop
//! controller.update(1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Axis homing state machine.
pub mod calibration;
/// Command parsing and the command vocabulary.
pub mod command;
/// Device table and protocol settings.
pub mod config;
/// Dispatch, emergency stop and event queue.
pub mod controller;
/// Device kinds, capability traits and the device enum.
pub mod devices;
/// Error codes carried by error replies.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Serial line transport.
pub mod interface;
/// Trapezoidal step profile shared by stepper drivers.
pub mod motion;
/// Numeric value parsing.
pub mod parsing;
/// Replies and events.
pub mod reply;
/// Core traits for hardware abstraction and the host link.
pub mod traits;

// Re-exports for convenience
pub use calibration::{Calibration, CalibrationFailure, CalibrationTarget};
pub use command::{BulkGroup, Command, CommandKind};
pub use config::{Axis, Config, DeviceTable, EventConfig, ProtocolConfig};
pub use controller::{Controller, ControllerState};
pub use devices::{Actuator, Device, DeviceKind, DeviceState, Sensor};
pub use error::ErrorCode;
pub use interface::{Interface, InterfaceStats};
pub use reply::{Reply, ReplyStatus};
pub use traits::{
    // Hardware
    AnalogInput,
    Board,
    Clock,
    DigitalInput,
    MotionDriver,
    PwmPin,
    // Transport
    SerialPort,
    ServoDriver,
};
