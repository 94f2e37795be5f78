//! Trait definitions for hardware abstraction and the host link.
//!
//! These let the controller core run unchanged on a RAMPS board, on an
//! `embedded-hal` target, or on a desktop against the simulated board.
//!
//! # Submodules
//!
//! - `hardware`: Motion driver, servo, PWM, digital/analog inputs, clock, board
//! - `transport`: Serial link to the host

pub mod hardware;
pub mod transport;

pub use hardware::*;
pub use transport::*;
