//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Simulated board for desktop development and tests
//! - `embedded`: Adapters from `embedded-hal` 1.0 pins (requires `embedded-hal` feature)

pub mod mock;

#[cfg(feature = "embedded-hal")]
pub mod embedded;

pub use mock::*;
