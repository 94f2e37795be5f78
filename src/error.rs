//! Error taxonomy surfaced to the host through error replies.
//!
//! Nothing in the controller panics on bad input. Every failure becomes an
//! [`ErrorCode`] carried by a [`Reply`](crate::reply::Reply), which the
//! transport encodes as `ERROR: <message> (<device>)`.

use core::fmt;

/// Failure categories reported to the host.
///
/// The numeric values match the wire-level codes used by existing host
/// tooling (`0` is reserved for "no error").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// No device or group with the given name.
    UnknownDevice = 1,
    /// The device does not support the requested command.
    UnknownCommand = 2,
    /// Malformed command or a write the device refused.
    InvalidParam = 3,
    /// Value outside the accepted range.
    OutOfRange = 4,
    /// Rejected because of the emergency stop or a running calibration.
    DeviceBusy = 5,
    /// Operation did not complete in time.
    Timeout = 6,
    /// Controller or driver unavailable.
    HardwareFault = 7,
    /// Recognised but not supported by this build.
    NotImplemented = 8,
}

impl ErrorCode {
    /// Numeric wire code.
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Canonical message used when a reply is built without one.
    ///
    /// ```
    /// use rs_ramps::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::UnknownDevice.default_message(), "Unknown device");
    /// assert_eq!(ErrorCode::Timeout.default_message(), "Operation timeout");
    /// ```
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::UnknownDevice => "Unknown device",
            Self::UnknownCommand => "Unknown command",
            Self::InvalidParam => "Invalid parameter",
            Self::OutOfRange => "Value out of range",
            Self::DeviceBusy => "Device busy",
            Self::Timeout => "Operation timeout",
            Self::HardwareFault => "Hardware fault",
            Self::NotImplemented => "Not implemented",
        }
    }

    /// Looks up a code from its numeric wire value.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::UnknownDevice),
            2 => Some(Self::UnknownCommand),
            3 => Some(Self::InvalidParam),
            4 => Some(Self::OutOfRange),
            5 => Some(Self::DeviceBusy),
            6 => Some(Self::Timeout),
            7 => Some(Self::HardwareFault),
            8 => Some(Self::NotImplemented),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_message())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorCode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for raw in 1..=8u8 {
            let code = ErrorCode::from_code(raw).unwrap();
            assert_eq!(code.code(), raw);
        }
        assert_eq!(ErrorCode::from_code(0), None);
        assert_eq!(ErrorCode::from_code(9), None);
    }

    #[test]
    fn display_uses_default_message() {
        assert_eq!(
            alloc::format!("{}", ErrorCode::DeviceBusy),
            "Device busy"
        );
    }
}
