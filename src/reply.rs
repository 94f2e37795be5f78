//! Controller replies and unsolicited events.
//!
//! Every command produces exactly one [`Reply`]. Events use the same type
//! with [`ReplyStatus::Event`] and are queued by the controller rather than
//! returned.
//!
//! # Wire Form
//!
//! | Status | Line |
//! |--------|------|
//! | Ok     | `<device> [<interface>] [<value>] OK` |
//! | Error  | `ERROR: <message> [(<device>)]` |
//! | Value  | `<device> [<interface>] <value>` |
//! | Event  | `<device> [<interface>] <value> EVENT` |
//! | Info   | `<value>` |
//!
//! ```rust
//! use rs_ramps::{ErrorCode, Reply};
//!
//! assert_eq!(Reply::ok("X", "position").with_value("1.57").encode(), "X position 1.57 OK");
//! assert_eq!(Reply::value("TEMP", "value", "23.50").encode(), "TEMP value 23.50");
//! assert_eq!(Reply::event("X_MIN", "state", "1").encode(), "X_MIN state 1 EVENT");
//! assert_eq!(Reply::info("PONG").encode(), "PONG");
//! assert_eq!(
//!     Reply::error("GHOST", ErrorCode::UnknownDevice, "Unknown device").encode(),
//!     "ERROR: Unknown device (GHOST)"
//! );
//! ```

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::error::ErrorCode;

/// Reply category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReplyStatus {
    /// Write accepted
    Ok,
    /// Command failed
    Error,
    /// Query result
    Value,
    /// Unsolicited notification
    Event,
    /// Free text (listings, status blocks)
    Info,
}

/// One line sent back to the host.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reply {
    /// Category
    pub status: ReplyStatus,
    /// Originating device, group or `CONTROLLER`
    pub device: String,
    /// Interface the reply concerns
    pub interface: String,
    /// Value text; the whole body for Info
    pub value: String,
    /// Failure category, set on errors
    pub error: Option<ErrorCode>,
    /// Human-readable error text
    pub message: String,
}

impl Reply {
    fn build(status: ReplyStatus, device: &str, interface: &str, value: &str) -> Self {
        Self {
            status,
            device: device.to_string(),
            interface: interface.to_string(),
            value: value.to_string(),
            error: None,
            message: String::new(),
        }
    }

    /// Acknowledge a write.
    pub fn ok(device: &str, interface: &str) -> Self {
        Self::build(ReplyStatus::Ok, device, interface, "")
    }

    /// Answer a query.
    pub fn value(device: &str, interface: &str, value: &str) -> Self {
        Self::build(ReplyStatus::Value, device, interface, value)
    }

    /// Unsolicited notification.
    pub fn event(device: &str, interface: &str, value: &str) -> Self {
        Self::build(ReplyStatus::Event, device, interface, value)
    }

    /// Free text.
    pub fn info(text: &str) -> Self {
        Self::build(ReplyStatus::Info, "", "", text)
    }

    /// Failure. An empty `message` falls back to the code's default text
    /// followed by the device name.
    ///
    /// ```
    /// use rs_ramps::{ErrorCode, Reply};
    ///
    /// let r = Reply::error("X", ErrorCode::Timeout, "");
    /// assert_eq!(r.message, "Operation timeout X");
    /// assert_eq!(r.encode(), "ERROR: Operation timeout X (X)");
    /// ```
    pub fn error(device: &str, code: ErrorCode, message: &str) -> Self {
        let mut reply = Self::build(ReplyStatus::Error, device, "", "");
        reply.error = Some(code);
        reply.message = if message.is_empty() {
            let mut text = code.default_message().to_string();
            if !device.is_empty() {
                text.push(' ');
                text.push_str(device);
            }
            text
        } else {
            message.to_string()
        };
        reply
    }

    /// Attach a value.
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    /// Whether this is an error reply.
    pub fn is_error(&self) -> bool {
        self.status == ReplyStatus::Error
    }

    /// Structural check: errors need a message, info needs text, and
    /// values and events need a device and a value.
    pub fn is_valid(&self) -> bool {
        match self.status {
            ReplyStatus::Error => !self.message.is_empty(),
            ReplyStatus::Info => !self.value.is_empty(),
            ReplyStatus::Value | ReplyStatus::Event => {
                !self.device.is_empty() && !self.value.is_empty()
            }
            ReplyStatus::Ok => true,
        }
    }

    /// Wire form, without the line terminator.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Best-effort decode of an encoded line, for host tooling.
    ///
    /// The status is inferred from the line: `ERROR:` prefix, `OK` or
    /// `EVENT` suffix, two or three single-line tokens for a value, and
    /// anything else as info.
    ///
    /// ```
    /// use rs_ramps::{Reply, ReplyStatus};
    ///
    /// let r = Reply::decode("X position 1.570");
    /// assert_eq!(r.status, ReplyStatus::Value);
    /// assert_eq!(r.device, "X");
    /// assert_eq!(r.value, "1.570");
    /// assert_eq!(Reply::decode("PONG").status, ReplyStatus::Info);
    /// ```
    pub fn decode(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(rest) = line.strip_prefix("ERROR: ") {
            let (message, device) = match rest.rfind(" (") {
                Some(open) if rest.ends_with(')') => {
                    (&rest[..open], &rest[open + 2..rest.len() - 1])
                }
                _ => (rest, ""),
            };
            let mut reply = Self::build(ReplyStatus::Error, device, "", "");
            reply.message = message.to_string();
            return reply;
        }

        let tokens: Vec<&str> = line.split(' ').filter(|t| !t.is_empty()).collect();
        let single_line = !line.contains('\n');

        if single_line && tokens.len() >= 2 && tokens.len() <= 4 {
            let last = tokens[tokens.len() - 1];
            let status = match last {
                "OK" => Some(ReplyStatus::Ok),
                "EVENT" if tokens.len() >= 3 => Some(ReplyStatus::Event),
                _ => None,
            };
            if let Some(status) = status {
                let fields = &tokens[..tokens.len() - 1];
                let (device, interface, value) = match (status, fields) {
                    (_, [d]) => (*d, "", ""),
                    (ReplyStatus::Event, [d, v]) => (*d, "", *v),
                    (_, [d, i]) => (*d, *i, ""),
                    (_, [d, i, v]) => (*d, *i, *v),
                    _ => ("", "", ""),
                };
                return Self::build(status, device, interface, value);
            }
        }

        match tokens.as_slice() {
            [d, v] if single_line => Self::build(ReplyStatus::Value, d, "", v),
            [d, i, v] if single_line => Self::build(ReplyStatus::Value, d, i, v),
            _ => Self::info(line),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = |f: &mut fmt::Formatter<'_>| -> fmt::Result {
            f.write_str(&self.device)?;
            for part in [&self.interface, &self.value] {
                if !part.is_empty() {
                    write!(f, " {part}")?;
                }
            }
            Ok(())
        };

        match self.status {
            ReplyStatus::Ok => {
                fields(f)?;
                f.write_str(" OK")
            }
            ReplyStatus::Error => {
                f.write_str("ERROR: ")?;
                if self.message.is_empty() {
                    f.write_str("Unknown error")?;
                } else {
                    f.write_str(&self.message)?;
                }
                if !self.device.is_empty() {
                    write!(f, " ({})", self.device)?;
                }
                Ok(())
            }
            ReplyStatus::Value => fields(f),
            ReplyStatus::Event => {
                fields(f)?;
                f.write_str(" EVENT")
            }
            ReplyStatus::Info => f.write_str(&self.value),
        }
    }
}
