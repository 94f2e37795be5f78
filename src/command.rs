//! Host commands: one text line becomes one [`Command`].
//!
//! # Wire Form
//!
//! ```text
//! [>]<device-or-group>[ <interface>[?] [<value>]]
//! ```
//!
//! - The device or group name is case-sensitive.
//! - The interface is lower-cased and classified into a [`CommandKind`].
//!   A trailing `?` (or the words `get`, `read`, `status`) makes it a query.
//! - A value of `ON` or `OFF` overrides the kind, so `FAN ON` and
//!   `FAN state OFF` both work.
//! - A bare word (`LIST`, `PING`) is its own interface.
//! - `SERVICE <name>` runs a service macro.
//!
//! # Example
//!
//! ```rust
//! use rs_ramps::{Command, CommandKind};
//!
//! let cmd: Command = ">X POSITION 1.57".parse().unwrap();
//! assert_eq!(cmd.name.as_str(), "X");
//! assert_eq!(cmd.interface.as_str(), "position");
//! assert_eq!(cmd.kind, CommandKind::Position);
//! assert_eq!(cmd.value.as_str(), "1.57");
//! assert!(!cmd.query);
//!
//! let cmd: Command = "X velocity?".parse().unwrap();
//! assert!(cmd.query);
//! assert!(cmd.value.is_empty());
//! ```

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

use heapless::String as HString;

use crate::config::{ProtocolConfig, ShortString};
use crate::devices::DeviceKind;
use crate::error::ErrorCode;
use crate::parsing::parse_value;

/// Reserved name of the controller itself.
pub const SYSTEM_DEVICE: &str = "CONTROLLER";

/// Reserved name for service macros.
pub const SERVICE_DEVICE: &str = "SERVICE";

/// Longest value text kept from a command line.
pub const MAX_VALUE_LEN: usize = 64;

/// Value text of a command.
pub type ValueString = HString<MAX_VALUE_LEN>;

// ============================================================================
// Command Kind
// ============================================================================

/// What a command asks for, derived from its interface token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandKind {
    /// `position`, `pos`
    Position,
    /// `velocity`, `vel`, `speed`
    Velocity,
    /// `state`
    State,
    /// `on`, or a value of `ON`
    On,
    /// `off`, or a value of `OFF`
    Off,
    /// `get`, `read`
    Get,
    /// `status`
    Status,
    /// `config`, `configure`
    Config,
    /// `calibrate`, `home`
    Calibrate,
    /// `reset`
    Reset,
    /// `list`
    List,
    /// `ping`
    Ping,
    /// `stop`
    Stop,
    /// `estop`, `emergency`
    Estop,
    /// `service`
    Service,
    /// `enable`
    Enable,
    /// `disable`
    Disable,
    /// Anything else; the interface is kept for device fallbacks
    Unknown,
}

impl CommandKind {
    /// Classify a lower-case interface token.
    ///
    /// ```
    /// use rs_ramps::CommandKind;
    ///
    /// assert_eq!(CommandKind::from_token("pos"), CommandKind::Position);
    /// assert_eq!(CommandKind::from_token("speed"), CommandKind::Velocity);
    /// assert_eq!(CommandKind::from_token("home"), CommandKind::Calibrate);
    /// assert_eq!(CommandKind::from_token("accel"), CommandKind::Unknown);
    /// ```
    pub fn from_token(token: &str) -> Self {
        match token {
            "position" | "pos" => CommandKind::Position,
            "velocity" | "vel" | "speed" => CommandKind::Velocity,
            "state" => CommandKind::State,
            "on" => CommandKind::On,
            "off" => CommandKind::Off,
            "get" | "read" => CommandKind::Get,
            "status" => CommandKind::Status,
            "config" | "configure" => CommandKind::Config,
            "calibrate" | "home" => CommandKind::Calibrate,
            "reset" => CommandKind::Reset,
            "list" => CommandKind::List,
            "ping" => CommandKind::Ping,
            "stop" => CommandKind::Stop,
            "estop" | "emergency" => CommandKind::Estop,
            "service" => CommandKind::Service,
            "enable" => CommandKind::Enable,
            "disable" => CommandKind::Disable,
            _ => CommandKind::Unknown,
        }
    }

    /// Canonical interface token.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Position => "position",
            CommandKind::Velocity => "velocity",
            CommandKind::State => "state",
            CommandKind::On => "on",
            CommandKind::Off => "off",
            CommandKind::Get => "get",
            CommandKind::Status => "status",
            CommandKind::Config => "config",
            CommandKind::Calibrate => "calibrate",
            CommandKind::Reset => "reset",
            CommandKind::List => "list",
            CommandKind::Ping => "ping",
            CommandKind::Stop => "stop",
            CommandKind::Estop => "estop",
            CommandKind::Service => "service",
            CommandKind::Enable => "enable",
            CommandKind::Disable => "disable",
            CommandKind::Unknown => "unknown",
        }
    }

    /// Kinds that read rather than write.
    pub const fn implies_query(&self) -> bool {
        matches!(self, CommandKind::Get | CommandKind::Status)
    }

    /// Kinds the controller answers itself when sent as a bare word.
    pub const fn is_system(&self) -> bool {
        matches!(
            self,
            CommandKind::List
                | CommandKind::Status
                | CommandKind::Ping
                | CommandKind::Estop
                | CommandKind::Reset
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Bulk Groups
// ============================================================================

/// Reserved group names addressing several devices at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BulkGroup {
    /// `STEPPERS`
    Steppers,
    /// `SERVOS`
    Servos,
    /// `OUTPUTS`
    Outputs,
    /// `SWITCHES`
    Switches,
    /// `SENSORS`: switches and analog sensors
    Sensors,
    /// `ACTUATORS`: steppers, servos and outputs
    Actuators,
    /// `ALL`
    All,
}

impl BulkGroup {
    /// Every group.
    pub const ALL_GROUPS: [BulkGroup; 7] = [
        BulkGroup::Steppers,
        BulkGroup::Servos,
        BulkGroup::Outputs,
        BulkGroup::Switches,
        BulkGroup::Sensors,
        BulkGroup::Actuators,
        BulkGroup::All,
    ];

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL_GROUPS.into_iter().find(|g| g.as_str() == name)
    }

    /// Wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BulkGroup::Steppers => "STEPPERS",
            BulkGroup::Servos => "SERVOS",
            BulkGroup::Outputs => "OUTPUTS",
            BulkGroup::Switches => "SWITCHES",
            BulkGroup::Sensors => "SENSORS",
            BulkGroup::Actuators => "ACTUATORS",
            BulkGroup::All => "ALL",
        }
    }

    /// Whether devices of `kind` belong to the group.
    pub const fn includes(&self, kind: DeviceKind) -> bool {
        match self {
            BulkGroup::Steppers => matches!(kind, DeviceKind::Stepper),
            BulkGroup::Servos => matches!(kind, DeviceKind::Servo),
            BulkGroup::Outputs => matches!(kind, DeviceKind::Output),
            BulkGroup::Switches => matches!(kind, DeviceKind::Switch),
            BulkGroup::Sensors => kind.is_sensor(),
            BulkGroup::Actuators => kind.is_actuator(),
            BulkGroup::All => true,
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// One parsed command line.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    /// Device, group, or system name as sent
    pub name: ShortString,
    /// Lower-case interface token
    pub interface: ShortString,
    /// Classified interface
    pub kind: CommandKind,
    /// Free-text value
    pub value: ValueString,
    /// Read rather than write
    pub query: bool,
    /// Name is a reserved group
    pub bulk: bool,
}

fn bounded<const N: usize>(text: &str) -> HString<N> {
    let mut out = HString::new();
    for c in text.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

fn lowercase(text: &str) -> ShortString {
    let mut out = ShortString::new();
    for c in text.chars() {
        if out.push(c.to_ascii_lowercase()).is_err() {
            break;
        }
    }
    out
}

impl Command {
    /// Build a command directly, using the kind's canonical interface.
    ///
    /// ```
    /// use rs_ramps::{Command, CommandKind};
    ///
    /// let cmd = Command::new("OUTPUTS", CommandKind::Off);
    /// assert!(cmd.bulk);
    /// assert_eq!(cmd.to_line(), ">OUTPUTS off");
    /// ```
    pub fn new(name: &str, kind: CommandKind) -> Self {
        Self {
            name: bounded(name),
            interface: bounded(kind.as_str()),
            kind,
            value: ValueString::new(),
            query: kind.implies_query(),
            bulk: BulkGroup::from_name(name).is_some(),
        }
    }

    /// Set the value text.
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = bounded(value);
        self
    }

    /// Replace the interface token, keeping the kind.
    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = lowercase(interface);
        self
    }

    /// Mark as a query.
    pub fn as_query(mut self) -> Self {
        self.query = true;
        self
    }

    /// Parse one line using `protocol` framing.
    ///
    /// Fails with [`ErrorCode::InvalidParam`] when no name is present.
    pub fn parse(line: &str, protocol: &ProtocolConfig) -> Result<Self, ErrorCode> {
        let mut text = line.trim();
        if protocol.use_start_marker {
            if let Some(rest) = text.strip_prefix(protocol.start_marker) {
                text = rest;
            }
        }

        let mut fields = text
            .split(protocol.delimiter)
            .filter(|f| !f.trim().is_empty())
            .map(str::trim)
            .take(4);
        let name = fields.next().ok_or(ErrorCode::InvalidParam)?;
        let field1 = fields.next();
        let field2 = fields.next();

        if name.eq_ignore_ascii_case(SERVICE_DEVICE) {
            if let Some(service) = field1 {
                return Ok(Self {
                    name: bounded(name),
                    interface: bounded(CommandKind::Service.as_str()),
                    kind: CommandKind::Service,
                    value: bounded(service),
                    query: false,
                    bulk: false,
                });
            }
        }

        let mut interface = lowercase(field1.unwrap_or(name));
        let mut query = false;
        if interface.ends_with('?') {
            interface.pop();
            query = true;
        }

        let mut kind = CommandKind::from_token(&interface);
        if kind.implies_query() {
            query = true;
        }

        let value = field2.unwrap_or("");
        if value.eq_ignore_ascii_case("ON") {
            kind = CommandKind::On;
        } else if value.eq_ignore_ascii_case("OFF") {
            kind = CommandKind::Off;
        }

        Ok(Self {
            name: bounded(name),
            interface,
            kind,
            value: bounded(value),
            query,
            bulk: BulkGroup::from_name(name).is_some(),
        })
    }

    /// The bulk group named by this command, if any.
    pub fn group(&self) -> Option<BulkGroup> {
        BulkGroup::from_name(&self.name)
    }

    /// The value as a number; non-numeric text reads as 0.
    pub fn numeric_value(&self) -> f32 {
        parse_value(&self.value)
    }

    /// Whether the line was a single word, like `PING`.
    pub fn is_bare(&self) -> bool {
        self.value.is_empty() && self.name.eq_ignore_ascii_case(&self.interface)
    }

    /// Whether the controller answers this command itself.
    pub fn is_system(&self) -> bool {
        self.name.as_str() == SYSTEM_DEVICE
            || self.kind == CommandKind::List
            || (self.is_bare() && self.kind.is_system())
    }

    /// Wire form of the command.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ">{}", self.name)?;
        if self.kind == CommandKind::Service && self.name.eq_ignore_ascii_case(SERVICE_DEVICE) {
            return write!(f, " {}", self.value);
        }
        if self.is_bare() {
            return Ok(());
        }
        if !self.interface.is_empty() {
            write!(f, " {}", self.interface)?;
            if self.query && !self.kind.implies_query() {
                f.write_str("?")?;
            }
        }
        if !self.value.is_empty() {
            write!(f, " {}", self.value)?;
        }
        Ok(())
    }
}

impl FromStr for Command {
    type Err = ErrorCode;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Command::parse(line, &ProtocolConfig::default())
    }
}
