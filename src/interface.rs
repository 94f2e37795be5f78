//! Line transport between a [`SerialPort`] and the [`Controller`].
//!
//! The interface collects printable bytes into a line, hands complete lines
//! to the controller, and writes the reply followed by any queued events.
//! It owns the port; the controller is passed in on every call so the two
//! can be borrowed independently by the main loop.
//!
//! # Framing
//!
//! - Bytes 32..127 are buffered; the terminator ends a line; anything
//!   else (CR, control characters) is ignored.
//! - A line longer than the buffer is discarded with
//!   `ERROR: Command buffer overflow`.
//! - A partial line idle for longer than the protocol timeout is dropped.
//!
//! # Example
//!
//! ```rust
//! use rs_ramps::{Config, Controller, Interface};
//! use rs_ramps::hal::{MockBoard, MockSerial};
//!
//! let config = Config::default();
//! let mut board = MockBoard::new();
//! let mut controller = Controller::new(&config, &mut board);
//! let mut link = Interface::new(MockSerial::new(), &config.protocol);
//!
//! link.port_mut().push_input(">PING\n>FAN ON\n");
//! link.tick(&mut controller, 0);
//!
//! assert_eq!(link.port_mut().take_output(), ["PONG", "FAN state ON OK"]);
//! assert_eq!(link.stats().commands, 2);
//! ```

use alloc::format;
use alloc::string::String;

use heapless::String as HString;
use log::{debug, warn};

use crate::command::Command;
use crate::config::ProtocolConfig;
use crate::controller::Controller;
use crate::reply::{Reply, ReplyStatus};
use crate::traits::{Board, SerialPort};

/// Size of the line buffer, including room for the terminator.
pub const COMMAND_BUFFER_SIZE: usize = 128;

/// Longest line kept; one more printable byte overflows.
const MAX_LINE_LEN: usize = COMMAND_BUFFER_SIZE - 1;

const BANNER_RULE: &str = "===========================================";

/// Command and error counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterfaceStats {
    /// Lines handed to the parser
    pub commands: u32,
    /// Parse failures, error replies and overflows
    pub errors: u32,
}

impl InterfaceStats {
    /// Errors as a percentage of commands, if any were processed.
    pub fn error_rate(&self) -> Option<f32> {
        if self.commands == 0 {
            None
        } else {
            Some(self.errors as f32 * 100.0 / self.commands as f32)
        }
    }
}

/// Serial line transport.
pub struct Interface<P: SerialPort> {
    port: P,
    protocol: ProtocolConfig,
    buffer: HString<MAX_LINE_LEN>,
    last_byte_ms: u64,
    ack_mode: bool,
    stats: InterfaceStats,
}

impl<P: SerialPort> Interface<P> {
    /// Wrap `port` using `protocol` framing.
    pub fn new(port: P, protocol: &ProtocolConfig) -> Self {
        Self {
            port,
            protocol: protocol.clone(),
            buffer: HString::new(),
            last_byte_ms: 0,
            ack_mode: protocol.ack_mode,
            stats: InterfaceStats::default(),
        }
    }

    // ========================================================================
    // Main Loop
    // ========================================================================

    /// Read input, advance the controller, and flush events.
    pub fn tick<B: Board>(&mut self, controller: &mut Controller<B>, now_ms: u64) {
        self.poll(controller, now_ms);
        controller.update(now_ms);
        self.flush_events(controller);
    }

    /// Drain waiting bytes and execute every complete line.
    ///
    /// Returns the number of lines executed.
    pub fn poll<B: Board>(&mut self, controller: &mut Controller<B>, now_ms: u64) -> usize {
        let mut lines = 0;

        while let Some(byte) = self.port.read_byte() {
            self.last_byte_ms = now_ms;

            if byte == self.protocol.terminator {
                if !self.buffer.is_empty() {
                    let line = core::mem::take(&mut self.buffer);
                    self.process_line(controller, &line, now_ms);
                    lines += 1;
                }
            } else if (32..127).contains(&byte) {
                if self.buffer.push(byte as char).is_err() {
                    warn!("command buffer overflow");
                    self.port.write_line("ERROR: Command buffer overflow");
                    self.stats.errors += 1;
                    self.buffer.clear();
                }
            }
        }

        if !self.buffer.is_empty()
            && now_ms.saturating_sub(self.last_byte_ms) > self.protocol.timeout_ms
        {
            warn!("command timeout, dropped partial line {:?}", self.buffer.as_str());
            self.buffer.clear();
        }

        lines
    }

    /// Parse and execute one line, then write its reply and any events.
    pub fn process_line<B: Board>(&mut self, controller: &mut Controller<B>, line: &str, now_ms: u64) {
        self.stats.commands += 1;

        let cmd = match Command::parse(line, &self.protocol) {
            Ok(cmd) => cmd,
            Err(code) => {
                debug!("rejected {:?}: {}", line, code);
                self.stats.errors += 1;
                self.send_reply(&Reply::error("", code, "Invalid command format"));
                return;
            }
        };

        debug!("command {}", cmd);
        let reply = controller.dispatch(&cmd, now_ms);
        if reply.is_error() {
            self.stats.errors += 1;
        }

        self.flush_events(controller);
        self.send_reply(&reply);
    }

    /// Write every queued controller event.
    pub fn flush_events<B: Board>(&mut self, controller: &mut Controller<B>) {
        while let Some(event) = controller.pop_event() {
            self.send_reply(&event);
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Write one reply. Bare acknowledgements are dropped when ACK mode is off.
    pub fn send_reply(&mut self, reply: &Reply) {
        if !reply.is_valid() {
            return;
        }
        if !self.ack_mode && reply.status == ReplyStatus::Ok && reply.value.is_empty() {
            return;
        }
        let line = reply.encode();
        if !line.is_empty() {
            self.port.write_line(&line);
        }
    }

    /// Write the power-on banner.
    pub fn send_startup_banner(&mut self) {
        let marker = if self.protocol.use_start_marker {
            format!("Commands start with '{}'", self.protocol.start_marker)
        } else {
            String::from("Commands need no start marker")
        };

        self.port.write_line(BANNER_RULE);
        self.port.write_line("RAMPS 1.4 Universal Controller");
        self.port
            .write_line(&format!("Firmware Version {}", env!("CARGO_PKG_VERSION")));
        self.port.write_line(BANNER_RULE);
        self.port.write_line("Ready for commands.");
        self.port.write_line("Type 'CONTROLLER LIST' for device list");
        self.port.write_line(&marker);
        self.port.write_line(BANNER_RULE);
    }

    /// Human-readable counters.
    ///
    /// ```rust
    /// use rs_ramps::Interface;
    /// use rs_ramps::config::ProtocolConfig;
    /// use rs_ramps::hal::MockSerial;
    ///
    /// let link = Interface::new(MockSerial::new(), &ProtocolConfig::default());
    /// assert_eq!(
    ///     link.statistics(),
    ///     "Interface Statistics:\nCommands processed: 0\nErrors: 0\nError rate: N/A\nACK mode: ON"
    /// );
    /// ```
    pub fn statistics(&self) -> String {
        let rate = match self.stats.error_rate() {
            Some(rate) => format!("{rate:.1}%"),
            None => String::from("N/A"),
        };
        format!(
            "Interface Statistics:\nCommands processed: {}\nErrors: {}\nError rate: {}\nACK mode: {}",
            self.stats.commands,
            self.stats.errors,
            rate,
            if self.ack_mode { "ON" } else { "OFF" }
        )
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Counters so far.
    pub fn stats(&self) -> InterfaceStats {
        self.stats
    }

    /// Whether bare acknowledgements are sent.
    pub fn ack_mode(&self) -> bool {
        self.ack_mode
    }

    /// Turn bare acknowledgements on or off.
    pub fn set_ack_mode(&mut self, enabled: bool) {
        self.ack_mode = enabled;
    }

    /// Bytes of the partial line.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// The underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Mutable access to the port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Give back the port.
    pub fn into_port(self) -> P {
        self.port
    }
}
