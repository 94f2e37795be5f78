//! Byte-level link to the host.

/// Serial link carrying the line protocol.
///
/// Reads are non-blocking; writes append the line terminator.
pub trait SerialPort {
    /// Next received byte, if one is waiting.
    fn read_byte(&mut self) -> Option<u8>;

    /// Send one line of text followed by a newline.
    fn write_line(&mut self, line: &str);
}
