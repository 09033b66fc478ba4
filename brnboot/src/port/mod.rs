//! Port abstraction for serial communication.
//!
//! The console engine talks to the device through the `Port` trait, which
//! keeps protocol logic independent of the actual serial driver:
//!
//! ```text
//! +-------------------------+
//! |  Bootloader operations  |
//! | (dump, write, xmodem)   |
//! +------------+------------+
//!              |
//!              v
//! +------------+------------+      +------------------+
//! |        Port trait       | ---> |  reader handle   | ---> LineReceiver thread
//! +------------+------------+      +------------------+
//!              |
//!              v
//! +------------+------------+
//! |  NativePort (serialport)|
//! +-------------------------+
//! ```
//!
//! The write half stays with the owner of the port; a second handle obtained
//! through [`Port::try_clone_reader`] feeds the background line receiver.
//!
//! ## Example
//!
//! ```rust,no_run
//! use brnboot::port::Port;
//! use std::io::Write;
//!
//! fn example<P: Port>(port: &mut P) -> brnboot::Result<()> {
//!     port.clear_buffers()?;
//!     port.write_all(b"\r")?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout.
    ///
    /// Kept short so the receiver thread notices a stop request quickly.
    pub timeout: Duration,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity (typically None).
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(20),
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
    /// Software flow control (XON/XOFF).
    Software,
}

/// Serial port information.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// Unified port trait for serial communication.
pub trait Port: Read + Write + Send {
    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Discard anything waiting in the input and output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Open a second handle that only reads.
    ///
    /// The handle is moved into the background receiver thread. Reads must
    /// time out (`ErrorKind::TimedOut` or `WouldBlock`) rather than block
    /// forever, otherwise the receiver cannot be stopped.
    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>>;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};
