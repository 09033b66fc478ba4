//! # brnboot
//!
//! A library for driving the BRN-boot serial console found on many
//! Lantiq/Infineon based routers.
//!
//! BRN-boot only offers a human oriented menu. This crate walks that menu
//! automatically to:
//!
//! - dump a range of device memory
//! - write bytes into device memory, one 32-bit word at a time
//! - upload a file into RAM with XMODEM (128-byte blocks, checksum)
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//! - `serde`: serialization support for the configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use brnboot::{BootConfig, Bootloader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let mut boot = Bootloader::open("/dev/ttyUSB0", BootConfig::default())?;
//!
//!         let dump = boot.dump(0xB000_0000, 0xB000_1000, 1024, |p| {
//!             println!("{}/{} bytes", p.bytes_processed, p.total_bytes);
//!         })?;
//!         println!("{} bytes, {} short blocks", dump.bytes.len(), dump.error_count);
//!
//!         boot.close()?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootloader;
pub mod config;
pub mod console;
pub mod error;
pub mod memory;
pub mod port;
pub mod progress;
pub mod protocol;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    bootloader::Bootloader,
    config::{BootConfig, Commands, NakPolicy, Prompts, Timing},
    console::{Console, ConsoleState, LineReceiver, LineStream, Retry, classify},
    error::{Error, Result},
    memory::{DumpResult, ShortBlock, parse_dump_line},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    progress::Progress,
    protocol::{XmodemPacket, checksum},
};
