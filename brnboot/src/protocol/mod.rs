//! Binary transfer protocols.

pub mod xmodem;

pub use xmodem::{XmodemPacket, checksum, upload};
