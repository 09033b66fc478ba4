//! XMODEM upload into device RAM.
//!
//! Only the original checksum variant is spoken:
//!
//! ```text
//! +-----+-----+------+---------------+-----+
//! | SOH | BLK | ~BLK |  DATA (128)   | SUM |
//! +-----+-----+------+---------------+-----+
//! | 1   | 1   | 1    |     128       | 1   |
//! +-----+-----+------+---------------+-----+
//! ```
//!
//! `SUM` is the payload bytes added modulo 256. A short final block is padded
//! with `0x1A`.

use crate::config::NakPolicy;
use crate::console::{Console, ConsoleState};
use crate::error::Result;
use crate::progress::Progress;
use log::{debug, info, trace, warn};
use std::io::Write;
use std::thread;

/// XMODEM control characters.
pub mod control {
    /// Start of Header.
    pub const SOH: u8 = 0x01;
    /// End of Transmission.
    pub const EOT: u8 = 0x04;
    /// Acknowledge.
    pub const ACK: u8 = 0x06;
    /// Not Acknowledge.
    pub const NAK: u8 = 0x15;
    /// Padding for the last block (SUB).
    pub const PAD: u8 = 0x1A;
    /// Receiver ready.
    pub const C: u8 = b'C';
}

/// Payload bytes per packet.
pub const DATA_SIZE: usize = 128;

/// Bytes per packet on the wire.
pub const PACKET_SIZE: usize = 3 + DATA_SIZE + 1;

/// Sum of `data` modulo 256.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// One framed XMODEM packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmodemPacket {
    bytes: [u8; PACKET_SIZE],
}

impl XmodemPacket {
    /// Frame `payload` as block `block`.
    ///
    /// At most [`DATA_SIZE`] bytes of `payload` are used; anything shorter is
    /// padded with [`control::PAD`].
    pub fn new(block: u8, payload: &[u8]) -> Self {
        let mut bytes = [control::PAD; PACKET_SIZE];
        bytes[0] = control::SOH;
        bytes[1] = block;
        bytes[2] = !block;

        let len = payload
            .len()
            .min(DATA_SIZE);
        bytes[3..3 + len].copy_from_slice(&payload[..len]);
        bytes[PACKET_SIZE - 1] = checksum(&bytes[3..3 + DATA_SIZE]);

        Self { bytes }
    }

    /// Block number.
    pub fn block(&self) -> u8 {
        self.bytes[1]
    }

    /// Padded payload.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[3..3 + DATA_SIZE]
    }

    /// Trailing checksum byte.
    pub fn checksum(&self) -> u8 {
        self.bytes[PACKET_SIZE - 1]
    }

    /// The packet as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Upload `data` to RAM at `address`.
///
/// Returns `Ok(false)` when the receiver stops answering a packet (or, with
/// [`NakPolicy::Retransmit`], keeps rejecting one). A receiver that never
/// signals readiness is an error.
pub fn upload<W, F>(
    console: &mut Console<W>,
    address: u64,
    data: &[u8],
    nak_policy: NakPolicy,
    mut progress: F,
) -> Result<bool>
where
    W: Write,
    F: FnMut(Progress),
{
    let commands = console
        .commands()
        .clone();
    let timing = console
        .timing()
        .clone();
    let total = data.len() as u64;
    info!("Uploading {total} bytes to 0x{address:08X}");

    console.resync()?;
    console.enter_admin_mode()?;
    console.open_menu(&commands.upload_mode, ConsoleState::UploadAddr)?;
    console.drain();
    console.send_with_enter(&format!("{address:X}"))?;
    // The echoed address can itself contain a 'C'.
    console.wait_for_line_end(timing.ready_timeout)?;

    debug!("Waiting for receiver to become ready");
    console.wait_for_char(&[control::C], timing.ready_timeout)?;

    let mut block: u8 = 0;
    let mut sent = 0u64;

    for chunk in data.chunks(DATA_SIZE) {
        block = block.wrapping_add(1);
        let packet = XmodemPacket::new(block, chunk);
        let mut retries = 0;

        loop {
            trace!("Sending block {block}");
            console.send_raw(packet.as_bytes())?;

            match console.wait_for_char(&[control::ACK, control::NAK], timing.char_timeout) {
                Ok(control::ACK) => break,
                Ok(_) => match nak_policy {
                    NakPolicy::Advance => {
                        warn!("Block {block} rejected, continuing with the next one");
                        break;
                    },
                    NakPolicy::Retransmit { max_retries } => {
                        if retries >= max_retries {
                            warn!("Block {block} rejected {} times, giving up", retries + 1);
                            return Ok(false);
                        }
                        retries += 1;
                        warn!("Block {block} rejected, resending ({retries}/{max_retries})");
                    },
                },
                Err(e) if e.is_timeout() => {
                    warn!("No answer to block {block}: {e}");
                    return Ok(false);
                },
                Err(e) => return Err(e),
            }
        }

        sent += chunk.len() as u64;
        progress(Progress {
            current_address: address + sent,
            bytes_processed: sent,
            total_bytes: total,
        });
    }

    debug!("Sending EOT");
    console.send_raw(&[control::EOT])?;
    thread::sleep(timing.eot_settle);

    info!("Upload finished");
    Ok(true)
}
