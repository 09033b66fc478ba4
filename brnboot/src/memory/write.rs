//! Memory writes through the console's "write to memory" menu.
//!
//! The menu takes one 32-bit word at a time, so data goes out in 4-byte
//! chunks. A chunk that never reports completion is retried from the menu
//! key after nudging the console back to its prompt.

use crate::console::{Console, ConsoleState, Retry};
use crate::error::{Error, Result};
use crate::progress::Progress;
use log::{debug, info};
use std::io::Write;
use std::thread;

/// Bytes per write command.
pub const CHUNK_SIZE: usize = 4;

/// Fill byte for a short final chunk.
pub const CHUNK_PAD: u8 = 0xFF;

/// Split `data` into 4-byte chunks, padding the last one with `0xFF`.
pub fn chunks(data: &[u8]) -> impl Iterator<Item = [u8; CHUNK_SIZE]> + '_ {
    data.chunks(CHUNK_SIZE)
        .map(|part| {
            let mut chunk = [CHUNK_PAD; CHUNK_SIZE];
            chunk[..part.len()].copy_from_slice(part);
            chunk
        })
}

/// Chunk as the console expects it: eight uppercase hex digits.
pub fn chunk_hex(chunk: &[u8; CHUNK_SIZE]) -> String {
    chunk
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

/// Write `data` to device memory starting at `start`.
///
/// Returns the number of bytes written, always a multiple of four.
pub fn write_memory<W, F>(
    console: &mut Console<W>,
    data: &[u8],
    start: u64,
    mut progress: F,
) -> Result<u64>
where
    W: Write,
    F: FnMut(Progress),
{
    let total = data
        .len()
        .div_ceil(CHUNK_SIZE)
        * CHUNK_SIZE;
    let total = total as u64;
    info!("Writing {} bytes to 0x{start:08X}", data.len());

    let attempts = console
        .timing()
        .write_attempts;
    let settle = console
        .timing()
        .settle_delay;

    console.resync()?;
    console.enter_admin_mode()?;
    console.wait_for_state(ConsoleState::Idle)?;

    let mut address = start;
    let mut written = 0u64;

    for chunk in chunks(data) {
        let hex = chunk_hex(&chunk);
        let outcome = console.retry(
            attempts,
            |c| write_chunk(c, address, &hex),
            |c| {
                c.drain();
                c.send_with_enter("")
            },
        )?;

        match outcome {
            Retry::Done { attempt, .. } => {
                if attempt > 1 {
                    debug!("Chunk at 0x{address:08X} written on attempt {attempt}");
                }
            },
            Retry::Exhausted { attempts } => {
                return Err(Error::WriteFailed { address, attempts });
            },
        }

        address += CHUNK_SIZE as u64;
        written += CHUNK_SIZE as u64;
        progress(Progress {
            current_address: address,
            bytes_processed: written,
            total_bytes: total,
        });
        thread::sleep(settle);
    }

    info!("Wrote {written} bytes");
    Ok(written)
}

/// One pass through the write menu for a single chunk.
fn write_chunk<W: Write>(console: &mut Console<W>, address: u64, hex: &str) -> Result<()> {
    let commands = console
        .commands()
        .clone();
    debug!("Writing {hex} at 0x{address:08X}");

    console.open_menu(&commands.write_mode, ConsoleState::WriteStartAddr)?;
    console.drain();
    console.send_with_enter(&format!("{address:X}"))?;
    console.wait_for_state(ConsoleState::DataLength)?;
    console.drain();
    console.send(&commands.write_data_length)?;
    console.wait_for_state(ConsoleState::WriteCount)?;
    console.drain();
    console.send_with_enter(&commands.write_repeat)?;
    console.wait_for_state(ConsoleState::WriteDataPrompt)?;
    console.drain();
    console.send_with_enter(hex)?;
    console.wait_for_state(ConsoleState::WriteCompleted)
}
