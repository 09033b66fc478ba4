//! Memory dump through the console's "read from memory" menu.
//!
//! The console prints memory as hex text, one line per row:
//!
//! ```text
//! 0x80001000 27 05 19 56 8E 3A 41 0B
//! ```
//!
//! The first segment is the row address and is skipped. Segments are split
//! on single spaces, so the line terminator ends up in the last segment,
//! which is always dropped.

use crate::config::MAX_BLOCK_SIZE;
use crate::console::{Console, ConsoleState};
use crate::error::{Error, Result};
use crate::progress::Progress;
use log::{debug, info, trace, warn};
use std::io::Write;
use std::thread;
use std::time::Instant;

/// A block that returned a different number of bytes than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortBlock {
    /// Start address of the block.
    pub address: u64,
    /// Bytes asked for.
    pub requested: usize,
    /// Bytes actually parsed.
    pub received: usize,
}

/// Result of a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpResult {
    /// Bytes read, in address order.
    pub bytes: Vec<u8>,
    /// Number of short blocks.
    pub error_count: u32,
    /// Where the short blocks happened.
    pub short_blocks: Vec<ShortBlock>,
}

impl DumpResult {
    /// Whether every block came back complete.
    pub fn is_clean(&self) -> bool {
        self.error_count == 0
    }
}

/// Parse one line of dump output into bytes.
///
/// Lines that do not start with a `0x` row address, or that have fewer than
/// two segments, yield nothing. A data segment that is not a one or two
/// digit hex number is a [`Error::MalformedResponse`].
pub fn parse_dump_line(line: &str) -> Result<Vec<u8>> {
    if line
        .trim()
        .is_empty()
    {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = line
        .split(' ')
        .collect();
    if segments.len() < 2
        || !segments[0]
            .trim()
            .starts_with("0x")
    {
        return Ok(Vec::new());
    }

    segments[1..segments.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            parse_hex_byte(segment).ok_or_else(|| Error::MalformedResponse {
                line: line.to_string(),
                segment: i + 1,
            })
        })
        .collect()
}

fn parse_hex_byte(segment: &str) -> Option<u8> {
    let digits = segment.trim();
    if digits.is_empty()
        || digits.len() > 2
        || !digits
            .bytes()
            .all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// Check a dump request before touching the device.
pub fn validate_request(start: u64, end: u64, block_size: usize) -> Result<u64> {
    if end < start {
        return Err(Error::InvalidArgument(format!(
            "end address 0x{end:X} is below start address 0x{start:X}"
        )));
    }
    validate_block_size(block_size)?;
    Ok(end - start)
}

fn validate_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 || block_size > MAX_BLOCK_SIZE {
        return Err(Error::InvalidArgument(format!(
            "block size {block_size} outside 1..={MAX_BLOCK_SIZE}"
        )));
    }
    Ok(())
}

/// Dump `count` bytes starting at `start`, `block_size` bytes per request.
///
/// Short blocks are counted and the next request starts where the data
/// actually stopped. The dump fails only on a timeout, a malformed data
/// line, or when too many blocks in a row return nothing.
pub fn dump_count<W, F>(
    console: &mut Console<W>,
    start: u64,
    count: u64,
    block_size: usize,
    mut progress: F,
) -> Result<DumpResult>
where
    W: Write,
    F: FnMut(Progress),
{
    validate_block_size(block_size)?;
    let mut result = DumpResult::default();
    if count == 0 {
        return Ok(result);
    }

    info!("Dumping {count} bytes from 0x{start:08X} in blocks of {block_size}");
    let started = Instant::now();
    let commands = console
        .commands()
        .clone();
    let stall_limit = console
        .timing()
        .stall_limit;

    console.resync()?;
    console.enter_admin_mode()?;

    let mut address = start;
    let mut remaining = count;
    let mut stalled = 0;

    while remaining > 0 {
        let requested = usize::try_from(remaining).map_or(block_size, |r| r.min(block_size));
        debug!("Reading {requested} bytes at 0x{address:08X}");

        console.open_menu(&commands.read_mode, ConsoleState::ReadStartAddr)?;
        console.drain();
        console.send_with_enter(&format!("{address:X}"))?;
        console.wait_for_state(ConsoleState::DataLength)?;
        console.drain();
        console.send(&commands.read_data_length)?;
        console.wait_for_state(ConsoleState::DumpCount)?;
        console.send_with_enter(&requested.to_string())?;

        let done = address - start;
        let received = read_block(console, &mut result.bytes, |in_block| {
            progress(Progress {
                current_address: address + in_block,
                bytes_processed: done + in_block,
                total_bytes: count,
            });
        })?;

        if received != requested {
            warn!("Short block at 0x{address:08X}: requested {requested}, received {received}");
            result.error_count += 1;
            result
                .short_blocks
                .push(ShortBlock {
                    address,
                    requested,
                    received,
                });
        }

        if received == 0 {
            stalled += 1;
            if stalled >= stall_limit {
                return Err(Error::Stalled {
                    address,
                    attempts: stalled,
                });
            }
        } else {
            stalled = 0;
        }

        address += received as u64;
        remaining = remaining.saturating_sub(received as u64);
    }

    console.send_with_enter("")?;
    console.send_with_enter("")?;

    info!(
        "Dump finished: {} bytes, {} short blocks in {:.1?}",
        result
            .bytes
            .len(),
        result.error_count,
        started.elapsed()
    );
    Ok(result)
}

/// Collect data lines until the console is back at its prompt.
///
/// The prompt check comes before draining so lines queued just ahead of the
/// prompt are still parsed.
fn read_block<W, F>(console: &Console<W>, out: &mut Vec<u8>, mut on_line: F) -> Result<usize>
where
    W: Write,
    F: FnMut(u64),
{
    let timeout = console
        .timing()
        .state_timeout;
    let poll = console
        .timing()
        .poll_interval;
    let base = out.len();
    let mut last_activity = Instant::now();

    loop {
        let idle = console.current_state() == ConsoleState::Idle;

        while let Some(line) = console
            .lines()
            .try_pop_line()
        {
            trace!("dump line {line:?}");
            let data = parse_dump_line(&line)?;
            out.extend_from_slice(&data);
            on_line((out.len() - base) as u64);
            last_activity = Instant::now();
        }

        if idle {
            return Ok(out.len() - base);
        }
        if last_activity.elapsed() > timeout {
            return Err(Error::timeout("end of dump block", timeout));
        }
        thread::sleep(poll);
    }
}
