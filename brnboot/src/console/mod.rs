//! Command sequencing on the BRN-boot text console.
//!
//! A [`Console`] owns the write half of the connection and reads console
//! output from a shared [`LineStream`]. Every wait is a bounded poll: the
//! current line is classified every `poll_interval` until the wanted state
//! shows up or the budget runs out.

pub mod lines;
pub mod state;

pub use lines::{LineReceiver, LineStream};
pub use state::{ConsoleState, classify};

use crate::config::{Commands, Prompts, Timing};
use crate::error::{Error, Result};
use log::{debug, trace, warn};
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of [`Console::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry<T> {
    /// The step succeeded on attempt `attempt` (1-based).
    Done {
        /// Value returned by the step.
        value: T,
        /// Attempt that succeeded.
        attempt: u32,
    },
    /// Every attempt timed out.
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Drives the console menu tree.
pub struct Console<W: Write> {
    writer: W,
    lines: Arc<LineStream>,
    commands: Commands,
    prompts: Prompts,
    timing: Timing,
}

impl<W: Write> Console<W> {
    /// Create a console over `writer`, reading output from `lines`.
    pub fn new(
        writer: W,
        lines: Arc<LineStream>,
        commands: Commands,
        prompts: Prompts,
        timing: Timing,
    ) -> Self {
        Self {
            writer,
            lines,
            commands,
            prompts,
            timing,
        }
    }

    /// The shared line stream.
    pub fn lines(&self) -> &LineStream {
        &self.lines
    }

    /// Menu keys in use.
    pub fn commands(&self) -> &Commands {
        &self.commands
    }

    /// Timing parameters in use.
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Shared access to the writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Mutable access to the writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Classify the line currently being received.
    pub fn current_state(&self) -> ConsoleState {
        self.prompts
            .classify(&self.lines.peek_current_line())
    }

    /// Wait for `target` using the configured state timeout.
    pub fn wait_for_state(&self, target: ConsoleState) -> Result<()> {
        self.wait_for_state_within(target, self.timing.state_timeout)
    }

    /// Wait until the current line classifies as `target`.
    ///
    /// Nothing is consumed; on timeout the buffers are left as they are.
    pub fn wait_for_state_within(&self, target: ConsoleState, timeout: Duration) -> Result<()> {
        trace!("Waiting for {target}");
        let start = Instant::now();

        loop {
            if self.current_state() == target {
                trace!("Reached {target} after {:?}", start.elapsed());
                return Ok(());
            }
            if start.elapsed() > timeout {
                debug!(
                    "Timeout waiting for {target}, current line: {:?}",
                    self.lines.peek_current_line()
                );
                return Err(Error::timeout(target.to_string(), timeout));
            }
            thread::sleep(self.timing.poll_interval);
        }
    }

    /// Wait for one of `targets` to show up in the current line.
    ///
    /// The current line is taken and cleared on every poll, so anything that
    /// is not a target is discarded.
    pub fn wait_for_char(&self, targets: &[u8], timeout: Duration) -> Result<u8> {
        let start = Instant::now();

        loop {
            let line = self.lines.take_current_line();
            let found = line
                .chars()
                .filter_map(|c| u8::try_from(c).ok())
                .find(|b| targets.contains(b));
            if let Some(byte) = found {
                trace!("Received control character 0x{byte:02X}");
                return Ok(byte);
            }
            if start.elapsed() > timeout {
                return Err(Error::timeout(
                    format!("control character {targets:02X?}"),
                    timeout,
                ));
            }
            thread::sleep(self.timing.poll_interval);
        }
    }

    /// Wait for the echo of the last command to end with a line terminator,
    /// then drop the completed lines.
    ///
    /// Text received after the terminator stays in the current line.
    pub fn wait_for_line_end(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        while !self.lines.has_line() {
            if start.elapsed() > timeout {
                return Err(Error::timeout("end of echoed line", timeout));
            }
            thread::sleep(self.timing.poll_interval);
        }
        while let Some(line) = self.lines.try_pop_line() {
            trace!("Skipping echo {line:?}");
        }
        Ok(())
    }

    /// Write text as-is.
    pub fn send(&mut self, text: &str) -> Result<()> {
        trace!("tx {text:?}");
        self.send_raw(text.as_bytes())
    }

    /// Write text followed by the console's Enter key.
    pub fn send_with_enter(&mut self, text: &str) -> Result<()> {
        let line = format!("{text}{}", self.commands.enter);
        self.send(&line)
    }

    /// Write binary data and flush.
    pub fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Discard queued lines and the in-progress line.
    pub fn drain(&self) {
        self.lines.clear();
    }

    /// Bring the console back to its prompt with two empty commands.
    pub fn resync(&mut self) -> Result<()> {
        debug!("Resynchronising console");
        self.drain();
        self.send_with_enter("")?;
        self.send_with_enter("")?;
        self.wait_for_state(ConsoleState::Idle)
    }

    /// Switch to administrator mode.
    pub fn enter_admin_mode(&mut self) -> Result<()> {
        debug!("Entering administrator mode");
        self.drain();
        let admin = self.commands.admin_mode.clone();
        self.send(&admin)?;
        self.wait_for_state(ConsoleState::Idle)
    }

    /// Send a menu key and wait for the prompt it opens.
    pub(crate) fn open_menu(&mut self, key: &str, expect: ConsoleState) -> Result<()> {
        self.wait_for_state(ConsoleState::Idle)?;
        self.drain();
        self.send(key)?;
        self.wait_for_state(expect)
    }

    /// Run `step` up to `attempts` times.
    ///
    /// A [`Error::Timeout`] from `step` runs `recover` and tries again; any
    /// other error, including one from `recover`, is returned immediately.
    pub fn retry<T, S, R>(&mut self, attempts: u32, mut step: S, mut recover: R) -> Result<Retry<T>>
    where
        S: FnMut(&mut Self) -> Result<T>,
        R: FnMut(&mut Self) -> Result<()>,
    {
        for attempt in 1..=attempts {
            match step(self) {
                Ok(value) => return Ok(Retry::Done { value, attempt }),
                Err(e) if e.is_timeout() => {
                    warn!("Attempt {attempt}/{attempts} timed out: {e}");
                    if attempt < attempts {
                        recover(self)?;
                    }
                },
                Err(e) => return Err(e),
            }
        }
        Ok(Retry::Exhausted { attempts })
    }
}
