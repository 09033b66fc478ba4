//! Line buffering of console output.
//!
//! Bytes arrive on a background thread and are split into completed lines
//! plus the line still being received. Bootloader prompts usually lack a
//! trailing newline, so the in-progress line is what state detection looks
//! at.

use crate::error::{Error, Result};
use log::{trace, warn};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
struct Buffers {
    lines: VecDeque<String>,
    current: String,
}

/// Completed lines plus the line currently being received.
///
/// One mutex guards both members. Each byte maps to exactly one `char`
/// (Latin-1), so control codes pass through unchanged.
#[derive(Debug, Default)]
pub struct LineStream {
    inner: Mutex<Buffers>,
}

impl LineStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        // A panicking producer leaves the buffers intact; keep using them.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append received bytes. A `\n` completes the current line.
    pub fn push_bytes(&self, bytes: &[u8]) {
        let mut buffers = self.lock();
        for &byte in bytes {
            buffers
                .current
                .push(char::from(byte));
            if byte == b'\n' {
                let line = std::mem::take(&mut buffers.current);
                buffers
                    .lines
                    .push_back(line);
            }
        }
    }

    /// Whether a completed line is waiting.
    pub fn has_line(&self) -> bool {
        !self
            .lock()
            .lines
            .is_empty()
    }

    /// Remove and return the oldest completed line, terminator included.
    pub fn pop_line(&self) -> Result<String> {
        self.lock()
            .lines
            .pop_front()
            .ok_or(Error::EmptyQueue)
    }

    /// Remove and return the oldest completed line, if any.
    pub fn try_pop_line(&self) -> Option<String> {
        self.lock()
            .lines
            .pop_front()
    }

    /// Text received since the last line terminator.
    pub fn peek_current_line(&self) -> String {
        self.lock()
            .current
            .clone()
    }

    /// Forget the in-progress line.
    pub fn clear_current_line(&self) {
        self.lock()
            .current
            .clear();
    }

    /// Return the in-progress line and clear it in one step.
    pub fn take_current_line(&self) -> String {
        std::mem::take(&mut self.lock().current)
    }

    /// Discard all queued lines and the in-progress line.
    pub fn clear(&self) {
        let mut buffers = self.lock();
        buffers
            .lines
            .clear();
        buffers
            .current
            .clear();
    }
}

/// Background thread feeding a [`LineStream`] from a port reader.
///
/// The thread runs until [`LineReceiver::stop`] is called or the receiver is
/// dropped. Read timeouts are expected and ignored; any other read error ends
/// the thread.
pub struct LineReceiver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LineReceiver {
    /// Spawn the receiver thread.
    pub fn spawn(mut reader: Box<dyn Read + Send>, stream: Arc<LineStream>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_reader = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("brnboot-rx".into())
            .spawn(move || {
                let mut buf = [0u8; 1024];
                while running_reader.load(Ordering::Relaxed) {
                    match reader.read(&mut buf) {
                        Ok(0) => {},
                        Ok(n) => {
                            trace!("rx {n} bytes: {:?}", String::from_utf8_lossy(&buf[..n]));
                            stream.push_bytes(&buf[..n]);
                        },
                        Err(e)
                            if matches!(
                                e.kind(),
                                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                            ) => {},
                        Err(e) => {
                            warn!("Serial receiver stopped: {e}");
                            break;
                        },
                    }
                }
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Whether the receiver thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running
            .store(false, Ordering::Relaxed);
        if let Some(handle) = self
            .handle
            .take()
        {
            let _ = handle.join();
        }
    }
}

impl Drop for LineReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}
