//! Connection to a BRN-boot console.

use crate::config::BootConfig;
use crate::console::{Console, LineReceiver, LineStream};
use crate::error::Result;
use crate::memory::{self, DumpResult};
use crate::port::Port;
use crate::progress::Progress;
use crate::protocol::xmodem;
use log::{debug, info};
use std::sync::Arc;

#[cfg(feature = "native")]
use crate::port::{NativePort, SerialConfig};

/// An open bootloader console.
///
/// Owns the port exclusively. Operations take `&mut self`, so one connection
/// never runs two of them at once; [`Bootloader::close`] consumes the handle.
pub struct Bootloader<P: Port> {
    console: Console<P>,
    receiver: LineReceiver,
    config: BootConfig,
}

#[cfg(feature = "native")]
impl Bootloader<NativePort> {
    /// Open the console on a serial port.
    ///
    /// Fails with [`crate::Error::Connection`] when the port cannot be opened.
    pub fn open(port_name: &str, config: BootConfig) -> Result<Self> {
        let port = NativePort::open(&SerialConfig::new(port_name, config.baud_rate))?;
        Self::with_port(port, config)
    }
}

impl<P: Port> Bootloader<P> {
    /// Take over an already open port and start receiving from it.
    ///
    /// Whatever the port buffered before this call is discarded.
    pub fn with_port(mut port: P, config: BootConfig) -> Result<Self> {
        debug!("Discarding stale input on {}", port.name());
        port.clear_buffers()?;
        let lines = Arc::new(LineStream::new());
        let receiver = LineReceiver::spawn(port.try_clone_reader()?, Arc::clone(&lines))?;
        info!("Connected to {} at {} baud", port.name(), port.baud_rate());

        let console = Console::new(
            port,
            lines,
            config
                .commands
                .clone(),
            config
                .prompts
                .clone(),
            config
                .timing
                .clone(),
        );

        Ok(Self {
            console,
            receiver,
            config,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    /// Name of the underlying port.
    pub fn port_name(&self) -> &str {
        self.console
            .get_ref()
            .name()
    }

    /// Direct access to the command sequencer.
    pub fn console(&mut self) -> &mut Console<P> {
        &mut self.console
    }

    /// Dump memory from `start` up to, not including, `end`.
    pub fn dump<F>(&mut self, start: u64, end: u64, block_size: usize, progress: F) -> Result<DumpResult>
    where
        F: FnMut(Progress),
    {
        let count = memory::dump::validate_request(start, end, block_size)?;
        self.dump_count(start, count, block_size, progress)
    }

    /// Dump `count` bytes from `start`.
    pub fn dump_count<F>(
        &mut self,
        start: u64,
        count: u64,
        block_size: usize,
        progress: F,
    ) -> Result<DumpResult>
    where
        F: FnMut(Progress),
    {
        memory::dump_count(&mut self.console, start, count, block_size, progress)
    }

    /// Write `data` to memory at `start`, four bytes per command.
    pub fn write_memory<F>(&mut self, data: &[u8], start: u64, progress: F) -> Result<u64>
    where
        F: FnMut(Progress),
    {
        memory::write_memory(&mut self.console, data, start, progress)
    }

    /// Upload `data` to RAM at `address` over XMODEM.
    pub fn upload_to_memory<F>(&mut self, address: u64, data: &[u8], progress: F) -> Result<bool>
    where
        F: FnMut(Progress),
    {
        let policy = self.config.nak_policy;
        xmodem::upload(&mut self.console, address, data, policy, progress)
    }

    /// Stop the receiver and close the port.
    pub fn close(self) -> Result<()> {
        let Self {
            console,
            mut receiver,
            ..
        } = self;
        receiver.stop();
        let mut port = console.into_inner();
        debug!("Closing {}", port.name());
        port.close()
    }
}
