//! Native serial port implementation using the `serialport` crate.

use {
    crate::{
        error::{Error, Result},
        port::{
            DataBits, FlowControl, Parity, Port, PortEnumerator, PortInfo, SerialConfig, StopBits,
        },
    },
    log::{debug, trace},
    serialport::ClearBuffer,
    std::io::{Read, Write},
};

/// Native serial port implementation.
pub struct NativePort {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    baud_rate: u32,
}

impl NativePort {
    /// Open a serial port with the given configuration.
    ///
    /// Fails with [`Error::Connection`] when the device does not exist or is
    /// already held open by someone else.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        debug!(
            "Opening {} at {} baud",
            config.port_name, config.baud_rate
        );
        let port = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(
                config
                    .data_bits
                    .into(),
            )
            .parity(
                config
                    .parity
                    .into(),
            )
            .stop_bits(
                config
                    .stop_bits
                    .into(),
            )
            .flow_control(
                config
                    .flow_control
                    .into(),
            )
            .open()
            .map_err(|e| Error::Connection(format!("{}: {e}", config.port_name)))?;

        Ok(Self {
            port: Some(port),
            name: config
                .port_name
                .clone(),
            baud_rate: config.baud_rate,
        })
    }

    /// Open a serial port with default settings.
    pub fn open_simple(port_name: &str, baud_rate: u32) -> Result<Self> {
        let config = SerialConfig::new(port_name, baud_rate);
        Self::open(&config)
    }

    fn closed() -> Error {
        Error::Connection("port is closed".into())
    }
}

impl Port for NativePort {
    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn clear_buffers(&mut self) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::All)?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(Self::closed)?;
        trace!("Cloning reader handle for {}", self.name);
        Ok(Box::new(port.try_clone()?))
    }

    fn close(&mut self) -> Result<()> {
        // Take ownership of the port and let it drop (close)
        if self
            .port
            .take()
            .is_some()
        {
            debug!("Closed {}", self.name);
        }
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.read(buf))
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(|p| p.write(buf))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port
            .as_mut()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"))
            .and_then(std::io::Write::flush)
    }
}

/// Native port enumerator.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(Error::Serial)?;

        Ok(ports
            .into_iter()
            .map(|p| {
                let (vid, pid, manufacturer, product, serial_number) = match &p.port_type {
                    serialport::SerialPortType::UsbPort(info) => (
                        Some(info.vid),
                        Some(info.pid),
                        info.manufacturer
                            .clone(),
                        info.product
                            .clone(),
                        info.serial_number
                            .clone(),
                    ),
                    _ => (None, None, None, None, None),
                };

                PortInfo {
                    name: p.port_name,
                    vid,
                    pid,
                    manufacturer,
                    product,
                    serial_number,
                }
            })
            .collect())
    }
}

// Type conversions from our types to serialport types

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Hardware => Self::Hardware,
            FlowControl::Software => Self::Software,
        }
    }
}
