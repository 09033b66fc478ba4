//! Simulated BRN-boot console for integration tests.
//!
//! Bytes written to [`SimPort`] drive a small model of the bootloader menu.
//! Its output is queued with a release time and handed out through the
//! reader clone, so the library's receiver thread sees it like serial data.

#![allow(dead_code)]

use brnboot::port::Port;
use brnboot::protocol::xmodem::{DATA_SIZE, PACKET_SIZE, checksum, control};
use brnboot::{BootConfig, Bootloader, Timing};
use std::collections::{BTreeMap, VecDeque};
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

pub const PROMPT: &str = "[V9]:";

/// Bytes per dump row.
const ROW: usize = 16;

/// Delay between the write completion message and the prompt that follows.
const COMPLETION_GAP: Duration = Duration::from_millis(20);

/// Memory content before any write.
pub fn initial_byte(address: u64) -> u8 {
    ((address & 0xFF) as u8) ^ 0x5A
}

/// Expected content of `len` untouched bytes from `start`.
pub fn pattern(start: u64, len: usize) -> Vec<u8> {
    (0..len as u64)
        .map(|i| initial_byte(start + i))
        .collect()
}

/// Which input the simulated bootloader is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Menu {
    Prompt,
    ReadAddr,
    ReadLength,
    ReadCount,
    WriteAddr,
    WriteLength,
    WriteCount,
    WriteData,
    UploadAddr,
    Xmodem,
}

/// Model of the bootloader plus everything the tests want to look at.
#[derive(Debug)]
pub struct Device {
    pub menu: Menu,
    /// Characters typed since the last Enter.
    pub input: String,
    pub read_address: u64,
    pub write_address: u64,
    /// XMODEM packet being assembled.
    pub packet: Vec<u8>,
    /// Pending output with the time it may be read.
    pub output: VecDeque<(Instant, u8)>,
    /// Bytes changed by writes.
    pub memory: BTreeMap<u64, u8>,

    /// `(address, count)` of every read request.
    pub read_requests: Vec<(u64, usize)>,
    /// `(address, hex)` of every write data entry.
    pub writes: Vec<(u64, String)>,
    /// Enter presses at the main prompt.
    pub empty_commands: usize,
    /// Whether administrator mode was requested.
    pub admin: bool,
    /// Upload destination as entered.
    pub upload_address: Option<u64>,
    /// Block numbers of every packet received.
    pub blocks: Vec<u8>,
    /// Payload of every accepted packet, in order.
    pub uploaded: Vec<u8>,
    /// Whether EOT arrived.
    pub eot: bool,

    /// Byte counts to return instead of the requested one, consumed in order.
    pub short_reads: VecDeque<usize>,
    /// Byte count to return for every read once `short_reads` is empty.
    pub always_short: Option<usize>,
    /// Swallow this many write completion messages.
    pub drop_completions: usize,
    /// Never announce completion of any write.
    pub never_complete: bool,
    /// Answer every read with a row holding a non-hex data segment.
    pub garbled_rows: bool,
    /// Print the rows of a read but never the prompt after them.
    pub hang_after_rows: bool,
    /// Answer the first packet with this block number with NAK.
    pub nak_once: Option<u8>,
    /// Stop answering from this block number on.
    pub silent_from_block: Option<u8>,
    /// Send the XMODEM ready character.
    pub send_ready: bool,
    /// Hold the ready character back this long after the address.
    pub ready_delay: Duration,
    /// When the receiver starts listening for packets.
    pub ready_at: Option<Instant>,
    /// Packet bytes that arrived before the receiver was ready.
    pub bytes_before_ready: usize,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            menu: Menu::Prompt,
            input: String::new(),
            read_address: 0,
            write_address: 0,
            packet: Vec::new(),
            output: VecDeque::new(),
            memory: BTreeMap::new(),
            read_requests: Vec::new(),
            writes: Vec::new(),
            empty_commands: 0,
            admin: false,
            upload_address: None,
            blocks: Vec::new(),
            uploaded: Vec::new(),
            eot: false,
            short_reads: VecDeque::new(),
            always_short: None,
            drop_completions: 0,
            never_complete: false,
            garbled_rows: false,
            hang_after_rows: false,
            nak_once: None,
            silent_from_block: None,
            send_ready: true,
            ready_delay: Duration::ZERO,
            ready_at: None,
            bytes_before_ready: 0,
        }
    }
}

impl Device {
    pub fn byte_at(&self, address: u64) -> u8 {
        self.memory
            .get(&address)
            .copied()
            .unwrap_or_else(|| initial_byte(address))
    }

    pub fn set_byte(&mut self, address: u64, value: u8) {
        self.memory.insert(address, value);
    }

    pub fn read_range(&self, start: u64, len: usize) -> Vec<u8> {
        (0..len as u64)
            .map(|i| self.byte_at(start + i))
            .collect()
    }

    fn emit_at(&mut self, at: Instant, bytes: &[u8]) {
        // Output leaves in order, never ahead of what is already queued.
        let at = self
            .output
            .back()
            .map_or(at, |&(last, _)| last.max(at));
        self.output
            .extend(bytes.iter().map(|&b| (at, b)));
    }

    /// Queue `text` for the host right away.
    pub fn emit(&mut self, text: &str) {
        self.emit_at(Instant::now(), text.as_bytes());
    }

    fn emit_bytes(&mut self, bytes: &[u8]) {
        self.emit_at(Instant::now(), bytes);
    }

    fn prompt(&mut self) {
        self.emit(&format!("\r\n{PROMPT}"));
        self.menu = Menu::Prompt;
    }

    fn take_output(&mut self, buf: &mut [u8]) -> usize {
        let now = Instant::now();
        let mut n = 0;
        while n < buf.len() {
            match self.output.front() {
                Some(&(at, byte)) if at <= now => {
                    buf[n] = byte;
                    n += 1;
                    self.output.pop_front();
                },
                _ => break,
            }
        }
        n
    }

    fn receive(&mut self, data: &[u8]) {
        for &byte in data {
            self.receive_byte(byte);
        }
    }

    fn receive_byte(&mut self, byte: u8) {
        match self.menu {
            Menu::Prompt => self.at_prompt(byte),
            Menu::ReadLength => {
                self.emit_bytes(&[byte]);
                self.emit("\r\nEnter the Count to Read....(Maximun 10000)");
                self.menu = Menu::ReadCount;
            },
            Menu::WriteLength => {
                self.emit_bytes(&[byte]);
                self.emit("\r\nEnter the Count to Write....(Maximun 10000)");
                self.menu = Menu::WriteCount;
            },
            Menu::Xmodem => self.xmodem_byte(byte),
            _ => self.text_byte(byte),
        }
    }

    fn at_prompt(&mut self, byte: u8) {
        match byte {
            b'\r' => {
                self.empty_commands += 1;
                self.prompt();
            },
            b'!' => {
                self.admin = true;
                self.emit("!");
                self.prompt();
            },
            b'r' => {
                self.emit("r\r\nEnter the Start Address to Read....0x");
                self.menu = Menu::ReadAddr;
            },
            b'w' => {
                self.emit("w\r\nEnter the Start Address to Write....0x");
                self.menu = Menu::WriteAddr;
            },
            b'm' => {
                self.emit("m\r\nRAM upload destination: 0x");
                self.menu = Menu::UploadAddr;
            },
            other => self.emit_bytes(&[other]),
        }
    }

    fn text_byte(&mut self, byte: u8) {
        if byte != b'\r' {
            self.emit_bytes(&[byte]);
            self.input.push(char::from(byte));
            return;
        }
        self.emit("\r\n");
        let input = std::mem::take(&mut self.input);

        match self.menu {
            Menu::ReadAddr => {
                self.read_address = u64::from_str_radix(&input, 16).unwrap_or(0);
                self.emit("Data Length is (1) 4 Bytes (2) 2 Bytes (3) 1 Byte...");
                self.menu = Menu::ReadLength;
            },
            Menu::ReadCount => {
                let requested: usize = input.parse().unwrap_or(0);
                self.read_requests.push((self.read_address, requested));
                let count = self
                    .short_reads
                    .pop_front()
                    .or(self.always_short)
                    .unwrap_or(requested);
                if self.garbled_rows {
                    let line = format!("0x{:08X} 0A ZZ 0B \r\n", self.read_address);
                    self.emit(&line);
                } else {
                    self.dump_rows(self.read_address, count);
                }
                if self.hang_after_rows {
                    self.menu = Menu::Prompt;
                    return;
                }
                self.emit(PROMPT);
                self.menu = Menu::Prompt;
            },
            Menu::WriteAddr => {
                self.write_address = u64::from_str_radix(&input, 16).unwrap_or(0);
                self.emit("Data Length is (1) 4 Bytes (2) 2 Bytes (3) 1 Byte...");
                self.menu = Menu::WriteLength;
            },
            Menu::WriteCount => {
                self.emit("Enter the Data to Write....0x");
                self.menu = Menu::WriteData;
            },
            Menu::WriteData => {
                for (i, pair) in input
                    .as_bytes()
                    .chunks(2)
                    .enumerate()
                {
                    let text = std::str::from_utf8(pair).unwrap_or("00");
                    let value = u8::from_str_radix(text, 16).unwrap_or(0);
                    self.memory
                        .insert(self.write_address + i as u64, value);
                }
                self.writes
                    .push((self.write_address, input));
                self.menu = Menu::Prompt;

                if self.never_complete {
                    return;
                }
                if self.drop_completions > 0 {
                    self.drop_completions -= 1;
                    return;
                }
                self.emit("Writing Process Completed");
                let later = Instant::now() + COMPLETION_GAP;
                self.emit_at(later, format!("\r\n{PROMPT}").as_bytes());
            },
            Menu::UploadAddr => {
                self.upload_address = u64::from_str_radix(&input, 16).ok();
                self.menu = Menu::Xmodem;
                if self.send_ready {
                    let at = Instant::now() + self.ready_delay;
                    self.ready_at = Some(at);
                    self.emit_at(at, &[control::C]);
                }
            },
            _ => {},
        }
    }

    fn dump_rows(&mut self, start: u64, count: usize) {
        let data = self.read_range(start, count);
        for (row, bytes) in data
            .chunks(ROW)
            .enumerate()
        {
            let mut line = format!("0x{:08X} ", start + (row * ROW) as u64);
            for b in bytes {
                line.push_str(&format!("{b:02X} "));
            }
            line.push_str("\r\n");
            self.emit(&line);
        }
    }

    fn xmodem_byte(&mut self, byte: u8) {
        if self
            .ready_at
            .is_none_or(|at| Instant::now() < at)
        {
            self.bytes_before_ready += 1;
            return;
        }
        if self
            .packet
            .is_empty()
            && byte == control::EOT
        {
            self.eot = true;
            self.emit_bytes(&[control::ACK]);
            self.prompt();
            return;
        }

        self.packet.push(byte);
        if self.packet.len() < PACKET_SIZE {
            return;
        }

        let packet = std::mem::take(&mut self.packet);
        let block = packet[1];
        self.blocks.push(block);

        if self
            .silent_from_block
            .is_some_and(|b| block >= b)
        {
            return;
        }
        if self.nak_once == Some(block) {
            self.nak_once = None;
            self.emit_bytes(&[control::NAK]);
            return;
        }

        let payload = &packet[3..3 + DATA_SIZE];
        let valid = packet[0] == control::SOH
            && packet[2] == !block
            && packet[PACKET_SIZE - 1] == checksum(payload);
        if valid {
            self.uploaded
                .extend_from_slice(payload);
            self.emit_bytes(&[control::ACK]);
        } else {
            self.emit_bytes(&[control::NAK]);
        }
    }
}

/// Cheap handle for inspecting the device from a test.
#[derive(Clone, Default)]
pub struct Sim {
    device: Arc<Mutex<Device>>,
}

impl Sim {
    pub fn new(device: Device) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
        }
    }

    pub fn device(&self) -> MutexGuard<'_, Device> {
        self.device
            .lock()
            .unwrap()
    }

    pub fn port(&self) -> SimPort {
        SimPort {
            device: Arc::clone(&self.device),
            open: true,
        }
    }

    /// Bootloader over a fresh port with fast test timing.
    pub fn bootloader(&self) -> Bootloader<SimPort> {
        self.bootloader_with(test_config())
    }

    pub fn bootloader_with(&self, config: BootConfig) -> Bootloader<SimPort> {
        Bootloader::with_port(self.port(), config).unwrap()
    }
}

/// Timing tuned for the simulator: quick settles, short failure budgets.
pub fn test_timing() -> Timing {
    Timing {
        state_timeout: Duration::from_millis(500),
        char_timeout: Duration::from_millis(500),
        ready_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(1),
        settle_delay: Duration::from_millis(1),
        eot_settle: Duration::from_millis(10),
        write_attempts: 5,
        stall_limit: 5,
    }
}

pub fn test_config() -> BootConfig {
    BootConfig::default().with_timing(test_timing())
}

pub struct SimPort {
    device: Arc<Mutex<Device>>,
    open: bool,
}

struct SimReader {
    device: Arc<Mutex<Device>>,
}

fn read_from(device: &Mutex<Device>, buf: &mut [u8]) -> io::Result<usize> {
    let n = device
        .lock()
        .unwrap()
        .take_output(buf);
    if n == 0 {
        thread::sleep(Duration::from_millis(1));
        return Err(io::Error::new(ErrorKind::TimedOut, "no data"));
    }
    Ok(n)
}

impl Read for SimReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_from(&self.device, buf)
    }
}

impl Read for SimPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_from(&self.device, buf)
    }
}

impl Write for SimPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(ErrorKind::NotConnected, "port closed"));
        }
        self.device
            .lock()
            .unwrap()
            .receive(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for SimPort {
    fn baud_rate(&self) -> u32 {
        115200
    }

    fn clear_buffers(&mut self) -> brnboot::Result<()> {
        self.device
            .lock()
            .unwrap()
            .output
            .clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "sim"
    }

    fn try_clone_reader(&self) -> brnboot::Result<Box<dyn Read + Send>> {
        Ok(Box::new(SimReader {
            device: Arc::clone(&self.device),
        }))
    }

    fn close(&mut self) -> brnboot::Result<()> {
        self.open = false;
        Ok(())
    }
}
