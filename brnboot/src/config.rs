//! Bootloader console configuration.
//!
//! Everything the engine needs to know about a particular bootloader build
//! lives here: which keys open which menu, which text identifies each prompt,
//! and how long to wait for it. The defaults match BRN-boot as shipped on
//! common Lantiq/Infineon based routers.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default BRN-boot baud rate.
pub const DEFAULT_BAUD: u32 = 115200;

/// Default target address for RAM uploads (start of usable RAM).
pub const DEFAULT_UPLOAD_ADDRESS: u64 = 0x8000_2000;

/// Largest block the read command accepts in one go.
pub const MAX_BLOCK_SIZE: usize = 10000;

/// Menu keys and fixed answers sent to the console.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Commands {
    /// Line terminator, i.e. the Enter key.
    pub enter: String,
    /// Enter administrator mode.
    pub admin_mode: String,
    /// Open the "read from memory" menu.
    pub read_mode: String,
    /// Open the "write to memory" menu.
    pub write_mode: String,
    /// Open the XMODEM "upload to memory" menu.
    pub upload_mode: String,
    /// Data-length choice used for reads (1 byte per unit).
    pub read_data_length: String,
    /// Data-length choice used for writes (4 bytes per unit).
    pub write_data_length: String,
    /// Repeat count answered to the write count prompt.
    pub write_repeat: String,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            enter: "\r".into(),
            admin_mode: "!".into(),
            read_mode: "r".into(),
            write_mode: "w".into(),
            upload_mode: "m".into(),
            read_data_length: "3".into(),
            write_data_length: "1".into(),
            write_repeat: "1".into(),
        }
    }
}

/// Prompt text used to recognise console states.
///
/// `prompt_suffix` is matched against the end of the line as-is, every other
/// phrase is a case-insensitive substring.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Prompts {
    /// End of the main console prompt, e.g. `[V9]:`.
    pub prompt_suffix: String,
    /// "Enter the Start Address to Read....0x"
    pub read_start_address: String,
    /// "Enter the Start Address to Write....0x"
    pub write_start_address: String,
    /// "Data Length is (1) 4 Bytes (2) 2 Bytes (3) 1 Byte..."
    pub data_length: String,
    /// "Enter the Count to Read....(Maximun 10000)"
    pub read_count: String,
    /// "Enter the Count to Write....(Maximun 10000)"
    pub write_count: String,
    /// "Enter the Data to Write....0x"
    pub write_data: String,
    /// "Writing Process Completed"
    pub write_completed: String,
    /// "RAM upload destination:"
    pub upload_address: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            prompt_suffix: "]:".into(),
            read_start_address: "enter the start address to read".into(),
            write_start_address: "enter the start address to write".into(),
            data_length: "data length is".into(),
            read_count: "enter the count to read".into(),
            write_count: "enter the count to write".into(),
            write_data: "enter the data to write".into(),
            write_completed: "writing process completed".into(),
            upload_address: "RAM upload destination:".into(),
        }
    }
}

/// What the uploader does when the receiver answers a packet with NAK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum NakPolicy {
    /// Log the NAK and carry on with the next block.
    ///
    /// This is how the BRN-boot tooling has always behaved; the rejected
    /// block is not sent again.
    #[default]
    Advance,
    /// Send the rejected packet again, up to `max_retries` extra times.
    Retransmit {
        /// Extra sends allowed per block before the upload is given up.
        max_retries: u32,
    },
}

/// Timeouts, delays and retry limits.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Timing {
    /// Budget for each prompt wait.
    pub state_timeout: Duration,
    /// Budget for each ACK/NAK wait during an upload.
    pub char_timeout: Duration,
    /// Budget for the receiver's ready character before an upload.
    pub ready_timeout: Duration,
    /// Poll interval of every wait loop.
    pub poll_interval: Duration,
    /// Pause after each completed write chunk.
    pub settle_delay: Duration,
    /// Pause after EOT before an upload is reported done.
    pub eot_settle: Duration,
    /// Attempts per 4-byte write chunk.
    pub write_attempts: u32,
    /// Consecutive empty dump blocks tolerated before giving up.
    pub stall_limit: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            state_timeout: Duration::from_secs(10),
            char_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(1),
            settle_delay: Duration::from_millis(1),
            eot_settle: Duration::from_secs(2),
            write_attempts: 5,
            stall_limit: 5,
        }
    }
}

/// Complete bootloader configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BootConfig {
    /// Console baud rate.
    pub baud_rate: u32,
    /// Menu keys.
    pub commands: Commands,
    /// Prompt text.
    pub prompts: Prompts,
    /// Timeouts and retry limits.
    pub timing: Timing,
    /// Address used when an upload does not name one.
    pub default_upload_address: u64,
    /// NAK handling during uploads.
    pub nak_policy: NakPolicy,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD,
            commands: Commands::default(),
            prompts: Prompts::default(),
            timing: Timing::default(),
            default_upload_address: DEFAULT_UPLOAD_ADDRESS,
            nak_policy: NakPolicy::default(),
        }
    }
}

impl BootConfig {
    /// Set the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timing parameters.
    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Set the NAK policy.
    #[must_use]
    pub fn with_nak_policy(mut self, nak_policy: NakPolicy) -> Self {
        self.nak_policy = nak_policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_brnboot() {
        let config = BootConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.commands.enter, "\r");
        assert_eq!(config.commands.admin_mode, "!");
        assert_eq!(config.prompts.prompt_suffix, "]:");
        assert_eq!(config.default_upload_address, 0x8000_2000);
        assert_eq!(config.nak_policy, NakPolicy::Advance);
        assert_eq!(config.timing.write_attempts, 5);
        assert_eq!(config.timing.state_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let config = BootConfig::default()
            .with_baud_rate(57600)
            .with_nak_policy(NakPolicy::Retransmit { max_retries: 3 });
        assert_eq!(config.baud_rate, 57600);
        assert_eq!(config.nak_policy, NakPolicy::Retransmit { max_retries: 3 });
    }
}
