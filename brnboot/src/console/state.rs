//! Prompt classification.
//!
//! The console never tells us which menu it is in; the state is re-derived
//! from the latest line of output every time it is needed. Rules are tried
//! in a fixed order and the first match wins:
//!
//! | # | test                                       | state             |
//! |---|--------------------------------------------|-------------------|
//! | 1 | ends with the prompt suffix                | `Idle`            |
//! | 2 | contains the read start address phrase     | `ReadStartAddr`   |
//! | 3 | contains the write start address phrase    | `WriteStartAddr`  |
//! | 4 | contains the data length phrase            | `DataLength`      |
//! | 5 | contains the read count phrase             | `DumpCount`       |
//! | 6 | contains the write count phrase            | `WriteCount`      |
//! | 7 | contains the write data phrase             | `WriteDataPrompt` |
//! | 8 | contains the write completed phrase        | `WriteCompleted`  |
//! | 9 | contains the upload destination phrase     | `UploadAddr`      |
//! |   | anything else                              | `Unknown`         |

use crate::config::Prompts;
use std::fmt;
use std::sync::OnceLock;

/// Console state inferred from a line of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleState {
    /// Nothing recognisable.
    Unknown,
    /// Sitting at the main prompt.
    Idle,
    /// Waiting for the start address of a read.
    ReadStartAddr,
    /// Waiting for the start address of a write.
    WriteStartAddr,
    /// Waiting for the data length choice (shared by read and write).
    DataLength,
    /// Waiting for the number of units to read.
    DumpCount,
    /// Waiting for the write repeat count.
    WriteCount,
    /// Waiting for the data to write.
    WriteDataPrompt,
    /// A write has been committed.
    WriteCompleted,
    /// Waiting for the RAM upload destination.
    UploadAddr,
}

impl fmt::Display for ConsoleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Idle => "console prompt",
            Self::ReadStartAddr => "read start address prompt",
            Self::WriteStartAddr => "write start address prompt",
            Self::DataLength => "data length prompt",
            Self::DumpCount => "read count prompt",
            Self::WriteCount => "write count prompt",
            Self::WriteDataPrompt => "write data prompt",
            Self::WriteCompleted => "write completion",
            Self::UploadAddr => "upload destination prompt",
        };
        f.write_str(name)
    }
}

impl Prompts {
    /// Classify a line of console output.
    ///
    /// Total: any input maps to some state, unmatched text to
    /// [`ConsoleState::Unknown`].
    pub fn classify(&self, line: &str) -> ConsoleState {
        if line.ends_with(&self.prompt_suffix) {
            return ConsoleState::Idle;
        }

        let lower = line.to_lowercase();
        let rules = [
            (&self.read_start_address, ConsoleState::ReadStartAddr),
            (&self.write_start_address, ConsoleState::WriteStartAddr),
            (&self.data_length, ConsoleState::DataLength),
            (&self.read_count, ConsoleState::DumpCount),
            (&self.write_count, ConsoleState::WriteCount),
            (&self.write_data, ConsoleState::WriteDataPrompt),
            (&self.write_completed, ConsoleState::WriteCompleted),
            (&self.upload_address, ConsoleState::UploadAddr),
        ];

        rules
            .into_iter()
            .find(|(phrase, _)| !phrase.is_empty() && lower.contains(&phrase.to_lowercase()))
            .map_or(ConsoleState::Unknown, |(_, state)| state)
    }
}

/// Classify a line using the default BRN-boot prompts.
pub fn classify(line: &str) -> ConsoleState {
    static DEFAULT: OnceLock<Prompts> = OnceLock::new();
    DEFAULT
        .get_or_init(Prompts::default)
        .classify(line)
}
