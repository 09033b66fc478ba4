//! brnboot CLI - Command-line tool for the BRN-boot serial console.
//!
//! ## Features
//!
//! - Dump a memory range to a file, optionally verified by a second pass
//! - Write a file into memory through the 4-byte write command
//! - Upload a file to RAM over XMODEM
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable support

use anyhow::{Context, Result};
use brnboot::config::DEFAULT_BAUD;
use brnboot::{Bootloader, NativePort, Progress};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

mod commands;
mod config;
mod serial;

use commands::completions::cmd_completions;
use commands::dump::{DumpArgs, cmd_dump};
use commands::ports::cmd_list_ports;
use commands::upload::cmd_upload;
use commands::write::cmd_write;
use config::Config;
use serial::{SerialOptions, select_serial_port};

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if progress bars and symbols should be drawn (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Failures that map to a specific exit code.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// Bad arguments or an impossible request.
    #[error("{0}")]
    Usage(String),
    /// A configuration value is out of range.
    #[error("{0}")]
    Config(String),
    /// The device misbehaved without raising a protocol error.
    #[error("{0}")]
    Device(String),
    /// Two dump passes disagreed.
    #[error("{0}")]
    Verify(String),
}

/// Process exit codes.
mod exit {
    pub const FAILURE: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const DEVICE: i32 = 4;
    pub const VERIFY: i32 = 5;
}

/// brnboot - Dump, write and upload memory through the BRN-boot console.
///
/// Environment variables:
///   BRNBOOT_PORT              - Default serial port
///   BRNBOOT_BAUD              - Default baud rate (default: 115200)
///   BRNBOOT_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "brnboot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "BRNBOOT_PORT")]
    port: Option<String>,

    /// Baud rate of the console [default: 115200].
    #[arg(short, long, global = true, env = "BRNBOOT_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "BRNBOOT_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Dump a memory range to a file.
    Dump {
        /// First address to read (hex).
        #[arg(short, long, value_parser = parse_hex_u64)]
        start: u64,

        /// Address to stop at, not included (hex).
        #[arg(short, long, value_parser = parse_hex_u64)]
        end: u64,

        /// Bytes per read request [default: 1024].
        #[arg(long, value_parser = clap::value_parser!(u64).range(16..=10000))]
        block_size: Option<u64>,

        /// Output file.
        #[arg(short, long, default_value = "dump.bin")]
        output: PathBuf,

        /// Dump the range twice and compare both passes.
        #[arg(long)]
        verify: bool,
    },

    /// Write a file into memory, four bytes per command.
    Write {
        /// Binary file to write.
        file: PathBuf,

        /// Target address (hex).
        #[arg(short, long, value_parser = parse_hex_u64)]
        address: u64,
    },

    /// Upload a file to RAM over XMODEM.
    Upload {
        /// Binary file to upload.
        file: PathBuf,

        /// RAM address (hex) [default: 0x80002000].
        #[arg(short, long, value_parser = parse_hex_u64)]
        address: Option<u64>,
    },

    /// List available serial ports.
    ListPorts {
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type.
        shell: Shell,
    },
}

/// Parse a hex number with optional `0x` prefix and `_` separators.
fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let s: String = s
        .chars()
        .filter(|c| *c != '_')
        .collect();
    u64::from_str_radix(&s, 16).map_err(|e| format!("Invalid hex address: {e}"))
}

impl Cli {
    /// Baud rate from the flag, then the config file, then the default.
    fn baud(&self, config: &Config) -> u32 {
        self.baud
            .or(config.connection.baud)
            .unwrap_or(DEFAULT_BAUD)
    }
}

/// Pick the serial port for a device command.
fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    let options = SerialOptions {
        port: cli.port.clone(),
        non_interactive: cli.non_interactive,
    };
    select_serial_port(&options, config)
}

/// Reject configuration values the device cannot accept.
fn check_baud(baud: u32) -> Result<u32> {
    if baud == 0 {
        return Err(CliError::Config("Baud rate must be greater than zero".to_string()).into());
    }
    Ok(baud)
}

/// Progress bar for device operations, hidden when quiet or not on a terminal.
fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    }
}

/// Progress callback that drives `pb` as a percentage.
fn track(pb: &ProgressBar) -> impl FnMut(Progress) + '_ {
    move |progress| {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (progress.fraction() * 100.0) as u64;
        pb.set_position(percent);
        pb.set_message(format!("0x{:08X}", progress.current_address));
    }
}

/// Open the console, run `f` on it and close the port again.
fn with_bootloader<T>(
    cli: &Cli,
    config: &Config,
    f: impl FnOnce(&mut Bootloader<NativePort>) -> Result<T>,
) -> Result<T> {
    let baud = check_baud(cli.baud(config))?;
    let port = get_port(cli, config)?;
    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {baud} baud",
            style("🔌").cyan(),
            style(&port).cyan()
        );
    }

    let mut boot = Bootloader::open(&port, config.boot_config(baud))
        .with_context(|| format!("Failed to open {port}"))?;
    let result = f(&mut boot);
    if let Err(e) = boot.close() {
        warn!("Failed to close {port}: {e}");
    }
    result
}

/// Map a failure to its process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return match cli_err {
                CliError::Usage(_) => exit::USAGE,
                CliError::Config(_) => exit::CONFIG,
                CliError::Device(_) => exit::DEVICE,
                CliError::Verify(_) => exit::VERIFY,
            };
        }
        if let Some(lib_err) = cause.downcast_ref::<brnboot::Error>() {
            return match lib_err {
                brnboot::Error::InvalidArgument(_) => exit::USAGE,
                _ => exit::DEVICE,
            };
        }
    }
    exit::FAILURE
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Dump {
            start,
            end,
            block_size,
            output,
            verify,
        } => {
            let args = DumpArgs {
                start: *start,
                end: *end,
                block_size: *block_size,
                output,
                verify: *verify,
            };
            cmd_dump(cli, &config, &args)?;
        },
        Commands::Write { file, address } => {
            cmd_write(cli, &config, file, *address)?;
        },
        Commands::Upload { file, address } => {
            cmd_upload(cli, &config, file, *address)?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json);
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
        },
    }

    Ok(())
}

fn main() {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);

    debug!(
        "brnboot v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!(
            "{} {err:#}",
            style("Error:")
                .red()
                .bold()
        );
        std::process::exit(exit_code(&err));
    }
}
