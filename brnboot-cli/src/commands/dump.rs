//! Memory dump command.

use anyhow::{Context, Result};
use brnboot::config::MAX_BLOCK_SIZE;
use brnboot::memory::dump::validate_request;
use brnboot::{Bootloader, DumpResult, NativePort};
use console::style;
use log::warn;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::{Cli, CliError, progress_bar, track, with_bootloader};

/// Smallest block size accepted from the user.
const MIN_BLOCK_SIZE: usize = 16;

/// Block size when neither flag nor config names one.
const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Arguments of `brnboot dump`.
pub(crate) struct DumpArgs<'a> {
    pub start: u64,
    pub end: u64,
    pub block_size: Option<u64>,
    pub output: &'a Path,
    pub verify: bool,
}

/// Block size from the flag, then the config file, then the default.
fn resolve_block_size(flag: Option<u64>, config: &Config) -> Result<usize> {
    if let Some(size) = flag {
        return usize::try_from(size)
            .map_err(|_| CliError::Usage(format!("Block size {size} is too large")).into());
    }

    match config.dump.block_size {
        None => Ok(DEFAULT_BLOCK_SIZE),
        Some(size) if (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size) => Ok(size),
        Some(size) => Err(CliError::Config(format!(
            "dump.block_size {size} is outside {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE}"
        ))
        .into()),
    }
}

/// Fail unless both passes returned the same bytes.
fn compare_passes(start: u64, first: &[u8], second: &[u8]) -> Result<()> {
    if first == second {
        return Ok(());
    }

    let offset = first
        .iter()
        .zip(second)
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| first.len().min(second.len()));
    Err(CliError::Verify(format!(
        "Verification failed: passes differ at 0x{:08X} (offset 0x{offset:X}, {} vs {} bytes)",
        start + offset as u64,
        first.len(),
        second.len()
    ))
    .into())
}

fn dump_pass(
    boot: &mut Bootloader<NativePort>,
    args: &DumpArgs<'_>,
    block_size: usize,
    quiet: bool,
    label: &str,
) -> Result<DumpResult> {
    let pb = progress_bar(quiet);
    pb.set_message(label.to_string());

    let started = Instant::now();
    let result = boot.dump(args.start, args.end, block_size, track(&pb))?;
    pb.finish_and_clear();

    if !quiet {
        eprintln!(
            "{} {label}: {} bytes, {} errors in {:.1?}",
            style("✓").green(),
            result
                .bytes
                .len(),
            result.error_count,
            started.elapsed()
        );
    }
    if !result.is_clean() {
        warn!(
            "{} blocks came back short; the dump may be incomplete",
            result.error_count
        );
    }
    Ok(result)
}

/// Dump command implementation.
pub(crate) fn cmd_dump(cli: &Cli, config: &Config, args: &DumpArgs<'_>) -> Result<()> {
    let block_size = resolve_block_size(args.block_size, config)?;
    let verify = args.verify || config.dump.verify;
    let count = validate_request(args.start, args.end, block_size)?;

    if !cli.quiet {
        eprintln!(
            "{} Dumping 0x{:08X}..0x{:08X} ({count} bytes, {block_size} per block)",
            style("ℹ").blue(),
            args.start,
            args.end
        );
    }

    let (first, second) = with_bootloader(cli, config, |boot| {
        let first = dump_pass(boot, args, block_size, cli.quiet, "Dump")?;
        let second = if verify {
            Some(dump_pass(boot, args, block_size, cli.quiet, "Verify")?)
        } else {
            None
        };
        Ok((first, second))
    })?;

    fs::write(args.output, &first.bytes)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    if !cli.quiet {
        eprintln!(
            "{} Saved to {}",
            style("✓").green(),
            style(args.output.display()).yellow()
        );
    }

    if let Some(second) = second {
        compare_passes(args.start, &first.bytes, &second.bytes)?;
        if !cli.quiet {
            eprintln!("{} Both passes match", style("✓").green());
        }
    }

    Ok(())
}
