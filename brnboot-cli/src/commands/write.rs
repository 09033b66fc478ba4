//! Memory write command.

use anyhow::{Context, Result};
use console::style;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::{Cli, CliError, progress_bar, track, with_bootloader};

/// Read an input image, refusing empty files.
pub(crate) fn read_image(file: &Path) -> Result<Vec<u8>> {
    let data = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if data.is_empty() {
        return Err(CliError::Usage(format!("{} is empty", file.display())).into());
    }
    Ok(data)
}

/// Write command implementation.
pub(crate) fn cmd_write(cli: &Cli, config: &Config, file: &Path, address: u64) -> Result<()> {
    let data = read_image(file)?;

    if !cli.quiet {
        eprintln!(
            "{} Writing {} ({} bytes) to 0x{address:08X}",
            style("ℹ").blue(),
            file.display(),
            data.len()
        );
    }

    let started = Instant::now();
    let written = with_bootloader(cli, config, |boot| {
        let pb = progress_bar(cli.quiet);
        let written = boot.write_memory(&data, address, track(&pb))?;
        pb.finish_and_clear();
        Ok(written)
    })?;

    if !cli.quiet {
        eprintln!(
            "{} Wrote {written} bytes in {:.1?}",
            style("✓").green(),
            started.elapsed()
        );
    }
    Ok(())
}
