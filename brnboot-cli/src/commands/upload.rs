//! XMODEM upload command.

use anyhow::Result;
use brnboot::config::DEFAULT_UPLOAD_ADDRESS;
use console::style;
use log::info;
use std::path::Path;
use std::time::Instant;

use crate::commands::write::read_image;
use crate::config::Config;
use crate::{Cli, CliError, progress_bar, track, with_bootloader};

/// Upload address from the flag, then `[upload]`, then the bootloader default.
fn resolve_address(flag: Option<u64>, config: &Config) -> u64 {
    flag.or(config.upload.address)
        .unwrap_or_else(|| {
            config
                .bootloader
                .as_ref()
                .map_or(DEFAULT_UPLOAD_ADDRESS, |boot| boot.default_upload_address)
        })
}

/// Upload command implementation.
pub(crate) fn cmd_upload(
    cli: &Cli,
    config: &Config,
    file: &Path,
    address: Option<u64>,
) -> Result<()> {
    let data = read_image(file)?;
    let address = resolve_address(address, config);

    if !cli.quiet {
        eprintln!(
            "{} Uploading {} ({} bytes) to 0x{address:08X}",
            style("ℹ").blue(),
            file.display(),
            data.len()
        );
        eprintln!(
            "{}",
            style("Waiting for the receiver, this can take a while").dim()
        );
    }

    let started = Instant::now();
    let completed = with_bootloader(cli, config, |boot| {
        let pb = progress_bar(cli.quiet);
        let completed = boot.upload_to_memory(address, &data, track(&pb))?;
        pb.finish_and_clear();
        Ok(completed)
    })?;

    if !completed {
        return Err(CliError::Device(
            "Upload aborted: the receiver stopped acknowledging packets".to_string(),
        )
        .into());
    }

    info!("Upload finished in {:.1?}", started.elapsed());
    if !cli.quiet {
        eprintln!(
            "{} Uploaded {} bytes to 0x{address:08X}",
            style("✓").green(),
            data.len()
        );
    }
    Ok(())
}
