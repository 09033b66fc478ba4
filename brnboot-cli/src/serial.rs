//! Serial port selection.
//!
//! The port comes from the command line, then the config file, then the
//! list of available ports:
//! - a single port is used as-is
//! - several ports are offered in an interactive list
//! - non-interactive mode refuses to guess

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    brnboot::{NativePortEnumerator, PortEnumerator, PortInfo},
    console::style,
    dialoguer::{Error as DialoguerError, Select, theme::ColorfulTheme},
    log::{debug, info},
    std::{cmp::Ordering, io::IsTerminal},
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Explicit port specified via CLI.
    pub port: Option<String>,
    /// Non-interactive mode (fail if there is a choice to make).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Select the serial port to open.
pub fn select_serial_port(options: &SerialOptions, config: &Config) -> Result<String> {
    if let Some(port_name) = &options.port {
        return Ok(port_name.clone());
    }

    if let Some(port_name) = &config
        .connection
        .port
    {
        debug!("Using port from config: {port_name}");
        return Ok(port_name.clone());
    }

    let ports = NativePortEnumerator::list_ports()?;
    choose_port(ports, options.non_interactive)
}

fn choose_port(ports: Vec<PortInfo>, non_interactive: bool) -> Result<String> {
    match ports
        .len()
        .cmp(&1)
    {
        Ordering::Less => Err(usage_err(
            "No serial ports found, connect the device or pass --port",
        )),
        Ordering::Equal => {
            let port = ports
                .into_iter()
                .next()
                .ok_or_else(|| usage_err("No serial ports found"))?;
            info!("Auto-selected port: {}", port.name);
            Ok(port.name)
        },
        Ordering::Greater if non_interactive => Err(usage_err(
            "Multiple serial ports found, pass --port in non-interactive mode",
        )),
        Ordering::Greater => {
            ensure_interactive_terminal()?;
            select_port_interactive(ports)
        },
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err(
            "Port selection needs a terminal, pass --port or set BRNBOOT_PORT",
        ))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                usage_err("Port selection cancelled")
            } else {
                usage_err("Port selection prompt failed")
            }
        },
    }
}

/// One line per port for the selection list.
fn port_label(port: &PortInfo) -> String {
    let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };

    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{}{vid_pid}{product}", port.name)
}

fn select_port_interactive(ports: Vec<PortInfo>) -> Result<String> {
    eprintln!(
        "{} Found {} serial ports",
        style("ℹ").blue(),
        ports.len()
    );

    let labels: Vec<String> = ports
        .iter()
        .map(port_label)
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the BRN-boot console port")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .into_iter()
            .nth(index)
            .map(|port| port.name)
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(usage_err("Port selection cancelled")),
    }
}
