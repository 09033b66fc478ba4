//! Serial port listing.

use brnboot::{NativePortEnumerator, PortEnumerator, PortInfo};
use console::style;
use log::debug;

fn port_json(port: &PortInfo) -> serde_json::Value {
    serde_json::json!({
        "name": port.name,
        "vid": port.vid,
        "pid": port.pid,
        "manufacturer": port.manufacturer,
        "product": port.product,
        "serial": port.serial_number,
    })
}

/// List available serial ports, as JSON on stdout or as a list on stderr.
pub(crate) fn cmd_list_ports(json: bool) {
    let detected = NativePortEnumerator::list_ports().unwrap_or_else(|e| {
        debug!("Port enumeration failed: {e}");
        Vec::new()
    });

    if json {
        let ports: Vec<serde_json::Value> = detected
            .iter()
            .map(port_json)
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&ports).unwrap_or_default()
        );
        return;
    }

    eprintln!(
        "{}",
        style("Available serial ports:")
            .bold()
            .underlined()
    );

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &detected {
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            vid_pid,
            product
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_json_fields() {
        let port = PortInfo {
            name: "/dev/ttyUSB0".to_string(),
            vid: Some(0x10C4),
            pid: Some(0xEA60),
            manufacturer: Some("Silicon Labs".to_string()),
            product: Some("CP2102".to_string()),
            serial_number: None,
        };
        let value = port_json(&port);
        assert_eq!(value["name"], "/dev/ttyUSB0");
        assert_eq!(value["vid"], 0x10C4);
        assert_eq!(value["pid"], 0xEA60);
        assert_eq!(value["product"], "CP2102");
        assert!(value["serial"].is_null());
    }
}
