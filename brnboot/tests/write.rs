//! Memory writes against the simulated console.

mod common;

use brnboot::Error;
use brnboot::config::Timing;
use common::{Device, Sim, test_config, test_timing};
use std::time::Duration;

#[test]
fn test_write_pads_last_chunk() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();

    let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02];
    let written = boot
        .write_memory(&data, 0x8000_1000, |_| {})
        .unwrap();
    assert_eq!(written, 8);

    let device = sim.device();
    assert_eq!(
        device.writes,
        vec![
            (0x8000_1000, "DEADBEEF".to_string()),
            (0x8000_1004, "0102FFFF".to_string()),
        ]
    );
    assert_eq!(
        device.read_range(0x8000_1000, 8),
        vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0xFF, 0xFF]
    );
}

#[test]
fn test_write_progress_per_chunk() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();

    let mut reports = Vec::new();
    boot.write_memory(&[0u8; 12], 0x100, |p| reports.push(p))
        .unwrap();

    let processed: Vec<u64> = reports
        .iter()
        .map(|p| p.bytes_processed)
        .collect();
    assert_eq!(processed, vec![4, 8, 12]);
    assert!(reports.iter().all(|p| p.total_bytes == 12));
    assert_eq!(reports[2].current_address, 0x10C);
}

#[test]
fn test_lost_completion_retries_same_chunk() {
    let device = Device {
        drop_completions: 1,
        ..Device::default()
    };
    let sim = Sim::new(device);
    let timing = Timing {
        state_timeout: Duration::from_millis(200),
        ..test_timing()
    };
    let mut boot = sim.bootloader_with(test_config().with_timing(timing));

    let written = boot
        .write_memory(&[0x11, 0x22, 0x33, 0x44, 0x55], 0x2000, |_| {})
        .unwrap();
    assert_eq!(written, 8);

    let device = sim.device();
    assert_eq!(
        device.writes,
        vec![
            (0x2000, "11223344".to_string()),
            (0x2000, "11223344".to_string()),
            (0x2004, "55FFFFFF".to_string()),
        ]
    );
    // Two from the initial resync, one to recover.
    assert_eq!(device.empty_commands, 3);
    assert_eq!(
        device.read_range(0x2000, 8),
        vec![0x11, 0x22, 0x33, 0x44, 0x55, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn test_write_gives_up_after_attempts() {
    let device = Device {
        never_complete: true,
        ..Device::default()
    };
    let sim = Sim::new(device);
    let timing = Timing {
        state_timeout: Duration::from_millis(100),
        write_attempts: 3,
        ..test_timing()
    };
    let mut boot = sim.bootloader_with(test_config().with_timing(timing));

    let err = boot
        .write_memory(&[1, 2, 3, 4, 5, 6, 7, 8], 0x3000, |_| {})
        .unwrap_err();
    assert!(matches!(
        err,
        Error::WriteFailed {
            address: 0x3000,
            attempts: 3
        }
    ));
    assert_eq!(
        sim.device()
            .writes
            .len(),
        3
    );
}

#[test]
fn test_empty_write() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();

    let written = boot
        .write_memory(&[], 0x4000, |_| {})
        .unwrap();
    assert_eq!(written, 0);
    assert!(
        sim.device()
            .writes
            .is_empty()
    );
}
