//! Command sequencing against the simulated console.

mod common;

use brnboot::ConsoleState;
use common::Sim;
use std::time::{Duration, Instant};

#[test]
fn test_resync_reaches_prompt() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();

    boot.console()
        .resync()
        .unwrap();
    assert_eq!(boot.console().current_state(), ConsoleState::Idle);
    assert_eq!(sim.device().empty_commands, 2);
}

#[test]
fn test_admin_mode() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();

    boot.console()
        .enter_admin_mode()
        .unwrap();
    assert!(sim.device().admin);
}

#[test]
fn test_wait_for_state_times_out_on_silent_device() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();

    let start = Instant::now();
    let err = boot
        .console()
        .wait_for_state_within(ConsoleState::ReadStartAddr, Duration::from_millis(100))
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_menu_prompt_without_newline_is_seen() {
    let sim = Sim::default();
    let mut boot = sim.bootloader();
    let console = boot.console();

    console
        .resync()
        .unwrap();
    console.drain();
    console
        .send("r")
        .unwrap();
    console
        .wait_for_state(ConsoleState::ReadStartAddr)
        .unwrap();
}

#[test]
fn test_close_stops_receiver() {
    let sim = Sim::default();
    let boot = sim.bootloader();
    assert_eq!(boot.port_name(), "sim");
    boot.close()
        .unwrap();
}

#[test]
fn test_stale_input_is_discarded_on_connect() {
    let sim = Sim::default();
    sim.device()
        .emit("\r\n[V9]:leftover from an earlier session");
    let mut boot = sim.bootloader();

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(
        boot.console()
            .lines()
            .peek_current_line(),
        ""
    );
    assert!(
        !boot
            .console()
            .lines()
            .has_line()
    );
}
