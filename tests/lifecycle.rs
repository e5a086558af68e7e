//! Open/close resource discipline and the auxiliary device operations.

mod common;

use std::sync::Arc;

use common::{open_port, DEVICE};
use pretty_assertions::assert_eq;
use serline::{LineState, MockCommSys, Port, PortError};

#[test]
fn open_of_a_missing_device_is_not_found() {
    let sys = MockCommSys::new();
    let err = Port::open_with(Arc::new(sys), "COM9", "").unwrap_err();

    match err {
        PortError::NotFound(name) => assert_eq!(name, "COM9"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn open_configures_timeouts_and_buffer_sizes() {
    let (sys, _port) = open_port();

    assert_eq!(sys.read_interval(), Some(10));
    assert_eq!(sys.buffer_sizes(), Some((4096, 4096)));
}

#[test]
fn first_event_failure_releases_the_device_handle() {
    let sys = MockCommSys::with_device(DEVICE);
    sys.fail_event_creation_after(0);

    let err = Port::open_with(Arc::new(sys.clone()), DEVICE, "").unwrap_err();

    assert!(matches!(err, PortError::Device { op: "open", .. }), "got {err:?}");
    assert_eq!(sys.open_device_handles(), 0, "device handle must not leak");
    assert_eq!(sys.open_event_handles(), 0);
}

#[test]
fn second_event_failure_releases_the_first_event_too() {
    let sys = MockCommSys::with_device(DEVICE);
    sys.fail_event_creation_after(1);

    Port::open_with(Arc::new(sys.clone()), DEVICE, "").unwrap_err();

    assert_eq!(sys.open_device_handles(), 0);
    assert_eq!(sys.open_event_handles(), 0, "first event must not leak");
}

#[test]
fn close_releases_both_events_and_the_device() {
    let (sys, port) = open_port();
    assert_eq!(sys.open_device_handles(), 1);
    assert_eq!(sys.open_event_handles(), 2);

    port.close().unwrap();

    assert_eq!(sys.open_device_handles(), 0);
    assert_eq!(sys.open_event_handles(), 0);
}

#[test]
fn close_surfaces_a_device_close_failure() {
    let (sys, port) = open_port();
    // Rip the device handle away; the events still release first.
    sys.revoke_open_devices();

    let err = port.close().unwrap_err();

    assert!(matches!(err, PortError::Device { op: "close", .. }), "got {err:?}");
    assert_eq!(sys.open_event_handles(), 0, "event release stays best-effort");
}

#[test]
fn dropping_an_unclosed_port_releases_everything() {
    let (sys, port) = open_port();
    drop(port);

    assert_eq!(sys.open_device_handles(), 0);
    assert_eq!(sys.open_event_handles(), 0);
}

#[test]
fn drain_flushes_buffered_output() {
    let (sys, mut port) = open_port();

    port.drain().unwrap();

    assert_eq!(sys.flush_count(), 1);
}

#[test]
fn purge_forwards_the_requested_directions() {
    let (sys, mut port) = open_port();

    port.purge(true, false).unwrap();
    port.purge(false, true).unwrap();
    port.purge(true, true).unwrap();

    assert_eq!(
        sys.discards(),
        vec![(true, false), (false, true), (true, true)]
    );
}

#[test]
fn modem_lines_report_the_live_input_state() {
    let (sys, port) = open_port();
    sys.set_modem_lines(LineState {
        cts: true,
        dsr: true,
        ring: false,
        carrier: false,
    });

    let lines = port.modem_lines().unwrap();
    assert!(lines.cts);
    assert!(lines.dsr);
    assert!(!lines.ring);
    assert!(!lines.carrier);
}

#[test]
fn device_list_filters_and_preserves_order() {
    let sys = MockCommSys::new();
    sys.add_registry_value("COM1");
    sys.add_registry_value("");
    sys.add_registry_value("COM7");
    sys.add_registry_value("COM3");

    assert_eq!(
        serline::device_list_with(&sys),
        vec!["COM1", "COM7", "COM3"]
    );
}
