//! Transfer engine behavior.
//!
//! The law under test: a zero-byte completion is a resubmit, a pending
//! submission is a wait, and any other failure surfaces immediately
//! with the direction and device in the error.

mod common;

use std::io::ErrorKind;

use common::open_port;
use pretty_assertions::assert_eq;
use serline::sys::mock::{ReadStep, WriteStep};
use serline::PortError;

#[test]
fn read_returns_an_immediate_completion() {
    let (sys, mut port) = open_port();
    sys.script_read(ReadStep::Ready(b"abc".to_vec()));

    let mut buf = [0u8; 8];
    let n = port.read(&mut buf).unwrap();

    assert_eq!(n, 3);
    assert_eq!(&buf[..n], b"abc");
    assert_eq!(sys.read_submissions(), 1);
}

#[test]
fn read_waits_out_a_pending_completion() {
    let (sys, mut port) = open_port();
    sys.script_read(ReadStep::Wait(b"later".to_vec()));

    let mut buf = [0u8; 8];
    let n = port.read(&mut buf).unwrap();

    assert_eq!(&buf[..n], b"later");
    assert_eq!(sys.read_submissions(), 1);
}

#[test]
fn read_resubmits_until_data_arrives() {
    let (sys, mut port) = open_port();
    // Three empty completions of both shapes, then data on the fourth.
    sys.script_read(ReadStep::Ready(Vec::new()));
    sys.script_read(ReadStep::Wait(Vec::new()));
    sys.script_read(ReadStep::Wait(Vec::new()));
    sys.script_read(ReadStep::Wait(b"hello".to_vec()));

    let mut buf = [0u8; 16];
    let n = port.read(&mut buf).unwrap();

    assert_eq!(n, 5);
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(sys.read_submissions(), 4, "each empty completion resubmits");
}

#[test]
fn read_fills_at_most_the_caller_buffer() {
    let (sys, mut port) = open_port();
    sys.script_read(ReadStep::Ready(b"abcdef".to_vec()));

    let mut buf = [0u8; 4];
    let n = port.read(&mut buf).unwrap();

    assert_eq!(n, 4);
    assert_eq!(&buf, b"abcd");
}

#[test]
fn read_submit_failure_is_tagged_with_direction_and_device() {
    let (sys, mut port) = open_port();
    sys.script_read(ReadStep::Fail(ErrorKind::PermissionDenied));

    let mut buf = [0u8; 8];
    let err = port.read(&mut buf).unwrap_err();

    match &err {
        PortError::Device { op, device, .. } => {
            assert_eq!(*op, "reading from");
            assert_eq!(device, common::DEVICE);
        }
        other => panic!("expected a device error, got {other:?}"),
    }
    assert!(err.to_string().contains("reading from COM3"));
}

#[test]
fn read_wait_failure_is_fatal_too() {
    let (sys, mut port) = open_port();
    sys.script_read(ReadStep::WaitFail(ErrorKind::BrokenPipe));

    let mut buf = [0u8; 8];
    let err = port.read(&mut buf).unwrap_err();
    assert!(matches!(err, PortError::Device { op: "reading from", .. }));
}

#[test]
fn write_returns_the_accepted_count() {
    let (sys, mut port) = open_port();
    sys.script_write(WriteStep::Wait(4));

    let n = port.write(b"ping").unwrap();

    assert_eq!(n, 4);
    assert_eq!(sys.write_submissions(), 1);
    assert_eq!(sys.write_log(), vec![b"ping".to_vec()]);
}

#[test]
fn write_resubmits_on_zero_byte_completions() {
    let (sys, mut port) = open_port();
    sys.script_write(WriteStep::Wait(0));
    sys.script_write(WriteStep::Ready(0));
    sys.script_write(WriteStep::Ready(4));

    let n = port.write(b"ping").unwrap();

    assert_eq!(n, 4);
    assert_eq!(sys.write_submissions(), 3);
}

#[test]
fn write_failure_is_tagged_with_direction_and_device() {
    let (sys, mut port) = open_port();
    sys.script_write(WriteStep::Fail(ErrorKind::PermissionDenied));

    let err = port.write(b"ping").unwrap_err();
    match err {
        PortError::Device { op, device, .. } => {
            assert_eq!(op, "writing to");
            assert_eq!(device, common::DEVICE);
        }
        other => panic!("expected a device error, got {other:?}"),
    }
}

#[test]
fn port_plugs_into_generic_reader_code() {
    use std::io::Read;

    let (sys, mut port) = open_port();
    sys.script_read(ReadStep::Ready(b"generic".to_vec()));

    let mut buf = [0u8; 16];
    let n = Read::read(&mut port, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"generic");
}

#[test]
fn port_plugs_into_generic_writer_code() {
    use std::io::Write;

    let (sys, mut port) = open_port();

    Write::write_all(&mut port, b"all of it").unwrap();
    Write::flush(&mut port).unwrap();

    assert_eq!(sys.write_log(), vec![b"all of it".to_vec()]);
    assert_eq!(sys.flush_count(), 1);
}
