//! Shared helpers for the integration suites.

use std::sync::Arc;

use serline::{MockCommSys, Port};

pub const DEVICE: &str = "COM3";

/// Open a port on a fresh mock backend, keeping a handle to the mock
/// for inspection.
pub fn open_port() -> (MockCommSys, Port) {
    open_port_with("")
}

pub fn open_port_with(directives: &str) -> (MockCommSys, Port) {
    let sys = MockCommSys::with_device(DEVICE);
    let port = Port::open_with(Arc::new(sys.clone()), DEVICE, directives)
        .expect("open against the mock backend");
    (sys, port)
}
