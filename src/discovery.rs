//! Best-effort serial device discovery.

use tracing::warn;

use crate::sys::CommSys;

/// List the device names the host registers as serial ports.
///
/// Only non-empty registry payloads make the list, in registry order.
/// An absent registry location or a failed query yields an empty list,
/// never an error; presence in the list is no guarantee the device can
/// currently be opened.
pub fn device_list_with(sys: &dyn CommSys) -> Vec<String> {
    match sys.registered_devices() {
        Ok(values) => values.into_iter().filter(|v| !v.is_empty()).collect(),
        Err(e) => {
            warn!(error = %e, "serial device enumeration failed");
            Vec::new()
        }
    }
}

/// List serial devices via the native platform backend.
#[cfg(windows)]
pub fn device_list() -> Vec<String> {
    device_list_with(&crate::sys::Win32CommSys::new())
}
