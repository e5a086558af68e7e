//! The platform collaborator interface.
//!
//! Everything a port needs from the host OS flows through [`CommSys`]:
//! exclusive overlapped open/close, completion events, submit/wait I/O,
//! the line-configuration command set, and the registry location that
//! lists serial devices. Production code uses the Win32 backend; tests
//! inject [`MockCommSys`].

use std::fmt;
use std::io;

use crate::control::{ControlBlock, LineState};

pub mod mock;
#[cfg(windows)]
pub mod windows;

pub use mock::MockCommSys;
#[cfg(windows)]
pub use windows::Win32CommSys;

/// Opaque handle to an open serial device.
///
/// Owned by exactly one [`Port`](crate::Port) and released exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle(pub(crate) u64);

/// Opaque handle to a completion-notification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(pub(crate) u64);

/// Token for one in-flight overlapped operation.
///
/// Produced by a submit call that reported the operation pending;
/// consumed by the matching finish call. Each token is bound to the
/// buffer the operation was submitted with.
#[derive(Debug)]
pub struct PendingIo(pub(crate) u64);

/// Outcome of submitting an overlapped transfer.
#[derive(Debug)]
pub enum Submission {
    /// The transfer finished within the submit call itself.
    Complete(u32),
    /// The transfer was queued; finish it by waiting on the bound event.
    Pending(PendingIo),
}

/// Momentary escape commands for the handshake lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCommand {
    SetRts,
    ClearRts,
    SetDtr,
    ClearDtr,
}

/// Host services a serial port is built on.
///
/// Errors are plain [`io::Error`] values carrying the originating OS
/// code; the port layer wraps them with operation and device context.
pub trait CommSys: Send + Sync + fmt::Debug {
    /// Open the named device for exclusive overlapped read/write access.
    ///
    /// The device must already exist; a missing device surfaces as
    /// [`io::ErrorKind::NotFound`].
    fn open_device(&self, name: &str) -> io::Result<DeviceHandle>;

    fn close_device(&self, dev: DeviceHandle) -> io::Result<()>;

    /// Create a manual-reset, initially unsignaled completion event.
    fn create_event(&self) -> io::Result<EventHandle>;

    fn close_event(&self, event: EventHandle) -> io::Result<()>;

    /// Push the full line configuration to the device in one command.
    fn apply_settings(&self, dev: DeviceHandle, settings: &ControlBlock) -> io::Result<()>;

    /// Set the inter-byte arrival timeout for reads, in milliseconds.
    ///
    /// Once configured, a pending read completes with zero transferred
    /// bytes when the interval elapses without data.
    fn set_read_interval(&self, dev: DeviceHandle, millis: u32) -> io::Result<()>;

    /// Request driver-side receive/transmit buffer capacities, in bytes.
    fn set_buffer_sizes(&self, dev: DeviceHandle, receive: u32, transmit: u32) -> io::Result<()>;

    /// Start an overlapped read into `buf`, signaling `event` on
    /// completion.
    ///
    /// When this returns [`Submission::Pending`], `buf` must stay live
    /// and unmoved until the matching [`finish_read`](Self::finish_read)
    /// returns, and that finish call must receive the same buffer.
    fn submit_read(
        &self,
        dev: DeviceHandle,
        event: EventHandle,
        buf: &mut [u8],
    ) -> io::Result<Submission>;

    /// Block until a pending read completes and report the byte count.
    fn finish_read(&self, dev: DeviceHandle, op: PendingIo, buf: &mut [u8]) -> io::Result<u32>;

    /// Start an overlapped write of `buf`, signaling `event` on
    /// completion. Same buffer discipline as
    /// [`submit_read`](Self::submit_read).
    fn submit_write(
        &self,
        dev: DeviceHandle,
        event: EventHandle,
        buf: &[u8],
    ) -> io::Result<Submission>;

    /// Block until a pending write completes and report the byte count.
    fn finish_write(&self, dev: DeviceHandle, op: PendingIo) -> io::Result<u32>;

    /// Block until buffered output has physically left the device.
    fn flush_output(&self, dev: DeviceHandle) -> io::Result<()>;

    /// Drop unread receive and/or unsent transmit bytes.
    fn discard_buffers(&self, dev: DeviceHandle, receive: bool, transmit: bool) -> io::Result<()>;

    /// Issue a momentary handshake-line escape command.
    fn line_command(&self, dev: DeviceHandle, command: LineCommand) -> io::Result<()>;

    /// Sample the live modem input lines.
    fn modem_status(&self, dev: DeviceHandle) -> io::Result<LineState>;

    /// Raw payloads of the host registry location listing serial
    /// devices. A missing location is an empty list, not an error.
    fn registered_devices(&self) -> io::Result<Vec<String>>;
}
