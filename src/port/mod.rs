//! Serial port lifecycle and control surface.
//!
//! A [`Port`] owns one open device plus the pair of completion events
//! backing overlapped reads and writes. Configuration flows through a
//! desired/applied control-block pair that only touches the hardware on
//! real changes; transfers go through the submit/wait/resubmit engine
//! in [`io`](self).

mod io;
mod state;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::DEFAULT_DIRECTIVES;
use crate::control::{ControlBlock, LineState, Parity};
use crate::error::{PortError, Result};
use crate::sys::{CommSys, DeviceHandle, EventHandle};
use state::{ControlState, DeviceRef};

/// Inter-byte arrival timeout configured at open, in milliseconds.
/// Once it elapses with no data, a pending read completes with zero
/// transferred bytes and the engine resubmits.
const READ_INTERVAL_MS: u32 = 10;

/// Driver-side buffer capacity requested at open, in bytes.
const BUFFER_CAPACITY: u32 = 4096;

/// An open serial device.
///
/// The device handle and both completion events are exclusively owned
/// and released exactly once, on [`close`](Port::close) or drop. All
/// mutating calls take `&mut self`; a port shared across threads must
/// be externally serialized, as there is no internal locking. The two
/// transfer directions use independent completion events, so the
/// device itself runs full duplex.
///
/// Closing a port while a read or write is still blocked in another
/// thread of control is not supported.
pub struct Port {
    sys: Arc<dyn CommSys>,
    dev: DeviceHandle,
    name: String,
    read_event: EventHandle,
    write_event: EventHandle,
    control: ControlState,
    released: bool,
}

/// Releases partially acquired handles if open bails out early.
struct OpenCleanup {
    sys: Arc<dyn CommSys>,
    dev: Option<DeviceHandle>,
    read_event: Option<EventHandle>,
    write_event: Option<EventHandle>,
}

impl OpenCleanup {
    fn disarm(&mut self) {
        self.dev = None;
        self.read_event = None;
        self.write_event = None;
    }
}

impl Drop for OpenCleanup {
    fn drop(&mut self) {
        if let Some(event) = self.write_event.take() {
            let _ = self.sys.close_event(event);
        }
        if let Some(event) = self.read_event.take() {
            let _ = self.sys.close_event(event);
        }
        if let Some(dev) = self.dev.take() {
            let _ = self.sys.close_device(dev);
        }
    }
}

impl Port {
    /// Open `name` with the native platform backend.
    ///
    /// # Example
    /// ```no_run
    /// let mut port = serline::Port::open("COM3", "b9600")?;
    /// port.write(b"AT\r")?;
    /// # Ok::<(), serline::PortError>(())
    /// ```
    #[cfg(windows)]
    pub fn open(name: &str, directives: &str) -> Result<Self> {
        Self::open_with(Arc::new(crate::sys::Win32CommSys::new()), name, directives)
    }

    /// Open `name` against an injected platform backend.
    ///
    /// The device must already exist. `directives` (see
    /// [`crate::config`]) extend [`DEFAULT_DIRECTIVES`]; later tokens
    /// win, so callers only state what they want changed. The whole
    /// batch is applied with a single configuration push, after which
    /// the two completion events are created, the read interval is set
    /// to 10 ms and 4096-byte device buffers are requested. Every
    /// handle acquired before a failure is released again.
    pub fn open_with(sys: Arc<dyn CommSys>, name: &str, directives: &str) -> Result<Self> {
        debug!(device = name, "opening serial device");
        let dev = sys.open_device(name).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PortError::NotFound(name.to_string()),
            _ => PortError::device("open", name, e),
        })?;
        let mut cleanup = OpenCleanup {
            sys: Arc::clone(&sys),
            dev: Some(dev),
            read_event: None,
            write_event: None,
        };

        let mut control = ControlState::default();
        control.configure(
            DeviceRef {
                sys: sys.as_ref(),
                dev,
                name,
            },
            &format!("{DEFAULT_DIRECTIVES} {directives}"),
        )?;
        control.finish_init();

        let read_event = sys
            .create_event()
            .map_err(|e| PortError::device("open", name, e))?;
        cleanup.read_event = Some(read_event);
        let write_event = sys
            .create_event()
            .map_err(|e| PortError::device("open", name, e))?;
        cleanup.write_event = Some(write_event);

        sys.set_read_interval(dev, READ_INTERVAL_MS)
            .map_err(|e| PortError::device("open", name, e))?;
        sys.set_buffer_sizes(dev, BUFFER_CAPACITY, BUFFER_CAPACITY)
            .map_err(|e| PortError::device("open", name, e))?;

        cleanup.disarm();
        drop(cleanup);
        Ok(Self {
            sys,
            dev,
            name: name.to_string(),
            read_event,
            write_event,
            control,
            released: false,
        })
    }

    /// The device name this port was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last line configuration the device accepted.
    pub fn settings(&self) -> &ControlBlock {
        self.control.applied()
    }

    /// Close the port, releasing both completion events and the device
    /// handle.
    ///
    /// Event release failures are logged and swallowed; only a failure
    /// to close the device handle itself is reported. Taking `self` by
    /// value makes a second close unrepresentable; dropping an unclosed
    /// port performs the same release best-effort.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        debug!(device = %self.name, "closing serial device");
        if let Err(e) = self.sys.close_event(self.read_event) {
            warn!(device = %self.name, error = %e, "failed to release read completion event");
        }
        if let Err(e) = self.sys.close_event(self.write_event) {
            warn!(device = %self.name, error = %e, "failed to release write completion event");
        }
        self.sys
            .close_device(self.dev)
            .map_err(|e| PortError::device("close", &self.name, e))
    }

    /// Force buffered output onto the wire before returning.
    pub fn drain(&mut self) -> Result<()> {
        self.sys
            .flush_output(self.dev)
            .map_err(|e| PortError::device("drain", &self.name, e))
    }

    /// Discard unread input and/or unsent output.
    pub fn purge(&mut self, discard_input: bool, discard_output: bool) -> Result<()> {
        self.sys
            .discard_buffers(self.dev, discard_input, discard_output)
            .map_err(|e| PortError::device("purge", &self.name, e))
    }

    /// Sample the live modem input lines (CTS, DSR, RING, carrier).
    pub fn modem_lines(&self) -> Result<LineState> {
        self.sys
            .modem_status(self.dev)
            .map_err(|e| PortError::device("modem status", &self.name, e))
    }

    /// Apply a directive string (see [`crate::config`]) as one batch,
    /// pushing the device configuration at most once.
    pub fn configure(&mut self, directives: &str) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.configure(dev, directives)
    }

    pub fn set_baudrate(&mut self, rate: u32) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_baudrate(dev, rate)
    }

    /// Set the word length. Values outside {5, 6, 7, 8} are ignored.
    pub fn set_wordlen(&mut self, bits: u8) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_wordlen(dev, bits)
    }

    pub fn set_parity(&mut self, parity: Parity) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_parity(dev, parity)
    }

    /// Set the stop-bit count; only 1 and 2 are accepted.
    pub fn set_stopbits(&mut self, count: u8) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_stopbits(dev, count)
    }

    /// Assert or deassert the RTS line.
    pub fn set_rts(&mut self, on: bool) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_rts(dev, on)
    }

    /// Assert or deassert the DTR line.
    pub fn set_dtr(&mut self, on: bool) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_dtr(dev, on)
    }

    /// Enable or disable RTS/CTS hardware handshaking.
    ///
    /// Disabling restores the manually requested RTS line state.
    pub fn set_rts_cts(&mut self, on: bool) -> Result<()> {
        let (dev, control) = self.control_parts();
        control.set_rts_cts(dev, on)
    }

    fn control_parts(&mut self) -> (DeviceRef<'_>, &mut ControlState) {
        (
            DeviceRef {
                sys: self.sys.as_ref(),
                dev: self.dev,
                name: &self.name,
            },
            &mut self.control,
        )
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("baud_rate", &self.control.applied().baud_rate)
            .finish()
    }
}
