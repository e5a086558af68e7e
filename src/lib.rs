//! Serial line control built on overlapped I/O.
//!
//! This library opens a named serial device, keeps its line
//! configuration (baud rate, framing, handshake flags) reconciled
//! against an in-memory control block so that only real changes reach
//! the hardware, and moves raw bytes through a submit/wait transfer
//! engine that tolerates the zero-length completions produced by short
//! inter-byte read timeouts. It does not interpret the bytes it moves.
//!
//! # Modules
//!
//! - `control`: line configuration value types
//! - `config`: control directive string parsing
//! - `port`: the [`Port`] itself: lifecycle, configuration, transfers
//! - `sys`: the platform collaborator trait, its Win32 backend, and a
//!   scriptable mock for tests
//! - `discovery`: best-effort device enumeration
//! - `error`: the error taxonomy
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serline::{MockCommSys, Port};
//!
//! let sys = MockCommSys::with_device("COM3");
//! let mut port = Port::open_with(Arc::new(sys), "COM3", "b9600")?;
//! assert_eq!(port.settings().baud_rate, 9600);
//! port.set_baudrate(115_200)?;
//! # Ok::<(), serline::PortError>(())
//! ```
//!
//! On Windows, [`Port::open`] and [`discovery::device_list`] use the
//! native backend directly.

pub mod config;
pub mod control;
pub mod discovery;
pub mod error;
pub mod port;
pub mod sys;

pub use config::{Directive, DEFAULT_DIRECTIVES};
pub use control::{ControlBlock, ControlFlags, DtrMode, LineState, Parity, RtsMode, StopBits};
#[cfg(windows)]
pub use discovery::device_list;
pub use discovery::device_list_with;
pub use error::{PortError, Result};
pub use port::Port;
pub use sys::{CommSys, DeviceHandle, EventHandle, LineCommand, MockCommSys, PendingIo, Submission};
#[cfg(windows)]
pub use sys::Win32CommSys;
