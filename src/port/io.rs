//! The overlapped transfer engine.
//!
//! Reads and writes share one protocol: bind the direction's completion
//! event to a fresh operation descriptor, submit, wait if the device
//! queued the operation, and resubmit whenever a completion reports
//! zero transferred bytes. The zero-byte case is how the short
//! inter-byte read timeout surfaces when no data has arrived yet; it
//! means "try again", not end of stream and not an error.

use tracing::trace;

use super::Port;
use crate::error::{PortError, Result};
use crate::sys::{CommSys, Submission};

impl Port {
    /// Read into `buf`, blocking until at least one byte arrives.
    ///
    /// Returns the number of bytes transferred, always at least 1.
    /// There is no deadline: the call resubmits on empty completions
    /// until data shows up or a genuine failure occurs.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let submission = self
                .sys
                .submit_read(self.dev, self.read_event, buf)
                .map_err(|e| PortError::device("reading from", &self.name, e))?;
            let done = match submission {
                Submission::Complete(n) => n,
                Submission::Pending(op) => self
                    .sys
                    .finish_read(self.dev, op, buf)
                    .map_err(|e| PortError::device("reading from", &self.name, e))?,
            };
            if done > 0 {
                return Ok(done as usize);
            }
            trace!(device = %self.name, "read completed empty, resubmitting");
        }
    }

    /// Write from `buf`, blocking until at least one byte is accepted.
    ///
    /// Returns the number of bytes transferred, always at least 1.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            let submission = self
                .sys
                .submit_write(self.dev, self.write_event, buf)
                .map_err(|e| PortError::device("writing to", &self.name, e))?;
            let done = match submission {
                Submission::Complete(n) => n,
                Submission::Pending(op) => self
                    .sys
                    .finish_write(self.dev, op)
                    .map_err(|e| PortError::device("writing to", &self.name, e))?,
            };
            if done > 0 {
                return Ok(done as usize);
            }
            trace!(device = %self.name, "write completed empty, resubmitting");
        }
    }
}

impl std::io::Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Port::read(self, buf).map_err(std::io::Error::other)
    }
}

impl std::io::Write for Port {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Port::write(self, buf).map_err(std::io::Error::other)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.drain().map_err(std::io::Error::other)
    }
}
