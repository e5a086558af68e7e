//! Error types for port operations.
//!
//! Every platform call failure is wrapped with the operation name and
//! device name before it reaches the caller; the raw OS error stays
//! reachable through the source chain.

use std::io;

use thiserror::Error;

/// A specialized `Result` for port operations.
pub type Result<T> = std::result::Result<T, PortError>;

/// Errors surfaced by ports and device discovery.
#[derive(Debug, Error)]
pub enum PortError {
    /// The named device does not exist on this host.
    #[error("serial device not found: {0}")]
    NotFound(String),

    /// A platform call failed while operating on the device.
    #[error("{op} {device}: {source}")]
    Device {
        /// What the port was doing when the platform call failed.
        op: &'static str,
        device: String,
        #[source]
        source: io::Error,
    },

    /// A caller-supplied value outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PortError {
    pub(crate) fn device(op: &'static str, device: &str, source: io::Error) -> Self {
        Self::Device {
            op,
            device: device.to_string(),
            source,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The raw OS error code behind this error, if there is one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::Device { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
