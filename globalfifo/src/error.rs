//! Error types for the device and its configuration
//!
//! Every error is returned to the immediate caller. None of them leaves the
//! store in an inconsistent state: failing operations either did not touch
//! the store or were rejected before mutating it.

use std::io;

use crate::idgen::Handle;

pub const EBADF: i32 = 9;
pub const EAGAIN: i32 = 11;
pub const EFAULT: i32 = 14;
pub const EINVAL: i32 = 22;
pub const ERESTARTSYS: i32 = 512;

/// Error type for device operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Non-blocking call while the store was empty (read) or full (write)
    #[error("operation would block")]
    WouldBlock,

    /// A blocking wait was interrupted before its condition was met
    #[error("interrupted while waiting")]
    Interrupted,

    /// The caller buffer could not be read from or written to
    #[error("bad address in caller buffer")]
    Fault,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported control command: {0:#x}")]
    UnsupportedCommand(u32),

    #[error("bad handle: {0:?}")]
    BadHandle(Handle),
}

impl DeviceError {
    /// Positive errno value of the error, as a character device would report it
    ///
    /// Unknown commands report `EINVAL`, matching what the control path of the
    /// device has always returned.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::WouldBlock => EAGAIN,
            Self::Interrupted => ERESTARTSYS,
            Self::Fault => EFAULT,
            Self::InvalidArgument(_) | Self::UnsupportedCommand(_) => EINVAL,
            Self::BadHandle(_) => EBADF,
        }
    }

    /// Whether retrying the same call later can succeed without changing it
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WouldBlock | Self::Interrupted)
    }
}

impl From<DeviceError> for io::Error {
    fn from(e: DeviceError) -> Self {
        let kind = match e {
            DeviceError::WouldBlock => io::ErrorKind::WouldBlock,
            DeviceError::Interrupted => io::ErrorKind::Interrupted,
            DeviceError::Fault => io::ErrorKind::InvalidData,
            DeviceError::InvalidArgument(_) | DeviceError::BadHandle(_) => {
                io::ErrorKind::InvalidInput
            }
            DeviceError::UnsupportedCommand(_) => io::ErrorKind::Unsupported,
        };
        io::Error::new(kind, e)
    }
}

impl embedded_io::Error for DeviceError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Interrupted => embedded_io::ErrorKind::Interrupted,
            Self::Fault => embedded_io::ErrorKind::InvalidData,
            Self::InvalidArgument(_) | Self::BadHandle(_) => embedded_io::ErrorKind::InvalidInput,
            Self::UnsupportedCommand(_) => embedded_io::ErrorKind::Unsupported,
            // embedded-io has no would-block kind
            Self::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

/// Errors that can occur while loading a [`crate::config::DeviceConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("capacity must be positive")]
    ZeroCapacity,

    #[error("capacity {value} exceeds the limit of {max}")]
    CapacityTooLarge { value: usize, max: usize },

    #[error("readiness channel capacity must be positive")]
    ZeroChannelCapacity,

    #[error("readiness channel capacity {value} exceeds the limit of {max}")]
    ChannelCapacityTooLarge { value: usize, max: usize },
}
