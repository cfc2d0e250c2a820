use crate::error::DeviceError;

/// Raw command code of [`Command::Clear`]
pub const MEM_CLEAR_CMD: u32 = 0x1;

/// Administrative commands accepted by the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drop all stored bytes and zero the memory
    Clear,
}

impl Command {
    /// Decode a raw command code
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnsupportedCommand`] for any code other than
    /// [`MEM_CLEAR_CMD`].
    pub fn from_code(code: u32) -> Result<Self, DeviceError> {
        match code {
            MEM_CLEAR_CMD => Ok(Self::Clear),
            other => Err(DeviceError::UnsupportedCommand(other)),
        }
    }

    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Clear => MEM_CLEAR_CMD,
        }
    }
}

impl TryFrom<u32> for Command {
    type Error = DeviceError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}
