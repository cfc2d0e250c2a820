//! Per-handle seek position
//!
//! The cursor is validated against the store capacity but read and write
//! never look at it: they always take from and append to the store itself.

use crate::error::DeviceError;

/// How a seek offset is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Offset from position 0 (`SEEK_SET`)
    Absolute,
    /// Offset from the current position (`SEEK_CUR`)
    RelativeToCurrent,
}

impl SeekMode {
    /// Decode a raw `whence` value
    ///
    /// # Errors
    ///
    /// Only 0 and 1 are supported; anything else, including `SEEK_END`,
    /// is an invalid argument.
    pub fn from_whence(whence: i32) -> Result<Self, DeviceError> {
        match whence {
            0 => Ok(Self::Absolute),
            1 => Ok(Self::RelativeToCurrent),
            other => Err(DeviceError::InvalidArgument(format!(
                "unsupported seek whence {other}"
            ))),
        }
    }
}

/// Split a `std::io::SeekFrom` into offset and mode
///
/// # Errors
///
/// `SeekFrom::End` is rejected, and so are absolute offsets above `i64::MAX`.
pub fn from_std_seek(pos: std::io::SeekFrom) -> Result<(i64, SeekMode), DeviceError> {
    match pos {
        std::io::SeekFrom::Start(offset) => {
            let offset = i64::try_from(offset).map_err(|_| {
                DeviceError::InvalidArgument(format!("seek offset {offset} out of range"))
            })?;
            Ok((offset, SeekMode::Absolute))
        }
        std::io::SeekFrom::Current(offset) => Ok((offset, SeekMode::RelativeToCurrent)),
        std::io::SeekFrom::End(_) => Err(DeviceError::InvalidArgument(
            "seeking from the end is not supported".to_string(),
        )),
    }
}

/// Same as [`from_std_seek`] for `embedded_io::SeekFrom`
///
/// # Errors
///
/// See [`from_std_seek`].
pub fn from_embedded_seek(pos: embedded_io::SeekFrom) -> Result<(i64, SeekMode), DeviceError> {
    let pos = match pos {
        embedded_io::SeekFrom::Start(offset) => std::io::SeekFrom::Start(offset),
        embedded_io::SeekFrom::Current(offset) => std::io::SeekFrom::Current(offset),
        embedded_io::SeekFrom::End(offset) => std::io::SeekFrom::End(offset),
    };
    from_std_seek(pos)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekCursor {
    pos: u64,
}

impl SeekCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Move the cursor, keeping it within `[0, capacity]`
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidArgument`] if the target falls outside
    /// `[0, capacity]`; the cursor is left where it was.
    pub fn seek(
        &mut self,
        offset: i64,
        mode: SeekMode,
        capacity: usize,
    ) -> Result<u64, DeviceError> {
        let base = match mode {
            SeekMode::Absolute => 0,
            SeekMode::RelativeToCurrent => i128::from(self.pos),
        };
        let target = base + i128::from(offset);

        let Some(capacity) = u64::try_from(capacity).ok().map(i128::from) else {
            return Err(DeviceError::InvalidArgument("capacity out of range".to_string()));
        };
        if target < 0 || target > capacity {
            return Err(DeviceError::InvalidArgument(format!(
                "seek target {target} outside [0, {capacity}]"
            )));
        }

        // 0 <= target <= capacity <= u64::MAX
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.pos = target as u64;
        }
        Ok(self.pos)
    }
}
