//! Boundary between the store and caller-supplied buffers
//!
//! Bytes never move between the store and a caller directly: they are
//! copied through [`UserBuf`] (caller → store) and [`UserBufMut`]
//! (store → caller). A copy either transfers every requested byte or fails
//! with [`Fault`], in which case the store must be left as it was.

/// The caller buffer could not be accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("bad address")]
pub struct Fault;

impl From<Fault> for crate::error::DeviceError {
    fn from(_: Fault) -> Self {
        Self::Fault
    }
}

/// Destination of a read
pub trait UserBufMut {
    /// Copy all of `src` to the caller
    ///
    /// # Errors
    ///
    /// Returns [`Fault`] if the destination can not take `src.len()` bytes.
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault>;
}

/// Source of a write
pub trait UserBuf {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `dst` from the start of the caller buffer
    ///
    /// # Errors
    ///
    /// Returns [`Fault`] if the caller buffer is shorter than `dst`.
    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault>;
}

impl UserBufMut for [u8] {
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault> {
        let dst = self.get_mut(..src.len()).ok_or(Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// Appends, so a `Vec` never faults
impl UserBufMut for Vec<u8> {
    fn copy_to_user(&mut self, src: &[u8]) -> Result<(), Fault> {
        self.extend_from_slice(src);
        Ok(())
    }
}

impl UserBuf for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault> {
        let src = self.get(..dst.len()).ok_or(Fault)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

impl UserBuf for Vec<u8> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn copy_from_user(&self, dst: &mut [u8]) -> Result<(), Fault> {
        self.as_slice().copy_from_user(dst)
    }
}
