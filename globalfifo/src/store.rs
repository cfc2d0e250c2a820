//! Fixed-capacity byte store
//!
//! The valid bytes always occupy `bytes[0..len)`. A read copies from the
//! front and shifts the remainder down, so there is no wrap-around to reason
//! about. The store has no locking of its own: the gate owns it and holds
//! its lock around every call.

use std::fmt;

use crate::uaccess::{Fault, UserBuf, UserBufMut};

/// Fill level of the store, as seen by the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// `len == 0`, readers must wait
    Empty,
    /// `0 < len < capacity`
    Partial,
    /// `len == capacity`, writers must wait
    Full,
}

/// Readiness flags for poll-style callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl From<StoreState> for Readiness {
    fn from(state: StoreState) -> Self {
        Self {
            readable: state != StoreState::Empty,
            writable: state != StoreState::Full,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.readable, self.writable) {
            (true, true) => write!(f, "readable|writable"),
            (true, false) => write!(f, "readable"),
            (false, true) => write!(f, "writable"),
            (false, false) => write!(f, "-"),
        }
    }
}

pub struct ByteStore {
    bytes: Box<[u8]>,
    len: usize,
}

impl ByteStore {
    /// Create an empty, zeroed store
    ///
    /// A zero capacity is rejected when the device configuration is
    /// validated, before a store is ever built.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[must_use]
    pub fn state(&self) -> StoreState {
        if self.is_empty() {
            StoreState::Empty
        } else if self.is_full() {
            StoreState::Full
        } else {
            StoreState::Partial
        }
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.state().into()
    }

    /// The bytes written and not yet read, oldest first
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Move up to `max_n` bytes from the front of the store to `dst`
    ///
    /// Returns the number of bytes moved. If `dst` faults, the store is
    /// unchanged.
    pub fn try_consume<B>(&mut self, max_n: usize, dst: &mut B) -> Result<usize, Fault>
    where
        B: UserBufMut + ?Sized,
    {
        let n = max_n.min(self.len);
        dst.copy_to_user(&self.bytes[..n])?;

        self.bytes.copy_within(n..self.len, 0);
        self.len -= n;
        Ok(n)
    }

    /// Append as much of `src` as fits
    ///
    /// Returns the number of bytes appended. If `src` faults, `len` is
    /// unchanged; the stale region past `len` may have been overwritten.
    pub fn try_produce<B>(&mut self, src: &B) -> Result<usize, Fault>
    where
        B: UserBuf + ?Sized,
    {
        let n = src.len().min(self.capacity() - self.len);
        let end = self.len + n;
        src.copy_from_user(&mut self.bytes[self.len..end])?;

        self.len = end;
        Ok(n)
    }

    /// Drop all content and zero the backing storage
    pub fn clear(&mut self) {
        self.bytes.fill(0);
        self.len = 0;
    }
}

impl fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ByteStore(len={}, capacity={}, state={:?})",
            self.len,
            self.capacity(),
            self.state()
        )
    }
}
