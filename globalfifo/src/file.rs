//! Owned handle with I/O trait implementations
//!
//! A [`File`] keeps the device alive, remembers whether it was opened
//! non-blocking, and releases its handle when dropped.

use embedded_io::{ErrorType, SeekFrom};
use std::fmt;
use std::io;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::control::Command;
use crate::cursor;
use crate::device::GlobalFifo;
use crate::error::DeviceError;
use crate::gate::IoMode;
use crate::idgen::Handle;
use crate::signal::Interrupt;
use crate::store::Readiness;

/// One open of a [`GlobalFifo`]
///
/// # Thread Safety
///
/// - **Read and write take `&mut self`**: one `File` is used by one task or
///   thread at a time. Open several files on the same device for
///   concurrent access; they share the store.
/// - **Interrupting**: get an [`Interrupt`] with [`File::interrupter`]
///   before blocking, and raise it from another thread or task.
pub struct File {
    device: Arc<GlobalFifo>,
    handle: Handle,
    mode: IoMode,
}

impl File {
    /// Open `device` in blocking mode
    #[must_use]
    pub fn open(device: &Arc<GlobalFifo>) -> Self {
        Self::open_with_mode(device, IoMode::Blocking)
    }

    /// Open `device` in non-blocking mode
    #[must_use]
    pub fn open_nonblocking(device: &Arc<GlobalFifo>) -> Self {
        Self::open_with_mode(device, IoMode::NonBlocking)
    }

    #[must_use]
    pub fn open_with_mode(device: &Arc<GlobalFifo>, mode: IoMode) -> Self {
        Self {
            device: Arc::clone(device),
            handle: device.open(),
            mode,
        }
    }

    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    #[must_use]
    pub fn device(&self) -> &Arc<GlobalFifo> {
        &self.device
    }

    #[must_use]
    pub fn mode(&self) -> IoMode {
        self.mode
    }

    pub fn set_nonblocking(&mut self, nonblocking: bool) {
        self.mode = if nonblocking {
            IoMode::NonBlocking
        } else {
            IoMode::Blocking
        };
    }

    /// # Errors
    ///
    /// Fails only if the handle was released behind the file's back.
    pub fn interrupter(&self) -> Result<Interrupt, DeviceError> {
        self.device.interrupter(self.handle)
    }

    /// # Errors
    ///
    /// See [`GlobalFifo::control`].
    pub fn control(&self, command: Command) -> Result<(), DeviceError> {
        self.device.control(self.handle, command)
    }

    /// # Errors
    ///
    /// See [`GlobalFifo::poll_state`].
    pub fn poll_state(&self) -> Result<Readiness, DeviceError> {
        self.device.poll_state(self.handle)
    }

    /// # Errors
    ///
    /// See [`GlobalFifo::subscribe`].
    pub fn subscribe(&self) -> Result<broadcast::Receiver<Readiness>, DeviceError> {
        self.device.subscribe(self.handle)
    }

    async fn read_async(&self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let max = buf.len();
        self.device.read_into(self.handle, buf, max, self.mode).await
    }

    async fn write_async(&self, buf: &[u8]) -> Result<usize, DeviceError> {
        self.device.write(self.handle, buf, self.mode).await
    }

    fn seek_to(&self, offset: i64, mode: cursor::SeekMode) -> Result<u64, DeviceError> {
        self.device.seek(self.handle, offset, mode)
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File(handle={}, mode={:?})", self.handle, self.mode)
    }
}

impl Drop for File {
    fn drop(&mut self) {
        if let Err(e) = self.device.release(self.handle) {
            debug!("File::drop: {e}");
        }
    }
}

// Implement embedded_io traits
impl ErrorType for File {
    type Error = DeviceError;
}

impl embedded_io_async::Read for File {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_async(buf).await
    }
}

impl embedded_io_async::Write for File {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.write_async(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl embedded_io_async::Seek for File {
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        let (offset, mode) = cursor::from_embedded_seek(pos)?;
        self.seek_to(offset, mode)
    }
}

// Blocking std::io traits, driven on the calling thread
impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(futures::executor::block_on(self.read_async(buf))?)
    }
}

impl io::Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(futures::executor::block_on(self.write_async(buf))?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for File {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, mode) = cursor::from_std_seek(pos)?;
        Ok(self.seek_to(offset, mode)?)
    }
}
