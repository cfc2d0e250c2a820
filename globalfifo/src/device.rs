//! The device: one store, many open handles
//!
//! [`GlobalFifo`] ties the gate, the control channel and the per-handle
//! cursors together behind the usual character-device entry points.
//!
//! # Quirk: the cursor is not a read/write position
//!
//! `seek` moves a per-handle cursor and checks it against the capacity, but
//! `read` and `write` ignore it. They always consume from the front of the
//! store and append to its end, whatever the cursor says.
//!
//! # Blocking and async calls
//!
//! `read` and `write` are async and only use runtime-agnostic primitives, so
//! they can be awaited from any executor. `read_blocking` and
//! `write_blocking` park the calling thread instead; do not call them from
//! an async task.

use parking_lot::Mutex;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::config::DeviceConfig;
use crate::control::Command;
use crate::cursor::SeekMode;
use crate::error::{ConfigError, DeviceError};
use crate::file_table::{FileTable, OpenFile};
use crate::gate::{Gate, IoMode};
use crate::idgen::{Handle, IdGen};
use crate::signal::Interrupt;
use crate::store::Readiness;
use crate::uaccess::{UserBuf, UserBufMut};
use crate::wait_queue::WaitSet;

pub struct GlobalFifo {
    gate: Gate,
    files: Mutex<FileTable>,
    ids: IdGen,
    config: DeviceConfig,
}

impl GlobalFifo {
    /// Create a device with an empty store
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: DeviceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!("{}: created, capacity {}", config.name, config.capacity);

        Ok(Self {
            gate: Gate::new(
                config.capacity,
                config.readiness_channel_capacity,
                &config.name,
            ),
            files: Mutex::new(FileTable::new()),
            ids: IdGen::new(),
            config,
        })
    }

    /// Create a device with default settings and the given capacity
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        Self::new(DeviceConfig::with_capacity(capacity))
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.gate.capacity()
    }

    /// Number of bytes written and not yet read
    #[must_use]
    pub fn len(&self) -> usize {
        self.gate.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gate.is_empty()
    }

    /// Copy of the stored bytes, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.gate.snapshot()
    }

    /// Number of readers or writers currently blocked on the store
    #[must_use]
    pub fn waiting(&self, set: WaitSet) -> usize {
        self.gate.waiting(set)
    }

    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.files.lock().len()
    }

    /// Open the device
    ///
    /// The new handle has its own cursor at 0 and its own interrupt. The
    /// store is shared with every other handle.
    pub fn open(&self) -> Handle {
        let handle = self.ids.next_handle();
        self.files.lock().insert(handle, OpenFile::new());
        debug!("{}: open {handle}", self.config.name);
        handle
    }

    /// Close a handle
    ///
    /// The store is not touched. Blocked calls on the handle keep waiting;
    /// raise its interrupt first to end them.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] if the handle is not open.
    pub fn release(&self, handle: Handle) -> Result<(), DeviceError> {
        let mut files = self.files.lock();
        match files.remove(handle) {
            Some(_) => {
                debug!("{}: release {handle}", self.config.name);
                if files.is_empty() {
                    debug!("{}: no open handles left", self.config.name);
                }
                Ok(())
            }
            None => {
                warn!("{}: release of unknown handle {handle}", self.config.name);
                Err(DeviceError::BadHandle(handle))
            }
        }
    }

    /// The interrupt of a handle
    ///
    /// Raising it ends the handle's current or next blocking wait with
    /// [`DeviceError::Interrupted`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] if the handle is not open.
    pub fn interrupter(&self, handle: Handle) -> Result<Interrupt, DeviceError> {
        self.files
            .lock()
            .get(handle)
            .map(|file| file.interrupt.clone())
            .ok_or(DeviceError::BadHandle(handle))
    }

    /// Raise the interrupt of every open handle
    pub fn interrupt_all(&self) {
        let files = self.files.lock();
        for file in files.files() {
            file.interrupt.raise();
        }
        debug!("{}: interrupted {} handle(s)", self.config.name, files.len());
    }

    /// Read up to `max_size` bytes
    ///
    /// See [`Self::read_into`].
    ///
    /// # Errors
    ///
    /// See [`Self::read_into`].
    pub async fn read(
        &self,
        handle: Handle,
        max_size: usize,
        mode: IoMode,
    ) -> Result<Vec<u8>, DeviceError> {
        let mut out = Vec::with_capacity(max_size.min(self.capacity()));
        self.read_into(handle, &mut out, max_size, mode).await?;
        Ok(out)
    }

    /// Read up to `max_size` bytes into a caller buffer
    ///
    /// Waits while the store is empty unless `mode` is non-blocking. Returns
    /// fewer bytes than asked when fewer are stored.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::BadHandle`]: the handle is not open
    /// - [`DeviceError::WouldBlock`]: the store is empty in non-blocking mode
    /// - [`DeviceError::Interrupted`]: the handle was interrupted while waiting
    /// - [`DeviceError::Fault`]: `dst` can not take the bytes
    pub async fn read_into<B>(
        &self,
        handle: Handle,
        dst: &mut B,
        max_size: usize,
        mode: IoMode,
    ) -> Result<usize, DeviceError>
    where
        B: UserBufMut + ?Sized,
    {
        let interrupt = self.interrupter(handle)?;
        let result = self.gate.read(dst, max_size, mode, &interrupt).await;
        trace!("{}: read {handle} max={max_size} -> {result:?}", self.config.name);
        self.report_failure("read", handle, &result);
        result
    }

    /// Write `data`, or as much of it as fits
    ///
    /// # Errors
    ///
    /// See [`Self::write_from`].
    pub async fn write(
        &self,
        handle: Handle,
        data: &[u8],
        mode: IoMode,
    ) -> Result<usize, DeviceError> {
        self.write_from(handle, data, mode).await
    }

    /// Write from a caller buffer
    ///
    /// Waits while the store is full unless `mode` is non-blocking. Writes
    /// fewer bytes than offered when the free space is smaller.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::BadHandle`]: the handle is not open
    /// - [`DeviceError::WouldBlock`]: the store is full in non-blocking mode
    /// - [`DeviceError::Interrupted`]: the handle was interrupted while waiting
    /// - [`DeviceError::Fault`]: `src` can not be read
    pub async fn write_from<B>(
        &self,
        handle: Handle,
        src: &B,
        mode: IoMode,
    ) -> Result<usize, DeviceError>
    where
        B: UserBuf + ?Sized,
    {
        let interrupt = self.interrupter(handle)?;
        let result = self.gate.write(src, mode, &interrupt).await;
        trace!("{}: write {handle} len={} -> {result:?}", self.config.name, src.len());
        self.report_failure("write", handle, &result);
        result
    }

    /// [`Self::read`] on the calling thread
    ///
    /// # Errors
    ///
    /// See [`Self::read_into`].
    pub fn read_blocking(
        &self,
        handle: Handle,
        max_size: usize,
        mode: IoMode,
    ) -> Result<Vec<u8>, DeviceError> {
        futures::executor::block_on(self.read(handle, max_size, mode))
    }

    /// [`Self::write`] on the calling thread
    ///
    /// # Errors
    ///
    /// See [`Self::write_from`].
    pub fn write_blocking(
        &self,
        handle: Handle,
        data: &[u8],
        mode: IoMode,
    ) -> Result<usize, DeviceError> {
        futures::executor::block_on(self.write(handle, data, mode))
    }

    /// Move the handle's cursor
    ///
    /// Does not change where reads and writes happen; see the module docs.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::BadHandle`]: the handle is not open
    /// - [`DeviceError::InvalidArgument`]: the target is outside
    ///   `[0, capacity]`; the cursor is unchanged
    pub fn seek(&self, handle: Handle, offset: i64, mode: SeekMode) -> Result<u64, DeviceError> {
        let capacity = self.capacity();
        let mut files = self.files.lock();
        let file = files.get_mut(handle).ok_or(DeviceError::BadHandle(handle))?;
        let result = file.cursor.seek(offset, mode, capacity);
        trace!("{}: seek {handle} {offset} {mode:?} -> {result:?}", self.config.name);
        result
    }

    /// Raw seek with a `whence` code
    ///
    /// # Errors
    ///
    /// As [`Self::seek`]; an unknown `whence` is an invalid argument.
    pub fn lseek(&self, handle: Handle, offset: i64, whence: i32) -> Result<u64, DeviceError> {
        let mode = SeekMode::from_whence(whence)?;
        self.seek(handle, offset, mode)
    }

    /// Current cursor position of the handle
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] if the handle is not open.
    pub fn position(&self, handle: Handle) -> Result<u64, DeviceError> {
        self.files
            .lock()
            .get(handle)
            .map(|file| file.cursor.position())
            .ok_or(DeviceError::BadHandle(handle))
    }

    /// Apply an administrative command
    ///
    /// Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] if the handle is not open.
    pub fn control(&self, handle: Handle, command: Command) -> Result<(), DeviceError> {
        self.check_open(handle)?;
        match command {
            Command::Clear => {
                self.gate.clear();
                debug!("{}: {handle} cleared the store", self.config.name);
            }
        }
        Ok(())
    }

    /// Raw control call with a command code
    ///
    /// `arg` is accepted for signature compatibility; no command uses it.
    ///
    /// # Errors
    ///
    /// [`DeviceError::UnsupportedCommand`] for an unknown code, otherwise as
    /// [`Self::control`].
    pub fn ioctl(&self, handle: Handle, code: u32, arg: u64) -> Result<(), DeviceError> {
        self.check_open(handle)?;
        trace!("{}: ioctl {handle} code={code:#x} arg={arg}", self.config.name);
        self.control(handle, Command::from_code(code)?)
    }

    /// Readiness of the store, without blocking
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] if the handle is not open.
    pub fn poll_state(&self, handle: Handle) -> Result<Readiness, DeviceError> {
        self.check_open(handle)?;
        Ok(self.gate.readiness())
    }

    /// Subscribe to readiness changes of the store
    ///
    /// A value is sent every time the store moves between empty, partial and
    /// full, and after every clear. Drop the receiver to unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::BadHandle`] if the handle is not open.
    pub fn subscribe(&self, handle: Handle) -> Result<broadcast::Receiver<Readiness>, DeviceError> {
        self.check_open(handle)?;
        Ok(self.gate.subscribe())
    }

    fn check_open(&self, handle: Handle) -> Result<(), DeviceError> {
        if self.files.lock().get(handle).is_some() {
            Ok(())
        } else {
            Err(DeviceError::BadHandle(handle))
        }
    }

    // Warn on anything but WouldBlock and Interrupted
    fn report_failure(&self, op: &str, handle: Handle, result: &Result<usize, DeviceError>) {
        if let Err(e) = result {
            if !e.is_transient() {
                warn!("{}: {op} on {handle} failed: {e}", self.config.name);
            }
        }
    }
}

impl fmt::Debug for GlobalFifo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GlobalFifo(name={}, open={}, gate={:?})",
            self.config.name,
            self.open_handles(),
            self.gate
        )
    }
}
