//! The gate: one lock over the store and its wait sets
//!
//! Readers wait while the store is empty, writers wait while it is full.
//! Every byte copy happens with the lock held; waiters are woken after it
//! is released.

use parking_lot::Mutex;
use std::fmt;

use crate::error::DeviceError;
use crate::signal::Interrupt;
use crate::store::{ByteStore, Readiness, StoreState};
use crate::uaccess::{UserBuf, UserBufMut};
use crate::wait_queue::{WaitQueue, WaitSet, Waiter};

/// Whether a read or write may suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoMode {
    #[default]
    Blocking,
    /// Fail with [`DeviceError::WouldBlock`] instead of waiting
    NonBlocking,
}

/// Everything the gate lock protects
struct GateState {
    store: ByteStore,
    queue: WaitQueue,
}

impl GateState {
    /// Tell subscribers if the last mutation moved the store to another state
    fn publish_transition(&self, before: StoreState) {
        let after = self.store.state();
        if after != before {
            self.queue.publish(after.into());
        }
    }
}

/// Synchronization gate around the byte store
///
/// # Thread Safety
///
/// All methods take `&self`; the gate is meant to be shared (via `Arc` or a
/// reference) by any number of threads and tasks.
///
/// - **One lock**: `parking_lot::Mutex` guards the store and both wait sets
///   together, so checking the condition and registering as a waiter is
///   atomic with respect to the opposite side's wake-up.
/// - **Never held across a suspension**: the lock is released before a
///   waiter sleeps and re-acquired after it wakes.
/// - **NOT reentrant**: no callback runs under the lock, so this can not
///   deadlock by itself.
pub struct Gate {
    state: Mutex<GateState>,
    capacity: usize,
    debug_hint: String,
}

impl Gate {
    /// # Panics
    ///
    /// Panics if `readiness_channel_capacity` is 0 or above `usize::MAX / 2`;
    /// [`crate::DeviceConfig::validate`] keeps both out.
    #[must_use]
    pub fn new(capacity: usize, readiness_channel_capacity: usize, debug_hint: &str) -> Self {
        Self {
            state: Mutex::new(GateState {
                store: ByteStore::new(capacity),
                queue: WaitQueue::new(readiness_channel_capacity),
            }),
            capacity,
            debug_hint: debug_hint.to_string(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of bytes currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    /// Copy of the stored bytes, oldest first
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.lock().store.as_slice().to_vec()
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.state.lock().store.readiness()
    }

    /// Number of readers or writers currently blocked
    #[must_use]
    pub fn waiting(&self, set: WaitSet) -> usize {
        self.state.lock().queue.waiting(set)
    }

    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Readiness> {
        self.state.lock().queue.subscribe()
    }

    /// Read up to `max_n` bytes into `dst`
    ///
    /// Waits while the store is empty (unless `mode` is non-blocking), then
    /// takes whatever is available up to `max_n`. Returns at least one byte
    /// for a positive request; a zero-sized request returns 0 at once.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::WouldBlock`]: empty store in non-blocking mode
    /// - [`DeviceError::Interrupted`]: `interrupt` was raised while waiting
    /// - [`DeviceError::Fault`]: `dst` could not take the bytes; the store
    ///   is unchanged
    pub async fn read<B>(
        &self,
        dst: &mut B,
        max_n: usize,
        mode: IoMode,
        interrupt: &Interrupt,
    ) -> Result<usize, DeviceError>
    where
        B: UserBufMut + ?Sized,
    {
        if max_n == 0 {
            return Ok(0);
        }

        loop {
            let waiter = {
                let mut state = self.state.lock();

                if !state.store.is_empty() {
                    let before = state.store.state();
                    let n = state.store.try_consume(max_n, dst)?;
                    log::debug!(
                        "{}: read {n} byte(s), len: {}",
                        self.debug_hint,
                        state.store.len()
                    );
                    state.publish_transition(before);
                    let wakeup = state.queue.detach(WaitSet::Writers);
                    drop(state);

                    wakeup.wake();
                    return Ok(n);
                }

                if mode == IoMode::NonBlocking {
                    return Err(DeviceError::WouldBlock);
                }
                state.queue.register(WaitSet::Readers, "reader")
            };

            self.wait(waiter, interrupt).await?;
        }
    }

    /// Write as much of `src` as fits
    ///
    /// Waits while the store is full (unless `mode` is non-blocking), then
    /// appends up to the free space. Returns at least one byte for a
    /// non-empty `src`; an empty `src` returns 0 at once.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::WouldBlock`]: full store in non-blocking mode
    /// - [`DeviceError::Interrupted`]: `interrupt` was raised while waiting
    /// - [`DeviceError::Fault`]: `src` could not be read; the stored length
    ///   is unchanged
    pub async fn write<B>(
        &self,
        src: &B,
        mode: IoMode,
        interrupt: &Interrupt,
    ) -> Result<usize, DeviceError>
    where
        B: UserBuf + ?Sized,
    {
        if src.is_empty() {
            return Ok(0);
        }

        loop {
            let waiter = {
                let mut state = self.state.lock();

                if !state.store.is_full() {
                    let before = state.store.state();
                    let n = state.store.try_produce(src)?;
                    log::debug!(
                        "{}: written {n} byte(s), len: {}",
                        self.debug_hint,
                        state.store.len()
                    );
                    state.publish_transition(before);
                    let wakeup = state.queue.detach(WaitSet::Readers);
                    drop(state);

                    wakeup.wake();
                    return Ok(n);
                }

                if mode == IoMode::NonBlocking {
                    return Err(DeviceError::WouldBlock);
                }
                state.queue.register(WaitSet::Writers, "writer")
            };

            self.wait(waiter, interrupt).await?;
        }
    }

    /// Empty the store and zero its memory
    ///
    /// Does not wake blocked writers; subscribers are told the new readiness.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.store.clear();
        log::debug!("{}: cleared", self.debug_hint);
        state.queue.publish(state.store.readiness());
    }

    /// Sleep until woken or interrupted
    ///
    /// An interrupt that is pending when the waiter resumes wins over a
    /// wake-up that arrived at the same time. The wake-up is not lost for
    /// anyone else: it released the whole wait set.
    async fn wait(&self, waiter: Waiter, interrupt: &Interrupt) -> Result<(), DeviceError> {
        tokio::select! {
            biased;
            () = interrupt.raised() => {
                interrupt.take();
                log::debug!("{}: wait interrupted", self.debug_hint);
                Err(DeviceError::Interrupted)
            }
            () = waiter => Ok(()),
        }
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "Gate(store={:?}, queue={:?}, hint={})",
            state.store, state.queue, self.debug_hint
        )
    }
}
