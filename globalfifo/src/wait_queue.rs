//! Wait sets and readiness subscribers
//!
//! # 1) Waiting for the store
//!
//! In the first approximation, a blocked reader does the following:
//!
//! 10. Reader: lock the gate, see that the store is empty
//! 20. Reader: add itself to the reader wait set
//! 30. Reader: unlock the gate and sleep
//!
//! 40. Writer: lock the gate, append bytes
//! 50. Writer: detach the reader wait set, unlock the gate
//! 60. Writer: wake the detached readers
//!
//! 70. Reader: wake up, lock the gate, check the store again
//!
//! If the steps 10 and 20 were not done under the same lock, the writer
//! could detach the wait set between them, and the reader would sleep with
//! data already in the store. That is why [`WaitQueue`] has no lock of its
//! own: it lives inside the gate, next to the store, and the check and the
//! registration happen in one critical section.
//!
//! Step 70 is mandatory. A wake-up is a hint: every waiter of the set is
//! released, and another reader may have drained the store first.
//!
//! ```ignore
//! let mut state = gate.lock();
//! while state.store.is_empty() {
//!     let waiter = state.queue.register(WaitSet::Readers, "reader");
//!     drop(state);
//!     waiter.await;
//!     state = gate.lock();
//! }
//! ```
//!
//! # 2) Subscribing to readiness
//!
//! Subscribers get a [`Readiness`] value every time the store moves between
//! empty, partial and full. The gate publishes from inside the critical
//! section that changed the state, so subscribers see transitions in order.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{broadcast, oneshot};

use crate::store::Readiness;

/// Which condition a waiter is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitSet {
    /// Waiting for the store to become non-empty
    Readers,
    /// Waiting for the store to become non-full
    Writers,
}

/// A blocked reader or writer
struct WaitingClient {
    sender: oneshot::Sender<()>,
    debug_hint: String,
}

impl std::fmt::Debug for WaitingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitingClient")
            .field("debug_hint", &self.debug_hint)
            .finish_non_exhaustive()
    }
}

/// Future resolved when the wait set it was registered in is woken
///
/// Dropping it unregisters lazily: the stale entry is pruned on the next
/// registration or ignored on the next wake.
#[derive(Debug)]
pub struct Waiter {
    receiver: oneshot::Receiver<()>,
}

impl Future for Waiter {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // A closed sender only happens when the gate is gone; treat it as a wake.
        Pin::new(&mut self.receiver).poll(cx).map(|_| ())
    }
}

/// Waiters detached from a wait set, to be woken after the gate is unlocked
#[must_use = "detached waiters sleep forever unless woken"]
#[derive(Debug)]
pub struct Wakeup {
    set: WaitSet,
    clients: Vec<WaitingClient>,
}

impl Wakeup {
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Wake every detached waiter
    pub fn wake(self) {
        if !self.clients.is_empty() {
            log::debug!("wait_queue.wake: {:?}, waiters: {}", self.set, self.clients.len());
        }
        for client in self.clients {
            if client.sender.send(()).is_err() {
                log::debug!(
                    "wait_queue.wake: waiter gone for {:?} (hint: {})",
                    self.set,
                    client.debug_hint
                );
            }
        }
    }
}

/// Wait sets of the gate plus the readiness broadcast channel
pub struct WaitQueue {
    waiting: HashMap<WaitSet, Vec<WaitingClient>>,
    readiness: broadcast::Sender<Readiness>,
}

impl WaitQueue {
    #[must_use]
    pub fn new(readiness_channel_capacity: usize) -> Self {
        let (readiness, _rx) = broadcast::channel(readiness_channel_capacity);
        Self {
            waiting: HashMap::new(),
            readiness,
        }
    }

    /// Add a waiter to `set`
    ///
    /// Precondition: the caller holds the gate lock and has just checked
    /// that it must wait. See the module documentation.
    pub fn register(&mut self, set: WaitSet, debug_hint: &str) -> Waiter {
        let (tx, rx) = oneshot::channel();
        let clients = self.waiting.entry(set).or_default();

        // Waiters interrupted or dropped since the last wake
        clients.retain(|c| !c.sender.is_closed());
        clients.push(WaitingClient {
            sender: tx,
            debug_hint: debug_hint.to_string(),
        });

        Waiter { receiver: rx }
    }

    /// Take every waiter out of `set`
    pub fn detach(&mut self, set: WaitSet) -> Wakeup {
        Wakeup {
            set,
            clients: self.waiting.remove(&set).unwrap_or_default(),
        }
    }

    /// Number of live waiters in `set`
    #[must_use]
    pub fn waiting(&self, set: WaitSet) -> usize {
        self.waiting
            .get(&set)
            .map_or(0, |clients| clients.iter().filter(|c| !c.sender.is_closed()).count())
    }

    /// Subscribe to readiness changes
    ///
    /// Drop the receiver to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Send `readiness` to all subscribers
    pub fn publish(&self, readiness: Readiness) {
        match self.readiness.send(readiness) {
            Ok(subscribers) => {
                log::debug!("wait_queue.publish: {readiness}, subscribers: {subscribers}");
            }
            Err(_) => {
                // No subscribers, nothing to do
            }
        }
    }
}

impl std::fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitQueue")
            .field("readers", &self.waiting(WaitSet::Readers))
            .field("writers", &self.waiting(WaitSet::Writers))
            .field("subscribers", &self.readiness.receiver_count())
            .finish()
    }
}
