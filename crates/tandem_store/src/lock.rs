//! The store lock.
//!
//! A FIFO mutual-exclusion primitive serializing read-decide-write spans
//! against the store. Requests queue strictly in arrival order; releasing
//! the lock hands it to the next queued request. The release operation is
//! a capability: it lives on the [`LockGuard`] returned from `lock`, so a
//! caller can neither release a lock it does not hold nor release the
//! same acquisition twice.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// A FIFO lock over the store.
///
/// Acquisition blocks the calling thread until every earlier request has
/// been granted and released. Re-acquiring from the thread that already
/// holds the lock deadlocks, as with any non-reentrant mutex.
#[derive(Debug, Default, Clone)]
pub struct StoreLock {
    inner: Arc<LockInner>,
}

#[derive(Debug, Default)]
struct LockInner {
    state: Mutex<LockState>,
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<String>,
    queue: VecDeque<Waiter>,
}

#[derive(Debug)]
struct Waiter {
    owner: String,
    grant: Sender<()>,
}

impl StoreLock {
    /// Creates a new unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `owner`, blocking until granted.
    ///
    /// The returned guard releases the lock when dropped or when
    /// [`LockGuard::release`] is called.
    pub fn lock(&self, owner: impl Into<String>) -> LockGuard {
        let owner = owner.into();
        let waiting: Option<Receiver<()>> = {
            let mut state = self.inner.state.lock();
            if state.holder.is_none() {
                tracing::trace!(owner = %owner, "store lock acquired");
                state.holder = Some(owner);
                None
            } else {
                tracing::trace!(owner = %owner, queued = state.queue.len(), "store lock queued");
                let (grant, granted) = mpsc::channel();
                state.queue.push_back(Waiter { owner, grant });
                Some(granted)
            }
        };

        if let Some(granted) = waiting {
            // Blocks until the releasing guard hands the lock over. The
            // sender is kept alive until after the send, so this cannot
            // return Err before the grant.
            let _ = granted.recv();
        }

        LockGuard {
            inner: Arc::clone(&self.inner),
            released: false,
        }
    }

    /// Returns the owner currently holding the lock, if any.
    #[must_use]
    pub fn holder(&self) -> Option<String> {
        self.inner.state.lock().holder.clone()
    }

    /// Returns the number of queued requests.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }
}

/// Capability to release one acquisition of the store lock.
///
/// Releases on drop; [`LockGuard::release`] makes the hand-over explicit.
#[derive(Debug)]
pub struct LockGuard {
    inner: Arc<LockInner>,
    released: bool,
}

impl LockGuard {
    /// Releases the lock, granting it to the next queued request.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut state = self.inner.state.lock();
        loop {
            match state.queue.pop_front() {
                Some(waiter) => {
                    state.holder = Some(waiter.owner);
                    if waiter.grant.send(()).is_ok() {
                        break;
                    }
                    // The waiter vanished before being granted; skip it.
                }
                None => {
                    state.holder = None;
                    break;
                }
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}
