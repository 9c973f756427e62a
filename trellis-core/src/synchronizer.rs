//! FIFO mutex for asynchronous work units.
//!
//! An [`AsyncSynchronizer`] runs the units submitted to it one at a time, in
//! strict submission order. Each submission enqueues a token and parks on
//! its own [`Notify`] until the token reaches the head of the queue; when the
//! unit finishes, fails or is dropped, its token leaves the queue and the new
//! head is woken.
//!
//! ```rust
//! use trellis_core::synchronizer::AsyncSynchronizer;
//!
//! # async fn example() -> Result<(), trellis_core::Error> {
//! let sync = AsyncSynchronizer::new("0-method-save");
//! let saved = sync.run(async { Ok(42) }).await?;
//! assert_eq!(saved, 42);
//! # Ok(())
//! # }
//! ```
//!
//! Routes marked synchronized get one synchronizer per
//! `(controller, operation)` key from the [`SynchronizerRegistry`] owned by
//! the dispatcher.

use crate::Error;
use crate::logging::{error, trace};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

struct Waiter {
    id: u64,
    notify: Arc<Notify>,
}

/// Per-key FIFO mutex.
pub struct AsyncSynchronizer {
    key: String,
    queue: Mutex<VecDeque<Waiter>>,
    next_id: AtomicU64,
}

impl AsyncSynchronizer {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            queue: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Submissions currently queued, including the running one
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run `unit` once every earlier submission has completed.
    pub async fn run<F, T>(&self, unit: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        let (ticket, notify, at_head) = self.enqueue();

        if !at_head {
            trace!(key = %self.key, ticket = ticket.id, "waiting for synchronizer");
            notify.notified().await;

            if !self.is_head(ticket.id) {
                error!(key = %self.key, ticket = ticket.id, "synchronizer woke a waiter out of order");
                return Err(Error::SynchronizerOutOfOrder {
                    key: self.key.clone(),
                });
            }
        }

        unit.await
    }

    fn enqueue(&self) -> (QueueTicket<'_>, Arc<Notify>, bool) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let notify = Arc::new(Notify::new());

        let mut queue = self.queue.lock();
        queue.push_back(Waiter {
            id,
            notify: Arc::clone(&notify),
        });
        let at_head = queue.len() == 1;

        (QueueTicket { owner: self, id }, notify, at_head)
    }

    fn is_head(&self, id: u64) -> bool {
        self.queue.lock().front().is_some_and(|w| w.id == id)
    }

    fn release(&self, id: u64) {
        let mut queue = self.queue.lock();
        let Some(position) = queue.iter().position(|w| w.id == id) else {
            return;
        };
        queue.remove(position);

        if position == 0 {
            if let Some(next) = queue.front() {
                // Stores a permit if the next waiter has not started waiting yet
                next.notify.notify_one();
            }
        }
    }
}

impl std::fmt::Debug for AsyncSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncSynchronizer")
            .field("key", &self.key)
            .field("queued", &self.queued())
            .finish()
    }
}

/// Removes a submission's token from the queue on completion, failure or
/// cancellation.
struct QueueTicket<'a> {
    owner: &'a AsyncSynchronizer,
    id: u64,
}

impl Drop for QueueTicket<'_> {
    fn drop(&mut self) {
        self.owner.release(self.id);
    }
}

/// Synchronizers keyed by `"{controller-index}-method-{operation}"`, created
/// on first use and kept for the lifetime of the dispatcher.
#[derive(Debug, Default)]
pub struct SynchronizerRegistry {
    synchronizers: Mutex<HashMap<String, Arc<AsyncSynchronizer>>>,
}

impl SynchronizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: &str) -> Arc<AsyncSynchronizer> {
        let mut synchronizers = self.synchronizers.lock();
        if let Some(existing) = synchronizers.get(key) {
            return Arc::clone(existing);
        }
        let created = Arc::new(AsyncSynchronizer::new(key));
        synchronizers.insert(key.to_string(), Arc::clone(&created));
        created
    }

    pub fn get(&self, key: &str) -> Option<Arc<AsyncSynchronizer>> {
        self.synchronizers.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.synchronizers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.lock().is_empty()
    }
}
