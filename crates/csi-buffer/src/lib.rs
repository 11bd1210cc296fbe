//! Bounded sample buffer between a latency-critical producer and a schedulable consumer.
//!
//! [`SampleBuffer<T>`] is the hand-off point between the radio driver's ingestion
//! context (which must never block) and the processing task (which may suspend).
//!
//! # Key Design: Non-Blocking Producer
//!
//! `put()` is bounded-time by construction. It never waits on a lock or a permit:
//! either the item goes into the queue, or the overflow policy decides what is
//! dropped and the drop is counted.
//!
//! - **Strict mode** (default): a full buffer rejects the new item and hands it
//!   back inside [`Full`], so the caller decides when it is released.
//! - **Overwrite mode**: a full buffer evicts its oldest item, releases it, and
//!   accepts the new one.
//!
//! # Safety Model
//!
//! The buffer uses the same semaphore + lock-free queue pattern as an object pool:
//! 1. `ArrayQueue` holds the items (fixed capacity, lock-free, FIFO)
//! 2. `Semaphore` permits track items available to consumers
//! 3. A consumer always takes a permit before popping, so a pop after a permit
//!    always finds an item
//! 4. An eviction replaces one item with another and leaves the permit count alone
//!
//! # Example
//!
//! ```
//! use csi_buffer::SampleBuffer;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let buffer = SampleBuffer::new(4);
//! buffer.put(7u32).unwrap();
//!
//! let item = buffer.get(Duration::from_millis(10)).await.unwrap();
//! assert_eq!(item, 7);
//! # });
//! ```

use crossbeam_queue::ArrayQueue;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Rejected `put()` in strict mode. Carries the item back to the caller.
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Take back the rejected item.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("sample buffer is full")
    }
}

impl<T> std::error::Error for Full<T> {}

/// Why a `get()` returned without an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetError {
    /// Nothing arrived within the requested window. Not a failure.
    Timeout,
    /// The buffer was closed while (or before) waiting.
    Closed,
}

impl fmt::Display for GetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetError::Timeout => f.write_str("no sample available before timeout"),
            GetError::Closed => f.write_str("sample buffer closed"),
        }
    }
}

impl std::error::Error for GetError {}

/// Point-in-time counters of a [`SampleBuffer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Items accepted by `put()` (including ones that evicted an older item)
    pub total_enqueued: u64,
    /// Items released by the overflow policy (rejected or evicted)
    pub total_dropped: u64,
    /// Items currently queued
    pub depth: usize,
    /// Fixed capacity in items
    pub capacity: usize,
}

/// Fixed-capacity FIFO with a non-blocking producer side and a timed consumer side.
///
/// # Type Parameters
/// - `T`: The item type. Items are moved in and out, never copied.
pub struct SampleBuffer<T> {
    /// Queued items, oldest first
    queue: ArrayQueue<T>,
    /// One permit per item a consumer may take
    ready: Semaphore,
    /// Overflow policy: evict oldest (true) or reject newest (false)
    overwrite: AtomicBool,
    total_enqueued: AtomicU64,
    total_dropped: AtomicU64,
}

impl<T: Send> SampleBuffer<T> {
    /// Create a strict-mode buffer holding at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Arc<Self> {
        Self::with_overwrite(capacity, false)
    }

    /// Create a buffer with an explicit overflow policy.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn with_overwrite(capacity: usize, overwrite: bool) -> Arc<Self> {
        assert!(capacity > 0, "buffer capacity must be greater than 0");

        Arc::new(Self {
            queue: ArrayQueue::new(capacity),
            ready: Semaphore::new(0),
            overwrite: AtomicBool::new(overwrite),
            total_enqueued: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        })
    }

    /// Enqueue an item without ever waiting.
    ///
    /// In overwrite mode this always succeeds; when the buffer is full the oldest
    /// item is evicted and dropped. In strict mode a full buffer returns
    /// [`Full`] carrying the item back. Every eviction or rejection bumps the
    /// dropped counter.
    ///
    /// Safe to call from any thread, including contexts that must not block.
    /// No logging happens on this path.
    pub fn put(&self, item: T) -> Result<(), Full<T>> {
        if self.ready.is_closed() {
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Full(item));
        }

        if self.overwrite.load(Ordering::Acquire) {
            match self.queue.force_push(item) {
                // Slot count unchanged: the new item takes over the evicted item's permit
                Some(evicted) => {
                    drop(evicted);
                    self.total_dropped.fetch_add(1, Ordering::Relaxed);
                }
                None => self.ready.add_permits(1),
            }
            self.total_enqueued.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        match self.queue.push(item) {
            Ok(()) => {
                self.total_enqueued.fetch_add(1, Ordering::Relaxed);
                self.ready.add_permits(1);
                Ok(())
            }
            Err(item) => {
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                Err(Full(item))
            }
        }
    }

    /// Take the oldest item if one is available right now.
    #[must_use]
    pub fn try_get(&self) -> Option<T> {
        let permit = self.ready.try_acquire().ok()?;
        permit.forget();
        self.pop_reserved().ok()
    }

    /// Wait up to `timeout` for the oldest item.
    ///
    /// Returns [`GetError::Timeout`] if nothing arrives in time, which callers
    /// should read as "nothing to do yet".
    pub async fn get(&self, timeout: Duration) -> Result<T, GetError> {
        match tokio::time::timeout(timeout, self.ready.acquire()).await {
            Ok(Ok(permit)) => permit.forget(),
            Ok(Err(_)) => return Err(GetError::Closed),
            Err(_) => return Err(GetError::Timeout),
        }
        self.pop_reserved()
    }

    /// Wait without a deadline for the oldest item.
    pub async fn recv(&self) -> Result<T, GetError> {
        let permit = self.ready.acquire().await.map_err(|_| GetError::Closed)?;
        permit.forget();
        self.pop_reserved()
    }

    /// Pop after a permit was taken. A permit guarantees an item.
    fn pop_reserved(&self) -> Result<T, GetError> {
        self.queue.pop().ok_or(GetError::Closed)
    }

    /// Snapshot of the counters. Safe to call concurrently with `put`/`get`.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            total_enqueued: self.total_enqueued.load(Ordering::Relaxed),
            total_dropped: self.total_dropped.load(Ordering::Relaxed),
            depth: self.queue.len(),
            capacity: self.queue.capacity(),
        }
    }

    /// Switch the overflow policy. Takes effect on the next `put()`.
    pub fn set_overwrite(&self, enabled: bool) {
        let previous = self.overwrite.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(
                mode = if enabled { "overwrite" } else { "strict" },
                "Sample buffer overflow policy changed"
            );
        }
    }

    /// Whether overflow evicts the oldest item.
    #[must_use]
    pub fn is_overwrite(&self) -> bool {
        self.overwrite.load(Ordering::Acquire)
    }

    /// Fixed capacity in items.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Close the buffer. Waiting and future `get()` calls return
    /// [`GetError::Closed`]; future `put()` calls are rejected.
    ///
    /// Items already queued stay until [`drain`](Self::drain) or drop.
    pub fn close(&self) {
        self.ready.close();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.ready.is_closed()
    }

    /// Remove every queued item, oldest first.
    ///
    /// Works on closed buffers too, so shutdown can release what is left.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.queue.len());
        while let Some(item) = self.queue.pop() {
            // Keep permits in step with items while the buffer is still open
            if let Ok(permit) = self.ready.try_acquire() {
                permit.forget();
            }
            items.push(item);
        }
        if !items.is_empty() {
            debug!(count = items.len(), "Drained sample buffer");
        }
        items
    }
}
