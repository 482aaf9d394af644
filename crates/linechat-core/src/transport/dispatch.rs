//! Dispatch queue: the handoff from socket tasks to the owning module.
//!
//! # Why a queue? (for beginners)
//!
//! A connection's read loop runs on its own task.  If it called straight into
//! the server to register, broadcast, or remove connections, the registry
//! would need a lock and every consumer callback would run on a socket task.
//!
//! Instead, socket tasks only ever *push* events through a cheap, cloneable
//! [`DispatchHandle`].  The owner holds the single [`DispatchQueue`] and pulls
//! events out on its own context, one at a time.  All mutation of shared state
//! happens there.
//!
//! ```text
//! read loop (conn A) ──push──┐
//! read loop (conn B) ──push──┼──► DispatchQueue ──next()/drain()──► owner
//! accept loop        ──push──┘
//! ```
//!
//! The queue is unbounded so a push never blocks a socket task.

use tokio::sync::mpsc;

/// Producer side of a [`DispatchQueue`].  Cheap to clone; safe to use from any task.
#[derive(Debug)]
pub struct DispatchHandle<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for DispatchHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> DispatchHandle<T> {
    /// Pushes an event.  Returns `false` if the owning queue has been dropped.
    pub fn push(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }
}

/// Consumer side, held by exactly one owner.
#[derive(Debug)]
pub struct DispatchQueue<T> {
    handle: DispatchHandle<T>,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> DispatchQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle: DispatchHandle { tx },
            rx,
        }
    }

    /// Returns a new producer handle for this queue.
    pub fn handle(&self) -> DispatchHandle<T> {
        self.handle.clone()
    }

    /// Waits for the next event.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing, so
    /// it can sit in a `tokio::select!` next to other inputs.  The queue keeps
    /// a producer of its own, so this only returns `None` if that invariant is
    /// ever broken.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Returns the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Removes and returns every event buffered right now, in arrival order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.rx.len());
        while let Some(item) = self.try_next() {
            drained.push(item);
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
