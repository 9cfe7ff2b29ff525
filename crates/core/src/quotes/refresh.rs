//! Refresh request throttling.
//!
//! The external price collaborator rate-limits itself with a small bounded
//! queue of pending refresh requests. The engine preserves that policy at the
//! integration boundary: when the queue is full the oldest pending request is
//! dropped in favour of the newest one.

use crate::constants::REFRESH_QUEUE_CAPACITY;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded FIFO of pending refresh requests with oldest-drop overflow.
#[derive(Debug)]
pub struct RefreshQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> RefreshQueue<T> {
    pub fn new() -> Self {
        Self::with_capacity(REFRESH_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Enqueues a request. When the queue is already at capacity the oldest
    /// pending request is dropped and returned.
    pub fn push(&self, request: T) -> Option<T> {
        let mut queue = self.inner.lock().unwrap();
        let dropped = if queue.len() >= self.capacity {
            let oldest = queue.pop_front();
            log::debug!("Refresh queue full; dropping oldest pending request");
            oldest
        } else {
            None
        };
        queue.push_back(request);
        dropped
    }

    /// Removes and returns the oldest pending request.
    pub fn pop(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Drains all pending requests in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        self.inner.lock().unwrap().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl<T> Default for RefreshQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
