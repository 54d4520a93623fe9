//! Bounded request queue.

use crate::category::RequestCategory;
use crate::error::RequestOutcome;
use crate::http::RequestDescriptor;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;

pub(crate) struct QueuedRequest {
    pub id: String,
    pub category: RequestCategory,
    pub enqueued_at_ms: u64,
    pub descriptor: RequestDescriptor,
    pub responder: oneshot::Sender<RequestOutcome>,
}

/// FIFO with a hard capacity. Push never blocks.
pub(crate) struct RequestQueue {
    items: Mutex<VecDeque<QueuedRequest>>,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Append, or hand the request back if the queue is full.
    pub fn push(&self, request: QueuedRequest) -> Result<usize, QueuedRequest> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(request);
        }
        items.push_back(request);
        Ok(items.len())
    }

    pub fn pop(&self) -> Option<QueuedRequest> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn drain(&self) -> Vec<QueuedRequest> {
        self.items.lock().drain(..).collect()
    }
}
