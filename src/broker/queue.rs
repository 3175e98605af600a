//! Named in-memory mailboxes
//!
//! Queues are created on first reference and live as long as the broker.
//! Each queue sits behind its own lock, so senders and the consumer of one
//! queue never contend with traffic on another.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;

use super::message::{Message, MessageKind};

type Queue = Arc<Mutex<VecDeque<Message>>>;

/// Registry of named FIFO queues shared by every runtime instance
///
/// Cloning a `Broker` yields another handle to the same queues.
#[derive(Debug, Clone, Default)]
pub struct Broker {
    queues: Arc<RwLock<HashMap<String, Queue>>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the queue named `queue`
    pub fn send(&self, message: Message, queue: &str) {
        if message.kind == MessageKind::QueueEmpty {
            debug!(queue, "dropping QUEUE_EMPTY sentinel");
            return;
        }
        debug!(queue, %message, "send");
        lock(&self.queue(queue)).push_back(message);
    }

    /// Remove and return the head of `queue`, or `None` when it is empty
    pub fn read(&self, queue: &str) -> Option<Message> {
        lock(&self.queue(queue)).pop_front()
    }

    /// Number of messages waiting in `queue`
    pub fn len(&self, queue: &str) -> usize {
        lock(&self.queue(queue)).len()
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    fn queue(&self, name: &str) -> Queue {
        {
            let queues = self.queues.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(queue) = queues.get(name) {
                return Arc::clone(queue);
            }
        }

        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(queues.entry(name.to_string()).or_default())
    }
}

// push_back/pop_front leave the deque consistent even if a holder panicked
fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<Message>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}
