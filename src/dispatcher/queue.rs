//! Bounded FIFO queue for inbound updates.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Semaphore;

use crate::error::{FeedmonError, Result};
use crate::telegram::Update;

/// Bounded FIFO of pending updates shared between the receive loop and the
/// worker pool.
///
/// A counting semaphore carries one permit per queued item, so each enqueue
/// wakes exactly one waiting worker and an idle pool never busy-polls.
pub struct UpdateQueue {
    inner: Mutex<VecDeque<Update>>,
    available: Semaphore,
    capacity: usize,
}

impl UpdateQueue {
    /// Create a queue holding at most `capacity` updates.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Semaphore::new(0),
            capacity,
        }
    }

    /// Enqueue one update.
    ///
    /// At capacity the update is handed back to the caller, which owes the
    /// sender an explicit overflow reply.
    pub fn push(&self, update: Update) -> std::result::Result<(), Update> {
        {
            let mut inner = self.inner.lock().expect("update queue lock poisoned");
            if inner.len() >= self.capacity {
                return Err(update);
            }
            inner.push_back(update);
        }
        self.available.add_permits(1);
        Ok(())
    }

    /// Dequeue one update, waiting until one is available.
    ///
    /// A granted permit with an empty queue means the queue and its signal
    /// went out of sync; that is unrecoverable bookkeeping corruption.
    pub async fn pop(&self) -> Result<Update> {
        let permit = self
            .available
            .acquire()
            .await
            .map_err(|_| FeedmonError::Invariant("update queue semaphore closed".to_string()))?;
        permit.forget();

        let mut inner = self.inner.lock().expect("update queue lock poisoned");
        inner.pop_front().ok_or_else(|| {
            FeedmonError::Invariant("update queue signaled but empty".to_string())
        })
    }

    /// Number of updates currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("update queue lock poisoned").len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued updates.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: i64) -> Update {
        Update {
            update_id: id,
            message: None,
        }
    }

    #[test]
    fn test_push_within_capacity() {
        let queue = UpdateQueue::new(3);
        assert!(queue.push(update(1)).is_ok());
        assert!(queue.push(update(2)).is_ok());
        assert!(queue.push(update(3)).is_ok());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_push_beyond_capacity_rejected() {
        let queue = UpdateQueue::new(2);
        assert!(queue.push(update(1)).is_ok());
        assert!(queue.push(update(2)).is_ok());

        // The rejected update comes back to the caller.
        let rejected = queue.push(update(3)).unwrap_err();
        assert_eq!(rejected.update_id, 3);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_pop_fifo_order() {
        let queue = UpdateQueue::new(10);
        queue.push(update(1)).unwrap();
        queue.push(update(2)).unwrap();
        queue.push(update(3)).unwrap();

        assert_eq!(queue.pop().await.unwrap().update_id, 1);
        assert_eq!(queue.pop().await.unwrap().update_id, 2);
        assert_eq!(queue.pop().await.unwrap().update_id, 3);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_wakes_on_push() {
        use std::sync::Arc;

        let queue = Arc::new(UpdateQueue::new(10));
        let popper = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await.unwrap().update_id })
        };

        // Give the popper a chance to block on the semaphore first.
        tokio::task::yield_now().await;
        queue.push(update(99)).unwrap();

        assert_eq!(popper.await.unwrap(), 99);
    }

    #[tokio::test]
    async fn test_length_never_exceeds_capacity() {
        let queue = UpdateQueue::new(5);
        for i in 0..20 {
            let _ = queue.push(update(i));
            assert!(queue.len() <= 5);
        }
        assert_eq!(queue.len(), 5);
    }
}
