//! Key/value pair queues used to move rows between shards and the merge.
//!
//! Two variants exist:
//!
//! - [`BlockingPairQueue`]: bounded and shared. Producers block in
//!   [`collect`](BlockingPairQueue::collect) while the queue is full, which
//!   holds fast shards back until the consumer drains.
//! - [`UnsafePairQueue`]: unbounded and unsynchronised. Used wherever one
//!   thread owns the queue outright, i.e. payloads and every merge phase.
//!
//! Both are written to through [`OutputCollector`] and read by a single
//! destructive drain.

use crate::{config::DEFAULT_QUEUE_CAPACITY, terminate::HasTerminate};
use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::Duration,
};

/// How often a blocked producer re-checks its termination signal.
const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sink for key/value pairs.
pub trait OutputCollector<K, V> {
    fn collect(&mut self, key: K, value: V);
}

#[derive(Debug, Clone)]
pub struct UnsafePairQueue<K, V> {
    pairs: Vec<(K, V)>,
}

impl<K, V> UnsafePairQueue<K, V> {
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
        }
    }

    pub fn collect(&mut self, key: K, value: V) {
        self.pairs.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K, V> Default for UnsafePairQueue<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> OutputCollector<K, V> for UnsafePairQueue<K, V> {
    fn collect(&mut self, key: K, value: V) {
        self.pairs.push((key, value));
    }
}

impl<K, V> IntoIterator for UnsafePairQueue<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

impl<K, V> FromIterator<(K, V)> for UnsafePairQueue<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}

pub struct BlockingPairQueue<K, V> {
    pairs: Mutex<VecDeque<(K, V)>>,
    not_full: Condvar,
    capacity: usize,
    terminate: Option<Arc<dyn HasTerminate>>,
}

impl<K, V> BlockingPairQueue<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            pairs: Mutex::new(VecDeque::new()),
            not_full: Condvar::new(),
            capacity: capacity.max(1),
            terminate: None,
        }
    }

    /// Lets producers blocked on a full queue give up once `terminate` is raised.
    pub fn with_terminate(mut self, terminate: Arc<dyn HasTerminate>) -> Self {
        self.terminate = Some(terminate);
        self
    }

    fn terminated(&self) -> bool {
        self.terminate.as_ref().is_some_and(|t| t.is_terminated())
    }

    /// Appends a pair, blocking while the queue is full.
    ///
    /// Returns `false` when the pair was dropped because the queue's
    /// termination signal was raised while waiting for space.
    pub fn collect(&self, key: K, value: V) -> bool {
        let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        while pairs.len() >= self.capacity {
            if self.terminated() {
                tracing::debug!("Dropping pair collected after termination");
                return false;
            }
            pairs = self
                .not_full
                .wait_timeout(pairs, TERMINATE_POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        pairs.push_back((key, value));
        true
    }

    /// Moves every queued pair out and wakes blocked producers.
    pub fn drain(&self) -> UnsafePairQueue<K, V> {
        let drained: UnsafePairQueue<K, V> = {
            let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
            pairs.drain(..).collect()
        };
        self.not_full.notify_all();
        drained
    }

    pub fn len(&self) -> usize {
        self.pairs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V> Default for BlockingPairQueue<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl<K, V> OutputCollector<K, V> for &BlockingPairQueue<K, V> {
    fn collect(&mut self, key: K, value: V) {
        BlockingPairQueue::collect(*self, key, value);
    }
}
