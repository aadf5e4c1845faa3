use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of a blocking pair queue before producers are held back.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_000_000;

/// Per-depth size bounds.
///
/// Depths past the declared list reuse the last declared value. An empty list
/// places no bound on any depth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sizes(Vec<usize>);

/// Maximum number of children retained under each parent, per depth.
pub type StoreSize = Sizes;

/// Maximum number of children returned under each parent, per depth.
pub type MaxResults = Sizes;

impl Sizes {
    pub fn new(sizes: impl Into<Vec<usize>>) -> Self {
        Self(sizes.into())
    }

    /// No bound at any depth.
    pub fn unbounded() -> Self {
        Self(Vec::new())
    }

    pub fn size(&self, depth: usize) -> usize {
        match self.0.get(depth) {
            Some(size) => *size,
            None => self.0.last().copied().unwrap_or(usize::MAX),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for Sizes {
    fn from(sizes: Vec<usize>) -> Self {
        Self(sizes)
    }
}

/// Configuration for the search response creator cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of live queries (default: 100)
    pub max_entries: u64,

    /// Idle time after which a query is evicted and terminated (default: 10min)
    pub time_to_idle: Duration,

    /// How often the expiry sweep runs (default: 60s)
    pub eviction_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            time_to_idle: Duration::from_secs(10 * 60),
            eviction_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of cached queries
    pub fn max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set idle expiry
    pub fn time_to_idle(mut self, ttl: Duration) -> Self {
        self.time_to_idle = ttl;
        self
    }

    /// Set expiry sweep interval
    pub fn eviction_interval(mut self, interval: Duration) -> Self {
        self.eviction_interval = interval;
        self
    }
}
