//! Per-query cache of [`SearchResponseCreator`]s.
//!
//! A creator is built on first request for a query key and shared by every
//! later request for the same key until it is removed or sits idle for longer
//! than the configured time-to-idle. Concurrent first requests for one key
//! build a single creator; the others wait for it. Leaving the cache for any
//! reason destroys the creator, which terminates its search.

use crate::{
    config::CacheConfig,
    error::{Error, Result},
    search::{QueryKey, SearchRequest, SearchResponseCreator},
    store::StoreFactory,
};
use moka::{notification::RemovalCause, sync::Cache};
use std::{
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Cache lookup key.
///
/// Identity is the query key alone; the request is only carried so that a
/// missing creator can be built from it.
#[derive(Debug, Clone)]
pub struct CacheKey {
    query_key: QueryKey,
    request: Option<Arc<SearchRequest>>,
}

impl CacheKey {
    pub fn new(request: SearchRequest) -> Self {
        Self {
            query_key: request.key.clone(),
            request: Some(Arc::new(request)),
        }
    }

    /// A key that can find an existing creator but not build one.
    pub fn for_query(query_key: QueryKey) -> Self {
        Self {
            query_key,
            request: None,
        }
    }

    pub fn query_key(&self) -> &QueryKey {
        &self.query_key
    }

    pub fn request(&self) -> Option<&SearchRequest> {
        self.request.as_deref()
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.query_key == other.query_key
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query_key.hash(state);
    }
}

pub trait SearchResponseCreatorCache: Send + Sync {
    /// The creator for `key`, building it if absent.
    fn get(&self, key: &CacheKey) -> Result<Arc<SearchResponseCreator>>;

    /// Drops and destroys the creator for `key`, if any.
    fn remove(&self, key: &CacheKey);

    /// Evicts and destroys creators that have been idle too long.
    fn evict_expired_elements(&self);
}

pub struct CreatorCache {
    cache: Cache<QueryKey, Arc<SearchResponseCreator>>,
    factory: Arc<dyn StoreFactory>,
    stats: Stats,
}

impl CreatorCache {
    pub fn new(config: &CacheConfig, factory: Arc<dyn StoreFactory>) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries.max(1))
            .time_to_idle(config.time_to_idle)
            .eviction_listener(evicted)
            .build();

        tracing::info!(
            max_entries = config.max_entries,
            time_to_idle = ?config.time_to_idle,
            "Created search response creator cache"
        );

        Self {
            cache,
            factory,
            stats: Stats::new(),
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key.query_key())
    }

    /// Returns (hits, misses).
    pub fn stats(&self) -> (usize, usize) {
        self.stats.get()
    }

    fn build(&self, key: &CacheKey) -> Result<Arc<SearchResponseCreator>> {
        let request = key
            .request()
            .ok_or_else(|| Error::MissingRequest(key.query_key().to_string()))?;
        let store = self.factory.create(request).map_err(|e| {
            tracing::warn!(query = %key.query_key(), error = %e, "Failed to create search store");
            e
        })?;
        Ok(Arc::new(SearchResponseCreator::new(store)))
    }
}

impl SearchResponseCreatorCache for CreatorCache {
    fn get(&self, key: &CacheKey) -> Result<Arc<SearchResponseCreator>> {
        let mut built = false;
        let creator = self
            .cache
            .try_get_with(key.query_key().clone(), || {
                built = true;
                self.build(key)
            })
            .map_err(Error::Cache)?;

        if built {
            self.stats.miss();
            tracing::debug!(query = %key.query_key(), "Created search response creator");
        } else {
            self.stats.hit();
        }
        Ok(creator)
    }

    fn remove(&self, key: &CacheKey) {
        if let Some(creator) = self.cache.remove(key.query_key()) {
            tracing::debug!(query = %key.query_key(), "Removed search response creator");
            creator.destroy();
        }
    }

    fn evict_expired_elements(&self) {
        self.cache.run_pending_tasks();
    }
}

fn evicted(key: Arc<QueryKey>, creator: Arc<SearchResponseCreator>, cause: RemovalCause) {
    // Explicit removals destroy the creator themselves.
    if cause.was_evicted() {
        tracing::info!(query = %key, cause = ?cause, "Evicted search response creator");
        creator.destroy();
    }
}

struct Stats {
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl Stats {
    fn new() -> Self {
        Stats {
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::SeqCst);
    }

    fn get(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::SeqCst),
            self.misses.load(Ordering::SeqCst),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::FieldSpec,
        search::ResultRequest,
        store::{Store, TableStoreFactory},
        terminate::HasTerminate,
    };
    use std::{
        sync::Barrier,
        thread,
        time::Duration,
    };

    struct CountingFactory {
        inner: TableStoreFactory,
        created: AtomicUsize,
        delay: Duration,
    }

    impl CountingFactory {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                inner: TableStoreFactory::new(),
                created: AtomicUsize::new(0),
                delay,
            })
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    impl StoreFactory for CountingFactory {
        fn create(&self, request: &SearchRequest) -> Result<Arc<dyn Store>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.inner.create(request)
        }
    }

    fn key(id: &str) -> CacheKey {
        let table = ResultRequest::new("t", vec![FieldSpec::new("message")]).show_detail(true);
        CacheKey::new(SearchRequest::new(QueryKey::new(id), vec![table]))
    }

    #[test]
    fn test_concurrent_gets_build_one_creator() {
        let factory = CountingFactory::new(Duration::from_millis(50));
        let cache = Arc::new(CreatorCache::new(&CacheConfig::new(), factory.clone()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.get(&key("q")).unwrap()
                })
            })
            .collect();
        let creators: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(factory.created(), 1);
        assert!(creators.iter().all(|c| Arc::ptr_eq(c, &creators[0])));
        assert_eq!(cache.stats(), (7, 1));
    }

    #[test]
    fn test_identity_is_the_query_key() {
        let factory = CountingFactory::new(Duration::ZERO);
        let cache = CreatorCache::new(&CacheConfig::new(), factory.clone());

        let first = cache.get(&key("q")).unwrap();
        let by_query = cache.get(&CacheKey::for_query(QueryKey::new("q"))).unwrap();

        assert!(Arc::ptr_eq(&first, &by_query));
        assert_eq!(key("q"), CacheKey::for_query(QueryKey::new("q")));
        assert_ne!(key("q"), key("r"));
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn test_remove_destroys_creator() {
        let factory = CountingFactory::new(Duration::ZERO);
        let cache = CreatorCache::new(&CacheConfig::new(), factory.clone());
        let key = key("q");

        cache.get(&key).unwrap();
        let store = factory.inner.store(key.query_key()).unwrap();

        cache.remove(&key);
        assert!(store.terminator().is_terminated());
        assert!(!cache.contains(&key));

        // Removing again is harmless, and the next get starts a new search.
        cache.remove(&key);
        cache.get(&key).unwrap();
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_idle_creators_are_evicted_and_destroyed() {
        let factory = CountingFactory::new(Duration::ZERO);
        let config = CacheConfig::new().time_to_idle(Duration::from_millis(50));
        let cache = CreatorCache::new(&config, factory.clone());

        cache.get(&key("idle")).unwrap();
        let store = factory.inner.store(&QueryKey::new("idle")).unwrap();

        thread::sleep(Duration::from_millis(150));
        cache.evict_expired_elements();

        assert!(store.terminator().is_terminated());
        assert!(!cache.contains(&key("idle")));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let factory = CountingFactory::new(Duration::ZERO);
        let cache = CreatorCache::new(&CacheConfig::new(), factory.clone());

        let err = cache
            .get(&CacheKey::for_query(QueryKey::new("q")))
            .unwrap_err();
        assert!(matches!(&err, Error::Cache(inner) if matches!(inner.as_ref(), Error::MissingRequest(_))));
        assert!(!cache.contains(&key("q")));

        cache.get(&key("q")).unwrap();
        assert!(cache.contains(&key("q")));
        assert_eq!(factory.created(), 1);
    }
}
