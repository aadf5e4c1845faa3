use crate::{
    cache::{CacheKey, CreatorCache, SearchResponseCreatorCache},
    config::CacheConfig,
    error::Result,
    scheduler::Scheduler,
    search::{SearchRequest, SearchResponse, SearchResponseCreator},
    store::StoreFactory,
    tasks::EvictionTask,
};
use std::sync::Arc;

/// Entry point for serving search results: finds or starts the search
/// behind a request and builds its response.
pub struct SearchResponseCreatorManager {
    cache: Arc<dyn SearchResponseCreatorCache>,
    config: CacheConfig,
}

impl SearchResponseCreatorManager {
    pub fn new(config: CacheConfig, factory: Arc<dyn StoreFactory>) -> Self {
        let cache = Arc::new(CreatorCache::new(&config, factory));
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: CacheConfig, cache: Arc<dyn SearchResponseCreatorCache>) -> Self {
        Self { cache, config }
    }

    pub fn get(&self, key: &CacheKey) -> Result<Arc<SearchResponseCreator>> {
        self.cache.get(key)
    }

    /// Responds to `request`, starting its search on first sight of the query key.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let creator = self.cache.get(&CacheKey::new(request.clone()))?;
        Ok(creator.create(request))
    }

    /// Stops the search for `key` and forgets it.
    pub fn remove(&self, key: &CacheKey) {
        self.cache.remove(key);
    }

    pub fn evict_expired_elements(&self) {
        self.cache.evict_expired_elements();
    }

    /// Runs the idle sweep on `scheduler` every `eviction_interval`.
    pub fn schedule_eviction(&self, scheduler: &Scheduler) -> Result<()> {
        let task = EvictionTask::new(self.cache.clone(), self.config.eviction_interval);
        scheduler.register(Arc::new(task))?;
        tracing::info!(
            interval = ?self.config.eviction_interval,
            "Scheduled search response creator eviction"
        );
        Ok(())
    }
}
