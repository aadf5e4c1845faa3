use crate::{
    cache::SearchResponseCreatorCache,
    error::{Error, Result},
    scheduler::{BackgroundTask, Context},
};
use std::{sync::Arc, time::Duration};

/// Periodically evicts idle search response creators, terminating their searches.
pub struct EvictionTask {
    cache: Arc<dyn SearchResponseCreatorCache>,
    interval: Duration,
}

impl EvictionTask {
    pub fn new(cache: Arc<dyn SearchResponseCreatorCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }
}

#[async_trait::async_trait]
impl BackgroundTask for EvictionTask {
    fn name(&self) -> &'static str {
        "creator-eviction"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self, ctx: Context) -> Result<()> {
        let cache = self.cache.clone();
        // Destroying a store waits on its handlers' locks.
        tokio::task::spawn_blocking(move || cache.evict_expired_elements())
            .await
            .map_err(|e| Error::InvalidState(format!("Eviction sweep panicked: {}", e)))?;

        tracing::trace!(task = ctx.task_name, run_id = ctx.run_id, "Evicted expired creators");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::CacheKey, scheduler::Scheduler, search::SearchResponseCreator};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct SweepCounter {
        sweeps: AtomicUsize,
    }

    impl SearchResponseCreatorCache for SweepCounter {
        fn get(&self, key: &CacheKey) -> Result<Arc<SearchResponseCreator>> {
            Err(Error::MissingRequest(key.query_key().to_string()))
        }

        fn remove(&self, _key: &CacheKey) {}

        fn evict_expired_elements(&self) {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_sweeps_on_every_tick() -> Result<()> {
        let cache = Arc::new(SweepCounter::default());
        let scheduler = Scheduler::new()?;

        scheduler.register(Arc::new(EvictionTask::new(
            cache.clone(),
            Duration::from_millis(10),
        )))?;
        tokio::time::sleep(Duration::from_millis(60)).await;
        scheduler.shutdown().await?;

        assert!(cache.sweeps.load(Ordering::SeqCst) > 1);
        Ok(())
    }
}
