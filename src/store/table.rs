use super::{Data, Store, StoreFactory};
use crate::{
    error::{Error, Result},
    handler::{Payload, TablePayloadHandler},
    search::{QueryKey, SearchRequest},
    terminate::{HasTerminate, Terminator},
};
use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, PoisonError, Weak},
    time::{Duration, Instant},
};

/// Store for a search made of table components.
///
/// Each component gets its own [`TablePayloadHandler`]; all of them share one
/// [`Terminator`] so destroying the store stops every merge at once.
pub struct TableStore {
    key: QueryKey,
    terminator: Arc<Terminator>,
    handlers: HashMap<String, Arc<TablePayloadHandler>>,
    errors: Mutex<Vec<String>>,
    highlights: Mutex<Vec<String>>,
    complete: Mutex<bool>,
    completion: Condvar,
}

impl TableStore {
    pub fn new(request: &SearchRequest) -> Result<Self> {
        let mut handlers = HashMap::with_capacity(request.components.len());
        for component in &request.components {
            let handler = TablePayloadHandler::new(
                &component.fields,
                component.show_detail,
                component.max_results.clone(),
                component.store_size.clone(),
            )?;
            if handlers
                .insert(component.component_id.clone(), Arc::new(handler))
                .is_some()
            {
                return Err(Error::InvalidConfig(format!(
                    "component {} is declared twice",
                    component.component_id
                )));
            }
        }

        Ok(Self {
            key: request.key.clone(),
            terminator: Arc::new(Terminator::new()),
            handlers,
            errors: Mutex::new(Vec::new()),
            highlights: Mutex::new(Vec::new()),
            complete: Mutex::new(false),
            completion: Condvar::new(),
        })
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn terminator(&self) -> Arc<Terminator> {
        self.terminator.clone()
    }

    pub fn handler(&self, component_id: &str) -> Option<&Arc<TablePayloadHandler>> {
        self.handlers.get(component_id)
    }

    /// Hands a shard's rows to the handler for `component_id`.
    pub fn add_payload(&self, component_id: &str, payload: Payload) -> Result<()> {
        let handler = self
            .handlers
            .get(component_id)
            .ok_or_else(|| Error::UnknownComponent(component_id.to_string()))?;
        handler.add_queue(payload, self.terminator.as_ref())
    }

    pub fn add_error(&self, error: impl Into<String>) {
        let error = error.into();
        tracing::warn!(query = %self.key, error = %error, "Search reported an error");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    pub fn set_highlights(&self, highlights: Vec<String>) {
        *self.highlights.lock().unwrap_or_else(PoisonError::into_inner) = highlights;
    }

    /// Marks the search as finished and wakes anyone awaiting completion.
    pub fn complete(&self) {
        let mut complete = self.complete.lock().unwrap_or_else(PoisonError::into_inner);
        if !*complete {
            *complete = true;
            tracing::debug!(query = %self.key, "Search complete");
        }
        self.completion.notify_all();
    }

    /// True once every component has all the rows it can show.
    pub fn should_terminate_search(&self) -> bool {
        !self.handlers.is_empty()
            && self
                .handlers
                .values()
                .all(|handler| handler.should_terminate_search())
    }

    /// Waits for every handler to finish merging what it has been given.
    pub fn wait_for_pending_work(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        self.handlers.values().all(|handler| {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            handler.wait_for_pending_work(remaining)
        })
    }
}

impl Store for TableStore {
    fn destroy(&self) {
        if self.terminator.terminate() {
            tracing::info!(query = %self.key, "Destroying search store");
        }
        for handler in self.handlers.values() {
            handler.clear();
        }
        self.complete();
    }

    fn is_complete(&self) -> bool {
        *self.complete.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn await_completion(&self, timeout: Duration) -> bool {
        let complete = self.complete.lock().unwrap_or_else(PoisonError::into_inner);
        let (complete, _) = self
            .completion
            .wait_timeout_while(complete, timeout, |complete| !*complete)
            .unwrap_or_else(PoisonError::into_inner);
        *complete
    }

    fn data(&self, component_id: &str) -> Option<Arc<Data>> {
        if self.terminator.is_terminated() {
            return None;
        }
        self.handlers.get(component_id).map(|handler| handler.data())
    }

    fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn highlights(&self) -> Vec<String> {
        self.highlights
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Creates a [`TableStore`] per request and lets search workers find it again
/// by query key to deliver their payloads.
#[derive(Default)]
pub struct TableStoreFactory {
    stores: Mutex<HashMap<QueryKey, Weak<TableStore>>>,
}

impl TableStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live store for `key`, if one has been created and not yet dropped.
    pub fn store(&self, key: &QueryKey) -> Option<Arc<TableStore>> {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(Weak::upgrade)
    }
}

impl StoreFactory for TableStoreFactory {
    fn create(&self, request: &SearchRequest) -> Result<Arc<dyn Store>> {
        let store = Arc::new(TableStore::new(request)?);

        let mut stores = self.stores.lock()?;
        stores.retain(|_, store| store.strong_count() > 0);
        stores.insert(request.key.clone(), Arc::downgrade(&store));
        drop(stores);

        tracing::info!(
            query = %request.key,
            components = request.components.len(),
            "Created search store"
        );
        Ok(store)
    }
}
