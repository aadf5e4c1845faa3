mod creator;
mod data;
mod table;

pub use creator::ResultStoreCreator;
pub use data::Data;
pub use table::{TableStore, TableStoreFactory};

use crate::{error::Result, search::SearchRequest};
use std::{sync::Arc, time::Duration};

/// The results of one running search, as seen by the response layer.
pub trait Store: Send + Sync {
    /// Stops the search and releases everything it holds. Idempotent.
    fn destroy(&self);

    fn is_complete(&self) -> bool;

    /// Blocks until the search completes or `timeout` elapses.
    /// Returns whether the search completed.
    fn await_completion(&self, timeout: Duration) -> bool;

    /// Latest snapshot for a table component.
    fn data(&self, component_id: &str) -> Option<Arc<Data>>;

    fn errors(&self) -> Vec<String>;

    fn highlights(&self) -> Vec<String>;
}

/// Starts the search behind a request and returns its store.
pub trait StoreFactory: Send + Sync {
    fn create(&self, request: &SearchRequest) -> Result<Arc<dyn Store>>;
}
