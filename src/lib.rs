pub mod cache;
pub mod config;
pub mod error;
pub mod field;
pub mod handler;
pub mod item;
pub mod manager;
pub mod partition;
pub mod plan;
pub mod queue;
pub mod scheduler;
pub mod search;
pub mod store;
pub mod tasks;
pub mod terminate;
pub mod value;

pub use cache::{CacheKey, CreatorCache, SearchResponseCreatorCache};
pub use config::{CacheConfig, MaxResults, Sizes, StoreSize};
pub use error::{Error, Result};
pub use field::{FieldSpec, Sort, SortDirection};
pub use handler::{payload, Payload, TablePayloadHandler};
pub use item::{Item, Key, RowKey};
pub use manager::SearchResponseCreatorManager;
pub use queue::{BlockingPairQueue, OutputCollector, UnsafePairQueue};
pub use search::{
    OffsetRange, QueryKey, ResultRequest, Row, SearchRequest, SearchResponse,
    SearchResponseCreator, TableResult,
};
pub use store::{Data, Store, StoreFactory, TableStore, TableStoreFactory};
pub use terminate::{HasTerminate, NeverTerminate, Terminator};
pub use value::{Generator, Val};
