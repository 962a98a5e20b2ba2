//! Tiered caching in front of the Saavn client.

pub mod durable;
pub mod fetch;
pub mod key;
pub mod payload;
pub mod pg;
pub mod ttl;
pub mod writer;

pub use durable::{DurableRecord, DurableStore, MemoryStore, MissingQueryRecord, StoreError};
pub use fetch::{CachedFetcher, FetchError, FetchResult, FetchSource, Fetched, Produced};
pub use key::{CacheKey, Namespace, TRENDING_TTL};
pub use payload::Payload;
pub use pg::PgStore;
pub use ttl::TtlCache;
pub use writer::DurableWriter;
