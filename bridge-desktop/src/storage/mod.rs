//! Storage backends implementing [`StorageAdapter`](bridge_traits::storage::StorageAdapter).

pub mod document;
pub mod hybrid;
pub mod kv_store;
pub mod memory;
pub mod sync_backed;

pub use document::{DocumentLocation, DocumentStorage};
pub use hybrid::HybridStorage;
pub use kv_store::{
    FileKeyValueStore, InMemoryKeyValueStore, KeyValueStoreError, SyncKeyValueStore,
};
pub use memory::{MemoryStorage, MemoryStore};
pub use sync_backed::SyncBackedStorage;
