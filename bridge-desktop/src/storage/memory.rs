//! In-process storage backend.
//!
//! Reference semantics for every other backend, prefix-scoped `clear` and
//! `keys` included.

use async_trait::async_trait;
use bridge_traits::{
    error::StorageResult,
    listeners::{ListenerRegistry, Subscription},
    storage::{ChangeEvent, ChangeListener, KeyNamespace, StorageAdapter, StoredValue},
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryData {
    entries: BTreeMap<String, StoredValue>,
    collections: BTreeMap<String, BTreeMap<String, StoredValue>>,
}

/// Physical backing shared by one or more [`MemoryStorage`] instances.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical keys currently stored, prefixes included.
    pub fn physical_keys(&self) -> Vec<String> {
        self.data.lock().entries.keys().cloned().collect()
    }

    /// Physical collection names currently holding at least one item.
    pub fn physical_collections(&self) -> Vec<String> {
        self.data.lock().collections.keys().cloned().collect()
    }
}

/// Memory-backed [`StorageAdapter`].
pub struct MemoryStorage {
    store: MemoryStore,
    namespace: KeyNamespace,
    listeners: ListenerRegistry<ChangeEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::shared(MemoryStore::new(), None)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::shared(MemoryStore::new(), Some(prefix.into()))
    }

    /// An instance over an existing physical store.
    pub fn shared(store: MemoryStore, prefix: Option<String>) -> Self {
        Self {
            store,
            namespace: KeyNamespace::new(prefix),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        let physical = self.namespace.apply(key);
        Ok(self.store.data.lock().entries.get(&physical).cloned())
    }

    async fn set(&self, key: &str, value: StoredValue) -> StorageResult<()> {
        let physical = self.namespace.apply(key);
        let old_value = self
            .store
            .data
            .lock()
            .entries
            .insert(physical, value.clone());

        debug!(key = key, "memory set");
        self.listeners
            .emit(&ChangeEvent::new(key, old_value, Some(value)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let physical = self.namespace.apply(key);
        let old_value = self.store.data.lock().entries.remove(&physical);

        debug!(key = key, existed = old_value.is_some(), "memory delete");
        self.listeners.emit(&ChangeEvent::new(key, old_value, None));
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut data = self.store.data.lock();
        if self.namespace.prefix().is_none() {
            data.entries.clear();
            data.collections.clear();
        } else {
            data.entries.retain(|key, _| !self.namespace.owns(key));
            data.collections.retain(|name, _| !self.namespace.owns(name));
        }
        debug!(prefix = ?self.namespace.prefix(), "memory clear");
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let data = self.store.data.lock();
        Ok(data
            .entries
            .keys()
            .filter_map(|key| self.namespace.strip(key).map(str::to_string))
            .collect())
    }

    async fn get_structured(
        &self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<StoredValue>> {
        let physical = self.namespace.apply(collection);
        let data = self.store.data.lock();
        Ok(data
            .collections
            .get(&physical)
            .and_then(|items| items.get(id))
            .cloned())
    }

    async fn set_structured(
        &self,
        collection: &str,
        id: &str,
        value: StoredValue,
    ) -> StorageResult<()> {
        let physical = self.namespace.apply(collection);
        self.store
            .data
            .lock()
            .collections
            .entry(physical)
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    async fn delete_structured(&self, collection: &str, id: Option<&str>) -> StorageResult<()> {
        let physical = self.namespace.apply(collection);
        let mut data = self.store.data.lock();
        match id {
            Some(id) => {
                let now_empty = match data.collections.get_mut(&physical) {
                    Some(items) => {
                        items.remove(id);
                        items.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    data.collections.remove(&physical);
                }
            }
            None => {
                data.collections.remove(&physical);
            }
        }
        Ok(())
    }

    async fn list_structured(&self, collection: &str) -> StorageResult<Vec<String>> {
        let physical = self.namespace.apply(collection);
        let data = self.store.data.lock();
        Ok(data
            .collections
            .get(&physical)
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn on_changed(&self, listener: ChangeListener) -> Subscription {
        self.listeners.subscribe(listener)
    }
}
