//! Asynchronous storage over a synchronous string key-value store.
//!
//! Values are stored as JSON text. Structured items are encoded as flat keys
//! `_coll_{collection}_{id}` under the instance namespace, so listing a
//! collection scans every key in the store. The collection segment has `%`
//! and `_` percent-escaped, so the first `_` after it always ends the
//! collection name and `notes` never matches `notes_archive`. Ids are stored
//! verbatim.

use async_trait::async_trait;
use bridge_traits::{
    error::{StorageError, StorageResult},
    listeners::{ListenerRegistry, Subscription},
    storage::{ChangeEvent, ChangeListener, KeyNamespace, StorageAdapter, StoredValue},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::kv_store::{KeyValueStoreError, SyncKeyValueStore};

/// Marker that starts every encoded structured key.
pub const COLLECTION_MARKER: &str = "_coll_";

const QUOTA_ERROR_NAMES: &[&str] = &[
    "QuotaExceededError",
    "NS_ERROR_DOM_QUOTA_REACHED",
    "StorageFull",
];

/// 22 and 1014 are the legacy DOM codes, 28 is ENOSPC.
const QUOTA_ERROR_CODES: &[i32] = &[22, 1014, 28];

const PERMISSION_ERROR_NAMES: &[&str] = &["SecurityError", "PermissionDenied"];

/// Does `err` look like the store ran out of room?
pub fn is_quota_error(err: &KeyValueStoreError) -> bool {
    QUOTA_ERROR_NAMES.contains(&err.name.as_str())
        || err
            .code
            .map(|code| QUOTA_ERROR_CODES.contains(&code))
            .unwrap_or(false)
}

pub fn map_store_error(err: KeyValueStoreError, context: &str) -> StorageError {
    let message = format!("{}: {}", context, err);
    if is_quota_error(&err) {
        StorageError::QuotaExceeded(message)
    } else if PERMISSION_ERROR_NAMES.contains(&err.name.as_str()) {
        StorageError::PermissionDenied(message)
    } else {
        StorageError::Unknown(message)
    }
}

fn escape_collection(collection: &str) -> String {
    let mut escaped = String::with_capacity(collection.len());
    for ch in collection.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '_' => escaped.push_str("%5F"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn collection_prefix(collection: &str) -> String {
    format!("{}{}_", COLLECTION_MARKER, escape_collection(collection))
}

fn collection_key(collection: &str, id: &str) -> String {
    format!("{}{}", collection_prefix(collection), id)
}

/// [`StorageAdapter`] over any [`SyncKeyValueStore`].
///
/// Mutations on a store that [blocks on I/O](SyncKeyValueStore::blocks_on_io)
/// run on tokio's blocking pool.
pub struct SyncBackedStorage<S: SyncKeyValueStore> {
    core: Arc<SyncCore<S>>,
    listeners: ListenerRegistry<ChangeEvent>,
}

struct SyncCore<S> {
    store: Arc<S>,
    namespace: KeyNamespace,
    /// Held across read-old-then-write so the reported old value is exact.
    mutation_lock: Mutex<()>,
}

impl<S: SyncKeyValueStore> SyncCore<S> {
    fn read(&self, physical: &str) -> StorageResult<Option<StoredValue>> {
        let raw = self
            .store
            .get_item(physical)
            .map_err(|e| map_store_error(e, "read failed"))?;
        match raw {
            Some(text) => serde_json::from_str(&text).map(Some).map_err(|e| {
                StorageError::InvalidData(format!("{} holds undecodable data: {}", physical, e))
            }),
            None => Ok(None),
        }
    }

    /// Prior value for change events. Undecodable text reports as absent.
    fn read_previous(&self, physical: &str) -> StorageResult<Option<StoredValue>> {
        match self.read(physical) {
            Err(StorageError::InvalidData(message)) => {
                warn!(key = physical, %message, "Previous value unreadable");
                Ok(None)
            }
            other => other,
        }
    }

    fn write(&self, physical: &str, value: &StoredValue) -> StorageResult<()> {
        let text = serde_json::to_string(value)?;
        self.store
            .set_item(physical, &text)
            .map_err(|e| map_store_error(e, "write failed"))
    }

    fn remove(&self, physical: &str) -> StorageResult<()> {
        self.store
            .remove_item(physical)
            .map_err(|e| map_store_error(e, "remove failed"))
    }

    /// Physical keys in this namespace, paired with their logical form.
    fn owned_keys(&self) -> Vec<(String, String)> {
        self.store
            .all_keys()
            .into_iter()
            .filter_map(|physical| {
                let logical = self.namespace.strip(&physical)?.to_string();
                Some((physical, logical))
            })
            .collect()
    }

    /// Write or remove `physical`, returning the value it held before.
    fn replace(
        &self,
        physical: &str,
        value: Option<&StoredValue>,
    ) -> StorageResult<Option<StoredValue>> {
        let _guard = self.mutation_lock.lock();
        let old_value = self.read_previous(physical)?;
        match value {
            Some(value) => self.write(physical, value)?,
            None => self.remove(physical)?,
        }
        Ok(old_value)
    }

    fn clear(&self) -> StorageResult<()> {
        let _guard = self.mutation_lock.lock();
        if self.namespace.prefix().is_none() {
            self.store
                .clear()
                .map_err(|e| map_store_error(e, "clear failed"))
        } else {
            for (physical, _) in self.owned_keys() {
                self.remove(&physical)?;
            }
            Ok(())
        }
    }

    fn remove_collection(&self, collection: &str) -> StorageResult<()> {
        let prefix = collection_prefix(collection);
        let _guard = self.mutation_lock.lock();
        for (physical, logical) in self.owned_keys() {
            if logical.starts_with(&prefix) {
                self.remove(&physical)?;
            }
        }
        Ok(())
    }
}

impl<S: SyncKeyValueStore + 'static> SyncBackedStorage<S> {
    pub fn new(store: Arc<S>, prefix: Option<String>) -> Self {
        Self {
            core: Arc::new(SyncCore {
                store,
                namespace: KeyNamespace::new(prefix),
                mutation_lock: Mutex::new(()),
            }),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.core.store
    }

    /// Run a mutation, off the worker thread when the store does disk I/O.
    async fn mutate<T, F>(&self, op: F) -> StorageResult<T>
    where
        F: FnOnce(&SyncCore<S>) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.core.store.blocks_on_io() {
            return op(&self.core);
        }
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || op(&core))
            .await
            .map_err(|e| StorageError::Unknown(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl<S: SyncKeyValueStore + 'static> StorageAdapter for SyncBackedStorage<S> {
    fn backend_name(&self) -> &'static str {
        "sync-backed"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        self.core.read(&self.core.namespace.apply(key))
    }

    async fn set(&self, key: &str, value: StoredValue) -> StorageResult<()> {
        let physical = self.core.namespace.apply(key);
        let stored = value.clone();
        let old_value = self
            .mutate(move |core| core.replace(&physical, Some(&stored)))
            .await?;

        debug!(key = key, "sync-backed set");
        self.listeners
            .emit(&ChangeEvent::new(key, old_value, Some(value)));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let physical = self.core.namespace.apply(key);
        let old_value = self.mutate(move |core| core.replace(&physical, None)).await?;

        debug!(key = key, "sync-backed delete");
        self.listeners.emit(&ChangeEvent::new(key, old_value, None));
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.mutate(|core| core.clear()).await?;
        debug!(prefix = ?self.core.namespace.prefix(), "sync-backed clear");
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .core
            .owned_keys()
            .into_iter()
            .map(|(_, logical)| logical)
            .filter(|logical| !logical.starts_with(COLLECTION_MARKER))
            .collect())
    }

    async fn get_structured(
        &self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<StoredValue>> {
        self.core
            .read(&self.core.namespace.apply(&collection_key(collection, id)))
    }

    async fn set_structured(
        &self,
        collection: &str,
        id: &str,
        value: StoredValue,
    ) -> StorageResult<()> {
        let physical = self.core.namespace.apply(&collection_key(collection, id));
        self.mutate(move |core| core.write(&physical, &value)).await
    }

    async fn delete_structured(&self, collection: &str, id: Option<&str>) -> StorageResult<()> {
        match id {
            Some(id) => {
                let physical = self.core.namespace.apply(&collection_key(collection, id));
                self.mutate(move |core| core.remove(&physical)).await
            }
            None => {
                let collection = collection.to_string();
                self.mutate(move |core| core.remove_collection(&collection))
                    .await
            }
        }
    }

    async fn list_structured(&self, collection: &str) -> StorageResult<Vec<String>> {
        let prefix = collection_prefix(collection);
        Ok(self
            .core
            .owned_keys()
            .into_iter()
            .filter_map(|(_, logical)| logical.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    fn on_changed(&self, listener: ChangeListener) -> Subscription {
        self.listeners.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv_store::{
        FileKeyValueStore, InMemoryKeyValueStore, MockSyncKeyValueStore,
    };
    use bridge_traits::error::StorageErrorCode;
    use serde_json::json;

    fn storage(prefix: Option<&str>) -> SyncBackedStorage<InMemoryKeyValueStore> {
        SyncBackedStorage::new(
            Arc::new(InMemoryKeyValueStore::new()),
            prefix.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_values_are_json_text() {
        let storage = storage(Some("app"));
        storage.set("verse", json!({"ref": "Ps 23:1"})).await.unwrap();

        let raw = storage.store().get_item("app.verse").unwrap().unwrap();
        assert_eq!(raw, r#"{"ref":"Ps 23:1"}"#);
    }

    #[tokio::test]
    async fn test_undecodable_text_is_invalid_data() {
        let storage = storage(None);
        storage.store().set_item("broken", "{nope").unwrap();

        let err = storage.get("broken").await.unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::InvalidData);
    }

    #[tokio::test]
    async fn test_structured_encoding_and_listing() {
        let storage = storage(Some("app"));
        storage.set_structured("posts", "1", json!("a")).await.unwrap();
        storage.set_structured("posts", "2", json!("b")).await.unwrap();
        storage.set("plain", json!(0)).await.unwrap();

        assert!(storage.store().get_item("app._coll_posts_1").unwrap().is_some());

        let mut ids = storage.list_structured("posts").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(storage.keys().await.unwrap(), vec!["plain".to_string()]);

        storage.delete_structured("posts", None).await.unwrap();
        assert!(storage.list_structured("posts").await.unwrap().is_empty());
        assert_eq!(storage.get("plain").await.unwrap(), Some(json!(0)));
    }

    #[tokio::test]
    async fn test_collection_names_are_escaped() {
        let storage = storage(None);
        storage.set_structured("notes", "1", json!("a")).await.unwrap();
        storage
            .set_structured("notes_archive", "7", json!("b"))
            .await
            .unwrap();
        storage.set_structured("100%", "x", json!("c")).await.unwrap();

        assert!(storage
            .store()
            .get_item("_coll_notes%5Farchive_7")
            .unwrap()
            .is_some());
        assert!(storage.store().get_item("_coll_100%25_x").unwrap().is_some());

        assert_eq!(storage.list_structured("notes").await.unwrap(), vec!["1"]);
        storage.delete_structured("notes", None).await.unwrap();
        assert_eq!(
            storage.list_structured("notes_archive").await.unwrap(),
            vec!["7"]
        );
        assert_eq!(storage.list_structured("100%").await.unwrap(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_file_store_mutations_leave_worker_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local-storage.json");
        let storage = SyncBackedStorage::new(
            Arc::new(FileKeyValueStore::open(&path, None).unwrap()),
            Some("app".into()),
        );

        storage.set("font", json!("serif")).await.unwrap();
        storage.set_structured("notes", "1", json!("a")).await.unwrap();
        storage.delete("font").await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("app._coll_notes_1"));
        assert!(!text.contains("app.font"));

        storage.clear().await.unwrap();
        assert!(storage.list_structured("notes").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quota_maps_to_quota_exceeded() {
        let storage = SyncBackedStorage::new(Arc::new(InMemoryKeyValueStore::with_quota(16)), None);
        let err = storage
            .set("chapter", json!("In the beginning was the Word"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::QuotaExceeded);
    }

    #[test]
    fn test_quota_heuristic_shapes() {
        assert!(is_quota_error(&KeyValueStoreError::new(
            "NS_ERROR_DOM_QUOTA_REACHED",
            "full"
        )));
        assert!(is_quota_error(
            &KeyValueStoreError::new("IoError", "No space left on device").with_code(28)
        ));
        assert!(is_quota_error(
            &KeyValueStoreError::new("Error", "legacy").with_code(1014)
        ));
        assert!(!is_quota_error(&KeyValueStoreError::new("IoError", "busy")));
    }

    #[tokio::test]
    async fn test_store_failures_are_translated() {
        let mut mock = MockSyncKeyValueStore::new();
        mock.expect_get_item().returning(|_| Ok(None));
        mock.expect_set_item()
            .returning(|_, _| Err(KeyValueStoreError::new("SecurityError", "blocked")));
        mock.expect_remove_item()
            .returning(|_| Err(KeyValueStoreError::new("WeirdError", "?")));

        mock.expect_blocks_on_io().return_const(false);
        let storage = SyncBackedStorage::new(Arc::new(mock), None);

        let err = storage.set("k", json!(1)).await.unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::PermissionDenied);

        let err = storage.delete("k").await.unwrap_err();
        assert_eq!(err.code(), StorageErrorCode::Unknown);
    }

    #[tokio::test]
    async fn test_change_events_carry_previous_value() {
        let storage = storage(None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = storage.on_changed(Box::new(move |event: &ChangeEvent| {
            sink.lock().push(event.clone())
        }));

        storage.set("k", json!(1)).await.unwrap();
        storage.set("k", json!(2)).await.unwrap();
        storage.delete("k").await.unwrap();
        sub.unsubscribe();
        storage.set("k", json!(3)).await.unwrap();

        let seen = seen.lock();
        assert_eq!(
            *seen,
            vec![
                ChangeEvent::new("k", None, Some(json!(1))),
                ChangeEvent::new("k", Some(json!(1)), Some(json!(2))),
                ChangeEvent::new("k", Some(json!(2)), None),
            ]
        );
    }
}
