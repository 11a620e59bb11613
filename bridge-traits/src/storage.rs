//! Storage Contract
//!
//! The interface every persistence backend implements: key-value CRUD,
//! structured-collection CRUD addressed by `(collection, id)`, batch helpers,
//! and change notification for key-value mutations.
//!
//! Runtime code depends only on [`StorageAdapter`]; the concrete backend is
//! chosen by the adapter factory.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StorageResult;
use crate::listeners::Subscription;

/// Opaque stored value. Backends never inspect its content.
pub type StoredValue = serde_json::Value;

/// Separator between a namespace prefix and the logical key.
pub const NAMESPACE_SEPARATOR: char = '.';

/// Emitted once per key-value mutation (`set` / `delete`).
///
/// `key` is the logical key as the caller passed it. `old_value` is the value
/// held before the mutation, `new_value` the value after (`None` on delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub key: String,
    pub old_value: Option<StoredValue>,
    pub new_value: Option<StoredValue>,
}

impl ChangeEvent {
    pub fn new(
        key: impl Into<String>,
        old_value: Option<StoredValue>,
        new_value: Option<StoredValue>,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
        }
    }
}

/// Optional key prefix isolating logical stores that share a physical backend.
///
/// Physical keys take the form `prefix.key`. Mapping is bijective for logical
/// keys without the separator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: Option<String>,
}

impl KeyNamespace {
    /// An empty prefix is treated as no prefix.
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    pub fn none() -> Self {
        Self { prefix: None }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// The leading text every owned physical key starts with (`prefix.`).
    pub fn physical_prefix(&self) -> Option<String> {
        self.prefix
            .as_ref()
            .map(|p| format!("{}{}", p, NAMESPACE_SEPARATOR))
    }

    pub fn apply(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}{}", prefix, NAMESPACE_SEPARATOR, key),
            None => key.to_string(),
        }
    }

    /// Logical key for `physical`, or `None` when it lies outside this namespace.
    pub fn strip<'a>(&self, physical: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => physical
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(NAMESPACE_SEPARATOR)),
            None => Some(physical),
        }
    }

    pub fn owns(&self, physical: &str) -> bool {
        self.strip(physical).is_some()
    }
}

/// Callback registered through [`StorageAdapter::on_changed`].
pub type ChangeListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Storage contract implemented by every backend.
///
/// # Errors
///
/// Every operation either succeeds or fails with exactly one
/// [`StorageError`](crate::error::StorageError). Missing entries are not
/// errors: reads return `None`.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageAdapter;
/// use serde_json::json;
///
/// async fn remember_chapter(storage: &dyn StorageAdapter) -> StorageResult<()> {
///     storage.set("last-chapter", json!({"book": "JHN", "chapter": 3})).await?;
///     storage.set_structured("bookmarks", "jhn-3-16", json!({"note": "memorize"})).await
/// }
/// ```
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;

    // ---- key-value ---------------------------------------------------------

    async fn get(&self, key: &str) -> StorageResult<Option<StoredValue>>;

    async fn set(&self, key: &str, value: StoredValue) -> StorageResult<()>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Remove everything under this instance's namespace prefix, or the
    /// whole backend when no prefix is configured.
    async fn clear(&self) -> StorageResult<()>;

    /// Logical keys under this instance's namespace. Structured rows are
    /// never listed.
    async fn keys(&self) -> StorageResult<Vec<String>>;

    // ---- structured collections -------------------------------------------

    async fn get_structured(&self, collection: &str, id: &str)
        -> StorageResult<Option<StoredValue>>;

    async fn set_structured(&self, collection: &str, id: &str, value: StoredValue)
        -> StorageResult<()>;

    /// Delete one item, or the whole collection when `id` is `None`.
    async fn delete_structured(&self, collection: &str, id: Option<&str>) -> StorageResult<()>;

    /// Ids stored in `collection`, in no particular order.
    async fn list_structured(&self, collection: &str) -> StorageResult<Vec<String>>;

    // ---- batch -------------------------------------------------------------

    async fn get_batch(
        &self,
        keys: &[String],
    ) -> StorageResult<HashMap<String, Option<StoredValue>>> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = self.get(key).await?;
            values.insert(key.clone(), value);
        }
        Ok(values)
    }

    /// Apply entries in order. Not atomic: on failure, earlier entries may
    /// already be stored.
    async fn set_batch(&self, entries: Vec<(String, StoredValue)>) -> StorageResult<()> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }

    // ---- notification & lifecycle -----------------------------------------

    /// Subscribe to key-value mutations made through this instance.
    fn on_changed(&self, listener: ChangeListener) -> Subscription;

    /// Release native handles held by the backend.
    async fn dispose(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Typed helpers over [`StorageAdapter`].
#[async_trait]
pub trait StorageAdapterExt: StorageAdapter {
    async fn get_typed<T>(&self, key: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set_typed<T>(&self, key: &str, value: &T) -> StorageResult<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }

    async fn get_structured_typed<T>(&self, collection: &str, id: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_structured(collection, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

impl<S: StorageAdapter + ?Sized> StorageAdapterExt for S {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_round_trip() {
        let ns = KeyNamespace::new(Some("reader".to_string()));
        let physical = ns.apply("font-size");
        assert_eq!(physical, "reader.font-size");
        assert_eq!(ns.strip(&physical), Some("font-size"));
        assert!(ns.owns(&physical));
        assert!(!ns.owns("readerx.font-size"));
        assert!(!ns.owns("other.font-size"));
    }

    #[test]
    fn test_empty_prefix_is_no_prefix() {
        let ns = KeyNamespace::new(Some(String::new()));
        assert_eq!(ns.prefix(), None);
        assert_eq!(ns.apply("k"), "k");
        assert_eq!(ns.strip("anything"), Some("anything"));
        assert_eq!(ns.physical_prefix(), None);
    }

    #[test]
    fn test_change_event_serializes_camel_case() {
        let event = ChangeEvent::new("k", None, Some(serde_json::json!(1)));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"key": "k", "oldValue": null, "newValue": 1})
        );
    }
}
