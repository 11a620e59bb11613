//! Router composing two storage backends.
//!
//! Key-value and batch operations go to `small`; structured operations go to
//! `large`. The assignment is fixed at construction. `clear` and `dispose`
//! reach both. Nothing is atomic across the two.

use async_trait::async_trait;
use bridge_traits::{
    error::StorageResult,
    listeners::Subscription,
    storage::{ChangeEvent, ChangeListener, StorageAdapter, StoredValue},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct HybridStorage {
    small: Arc<dyn StorageAdapter>,
    large: Arc<dyn StorageAdapter>,
}

impl HybridStorage {
    pub fn new(small: Arc<dyn StorageAdapter>, large: Arc<dyn StorageAdapter>) -> Self {
        debug!(
            small = small.backend_name(),
            large = large.backend_name(),
            "Composing hybrid storage"
        );
        Self { small, large }
    }

    pub fn small(&self) -> &Arc<dyn StorageAdapter> {
        &self.small
    }

    pub fn large(&self) -> &Arc<dyn StorageAdapter> {
        &self.large
    }
}

#[async_trait]
impl StorageAdapter for HybridStorage {
    fn backend_name(&self) -> &'static str {
        "hybrid"
    }

    async fn get(&self, key: &str) -> StorageResult<Option<StoredValue>> {
        self.small.get(key).await
    }

    async fn set(&self, key: &str, value: StoredValue) -> StorageResult<()> {
        self.small.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.small.delete(key).await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.small.clear().await?;
        self.large.clear().await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.small.keys().await
    }

    async fn get_structured(
        &self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Option<StoredValue>> {
        self.large.get_structured(collection, id).await
    }

    async fn set_structured(
        &self,
        collection: &str,
        id: &str,
        value: StoredValue,
    ) -> StorageResult<()> {
        self.large.set_structured(collection, id, value).await
    }

    async fn delete_structured(&self, collection: &str, id: Option<&str>) -> StorageResult<()> {
        self.large.delete_structured(collection, id).await
    }

    async fn list_structured(&self, collection: &str) -> StorageResult<Vec<String>> {
        self.large.list_structured(collection).await
    }

    async fn get_batch(
        &self,
        keys: &[String],
    ) -> StorageResult<HashMap<String, Option<StoredValue>>> {
        self.small.get_batch(keys).await
    }

    async fn set_batch(&self, entries: Vec<(String, StoredValue)>) -> StorageResult<()> {
        self.small.set_batch(entries).await
    }

    /// Listens on both backends; no duplicate suppression.
    fn on_changed(&self, listener: ChangeListener) -> Subscription {
        let listener: Arc<dyn Fn(&ChangeEvent) + Send + Sync> = Arc::from(listener);
        let for_large = Arc::clone(&listener);
        let small = self.small.on_changed(Box::new(move |event: &ChangeEvent| listener(event)));
        let large = self
            .large
            .on_changed(Box::new(move |event: &ChangeEvent| for_large(event)));
        small.join(large)
    }

    async fn dispose(&self) -> StorageResult<()> {
        let small = self.small.dispose().await;
        let large = self.large.dispose().await;
        small.and(large)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn router() -> (HybridStorage, Arc<MemoryStorage>, Arc<MemoryStorage>) {
        let small = Arc::new(MemoryStorage::new());
        let large = Arc::new(MemoryStorage::new());
        let hybrid = HybridStorage::new(small.clone(), large.clone());
        (hybrid, small, large)
    }

    #[tokio::test]
    async fn test_key_value_goes_to_small() {
        let (hybrid, small, large) = router();
        hybrid.set("k", json!("v")).await.unwrap();

        assert_eq!(small.get("k").await.unwrap(), Some(json!("v")));
        assert_eq!(large.get("k").await.unwrap(), None);
        assert!(large.list_structured("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_structured_goes_to_large() {
        let (hybrid, small, large) = router();
        hybrid.set_structured("c", "1", json!({})).await.unwrap();

        assert_eq!(large.get_structured("c", "1").await.unwrap(), Some(json!({})));
        assert!(small.keys().await.unwrap().is_empty());
        assert!(small.list_structured("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_goes_to_small() {
        let (hybrid, small, _large) = router();
        hybrid
            .set_batch(vec![("a".into(), json!(1)), ("b".into(), json!(2))])
            .await
            .unwrap();

        let values = hybrid
            .get_batch(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(values.get("a"), Some(&Some(json!(1))));
        assert_eq!(values.get("missing"), Some(&None));
        assert_eq!(small.keys().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_reaches_both() {
        let (hybrid, small, large) = router();
        small.set("k", json!(1)).await.unwrap();
        large.set_structured("c", "1", json!(1)).await.unwrap();

        hybrid.clear().await.unwrap();
        assert!(small.keys().await.unwrap().is_empty());
        assert!(large.list_structured("c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_on_changed_merges_both_backends() {
        let (hybrid, small, large) = router();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = hybrid.on_changed(Box::new(move |_: &ChangeEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        hybrid.set("k", json!(1)).await.unwrap();
        large.set("direct", json!(1)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        sub.unsubscribe();
        small.set("k", json!(2)).await.unwrap();
        large.set("direct", json!(2)).await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
