//! In-memory blob store used in tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::traits::{BlobStore, ListPage, StorageError, StorageResult};

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Blob store keeping objects in a sorted in-process map.
///
/// Listing order and pagination semantics match the S3 backend so pipeline
/// tests exercise the same paging paths.
#[derive(Clone)]
pub struct MemoryBlobStore {
    objects: Arc<Mutex<BTreeMap<String, (String, Vec<u8>)>>>,
    page_size: usize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Shrink the listing page size to exercise pagination in tests.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::new()
        }
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Object bytes for test assertions.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(_, d)| d.clone())
    }

    /// Stored content type for test assertions.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(ct, _)| ct.clone())
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), data));
        Ok(key.to_string())
    }

    async fn list(&self, prefix: &str, continuation: Option<String>) -> StorageResult<ListPage> {
        let objects = self.objects.lock().unwrap();
        let mut keys: Vec<String> = objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .filter(|k| continuation.as_deref().is_none_or(|token| k.as_str() > token))
            .collect();

        let next_token = if keys.len() > self.page_size {
            keys.truncate(self.page_size);
            keys.last().cloned()
        } else {
            None
        };

        Ok(ListPage { keys, next_token })
    }

    async fn head(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_head() {
        let store = MemoryBlobStore::new();
        store
            .put("events/shared/e/images/1-0-a.jpg", vec![1], "image/jpeg")
            .await
            .unwrap();

        assert!(store.head("events/shared/e/images/1-0-a.jpg").await.unwrap());
        assert!(!store.head("events/shared/e/images/1-0-b.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let store = MemoryBlobStore::new();
        let err = store.put("../escape", vec![], "image/jpeg").await;
        assert!(matches!(err, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn list_pages_through_prefix() {
        let store = MemoryBlobStore::with_page_size(2);
        for i in 0..5 {
            store
                .put(&format!("p/{}.jpg", i), vec![], "image/jpeg")
                .await
                .unwrap();
        }
        store.put("q/other.jpg", vec![], "image/jpeg").await.unwrap();

        let mut all = Vec::new();
        let mut token = None;
        loop {
            let page = store.list("p/", token).await.unwrap();
            all.extend(page.keys);
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        assert_eq!(all.len(), 5);
        assert!(all.iter().all(|k| k.starts_with("p/")));
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }
}
