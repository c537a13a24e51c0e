//! In-memory object store used by tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{QuillError, Result};
use crate::storage::{ObjectStore, PRIVATE_PREFIX, PUBLIC_PREFIX, TEMP_PREFIX};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Map-backed [`ObjectStore`] with the same key layout as the production
/// store: `temp/`, `public/` and `private/` prefixes. Persisting copies the
/// staged object and leaves the `temp/` entry behind, mirroring a store
/// whose lifecycle rules expire staged blobs on their own.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    public_domain: String,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://quill")
    }
}

impl MemoryObjectStore {
    pub fn new(public_domain: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            public_domain: public_domain.into(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().expect("store lock").contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.read().expect("store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently held under the given prefix, sorted for stable
    /// assertions.
    pub fn keys_under(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .expect("store lock")
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload_temporary(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let key = format!("{TEMP_PREFIX}{name}");
        self.objects.write().expect("store lock").insert(
            key.clone(),
            StoredObject {
                bytes,
                content_type: content_type.to_owned(),
            },
        );
        Ok(key)
    }

    async fn persist(&self, key: &str, target_folder: &str, make_public: bool) -> Result<String> {
        if !key.starts_with(TEMP_PREFIX) {
            return Ok(key.to_owned());
        }

        let file_name = key.rsplit('/').next().unwrap_or(key);
        let folder = target_folder.trim_matches('/');
        let scope = if make_public {
            PUBLIC_PREFIX
        } else {
            PRIVATE_PREFIX
        };
        let new_key = if folder.is_empty() {
            format!("{scope}{file_name}")
        } else {
            format!("{scope}{folder}/{file_name}")
        };

        let mut objects = self.objects.write().expect("store lock");
        let staged = objects
            .get(key)
            .cloned()
            .ok_or_else(|| QuillError::ObjectStore(format!("no staged object at {key}")))?;
        objects.insert(new_key.clone(), staged);
        Ok(new_key)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().expect("store lock").remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        if key.is_empty() {
            return String::new();
        }
        format!("{}/{key}", self.public_domain.trim_end_matches('/'))
    }

    fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        if key.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(
            "{}/{key}?expires={}",
            self.public_domain.trim_end_matches('/'),
            ttl.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_moves_staged_blob_under_target_folder() {
        let store = MemoryObjectStore::default();
        let staged = store
            .upload_temporary("a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(staged, "temp/a.png");

        let key = store.persist(&staged, "posts/media", false).await.unwrap();
        assert_eq!(key, "private/posts/media/a.png");
        assert!(store.contains(&key));
    }

    #[tokio::test]
    async fn persist_passes_permanent_keys_through() {
        let store = MemoryObjectStore::default();
        let key = store
            .persist("private/posts/media/a.png", "posts/media", false)
            .await
            .unwrap();
        assert_eq!(key, "private/posts/media/a.png");
    }

    #[tokio::test]
    async fn persist_of_unknown_staged_key_fails() {
        let store = MemoryObjectStore::default();
        let result = store.persist("temp/missing.png", "posts/media", false).await;
        assert!(matches!(result, Err(QuillError::ObjectStore(_))));
    }

    #[tokio::test]
    async fn delete_is_silent_for_unknown_keys() {
        let store = MemoryObjectStore::default();
        store.delete("private/nope.png").await.unwrap();
    }

    #[test]
    fn urls_are_empty_for_empty_keys() {
        let store = MemoryObjectStore::default();
        assert_eq!(store.public_url(""), "");
        assert_eq!(
            store
                .presigned_url("", Duration::from_secs(60))
                .unwrap(),
            ""
        );
    }
}
