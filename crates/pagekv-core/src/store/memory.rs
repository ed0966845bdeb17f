use crate::{
    error::InternalError,
    store::{Bucket, BucketError, ExtendedKeyValueStore, KeyValueCache, KeyValueStore},
};
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

///
/// MemoryStore
///
/// Process-local ordered map implementing the extended store capability.
/// Reference backend for tests and embedders; nothing is persisted.
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry (diagnostics and tests).
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        self.entries.read().clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, InternalError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), InternalError> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), InternalError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

impl ExtendedKeyValueStore for MemoryStore {
    fn size(&self) -> Result<u64, InternalError> {
        Ok(self.entries.read().len() as u64)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, InternalError> {
        let entries = self.entries.read();
        let keys = entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        Ok(keys)
    }

    fn range(
        &self,
        prefix: &str,
        f: &mut dyn FnMut(&str, &[u8]) -> bool,
    ) -> Result<(), InternalError> {
        // Snapshot first so the callback may write back into this store.
        let matched: Vec<(String, Vec<u8>)> = {
            let entries = self.entries.read();
            entries
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };

        for (key, value) in &matched {
            if !f(key, value) {
                break;
            }
        }

        Ok(())
    }
}

///
/// MemoryCache
///
/// Named-bucket registry over [`MemoryStore`]s. Buckets are created on
/// first request and live as long as the cache.
///

#[derive(Debug, Default)]
pub struct MemoryCache {
    buckets: RwLock<BTreeMap<String, Arc<MemoryStore>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueCache for MemoryCache {
    fn bucket(&self, name: &str) -> Result<Bucket, InternalError> {
        if name.is_empty() {
            return Err(BucketError::EmptyName.into());
        }

        if let Some(existing) = self.buckets.read().get(name) {
            return Ok(existing.clone());
        }

        let mut buckets = self.buckets.write();
        let store = buckets
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()));

        Ok(store.clone())
    }

    fn existing_bucket(&self, name: &str) -> Result<Option<Bucket>, InternalError> {
        let buckets = self.buckets.read();

        Ok(buckets.get(name).map(|store| store.clone() as Bucket))
    }

    fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().keys().cloned().collect()
    }
}
