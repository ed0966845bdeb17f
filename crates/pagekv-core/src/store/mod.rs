mod memory;


pub use memory::{MemoryCache, MemoryStore};

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// KeyValueStore
///
/// The only storage capability the indexing layer relies on: opaque string
/// keys mapped to byte values within one bucket. No ordering, no
/// transactions. A missing key is `Ok(None)`, not an error.
///

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, InternalError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), InternalError>;

    /// Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), InternalError>;

    /// Like [`get`](Self::get), with a missing key reported as `NotFound`.
    fn must_get(&self, key: &str) -> Result<Vec<u8>, InternalError> {
        self.get(key)?
            .ok_or_else(|| InternalError::store_not_found(key))
    }
}

///
/// ExtendedKeyValueStore
///
/// Stores that can also enumerate their keys by prefix.
///

pub trait ExtendedKeyValueStore: KeyValueStore {
    /// Number of keys held.
    fn size(&self) -> Result<u64, InternalError>;

    /// Keys starting with `prefix`, in ascending byte order.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, InternalError>;

    /// Visit `(key, value)` pairs under `prefix` until `f` returns `false`.
    fn range(
        &self,
        prefix: &str,
        f: &mut dyn FnMut(&str, &[u8]) -> bool,
    ) -> Result<(), InternalError>;

    /// Lazy key sequence under `prefix`. The default snapshots [`keys`](Self::keys).
    fn stream_keys(&self, prefix: &str) -> Result<KeyStream, InternalError> {
        Ok(KeyStream::new(self.keys(prefix)?))
    }
}

/// Shared handle to one bucket.
pub type Bucket = Arc<dyn ExtendedKeyValueStore>;

///
/// KeyStream
///
/// Finite, non-restartable sequence of keys produced by
/// [`ExtendedKeyValueStore::stream_keys`].
///

pub struct KeyStream(Box<dyn Iterator<Item = String> + Send>);

impl KeyStream {
    #[must_use]
    pub fn new(keys: Vec<String>) -> Self {
        Self(Box::new(keys.into_iter()))
    }
}

impl Iterator for KeyStream {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

///
/// KeyValueCache
///
/// Hands out named buckets (independent key namespaces) over one backend.
///

pub trait KeyValueCache: Send + Sync {
    /// Open or create the named bucket.
    fn bucket(&self, name: &str) -> Result<Bucket, InternalError>;

    /// The named bucket if it was already created; never creates one.
    fn existing_bucket(&self, name: &str) -> Result<Option<Bucket>, InternalError> {
        if self.bucket_names().iter().any(|existing| existing == name) {
            self.bucket(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Names of buckets created so far, sorted.
    fn bucket_names(&self) -> Vec<String>;

    /// [`bucket`](Self::bucket), treating failure as fatal.
    fn must_bucket(&self, name: &str) -> Bucket {
        match self.bucket(name) {
            Ok(bucket) => bucket,
            Err(err) => panic!("bucket '{name}' unavailable: {err}"),
        }
    }
}

///
/// BucketError
///

#[derive(Debug, ThisError)]
pub enum BucketError {
    #[error("bucket name must not be empty")]
    EmptyName,
}

impl From<BucketError> for InternalError {
    fn from(err: BucketError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Store, err.to_string())
    }
}
