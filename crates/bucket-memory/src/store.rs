//! The bucket collaborator trait and the fetch/commit handle.

use async_trait::async_trait;
use bucket_types::error::BucketResult;
use bucket_types::factoid::{FactSet, Key};
use std::sync::Arc;

/// Revision reported for a key that holds no value.
pub const ABSENT: u64 = 0;

/// A value read together with the revision it was read at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Versioned {
    /// `ABSENT` when the key does not exist, otherwise bumped on every write.
    pub revision: u64,
    pub value: Option<FactSet>,
}

/// One named bucket of factoids.
///
/// Backends may block; every method is async so callers treat them as
/// suspending operations.
#[async_trait]
pub trait FactStore: Send + Sync {
    /// The bucket name.
    fn name(&self) -> &str;

    /// Read the set stored under `key`.
    async fn get(&self, key: &Key) -> BucketResult<Versioned>;

    /// Write `value` only if the key is still at revision `expected`.
    ///
    /// `None` deletes the key. Returns the new revision, or
    /// `BucketError::Conflict` when another writer got there first.
    async fn commit(&self, key: &Key, expected: u64, value: Option<FactSet>) -> BucketResult<u64>;

    /// Unconditionally replace the set stored under `key`.
    async fn set(&self, key: &Key, value: FactSet) -> BucketResult<()>;

    /// Unconditionally remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &Key) -> BucketResult<()>;
}

/// A fetched value that can be mutated in place and committed back.
pub struct Fetched {
    store: Arc<dyn FactStore>,
    key: Key,
    revision: u64,
    /// The set as read; mutate it, then call [`Fetched::commit`].
    pub value: Option<FactSet>,
}

impl Fetched {
    /// Read `key` from `store`.
    pub async fn fetch(store: &Arc<dyn FactStore>, key: &Key) -> BucketResult<Self> {
        let Versioned { revision, value } = store.get(key).await?;
        Ok(Self {
            store: Arc::clone(store),
            key: key.clone(),
            revision,
            value,
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Persist the (possibly mutated) value.
    ///
    /// An empty set is committed as a deletion so that no key ever holds an
    /// empty set.
    pub async fn commit(self) -> BucketResult<u64> {
        let value = self.value.filter(|set| !set.is_empty());
        self.store.commit(&self.key, self.revision, value).await
    }
}
