//! Named bucket registry built from the storage configuration.

use crate::in_memory::InMemoryStore;
use crate::sqlite::SqliteStore;
use crate::store::FactStore;
use bucket_types::config::{StorageBackend, StorageConfig};
use bucket_types::error::{BucketError, BucketResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Every bucket the bot may touch, keyed by bucket name.
#[derive(Clone, Default)]
pub struct Buckets {
    stores: HashMap<String, Arc<dyn FactStore>>,
}

impl Buckets {
    /// Open one store per bucket name using the configured backend.
    pub fn open<I>(config: &StorageConfig, names: I) -> BucketResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut buckets = Self::default();
        match config.backend {
            StorageBackend::Memory => {
                for name in names {
                    buckets.insert(Arc::new(InMemoryStore::new(name)));
                }
            }
            StorageBackend::Sqlite => {
                let path = config.path.as_deref().ok_or_else(|| {
                    BucketError::Config("storage.path is required for the sqlite backend".into())
                })?;
                let conn = SqliteStore::open_connection(path)?;
                for name in names {
                    buckets.insert(Arc::new(SqliteStore::new(name, Arc::clone(&conn))));
                }
            }
        }
        info!(
            backend = ?config.backend,
            count = buckets.len(),
            "Opened buckets"
        );
        Ok(buckets)
    }

    /// In-memory buckets with the given names.
    pub fn in_memory<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut buckets = Self::default();
        for name in names {
            buckets.insert(Arc::new(InMemoryStore::new(name)));
        }
        buckets
    }

    /// Register a store under its own name, replacing any previous one.
    pub fn insert(&mut self, store: Arc<dyn FactStore>) {
        self.stores.insert(store.name().to_string(), store);
    }

    pub fn get(&self, name: &str) -> BucketResult<Arc<dyn FactStore>> {
        self.stores
            .get(name)
            .cloned()
            .ok_or_else(|| BucketError::UnknownBucket(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
