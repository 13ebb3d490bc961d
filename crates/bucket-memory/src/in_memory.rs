//! Process-local bucket backed by a `DashMap`.

use crate::store::{FactStore, Versioned, ABSENT};
use async_trait::async_trait;
use bucket_types::error::{BucketError, BucketResult};
use bucket_types::factoid::{FactSet, Key};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;

/// In-memory bucket. Each key holds `(revision, set)`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    name: String,
    facts: DashMap<String, (u64, FactSet)>,
}

impl InMemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            facts: DashMap::new(),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

#[async_trait]
impl FactStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &Key) -> BucketResult<Versioned> {
        Ok(match self.facts.get(key.as_str()) {
            Some(found) => {
                let (revision, set) = found.value();
                Versioned {
                    revision: *revision,
                    value: Some(set.clone()),
                }
            }
            None => Versioned::default(),
        })
    }

    async fn commit(&self, key: &Key, expected: u64, value: Option<FactSet>) -> BucketResult<u64> {
        let conflict = |actual| BucketError::Conflict {
            key: key.to_string(),
            expected,
            actual,
        };
        match self.facts.entry(key.as_str().to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let actual = occupied.get().0;
                if actual != expected {
                    return Err(conflict(actual));
                }
                match value {
                    Some(set) => {
                        occupied.insert((actual + 1, set));
                        Ok(actual + 1)
                    }
                    None => {
                        occupied.remove();
                        Ok(ABSENT)
                    }
                }
            }
            MapEntry::Vacant(vacant) => {
                if expected != ABSENT {
                    return Err(conflict(ABSENT));
                }
                match value {
                    Some(set) => {
                        vacant.insert((1, set));
                        Ok(1)
                    }
                    None => Ok(ABSENT),
                }
            }
        }
    }

    async fn set(&self, key: &Key, value: FactSet) -> BucketResult<()> {
        let mut slot = self
            .facts
            .entry(key.as_str().to_string())
            .or_insert((ABSENT, FactSet::default()));
        let revision = slot.0 + 1;
        *slot = (revision, value);
        Ok(())
    }

    async fn delete(&self, key: &Key) -> BucketResult<()> {
        self.facts.remove(key.as_str());
        Ok(())
    }
}
