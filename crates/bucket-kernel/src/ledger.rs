//! Per-channel memory of the last mutation and the last retrieval.
//!
//! Backs `undo last` and `what was that?`. The locks are plain
//! `std::sync::Mutex`es and are never held across an `.await`.

use crate::factoids::{FactoidStore, Rejection, Requester};
use bucket_types::factoid::{Key, Verb};
use std::sync::Mutex;
use tracing::debug;

/// The entry most recently added by a teach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMutation {
    pub key: Key,
    /// Position at the time of the teach.
    pub index: usize,
    pub store: String,
    /// Nick of whoever taught it.
    pub author: String,
}

/// The entry most recently rendered by a retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRetrieval {
    pub key: Key,
    pub index: usize,
    pub verb: Verb,
    /// The store-string as rendered, with placeholders substituted.
    pub store: String,
}

#[derive(Debug, Default)]
pub struct UndoLedger {
    mutation: Mutex<Option<LastMutation>>,
    retrieval: Mutex<Option<LastRetrieval>>,
}

impl UndoLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_mutation(&self, mutation: LastMutation) {
        *self.mutation.lock().unwrap_or_else(|e| e.into_inner()) = Some(mutation);
    }

    pub fn clear_mutation(&self) {
        *self.mutation.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn last_mutation(&self) -> Option<LastMutation> {
        self.mutation
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn record_retrieval(&self, retrieval: LastRetrieval) {
        *self.retrieval.lock().unwrap_or_else(|e| e.into_inner()) = Some(retrieval);
    }

    pub fn last_retrieval(&self) -> Option<LastRetrieval> {
        self.retrieval
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Describe the last retrieval: `That was <key> #<index> (<verb> <store>)`.
    pub fn what_was(&self) -> Option<String> {
        self.last_retrieval().map(|r| {
            format!(
                "That was {} #{} ({} {})",
                r.key, r.index, r.verb, r.store
            )
        })
    }

    /// Revert the last teach.
    ///
    /// Allowed for admins and for the author of the entry; anyone else is
    /// ignored and the ledger stays as it is. The entry is located by its
    /// store-string, falling back to the recorded index when the text is no
    /// longer present.
    pub async fn undo_last(
        &self,
        factoids: &FactoidStore,
        requester: &Requester,
    ) -> Result<String, Rejection> {
        let Some(last) = self.last_mutation() else {
            return Err(Rejection::NotFound);
        };
        if !requester.is_admin && requester.nick != last.author {
            debug!(
                nick = %requester.nick,
                author = %last.author,
                "Undo refused for non-author"
            );
            return Err(Rejection::PermissionDenied);
        }

        let store = last.store.clone();
        let fallback = last.index;
        factoids
            .remove_entry(self, &last.key, move |set| {
                set.position(&store).unwrap_or(fallback)
            })
            .await
    }
}
