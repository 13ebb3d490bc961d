//! Teaching, retrieving and deleting factoids in one channel's bucket.
//!
//! Every read-modify-write runs as an optimistic transaction against the
//! bucket: fetch with a revision, mutate, commit only if the revision is
//! unchanged. A lost race restarts the operation from the fetch.

use crate::ledger::{LastMutation, LastRetrieval, UndoLedger};
use bucket_memory::store::{FactStore, Fetched};
use bucket_types::error::BucketError;
use bucket_types::factoid::{Entry, FactSet, Key, Verb};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Replaced by the requester's nick when a value is rendered.
pub const WHO_PLACEHOLDER: &str = "$who";

/// How often a conflicting commit is retried before giving up.
pub const MAX_COMMIT_ATTEMPTS: usize = 5;

/// Who is asking, and whether they hold admin rights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub nick: String,
    pub is_admin: bool,
}

impl Requester {
    pub fn new(nick: impl Into<String>, is_admin: bool) -> Self {
        Self {
            nick: nick.into(),
            is_admin,
        }
    }
}

/// Why a command did not go through.
///
/// The display text is what the channel sees; [`Rejection::user_message`]
/// decides whether it is said at all.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("I already knew that!")]
    AlreadyKnown,
    #[error("Can't alias non-empty fact")]
    AliasNonEmpty,
    #[error("That alias goes in circles")]
    AliasLoop,
    #[error("Editing your own factoids?")]
    SelfEdit,
    #[error("Wrong #ID")]
    WrongId,
    #[error("nothing to act on")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("No")]
    Backend(#[source] BucketError),
}

impl Rejection {
    /// The reply for this rejection, `None` when it is handled silently.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Rejection::NotFound | Rejection::PermissionDenied => None,
            other => Some(other.to_string()),
        }
    }
}

/// The factoid operations of one channel, over that channel's bucket.
#[derive(Clone)]
pub struct FactoidStore {
    bucket: Arc<dyn FactStore>,
}

impl FactoidStore {
    pub fn new(bucket: Arc<dyn FactStore>) -> Self {
        Self { bucket }
    }

    pub fn bucket_name(&self) -> &str {
        self.bucket.name()
    }

    /// Add `value` under `key`.
    ///
    /// A key whose set is a single alias forwards the teach to the alias
    /// target. On success the new entry becomes the ledger's last mutation.
    pub async fn teach(
        &self,
        ledger: &UndoLedger,
        author: &str,
        key: &Key,
        verb: Verb,
        value: &str,
    ) -> Result<String, Rejection> {
        let value = value.trim();
        let mut attempt = 0;
        loop {
            let (fetched, index) = self.stage_teach(author, key, &verb, value).await?;
            let target = fetched.key().clone();

            match fetched.commit().await {
                Ok(_) => {
                    ledger.record_mutation(LastMutation {
                        key: target,
                        index,
                        store: value.to_string(),
                        author: author.to_string(),
                    });
                    return Ok(format!("Okay, {author}"));
                }
                Err(e) if e.is_conflict() && attempt + 1 < MAX_COMMIT_ATTEMPTS => {
                    attempt += 1;
                    debug!(key = %key, attempt, "Teach lost a commit race, retrying");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Teach failed");
                    return Err(Rejection::Backend(e));
                }
            }
        }
    }

    /// Fetch the set the teach lands in and append the new entry to it.
    async fn stage_teach(
        &self,
        author: &str,
        key: &Key,
        verb: &Verb,
        value: &str,
    ) -> Result<(Fetched, usize), Rejection> {
        let mut key = key.clone();
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(key.clone()) {
                return Err(Rejection::AliasLoop);
            }
            let mut fetched = Fetched::fetch(&self.bucket, &key)
                .await
                .map_err(Rejection::Backend)?;
            let entry = Entry::new(value, verb.clone(), author);

            let Some(set) = fetched.value.as_mut() else {
                fetched.value = Some(FactSet::single(entry));
                return Ok((fetched, 0));
            };
            if set.contains(value) {
                return Err(Rejection::AlreadyKnown);
            }
            if *verb == Verb::Alias {
                return Err(Rejection::AliasNonEmpty);
            }
            if let Some(alias) = set.alias() {
                key = Key::new(&alias.store);
                continue;
            }
            let index = set.push(entry).ok_or(Rejection::AlreadyKnown)?;
            return Ok((fetched, index));
        }
    }

    /// Pick one value of `key` at random and render it for `requester`.
    ///
    /// Aliases are followed; a chain that revisits a key yields nothing.
    pub async fn retrieve(
        &self,
        ledger: &UndoLedger,
        requester: &str,
        key: &Key,
        strip_action: bool,
    ) -> Option<String> {
        let mut key = key.clone();
        let mut visited = HashSet::new();
        loop {
            if key.is_empty() || !visited.insert(key.clone()) {
                return None;
            }
            let set = match self.bucket.get(&key).await {
                Ok(versioned) => versioned.value?,
                Err(e) => {
                    warn!(key = %key, error = %e, "Factoid lookup failed");
                    return None;
                }
            };
            if set.is_empty() {
                return None;
            }

            let index = rand::thread_rng().gen_range(0..set.len());
            let entry = set.get(index)?;
            if entry.verb == Verb::Alias {
                key = Key::new(&entry.store);
                continue;
            }

            let store = entry.store.replace(WHO_PLACEHOLDER, requester);
            let reply = render(&key, &entry.verb, &store, strip_action);
            ledger.record_retrieval(LastRetrieval {
                key,
                index,
                verb: entry.verb.clone(),
                store,
            });
            return Some(reply);
        }
    }

    /// Remove the entry at `index` (admins only).
    pub async fn delete(
        &self,
        ledger: &UndoLedger,
        requester: &Requester,
        key: &Key,
        index: usize,
    ) -> Result<String, Rejection> {
        if !requester.is_admin {
            debug!(nick = %requester.nick, key = %key, "Delete refused for non-admin");
            return Err(Rejection::PermissionDenied);
        }
        self.remove_entry(ledger, key, move |_| index).await
    }

    /// Remove every value of `key` (admins only).
    pub async fn delete_all(
        &self,
        ledger: &UndoLedger,
        requester: &Requester,
        key: &Key,
    ) -> Result<String, Rejection> {
        if !requester.is_admin {
            debug!(nick = %requester.nick, key = %key, "Delete-all refused for non-admin");
            return Err(Rejection::PermissionDenied);
        }
        match self.bucket.delete(key).await {
            Ok(()) => {
                ledger.clear_mutation();
                Ok(format!("Deleted all {key}"))
            }
            Err(e) => {
                warn!(key = %key, bucket = self.bucket.name(), error = %e, "Delete-all failed");
                Err(Rejection::Backend(e))
            }
        }
    }

    /// Remove the entry chosen by `pick` from the current set of `key`.
    ///
    /// `pick` sees the freshly fetched set on every attempt.
    pub(crate) async fn remove_entry<F>(
        &self,
        ledger: &UndoLedger,
        key: &Key,
        pick: F,
    ) -> Result<String, Rejection>
    where
        F: Fn(&FactSet) -> usize + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut fetched = Fetched::fetch(&self.bucket, key)
                .await
                .map_err(Rejection::Backend)?;
            let Some(set) = fetched.value.as_mut() else {
                return Err(Rejection::NotFound);
            };
            let index = pick(set);
            let Some(removed) = set.remove(index) else {
                return Err(Rejection::WrongId);
            };

            match fetched.commit().await {
                Ok(_) => {
                    ledger.clear_mutation();
                    return Ok(format!(
                        "Deleted {key} #{index} ({} {})",
                        removed.verb, removed.store
                    ));
                }
                Err(e) if e.is_conflict() && attempt + 1 < MAX_COMMIT_ATTEMPTS => {
                    attempt += 1;
                    debug!(key = %key, attempt, "Delete lost a commit race, retrying");
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Delete failed");
                    return Err(Rejection::Backend(e));
                }
            }
        }
    }
}

/// Turn an entry into the text said in the channel.
fn render(key: &Key, verb: &Verb, store: &str, strip_action: bool) -> String {
    match verb {
        Verb::Reply => store.to_string(),
        Verb::Action if strip_action => format!("/me {store}"),
        Verb::Action => format!("\x01ACTION {store}\x01"),
        other => format!("{key} {other} {store}"),
    }
}
