//! Factoid data model: keys, verbs, entries and entry sets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized factoid topic (trimmed, lower-cased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Normalize raw user text into a key.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// The normalized key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key under which quotes of `speaker` are stored.
    pub fn quotes_of(speaker: &str) -> Self {
        Self::new(&format!("{speaker} quotes"))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// The semantic role of an entry.
///
/// Stored as its display form (`is`, `<reply>`, ...) so the persisted
/// encoding stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Verb {
    /// Plain predicate: `key is store`.
    Is,
    /// Plural predicate: `key are store`.
    Are,
    /// Scripted reply, rendered verbatim.
    Reply,
    /// Narrated action.
    Action,
    /// Redirect to another key.
    Alias,
    /// Any other bracketed verb, e.g. `<likes>`.
    Other(String),
}

impl Verb {
    /// Map the word inside `<...>` to a verb.
    pub fn from_bracketed(token: &str) -> Self {
        match token {
            "reply" => Verb::Reply,
            "action" => Verb::Action,
            "alias" => Verb::Alias,
            other => Verb::Other(other.to_string()),
        }
    }

    /// Display form, as used in confirmations and `what was that?`.
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Is => "is",
            Verb::Are => "are",
            Verb::Reply => "<reply>",
            Verb::Action => "<action>",
            Verb::Alias => "<alias>",
            Verb::Other(v) => v,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for String {
    fn from(verb: Verb) -> Self {
        verb.as_str().to_string()
    }
}

impl From<String> for Verb {
    fn from(s: String) -> Self {
        match s.as_str() {
            "is" => Verb::Is,
            "are" => Verb::Are,
            "<reply>" => Verb::Reply,
            "<action>" => Verb::Action,
            "<alias>" => Verb::Alias,
            _ => Verb::Other(s),
        }
    }
}

/// One possible value of a factoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The literal value text, unique within its set.
    pub store: String,
    /// How the value is rendered.
    pub verb: Verb,
    /// Nick of whoever taught it.
    pub author: String,
    /// When it was taught.
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Create an entry stamped with the current time.
    pub fn new(store: impl Into<String>, verb: Verb, author: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            verb,
            author: author.into(),
            created_at: Utc::now(),
        }
    }
}

/// All values of one key, in insertion order, with unique store-strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactSet {
    entries: Vec<Entry>,
}

impl FactSet {
    /// A set holding a single entry.
    pub fn single(entry: Entry) -> Self {
        Self {
            entries: vec![entry],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Whether `store` is already one of the values.
    pub fn contains(&self, store: &str) -> bool {
        self.position(store).is_some()
    }

    /// Index of the entry whose store-string is `store`.
    pub fn position(&self, store: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.store == store)
    }

    /// The alias entry, if this set is an alias.
    pub fn alias(&self) -> Option<&Entry> {
        match self.entries.as_slice() {
            [only] if only.verb == Verb::Alias => Some(only),
            _ => None,
        }
    }

    /// Append an entry and return its index.
    ///
    /// Returns `None` (and leaves the set untouched) when the store-string is
    /// already present.
    pub fn push(&mut self, entry: Entry) -> Option<usize> {
        if self.contains(&entry.store) {
            return None;
        }
        self.entries.push(entry);
        Some(self.entries.len() - 1)
    }

    /// Remove and return the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Entry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }
}
