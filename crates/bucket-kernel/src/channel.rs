//! A monitored channel and the state it owns.

use crate::factoids::FactoidStore;
use crate::history::HistoryBuffer;
use crate::ledger::UndoLedger;
use bucket_memory::store::FactStore;
use std::sync::{Arc, Mutex};

/// One monitored channel: its bucket, its ledger and its speaker history.
pub struct Channel {
    name: String,
    factoids: FactoidStore,
    ledger: UndoLedger,
    history: Mutex<HistoryBuffer>,
}

impl Channel {
    pub fn new(name: impl Into<String>, bucket: Arc<dyn FactStore>, history_capacity: usize) -> Self {
        Self {
            name: name.into(),
            factoids: FactoidStore::new(bucket),
            ledger: UndoLedger::new(),
            history: Mutex::new(HistoryBuffer::new(history_capacity)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factoids(&self) -> &FactoidStore {
        &self.factoids
    }

    pub fn ledger(&self) -> &UndoLedger {
        &self.ledger
    }

    /// Append a line to the speaker's history.
    pub fn record_line(&self, speaker: &str, text: &str) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(speaker, text);
    }

    /// The most recent line of `speaker` containing `needle`.
    pub fn find_line(&self, speaker: &str, needle: &str) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .find(speaker, needle)
            .map(str::to_string)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("bucket", &self.factoids.bucket_name())
            .finish()
    }
}
