//! Recent lines per speaker, consulted by `remember`.

use std::collections::{HashMap, VecDeque};

/// Speakers one channel keeps lines for before the least recently heard
/// one is forgotten.
pub const MAX_SPEAKERS: usize = 1024;

#[derive(Debug, Default)]
struct SpeakerLines {
    /// Tick of the last recorded line.
    heard: u64,
    lines: VecDeque<String>,
}

/// Bounded most-recent-first history of one channel.
///
/// Speakers are keyed case-insensitively; the lines themselves are kept
/// verbatim. Both the lines per speaker and the number of speakers are
/// bounded.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    max_speakers: usize,
    clock: u64,
    speakers: HashMap<String, SpeakerLines>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self::with_speaker_limit(capacity, MAX_SPEAKERS)
    }

    pub fn with_speaker_limit(capacity: usize, max_speakers: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            max_speakers: max_speakers.max(1),
            clock: 0,
            speakers: HashMap::new(),
        }
    }

    /// Remember `text` as the newest line of `speaker`, evicting the oldest
    /// line once the capacity is exceeded.
    pub fn record(&mut self, speaker: &str, text: &str) {
        let speaker = speaker.to_lowercase();
        if !self.speakers.contains_key(&speaker) && self.speakers.len() >= self.max_speakers {
            self.forget_quietest();
        }
        self.clock += 1;
        let entry = self.speakers.entry(speaker).or_default();
        entry.heard = self.clock;
        entry.lines.push_front(text.to_string());
        entry.lines.truncate(self.capacity);
    }

    /// The most recent line of `speaker` containing `needle` (case-sensitive).
    pub fn find(&self, speaker: &str, needle: &str) -> Option<&str> {
        self.speakers
            .get(&speaker.to_lowercase())?
            .lines
            .iter()
            .find(|line| line.contains(needle))
            .map(String::as_str)
    }

    fn forget_quietest(&mut self) {
        let quietest = self
            .speakers
            .iter()
            .min_by_key(|(_, s)| s.heard)
            .map(|(name, _)| name.clone());
        if let Some(name) = quietest {
            self.speakers.remove(&name);
        }
    }

    #[cfg(test)]
    fn len_for(&self, speaker: &str) -> usize {
        self.speakers
            .get(&speaker.to_lowercase())
            .map_or(0, |s| s.lines.len())
    }
}
