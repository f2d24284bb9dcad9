use crate::review::counts::{CountKey, DetectionCounts};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "T")]
    Correct,
    #[serde(rename = "F")]
    Incorrect,
}

impl Rating {
    pub fn from_correct(correct: bool) -> Self {
        if correct {
            Rating::Correct
        } else {
            Rating::Incorrect
        }
    }

    pub fn letter(&self) -> &'static str {
        match self {
            Rating::Correct => "T",
            Rating::Incorrect => "F",
        }
    }
}

/// A confirmed review of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub current_frame: u64,
    /// Total frames known when the entry was confirmed; 0 means unknown.
    pub total_frames: u64,
    pub counts: DetectionCounts,
    pub rating: Rating,
}

/// Entry contents before the ledger assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub current_frame: u64,
    pub total_frames: u64,
    pub counts: DetectionCounts,
    pub rating: Rating,
}

/// Review history, most recent entry first.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
    last_id: i64,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the head with an id derived from the wall clock.
    pub fn append(&mut self, entry: NewEntry) -> i64 {
        self.append_at(entry, chrono::Utc::now().timestamp_millis())
    }

    /// Ids are epoch milliseconds bumped past the last issued id, so two
    /// confirmations in the same millisecond still get distinct ids.
    pub fn append_at(&mut self, entry: NewEntry, now_ms: i64) -> i64 {
        let id = now_ms.max(self.last_id + 1);
        self.last_id = id;
        self.entries.push_front(HistoryEntry {
            id,
            current_frame: entry.current_frame,
            total_frames: entry.total_frames,
            counts: entry.counts,
            rating: entry.rating,
        });
        id
    }

    pub fn adjust_count(&mut self, id: i64, key: CountKey, delta: i64) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.counts.adjust(key, delta);
                true
            }
            None => false,
        }
    }

    pub fn set_rating(&mut self, id: i64, rating: Rating) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.rating = rating;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: i64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
