use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::assets::{Asset, Mode};

/// One completed conversion. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub mode: Mode,
    pub original: Asset,
    pub edited: Asset,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(mode: Mode, original: Asset, edited: Asset) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mode,
            original,
            edited,
            created_at: Utc::now(),
        }
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    pub fn created_at_iso(&self) -> String {
        self.created_at
            .to_rfc3339_opts(SecondsFormat::Millis, false)
    }
}

/// In-memory conversion history, newest first. Unbounded for the lifetime of
/// the owning session and never persisted.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
