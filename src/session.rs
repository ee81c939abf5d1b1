use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::models::ClassificationResult;

/// Number of runs kept by [`SessionHistory`].
pub const HISTORY_LIMIT: usize = 5;

/// One completed classification run.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub source_name: String,
    pub results: Vec<ClassificationResult>,
}

/// Bounded, append-only log of recent runs. Oldest entries are evicted first.
#[derive(Debug)]
pub struct SessionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_LIMIT)
    }
}

impl SessionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a run stamped with the current time.
    pub fn record(&mut self, source_name: &str, results: Vec<ClassificationResult>) -> &HistoryEntry {
        self.push(HistoryEntry {
            timestamp: Utc::now(),
            source_name: source_name.to_string(),
            results,
        })
    }

    fn push(&mut self, entry: HistoryEntry) -> &HistoryEntry {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                debug!(source = %evicted.source_name, "evicted oldest history entry");
            }
        }
        &self.entries[self.entries.len() - 1]
    }

    /// Entries oldest first; the most recent run is last.
    pub fn list(&self) -> impl ExactSizeIterator<Item = &HistoryEntry> + DoubleEndedIterator {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every recorded run; returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        debug!(removed, "history cleared");
        removed
    }
}

/// How terminal output is styled for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Color,
    Plain,
}

impl Theme {
    /// Apply the theme to the process-wide `colored` switch.
    pub fn apply(self) {
        match self {
            Theme::Color => colored::control::unset_override(),
            Theme::Plain => colored::control::set_override(false),
        }
    }
}

/// State that lives for one interactive run of the tool.
#[derive(Debug)]
pub struct Session {
    pub history: SessionHistory,
    theme: Theme,
    last_input: Option<String>,
}

impl Session {
    pub fn new(theme: Theme) -> Self {
        theme.apply();
        Self {
            history: SessionHistory::default(),
            theme,
            last_input: None,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Switch the output style for the rest of the session.
    pub fn set_theme(&mut self, theme: Theme) {
        if theme != self.theme {
            debug!(?theme, "theme changed");
        }
        theme.apply();
        self.theme = theme;
    }

    pub fn set_last_input(&mut self, source_name: &str) {
        self.last_input = Some(source_name.to_string());
    }

    pub fn last_input(&self) -> Option<&str> {
        self.last_input.as_deref()
    }
}
