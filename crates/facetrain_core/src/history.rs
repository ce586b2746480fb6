//! Bounded memory of which jobs the user started, so they can be asked about
//! again after a restart. Never a source of truth for job status.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const PROCESSING_CAPACITY: usize = 50;
pub const COMPLETED_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: String,
    #[serde(default)]
    pub domain: Option<String>,
    /// RFC 3339 timestamp supplied by the caller.
    #[serde(default)]
    pub recorded_at: String,
}

impl HistoryEntry {
    pub fn new(
        job_id: impl Into<String>,
        domain: Option<String>,
        recorded_at: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            domain,
            recorded_at: recorded_at.into(),
        }
    }
}

/// Least-recently-used list of job ids with a fixed capacity.
/// The front is the most recent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentJobs {
    capacity: usize,
    entries: VecDeque<HistoryEntry>,
}

impl RecentJobs {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `entry` as the most recent one. An existing entry with the same
    /// id is moved to the front; entries past capacity are evicted and returned.
    pub fn remember(&mut self, entry: HistoryEntry) -> Vec<HistoryEntry> {
        self.forget(&entry.job_id);
        self.entries.push_front(entry);
        self.evict_overflow()
    }

    pub fn forget(&mut self, job_id: &str) -> Option<HistoryEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.job_id == job_id)?;
        self.entries.remove(index)
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.job_id == job_id)
    }

    pub fn get(&self, job_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.job_id == job_id)
    }

    /// Ids from most to least recent.
    pub fn recent_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.job_id.clone())
            .collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drop the oldest entries until at most `keep` remain.
    pub fn truncate(&mut self, keep: usize) -> Vec<HistoryEntry> {
        let mut evicted = Vec::new();
        while self.entries.len() > keep {
            if let Some(entry) = self.entries.pop_back() {
                evicted.push(entry);
            }
        }
        evicted
    }

    /// Re-apply the capacity, e.g. after deserializing a list written with a
    /// larger one.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<HistoryEntry> {
        self.capacity = capacity.max(1);
        self.evict_overflow()
    }

    fn evict_overflow(&mut self) -> Vec<HistoryEntry> {
        self.truncate(self.capacity)
    }
}

/// Jobs started from this machine, split by whether they were last seen
/// processing or completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHistory {
    pub processing: RecentJobs,
    pub completed: RecentJobs,
}

impl Default for JobHistory {
    fn default() -> Self {
        Self::new(PROCESSING_CAPACITY, COMPLETED_CAPACITY)
    }
}

impl JobHistory {
    pub fn new(processing_capacity: usize, completed_capacity: usize) -> Self {
        Self {
            processing: RecentJobs::with_capacity(processing_capacity),
            completed: RecentJobs::with_capacity(completed_capacity),
        }
    }

    /// Remember a freshly started job.
    pub fn track_started(&mut self, entry: HistoryEntry) {
        self.completed.forget(&entry.job_id);
        self.processing.remember(entry);
    }

    /// Move a job from processing to completed. Unknown ids are ignored so a
    /// status seen for a job started elsewhere never enters the history.
    pub fn mark_completed(&mut self, job_id: &str, recorded_at: &str) -> bool {
        match self.processing.forget(job_id) {
            Some(mut entry) => {
                entry.recorded_at = recorded_at.to_string();
                self.completed.remember(entry);
                true
            }
            None => false,
        }
    }

    /// Forget a job entirely, e.g. after it was deleted on the server or
    /// reported as not found.
    pub fn forget(&mut self, job_id: &str) -> bool {
        let processing = self.processing.forget(job_id).is_some();
        let completed = self.completed.forget(job_id).is_some();
        processing || completed
    }

    pub fn clear_completed(&mut self) {
        self.completed.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.processing.is_empty() && self.completed.is_empty()
    }

    /// Ids that should be re-checked against the status endpoint.
    pub fn ids_to_recheck(&self) -> Vec<String> {
        self.processing.recent_ids()
    }

    /// Halve both lists, dropping the oldest entries. Used when the store
    /// refuses to persist the full history.
    pub fn shrink(&mut self) {
        let processing_keep = self.processing.len() / 2;
        let completed_keep = self.completed.len() / 2;
        self.processing.truncate(processing_keep);
        self.completed.truncate(completed_keep);
    }
}
